//! Per-transfer progress bar on stderr.

use indicatif::{ProgressBar, ProgressStyle};

const BAR_TEMPLATE: &str =
    "{msg} [{bar:30.cyan/blue}] {bytes}/{total_bytes} {bytes_per_sec} ({eta})";
const SPINNER_TEMPLATE: &str = "{spinner} {msg} {bytes} {bytes_per_sec}";

/// Creates the bar for one transfer.
///
/// `total` is the full size when known, bytes already on disk included, and
/// the bar starts at `offset`. Unknown sizes get a spinner. Returns a hidden
/// bar when `enabled` is false.
pub(crate) fn transfer_bar(
    enabled: bool,
    label: &str,
    total: Option<u64>,
    offset: u64,
) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let bar = match total {
        Some(total) => {
            let bar = ProgressBar::new(total);
            bar.set_style(
                ProgressStyle::with_template(BAR_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("=> "),
            );
            bar
        }
        None => {
            let bar = ProgressBar::new_spinner();
            bar.set_style(
                ProgressStyle::with_template(SPINNER_TEMPLATE)
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar
        }
    };
    bar.set_message(label.to_string());
    bar.set_position(offset);
    bar
}
