//! Exit code logic and failure rendering for the drivedl process.

use std::process::ExitCode;

use drivedl_core::{CacheError, DownloadError, FolderError, LocatorError};

/// Process outcome, mapped onto the exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProcessExit {
    Success,
    /// Some folder files were skipped after failing.
    Partial,
    Failure,
}

impl From<ProcessExit> for ExitCode {
    fn from(value: ProcessExit) -> Self {
        match value {
            ProcessExit::Success => ExitCode::SUCCESS,
            ProcessExit::Failure => ExitCode::from(1),
            ProcessExit::Partial => ExitCode::from(2),
        }
    }
}

/// Determines the process exit outcome from completed and failed download counts.
pub(crate) fn determine_exit_outcome(completed: usize, failed: usize) -> ProcessExit {
    if failed == 0 {
        ProcessExit::Success
    } else if completed > 0 {
        ProcessExit::Partial
    } else {
        ProcessExit::Failure
    }
}

/// Formats a fatal error for stderr.
///
/// Library errors already carry their cause and a suggestion line, so only
/// their own message is printed. Anything else prints the full context chain.
pub(crate) fn render_failure(error: &anyhow::Error) -> String {
    if let Some(FolderError::Capacity { .. }) = error.downcast_ref::<FolderError>() {
        return format!("Failed to retrieve folder contents:\n\n\t{error}");
    }
    if let Some(e @ DownloadError::Transport { .. }) = error.downcast_ref::<DownloadError>() {
        return format!("Failed to download:\n\n\t{e}");
    }

    let typed = error.is::<DownloadError>()
        || error.is::<FolderError>()
        || error.is::<CacheError>()
        || error.is::<LocatorError>();
    if typed {
        format!("Error: {error}")
    } else {
        format!("Error: {error:#}")
    }
}
