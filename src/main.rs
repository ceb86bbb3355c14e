//! CLI entry point for drivedl.

use std::io::IsTerminal;
use std::path::{MAIN_SEPARATOR, Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Result, bail};
use clap::Parser;
use drivedl_core::cache::default_cache_root;
use drivedl_core::folder::FolderOptions;
use drivedl_core::{
    CacheManager, Destination, DownloadEngine, FolderWalker, ResourceDescriptor,
    ServiceEndpoints, SessionOptions, parse_byte_rate, parse_resource,
};
use tracing::{debug, info, warn};

mod app_config;
mod cli;
mod exit_handler;

use app_config::FileConfig;
use cli::Args;
use exit_handler::{ProcessExit, determine_exit_outcome, render_failure};

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    // Logs go to stderr so `-O -` can stream file bytes on stdout.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(outcome) => outcome.into(),
        Err(error) => {
            eprintln!("{}", render_failure(&error));
            ProcessExit::Failure.into()
        }
    }
}

async fn run(args: &Args) -> Result<ProcessExit> {
    let file_config = match args.config.as_deref() {
        Some(path) => app_config::load_file_config(path)?,
        None => app_config::load_default_file_config()?,
    };

    let session = build_session(args, &file_config)?;
    let endpoints = args
        .endpoint_base
        .as_deref()
        .map_or_else(ServiceEndpoints::default, ServiceEndpoints::with_base)
        .with_api_key(file_config.api_key.clone());
    let engine = DownloadEngine::new(endpoints);

    if args.id {
        warn!("--id is deprecated: bare ids are detected automatically");
    }

    if args.cache {
        return run_cached(args, &file_config, engine, session).await;
    }

    let descriptor = parse_resource(&args.url_or_id, args.id, args.fuzzy)?
        .with_export_format(args.format.clone());
    debug!(kind = %descriptor.kind, id = %descriptor.id, "resolved input");

    if args.folder {
        run_folder(args, &file_config, engine, &descriptor, &session).await
    } else {
        run_file(args, &engine, &descriptor, &session).await
    }
}

async fn run_file(
    args: &Args,
    engine: &DownloadEngine,
    descriptor: &ResourceDescriptor,
    session: &SessionOptions,
) -> Result<ProcessExit> {
    if args.output_is_stdout() {
        let mut stdout = tokio::io::stdout();
        let outcome = engine
            .download(descriptor, Destination::Writer(&mut stdout), session)
            .await?;
        debug!(bytes = outcome.bytes_written, "streamed to stdout");
        return Ok(ProcessExit::Success);
    }

    let outcome = engine
        .download(descriptor, output_destination(args.output.as_deref()), session)
        .await?;
    if let Some(path) = &outcome.path {
        info!(
            path = %path.display(),
            bytes = outcome.bytes_written,
            resumed = outcome.resumed,
            "saved"
        );
    }
    Ok(ProcessExit::Success)
}

async fn run_folder(
    args: &Args,
    file_config: &FileConfig,
    engine: DownloadEngine,
    descriptor: &ResourceDescriptor,
    session: &SessionOptions,
) -> Result<ProcessExit> {
    if args.output_is_stdout() {
        bail!("A folder cannot be written to stdout; pass a directory with -O");
    }

    let options = FolderOptions {
        max_files: args.max_files_or(file_config.max_files),
        remaining_ok: args.remaining_ok,
        on_error: args
            .on_error
            .or(file_config.on_folder_error)
            .unwrap_or_default(),
    };
    let output_dir = args.output.as_deref().map_or_else(|| PathBuf::from("."), PathBuf::from);

    let walker = FolderWalker::new(engine, options);
    let report = walker
        .download_folder(descriptor, &output_dir, session)
        .await?;

    for failure in &report.failures {
        warn!(path = %failure.path.display(), error = %failure.error, "not downloaded");
    }
    info!(
        root = %report.root.display(),
        downloaded = report.downloaded.len(),
        failed = report.failures.len(),
        "folder saved"
    );
    Ok(determine_exit_outcome(
        report.downloaded.len(),
        report.failures.len(),
    ))
}

async fn run_cached(
    args: &Args,
    file_config: &FileConfig,
    engine: DownloadEngine,
    session: SessionOptions,
) -> Result<ProcessExit> {
    if args.output_is_stdout() {
        bail!("Cached downloads are written to disk; -O - is not supported with --cache");
    }

    let Some(root) = args
        .cache_dir
        .clone()
        .or_else(|| file_config.cache_dir.clone())
        .or_else(default_cache_root)
    else {
        bail!("No cache directory: set --cache-dir, `cache_dir` in the config, or HOME");
    };

    let cache = CacheManager::open(root, engine)?
        .with_session(session)
        .with_fuzzy(args.fuzzy);
    let path = cache
        .cached_download(
            &args.url_or_id,
            args.output.as_deref().map(Path::new),
            args.md5.as_deref(),
            None,
        )
        .await?;

    println!("{}", path.display());
    Ok(ProcessExit::Success)
}

/// Merges CLI flags over config file values over built-in defaults.
fn build_session(args: &Args, file_config: &FileConfig) -> Result<SessionOptions> {
    let defaults = SessionOptions::default();
    let speed = match args.speed {
        Some(speed) => Some(speed),
        None => file_config
            .speed
            .as_deref()
            .map(parse_byte_rate)
            .transpose()?,
    };

    Ok(SessionOptions {
        resume: args.resume,
        proxy: args.proxy.clone().or_else(|| file_config.proxy.clone()),
        use_cookies: !args.no_cookies && file_config.use_cookies.unwrap_or(true),
        verify_tls: !args.no_check_certificate && file_config.verify_tls.unwrap_or(true),
        connect_timeout: file_config
            .connect_timeout_secs
            .map_or(defaults.connect_timeout, Duration::from_secs),
        read_timeout: file_config
            .read_timeout_secs
            .map_or(defaults.read_timeout, Duration::from_secs),
        progress: !args.quiet && std::io::stderr().is_terminal(),
        ..defaults
    }
    .with_speed(speed))
}

/// A trailing separator or an existing directory means "save inside it".
fn output_destination(output: Option<&str>) -> Destination<'static> {
    match output {
        None => Destination::Directory(PathBuf::from(".")),
        Some(path)
            if path.ends_with('/') || path.ends_with(MAIN_SEPARATOR) || Path::new(path).is_dir() =>
        {
            Destination::Directory(PathBuf::from(path))
        }
        Some(path) => Destination::File(PathBuf::from(path)),
    }
}
