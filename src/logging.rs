use anyhow::{Context, Result};
use env_logger::{Builder, Env, Target};
use std::fs::OpenOptions;
use std::path::Path;

/// Routes `log` records to a file so they never tear the terminal UI.
/// `RUST_LOG` overrides the default `info` filter.
pub fn init(log_file: &Path) -> Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;

    Builder::from_env(Env::default().default_filter_or("info"))
        .filter_module("symphonia_bundle_mp3", log::LevelFilter::Error)
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_secs()
        .try_init()
        .context("logger already initialised")?;
    Ok(())
}
