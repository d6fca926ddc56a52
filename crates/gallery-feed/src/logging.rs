use std::path::PathBuf;

use anyhow::Context;

/// Default filter when `RUST_LOG` is unset.  Keeps connection-level DEBUG
/// from the HTTP client internals out of the log.
pub const DEFAULT_FILTER: &str = "info,hyper_util=warn,reqwest=warn,hyper=warn";

/// Install the global tracing subscriber.
///
/// Logs go to `<data_dir>/gallery.log` unless `to_stderr` is set.  Returns the
/// log file path when logging to a file.
pub fn init(to_stderr: bool) -> anyhow::Result<Option<PathBuf>> {
    let log_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| DEFAULT_FILTER.to_string());

    if to_stderr {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(log_filter.as_str())
            .init();
        return Ok(None);
    }

    let data_dir = gallery_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create {}", data_dir.display()))?;
    let log_path = data_dir.join("gallery.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();
    Ok(Some(log_path))
}
