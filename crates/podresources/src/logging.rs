//! provides logging helpers

use std::path::Path;

use anyhow::Context;
use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry;

/// initiate the global tracing subscriber
///
/// Logs always go to stderr. With `log_file` they are also written to a
/// daily rotated file; keep the returned guard alive until exit so buffered
/// lines get flushed.
pub fn init(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let fmt_layer = utils::logging::get_fmt_layer().with_filter(utils::logging::env_filter());

    let (file_layer, file_guard) = match log_file {
        Some(log_file) => {
            let (directory, prefix) = split_log_path(log_file)?;
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(prefix)
                .max_log_files(3)
                .build(directory)
                .context("failed to create rolling file appender")?;
            let (file_writer, file_guard) = tracing_appender::non_blocking(appender);

            let file_layer = layer()
                .with_writer(file_writer)
                .with_ansi(false)
                .with_filter(utils::logging::env_filter());
            (Some(file_layer), Some(file_guard))
        }
        None => (None, None),
    };

    registry().with(fmt_layer).with(file_layer).init();
    Ok(file_guard)
}

fn split_log_path(log_file: &Path) -> Result<(&Path, &str)> {
    let prefix = log_file
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("invalid log file name: {}", log_file.display()))?;
    let directory = log_file
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    Ok((directory, prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_absolute_log_path() {
        let (directory, prefix) =
            split_log_path(Path::new("/var/log/nri/podresources.log")).unwrap();
        assert_eq!(directory, Path::new("/var/log/nri"));
        assert_eq!(prefix, "podresources.log");
    }

    #[test]
    fn split_bare_file_name() {
        let (directory, prefix) = split_log_path(Path::new("podresources.log")).unwrap();
        assert_eq!(directory, Path::new("."));
        assert_eq!(prefix, "podresources.log");
    }

    #[test]
    fn reject_directory_only_path() {
        assert!(split_log_path(Path::new("/")).is_err());
    }
}
