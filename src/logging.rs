use std::{
    io::{self, IsTerminal},
    path::{Path, PathBuf},
};

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{
    fmt::{self, time::UtcTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

use crate::cli::ColorChoice;

/// Keeps the background log file writer alive. Dropping it flushes the file.
pub struct LogGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Console filter for a given number of `-v` flags.
pub fn console_filter(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "info,libmdview=debug,livefs=debug",
        2 => "info,libmdview=trace,livefs=trace",
        _ => "trace",
    }
}

pub fn log_dir(config_dir: &Path) -> PathBuf {
    config_dir.join("logs")
}

/// Installs the global subscriber. `log` records from library code are
/// bridged into it.
///
/// The file layer is only added when both `config_dir` and `file_log_level`
/// are present and the log directory can be created.
pub fn init_logging(
    verbosity: u8,
    color: ColorChoice,
    config_dir: Option<&Path>,
    file_log_level: Option<LevelFilter>,
    command_name: &str,
) -> LogGuard {
    let console_env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_filter(verbosity)));

    let use_ansi = match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => io::stderr().is_terminal(),
    };

    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(use_ansi)
        .without_time()
        .with_target(false)
        .with_thread_names(false)
        .with_level(true)
        .with_filter(console_env_filter);

    let mut file_guard = None;

    let file_layer = match (config_dir, file_log_level) {
        (Some(dir), Some(level)) => {
            let log_dir = log_dir(dir);

            match build_appender(&log_dir, command_name) {
                Ok(appender) => {
                    let (non_blocking, guard) = tracing_appender::non_blocking(appender);
                    file_guard = Some(guard);

                    let layer = fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_timer(UtcTime::rfc_3339())
                        .with_target(true)
                        .with_thread_names(true)
                        .with_level(true)
                        .with_filter(level);

                    Some(layer)
                }
                Err(err) => {
                    eprintln!(
                        "Warning: could not open log directory {}: {err}",
                        log_dir.display()
                    );
                    None
                }
            }
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    LogGuard {
        _file_guard: file_guard,
    }
}

fn build_appender(
    log_dir: &Path,
    command_name: &str,
) -> anyhow::Result<tracing_appender::rolling::RollingFileAppender> {
    fs_err::create_dir_all(log_dir)?;

    let appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix(command_name)
        .filename_suffix("log")
        .max_log_files(7)
        .build(log_dir)?;

    Ok(appender)
}
