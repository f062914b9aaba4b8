use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use glob::glob;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Error)]
pub enum LoggerError {
    #[error("unable to prepare log directory {path}: {source}")]
    LogDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid log filter '{0}'")]
    Filter(String),

    #[error("a global logger is already installed: {0}")]
    AlreadyInstalled(String),
}

/// # Logger Local Options
///
/// Where and how much a process logs. Console output is always on; file
/// output is added when `log_dir` is set.
#[derive(Debug, Clone)]
pub struct LoggerLocalOptions {
    /// Prefix of the log file names, usually the binary name.
    pub app_name: String,
    /// Default filter directive (`info`, `debug`, `lib_fusion=trace`, ...).
    /// `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Directory for `<app_name>-<timestamp>.log` files.
    pub log_dir: Option<PathBuf>,
}

/// # Logger Local
///
/// Installs the process-wide `tracing` subscriber. Keep the value alive for
/// the lifetime of `main`: dropping it flushes and stops the file writer.
pub struct LoggerLocal {
    current_log_file: Option<PathBuf>,
    _guard: Option<WorkerGuard>,
}

impl LoggerLocal {
    /// Sets up console logging and, if configured, file logging.
    ///
    /// Before the new file is opened, older files of the same application are
    /// pruned so that only the most recent previous run is kept next to the
    /// new one.
    pub fn init(options: LoggerLocalOptions) -> Result<Self, LoggerError> {
        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&options.level)
                .map_err(|_| LoggerError::Filter(options.level.clone()))?,
        };

        let mut current_log_file = None;
        let mut guard = None;
        let file_layer = match &options.log_dir {
            Some(dir) => {
                fs::create_dir_all(dir).map_err(|source| LoggerError::LogDir {
                    path: dir.clone(),
                    source,
                })?;
                rotate_logs(&options.app_name, dir, 1);

                let file_name = log_file_name(&options.app_name);
                let appender = tracing_appender::rolling::never(dir, &file_name);
                let (writer, worker) = tracing_appender::non_blocking(appender);
                current_log_file = Some(dir.join(file_name));
                guard = Some(worker);
                Some(fmt::layer().with_ansi(false).with_writer(writer))
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggerError::AlreadyInstalled(e.to_string()))?;

        Ok(Self {
            current_log_file,
            _guard: guard,
        })
    }

    /// The file this process is writing to, if file logging is enabled.
    pub fn current_log_file(&self) -> Option<&Path> {
        self.current_log_file.as_deref()
    }
}

fn log_file_name(app_name: &str) -> String {
    format!("{}-{}.log", app_name, Local::now().format("%Y%m%d_%H%M%S"))
}

/// Deletes all but the `keep` newest `<app_name>-*.log` files in `log_dir`.
///
/// File names carry a sortable timestamp, so the newest files sort last.
/// Failures to delete individual files are reported on stderr; the
/// subscriber is not installed yet at this point. Returns how many files were
/// removed.
pub fn rotate_logs(app_name: &str, log_dir: &Path, keep: usize) -> usize {
    let pattern = log_dir.join(format!("{app_name}-*.log"));
    let entries = match glob(&pattern.to_string_lossy()) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Invalid log rotation pattern {}: {}", pattern.display(), e);
            return 0;
        }
    };

    let mut log_files: Vec<PathBuf> = entries.filter_map(Result::ok).collect();
    log_files.sort();

    let excess = log_files.len().saturating_sub(keep);
    let mut removed = 0;
    for old_file in log_files.iter().take(excess) {
        match fs::remove_file(old_file) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Error deleting old log file {}: {}", old_file.display(), e),
        }
    }
    removed
}
