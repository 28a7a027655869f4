use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{config::LogConfig, error::LogError};

/// The terminal belongs to the dashboard, so logs always go to a file.
pub fn default_log_path() -> Option<PathBuf> {
    return dirs::state_dir()
        .or_else(dirs::cache_dir)
        .map(|dir| dir.join("kafkasync").join("dashboard.log"));
}

/// Installs the global JSON subscriber.</br>
/// Returns the file logs are written to, or `None` if no location could be found and logs are discarded.
pub fn init_logging(config: &LogConfig) -> Result<Option<PathBuf>, LogError> {
    let path = config.file.clone().or_else(default_log_path);
    let filter = env_filter(&config.level);

    match &path {
        Some(path) => {
            let file = open_log_file(path)?;
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_current_span(false)
                        .with_span_list(false)
                        .with_writer(Mutex::new(file)),
                )
                .with(filter)
                .try_init()?;
        }
        None => {
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::sink))
                .with(filter)
                .try_init()?;
        }
    }

    return Ok(path);
}

/// `RUST_LOG` wins over the configured level.
fn env_filter(level: &str) -> EnvFilter {
    return EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kafkasync_dashboard={level}")));
}

fn open_log_file(path: &Path) -> Result<File, LogError> {
    let to_err = |source| LogError::File { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(to_err)?;
    }
    return OpenOptions::new().create(true).append(true).open(path).map_err(to_err);
}
