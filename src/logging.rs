use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use env_logger::{Builder, Env, Target};

use crate::config::Config;

/// Environment variable holding the log filter (same syntax as `RUST_LOG`).
pub const LOG_ENV: &str = "MDPANE_LOG";

pub fn log_path() -> PathBuf {
    Config::cache_dir().join("mdpane.log")
}

/// Route `log` output to a file; the terminal belongs to the UI.
///
/// If the log file cannot be opened logging stays disabled.
pub fn init() {
    let path = log_path();
    if let Some(parent) = path.parent() {
        if fs::create_dir_all(parent).is_err() {
            return;
        }
    }
    let file = match OpenOptions::new().create(true).append(true).open(&path) {
        Ok(file) => file,
        Err(_) => return,
    };

    let _ = Builder::from_env(Env::default().filter_or(LOG_ENV, "info"))
        .target(Target::Pipe(Box::new(file)))
        .format_timestamp_millis()
        .try_init();
}
