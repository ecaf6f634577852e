//! Log sink setup.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use env_logger::{Builder, Logger, Target};
use log::LevelFilter;

use crate::error::{Error, Result};

/// Where log lines go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    /// Standard error.
    Console,
    /// A file, truncated when the logger is built.
    File(PathBuf),
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub sink: LogSink,
    pub level: LevelFilter,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            sink: LogSink::Console,
            level: LevelFilter::Info,
        }
    }
}

/// Build the logger described by `config` without installing it.
///
/// `RUST_LOG` still refines the configured level.
pub fn build(config: &LogConfig) -> Result<Logger> {
    let mut builder = Builder::new();
    builder.filter_level(config.level).parse_default_env();
    builder.format(|buf, record| {
        writeln!(
            buf,
            "{:<8} {} ({}:{}) {}",
            record.level(),
            chrono::Local::now().format("%y-%m-%d %H:%M:%S"),
            record.file().unwrap_or("?"),
            record.line().unwrap_or(0),
            record.args()
        )
    });

    match &config.sink {
        LogSink::Console => {
            builder.target(Target::Stderr);
        }
        LogSink::File(path) => {
            if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            let file = File::create(path)?;
            builder.target(Target::Pipe(Box::new(file)));
        }
    }

    Ok(builder.build())
}

/// Build the logger and install it as the process logger. Call once.
pub fn init(config: &LogConfig) -> Result<()> {
    let logger = build(config)?;
    log::set_max_level(logger.filter());
    log::set_boxed_logger(Box::new(logger)).map_err(|e| Error::Logging(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use log::{Level, Log, Record};

    #[test]
    fn file_sink_truncates_and_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("proxy_keeper.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "previous run\n").unwrap();

        let logger = build(&LogConfig {
            sink: LogSink::File(path.clone()),
            level: LevelFilter::Debug,
        })
        .unwrap();
        logger.log(
            &Record::builder()
                .level(Level::Info)
                .file(Some("scheduler.rs"))
                .line(Some(42))
                .args(format_args!("Count actual proxies: {}", 7))
                .build(),
        );
        logger.flush();

        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains("previous run"));
        assert!(written.starts_with("INFO     "));
        assert!(written.contains("(scheduler.rs:42) Count actual proxies: 7"));
    }

    #[test]
    fn file_sink_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("run.log");

        build(&LogConfig {
            sink: LogSink::File(path.clone()),
            level: LevelFilter::Info,
        })
        .unwrap();

        assert!(path.exists());
    }
}
