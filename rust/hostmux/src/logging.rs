use anyhow::{Context, Result};
use simplelog::*;
use std::{fmt, fs, path::PathBuf, str::FromStr};

/// Syslog-style severity. Lower is more severe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    Emerg = 0,
    Alert,
    Crit,
    Err,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Priority {
    pub const ALL: [Priority; 8] = [
        Priority::Emerg,
        Priority::Alert,
        Priority::Crit,
        Priority::Err,
        Priority::Warning,
        Priority::Notice,
        Priority::Info,
        Priority::Debug,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Emerg => "EMERG",
            Priority::Alert => "ALERT",
            Priority::Crit => "CRIT",
            Priority::Err => "ERR",
            Priority::Warning => "WARNING",
            Priority::Notice => "NOTICE",
            Priority::Info => "INFO",
            Priority::Debug => "DEBUG",
        }
    }

    /// Nearest `log` crate level.
    pub fn level(self) -> log::Level {
        match self {
            Priority::Emerg | Priority::Alert | Priority::Crit | Priority::Err => log::Level::Error,
            Priority::Warning => log::Level::Warn,
            Priority::Notice | Priority::Info => log::Level::Info,
            Priority::Debug => log::Level::Debug,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown log level: {0} (expected one of EMERG, ALERT, CRIT, ERR, WARNING, NOTICE, INFO, DEBUG)")]
pub struct UnknownPriority(String);

impl FromStr for Priority {
    type Err = UnknownPriority;

    fn from_str(s: &str) -> Result<Self, UnknownPriority> {
        let want = s.trim().to_uppercase();
        Priority::ALL
            .into_iter()
            .find(|p| p.as_str() == want)
            .ok_or(UnknownPriority(want))
    }
}

#[derive(Clone, Debug)]
pub struct LogConfig {
    pub file: PathBuf,
    pub min_priority: Priority,
    /// Mirror everything to the terminal as well.
    pub stderr: bool,
}

/// Handle every component logs through.
///
/// Holds only the minimum priority; it is built once at startup and cloned
/// into whatever needs it. Records are forwarded to the `log` facade, whose
/// sink is installed by [`init`].
#[derive(Clone, Copy, Debug)]
pub struct Logger {
    min_priority: Priority,
}

impl Logger {
    pub fn new(min_priority: Priority) -> Self {
        Self { min_priority }
    }

    pub fn min_priority(&self) -> Priority {
        self.min_priority
    }

    pub fn enabled(&self, priority: Priority) -> bool {
        priority <= self.min_priority
    }

    pub fn log(&self, priority: Priority, msg: impl fmt::Display) {
        if self.enabled(priority) {
            log::log!(priority.level(), "{}: {}", priority, msg);
        }
    }

    pub fn logf(&self, priority: Priority, args: fmt::Arguments<'_>) {
        self.log(priority, args)
    }

    /// Writes to the log file and stderr, then exits with status 1.
    pub fn fatal(&self, msg: impl fmt::Display) -> ! {
        let line = format!("FATAL: {msg}");
        log::error!("{line}");
        log::logger().flush();
        eprintln!("{line}");
        std::process::exit(1)
    }
}

/// Installs the file sink (plus the terminal one if asked) and returns the handle.
pub fn init(cfg: &LogConfig) -> Result<Logger> {
    // Filtering by priority happens in `Logger`; the sink only needs to be
    // at least as permissive.
    let level = cfg.min_priority.level().to_level_filter();

    if let Some(parent) = cfg.file.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&cfg.file)
        .with_context(|| format!("open log file {}", cfg.file.display()))?;

    // simplelog always prints its own level tag; the priority name follows it.
    let sink_cfg = ConfigBuilder::new()
        .set_target_level(LevelFilter::Off)
        .set_location_level(LevelFilter::Off)
        .set_thread_level(LevelFilter::Off)
        .set_time_format_rfc3339()
        .build();

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(WriteLogger::new(level, sink_cfg.clone(), file));
    if cfg.stderr {
        loggers.push(TermLogger::new(level, sink_cfg, TerminalMode::Stderr, ColorChoice::Auto));
    }
    CombinedLogger::init(loggers).context("install logger")?;

    Ok(Logger::new(cfg.min_priority))
}
