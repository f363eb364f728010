//! `log` backend for the CLI
//!
//! Records at or above the chosen verbosity go to stderr. Warnings and errors
//! are also appended to the event log so `rk logs list --errors` shows them.

use colored::Colorize;
use log::{Level, LevelFilter, Log, Metadata, Record};

use reconkit_core::{LogEvent, LoggingService};

struct CliLogger {
    stderr_level: LevelFilter,
    events: Option<LoggingService>,
}

fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

impl Log for CliLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.stderr_level || metadata.level() <= Level::Warn
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        if record.level() <= self.stderr_level {
            let line = format!("[{}] {}", record.level(), record.args());
            match record.level() {
                Level::Error => eprintln!("{}", line.red()),
                Level::Warn => eprintln!("{}", line.yellow()),
                _ => eprintln!("{}", line.dimmed()),
            }
        }

        if record.level() <= Level::Warn {
            if let Some(events) = &self.events {
                let event = LogEvent::new(format!("log_{}", record.level().as_str().to_lowercase()))
                    .with_error(record.args().to_string())
                    .with_error_details(record.target());
                // Logging must never break a command
                let _ = events.log(event);
            }
        }
    }

    fn flush(&self) {}
}

/// Install the logger; a second call is a no-op
pub fn init(verbosity: u8, events: Option<LoggingService>) {
    let stderr_level = level_for(verbosity);
    let logger = CliLogger { stderr_level, events };
    if log::set_boxed_logger(Box::new(logger)).is_ok() {
        log::set_max_level(stderr_level.max(LevelFilter::Warn));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(9), LevelFilter::Trace);
    }

    #[test]
    fn test_warnings_reach_event_log() {
        let dir = tempfile::tempdir().unwrap();
        let service = LoggingService::new(dir.path(), reconkit_core::EntryPoint::Cli, "test").unwrap();
        let logger = CliLogger {
            stderr_level: LevelFilter::Off,
            events: Some(service),
        };

        logger.log(
            &Record::builder()
                .level(Level::Warn)
                .target("reconkit_core::services::load")
                .args(format_args!("2 cell(s) could not be parsed"))
                .build(),
        );
        logger.log(&Record::builder().level(Level::Info).args(format_args!("loaded")).build());

        let entries = logger.events.as_ref().unwrap().get_recent(10).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event, "log_warn");
        assert_eq!(entries[0].error_details.as_deref(), Some("reconkit_core::services::load"));
    }
}
