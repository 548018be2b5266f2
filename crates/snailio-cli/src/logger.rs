//! Stderr backend for the `log` facade.
//!
//! Level comes from `-v` flags. Colors follow the same rules as the rest of
//! the CLI: `NO_COLOR` disables them, otherwise they are auto-detected.

use log::{Level, LevelFilter, Log, Metadata, Record, SetLoggerError};
use std::io::Write;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

struct StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let (color, label) = match record.level() {
            Level::Error => (Color::Red, "ERROR"),
            Level::Warn => (Color::Yellow, "WARN "),
            Level::Info => (Color::Blue, "INFO "),
            Level::Debug => (Color::Cyan, "DEBUG"),
            Level::Trace => (Color::Magenta, "TRACE"),
        };

        let mut stderr = StandardStream::stderr(color_choice());
        let _ = stderr.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true));
        let _ = write!(stderr, "[snailio] {}", label);
        let _ = stderr.reset();
        let _ = writeln!(stderr, " {}", record.args());
    }

    fn flush(&self) {}
}

static LOGGER: StderrLogger = StderrLogger;

fn color_choice() -> ColorChoice {
    if std::env::var_os("NO_COLOR").is_some() {
        ColorChoice::Never
    } else {
        ColorChoice::Auto
    }
}

/// Map the number of `-v` flags to a level filter.
pub fn level_for_verbosity(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the logger.
pub fn init(verbosity: u8) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER).map(|()| log::set_max_level(level_for_verbosity(verbosity)))
}
