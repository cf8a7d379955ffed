//! Append-only line logger feeding the external log-watcher.
//!
//! The line format `YYYY-MM-DD HH:MM:SS.mmm [LEVEL] message` and the
//! `Connection from <address> on port <port>` message are a compatibility
//! contract with the watcher and must not change. Every record is flushed
//! immediately so a tail-following watcher sees it promptly.

use chrono::Local;
use clap::ValueEnum;
use std::fmt;
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::net::IpAddr;
use std::path::Path;
use std::sync::Mutex;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Record severities, most severe first.
///
/// A record is emitted when its level is at or above the configured
/// threshold, i.e. numerically less than or equal to it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum Level {
    Error,
    Warning,
    Info,
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "ERROR"),
            Level::Warning => write!(f, "WARNING"),
            Level::Info => write!(f, "INFO"),
            Level::Debug => write!(f, "DEBUG"),
        }
    }
}

/// Timestamped line logger writing to a destination fixed at startup.
///
/// The destination is either an append-opened file or the process's
/// standard error stream; it never changes or reopens after construction.
pub struct Logger {
    threshold: Level,
    sink: Mutex<Box<dyn Write + Send>>,
}

impl Logger {
    /// Logger writing to the standard error stream.
    pub fn to_stderr(threshold: Level) -> Self {
        Self::with_sink(threshold, Box::new(io::stderr()))
    }

    /// Logger appending to the file at `path`, created if absent.
    pub fn to_file(path: &Path, threshold: Level) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::with_sink(threshold, Box::new(file)))
    }

    pub(crate) fn with_sink(threshold: Level, sink: Box<dyn Write + Send>) -> Self {
        Self {
            threshold,
            sink: Mutex::new(sink),
        }
    }

    /// Write one record, unless `level` falls below the threshold.
    ///
    /// Write failures are swallowed: the log destination is the only
    /// reporting channel there is, so there is nowhere left to complain.
    pub fn log(&self, level: Level, message: &str) {
        if level > self.threshold {
            return;
        }
        let record = format_record(level, message);
        let mut sink = self.sink.lock().expect("logger sink poisoned");
        let _ = sink.write_all(record.as_bytes());
        let _ = sink.flush();
    }

    pub fn error(&self, message: &str) {
        self.log(Level::Error, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warning, message);
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    /// Record one accepted connection. The message body is the substring
    /// the log-watcher pattern-matches on.
    pub fn connection(&self, remote: IpAddr, local_port: u16) {
        self.log(
            Level::Info,
            &format!("Connection from {remote} on port {local_port}"),
        );
    }
}

fn format_record(level: Level, message: &str) -> String {
    format!(
        "{} [{}] {}\n",
        Local::now().format(TIMESTAMP_FORMAT),
        level,
        message
    )
}

#[cfg(test)]
pub(crate) mod capture {
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    /// Shared in-memory sink so tests can inspect what a `Logger` wrote.
    #[derive(Clone, Default)]
    pub struct Capture(Arc<Mutex<Vec<u8>>>);

    impl Capture {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }

        pub fn lines(&self) -> Vec<String> {
            self.contents().lines().map(str::to_owned).collect()
        }
    }

    impl Write for Capture {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::capture::Capture;
    use super::*;
    use chrono::NaiveDateTime;
    use std::fs;
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    fn logger(threshold: Level) -> (Logger, Capture) {
        let capture = Capture::new();
        let logger = Logger::with_sink(threshold, Box::new(capture.clone()));
        (logger, capture)
    }

    #[test]
    fn severity_order_matches_wire_names() {
        assert!(Level::Error < Level::Warning);
        assert!(Level::Warning < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert_eq!(Level::Warning.to_string(), "WARNING");
    }

    #[test]
    fn threshold_filters_less_severe_records() {
        let (logger, capture) = logger(Level::Error);
        logger.info("probe");
        logger.warn("probe");
        assert!(capture.contents().is_empty());

        logger.error("kept");
        assert_eq!(capture.lines().len(), 1);
        assert!(capture.lines()[0].ends_with("[ERROR] kept"));
    }

    #[test]
    fn info_threshold_restores_connection_records() {
        let (logger, capture) = logger(Level::Info);
        logger.connection(IpAddr::V4(Ipv4Addr::LOCALHOST), 22);
        logger.debug("dropped");

        let lines = capture.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("[INFO] Connection from 127.0.0.1 on port 22"));
    }

    #[test]
    fn connection_record_renders_ipv6_colon_hex() {
        let (logger, capture) = logger(Level::Info);
        logger.connection(IpAddr::V6(Ipv6Addr::LOCALHOST), 8022);
        assert!(capture.lines()[0].ends_with("Connection from ::1 on port 8022"));
    }

    #[test]
    fn timestamp_round_trips_through_documented_format() {
        let before = Local::now().naive_local();
        let record = format_record(Level::Info, "tick");
        let after = Local::now().naive_local();

        // "YYYY-MM-DD HH:MM:SS.mmm" is exactly 23 characters.
        let stamp = &record[..23];
        let parsed = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).unwrap();

        // Rendering truncates to millisecond precision, so allow 1ms slack.
        let slack = chrono::Duration::milliseconds(1);
        assert!(parsed >= before - slack && parsed <= after + slack);
    }

    #[test]
    fn file_destination_appends_across_loggers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trap.log");

        Logger::to_file(&path, Level::Info).unwrap().info("first");
        Logger::to_file(&path, Level::Info).unwrap().info("second");

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO] first"));
        assert!(lines[1].ends_with("[INFO] second"));
    }
}
