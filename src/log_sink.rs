//! File-backed logging pipeline.
//!
//! All `log::` macro calls funnel through an unbounded crossbeam channel to
//! a dedicated writer thread that appends to `trayctl.log`. Logging call
//! sites never block and never fail; a flush handshake lets shutdown wait
//! until everything sent so far is on disk. The crossbeam channel works
//! from any thread or runtime, including the UI event loop thread.

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

const LOG_FILE_NAME: &str = "trayctl.log";
const LOG_PREFIX: &str = "[trayctl]";

enum SinkMessage {
    Line(String),
    /// Flush marker carrying a completion signal back to the caller
    Flush(std::sync::mpsc::Sender<()>),
}

/// Handle to the writer thread. Cheap to clone; all clones feed the same
/// file.
#[derive(Clone)]
pub struct LogSink {
    tx: Sender<SinkMessage>,
}

/// Resolve the log file path: beside the executable, falling back to the
/// working directory when the executable path is unavailable.
pub fn default_log_path() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|d| d.join(LOG_FILE_NAME)))
        .unwrap_or_else(|| PathBuf::from(LOG_FILE_NAME))
}

impl LogSink {
    /// Spawn the writer thread appending to `path`.
    pub fn new(path: PathBuf) -> Self {
        let (tx, rx) = unbounded::<SinkMessage>();

        std::thread::spawn(move || {
            let mut file = OpenOptions::new().create(true).append(true).open(&path);
            if let Err(ref e) = file {
                eprintln!("{} log file '{}' unavailable: {}", LOG_PREFIX, path.display(), e);
            }

            while let Ok(msg) = rx.recv() {
                match msg {
                    SinkMessage::Line(line) => {
                        if let Ok(ref mut f) = file {
                            let _ = f.write_all(line.as_bytes());
                            let _ = f.write_all(b"\n");
                        } else {
                            eprintln!("{}", line);
                        }
                    }
                    SinkMessage::Flush(done) => {
                        if let Ok(ref mut f) = file {
                            let _ = f.flush();
                        }
                        let _ = done.send(());
                    }
                }
            }
        });

        LogSink { tx }
    }

    /// Write a raw line, bypassing level formatting. Used for the session
    /// separators around each run.
    pub fn write_raw(&self, line: impl Into<String>) {
        let _ = self.tx.send(SinkMessage::Line(line.into()));
    }

    /// Block until every line sent so far has been written and flushed.
    pub fn flush_and_wait(&self) {
        let (done_tx, done_rx) = std::sync::mpsc::channel::<()>();
        if self.tx.send(SinkMessage::Flush(done_tx)).is_ok() {
            let _ = done_rx.recv();
        }
    }

    /// Install this sink as the global `log` backend. Returns an error if
    /// a logger is already installed.
    pub fn install(self, level: LevelFilter) -> Result<LogSink, log::SetLoggerError> {
        let handle = self.clone();
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(handle)
    }
}

impl Log for LogSink {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let line = format!(
            "{} {} [{}] {}",
            Local::now().format("%Y-%m-%d %H:%M:%S%.3f"),
            LOG_PREFIX,
            record.level(),
            record.args()
        );
        let _ = self.tx.send(SinkMessage::Line(line));
    }

    fn flush(&self) {
        self.flush_and_wait();
    }
}

/// Write the separator line that brackets one run of the panel.
pub fn write_session_separator(sink: &LogSink) {
    sink.write_raw(format!(
        "==== {} {} ====",
        LOG_PREFIX,
        Local::now().format("%Y-%m-%d %H:%M:%S")
    ));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lines_reach_disk_after_flush() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trayctl.log");

        let sink = LogSink::new(path.clone());
        sink.write_raw("first line");
        sink.write_raw("second line");
        sink.flush_and_wait();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("first line"));
        assert!(content.contains("second line"));
    }

    #[test]
    fn test_separator_format() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trayctl.log");

        let sink = LogSink::new(path.clone());
        write_session_separator(&sink);
        sink.flush_and_wait();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("==== [trayctl]"));
        assert!(content.trim_end().ends_with("===="));
    }

    #[test]
    fn test_install_wires_log_macros_to_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trayctl.log");

        let handle = LogSink::new(path.clone())
            .install(LevelFilter::Info)
            .unwrap();
        log::info!("install smoke line");
        handle.flush_and_wait();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[trayctl] [INFO] install smoke line"));
    }

    #[test]
    fn test_appends_across_sinks() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("trayctl.log");

        let first = LogSink::new(path.clone());
        first.write_raw("from first");
        first.flush_and_wait();

        let second = LogSink::new(path.clone());
        second.write_raw("from second");
        second.flush_and_wait();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("from first"));
        assert!(content.contains("from second"));
    }
}
