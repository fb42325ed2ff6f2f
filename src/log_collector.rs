//! Decoupled logging pipeline for the diagnosis engine.
//!
//! Every `log::info!()`/`warn!()`/... call is forwarded over an unbounded
//! channel to a background writer thread that appends to a session log file.
//! Request threads never touch the filesystem for logging.
//!
//! ```text
//! log::info!() ... [LogCollector] --(crossbeam channel)--> [disk writer thread]
//!                                                              |
//!                                                   <log_dir>/<ts>_diagnosis.log
//! ```
//!
//! Lines whose target is `audit` (completions, feedback) are also copied to
//! `<log_dir>/audit.log`, which is kept across sessions.

use chrono::Local;
use crossbeam_channel::{unbounded, Sender};
use log::{LevelFilter, Log, Metadata, Record};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Target used for lines that also go to the audit trail
pub const AUDIT_TARGET: &str = "audit";

enum LogMessage {
    Line(LogLine),
    /// Flush marker; the sender is signalled once everything before it is on disk
    Flush(std::sync::mpsc::Sender<()>),
}

/// A log line with metadata
#[derive(Clone, Debug)]
pub struct LogLine {
    pub message: String,
    pub audit: bool,
    pub timestamp: String,
}

impl LogLine {
    pub fn new(message: String) -> Self {
        LogLine {
            message,
            audit: false,
            timestamp: Local::now().format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        }
    }

    pub fn audit(message: String) -> Self {
        LogLine {
            audit: true,
            ..LogLine::new(message)
        }
    }
}

/// Logger that hands lines to a background disk writer
#[derive(Clone)]
pub struct LogCollector {
    tx: Sender<LogMessage>,
    session_path: PathBuf,
    level: LevelFilter,
    echo_stderr: bool,
}

impl LogCollector {
    /// Create the log directory and start the writer thread
    pub fn new(log_dir: &Path, level: LevelFilter, echo_stderr: bool) -> Result<Self, String> {
        std::fs::create_dir_all(log_dir)
            .map_err(|e| format!("Failed to create log dir {}: {}", log_dir.display(), e))?;

        let session_path = log_dir.join(format!(
            "{}_diagnosis.log",
            Local::now().format("%Y%m%d_%H%M%S")
        ));
        let audit_path = log_dir.join("audit.log");

        let mut session_file = open_append(&session_path)?;
        let mut audit_file = open_append(&audit_path)?;

        let (tx, rx) = unbounded::<LogMessage>();

        // Plain OS thread so lines from any runtime or blocking pool reach disk
        std::thread::spawn(move || {
            while let Ok(msg) = rx.recv() {
                match msg {
                    LogMessage::Line(line) => {
                        let formatted = format!("[{}] {}\n", line.timestamp, line.message);
                        let _ = session_file.write_all(formatted.as_bytes());
                        if line.audit {
                            let _ = audit_file.write_all(formatted.as_bytes());
                        }
                    }
                    LogMessage::Flush(done) => {
                        let _ = session_file.flush();
                        let _ = audit_file.flush();
                        let _ = session_file.sync_data();
                        let _ = audit_file.sync_data();
                        let _ = done.send(());
                    }
                }
            }
        });

        Ok(LogCollector {
            tx,
            session_path,
            level,
            echo_stderr,
        })
    }

    /// Install as the global `log` backend
    pub fn install(self) -> Result<(), String> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))
            .map_err(|e| format!("Failed to install logger: {}", e))?;
        log::set_max_level(level);
        Ok(())
    }

    pub fn session_path(&self) -> &Path {
        &self.session_path
    }

    /// Queue a line; never blocks
    pub fn log_line(&self, line: LogLine) {
        if self.echo_stderr {
            eprintln!("{}", line.message);
        }
        let _ = self.tx.send(LogMessage::Line(line));
    }

    /// Block until every line queued so far has been written
    pub fn flush_blocking(&self) -> Result<(), String> {
        let (tx, rx) = std::sync::mpsc::channel::<()>();
        self.tx
            .send(LogMessage::Flush(tx))
            .map_err(|e| format!("Failed to send flush marker: {}", e))?;
        rx.recv()
            .map_err(|e| format!("Flush signal interrupted: {}", e))
    }

    /// Async form of `flush_blocking` for use on a tokio runtime
    pub async fn wait_for_empty(&self) -> Result<(), String> {
        let collector = self.clone();
        tokio::task::spawn_blocking(move || collector.flush_blocking())
            .await
            .map_err(|e| format!("Flush task failed: {}", e))?
    }
}

impl Log for LogCollector {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let message = format!("[{}] {}", record.level(), record.args());
        if record.target() == AUDIT_TARGET {
            self.log_line(LogLine::audit(message));
        } else {
            self.log_line(LogLine::new(message));
        }
    }

    fn flush(&self) {
        let _ = self.flush_blocking();
    }
}

fn open_append(path: &Path) -> Result<File, String> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| format!("Failed to open log file {}: {}", path.display(), e))
}

/// Parse a level name from config, defaulting to `Info`
pub fn parse_level(name: &str) -> LevelFilter {
    name.parse::<LevelFilter>().unwrap_or(LevelFilter::Info)
}
