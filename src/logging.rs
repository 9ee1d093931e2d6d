//! Tracing setup for hosts embedding the engine
//!
//! Engine events are emitted under the `import`, `schema`, `query` and `sql`
//! targets. `init_tracing` installs a compact subscriber that also keeps the
//! most recent entries in memory so a host can show what the engine did.

use anyhow::{anyhow, Result};
use chrono::Local;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// Maximum number of log entries to keep in memory
const MAX_LOG_ENTRIES: usize = 1000;

static LOG_BUFFER: OnceLock<LogRingBuffer> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: String,
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, target: &str, message: String) -> Self {
        Self {
            timestamp: Local::now().format("%H:%M:%S.%3f").to_string(),
            level,
            target: target.to_string(),
            message,
        }
    }

    pub fn format_for_display(&self) -> String {
        format!(
            "[{}] {} [{}] {}",
            self.timestamp, self.level, self.target, self.message
        )
    }
}

/// Thread-safe ring buffer for log entries
#[derive(Clone)]
pub struct LogRingBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl LogRingBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_LOG_ENTRIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&self, entry: LogEntry) {
        if let Ok(mut entries) = self.entries.lock() {
            if entries.len() >= self.capacity {
                entries.pop_front();
            }
            entries.push_back(entry);
        }
    }

    pub fn get_recent(&self, count: usize) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.iter().rev().take(count).rev().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Recent entries emitted under one target, e.g. `"sql"`
    pub fn get_recent_for(&self, target: &str, count: usize) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => {
                let mut matching: Vec<LogEntry> = entries
                    .iter()
                    .rev()
                    .filter(|e| e.target == target)
                    .take(count)
                    .cloned()
                    .collect();
                matching.reverse();
                matching
            }
            Err(_) => Vec::new(),
        }
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for LogRingBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Writer that parses compact fmt output back into `LogEntry` values
#[derive(Clone)]
pub struct RingBufferWriter {
    buffer: LogRingBuffer,
}

impl RingBufferWriter {
    pub fn new(buffer: LogRingBuffer) -> Self {
        Self { buffer }
    }

    fn record(&self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        // compact format: "LEVEL target: message"
        let (level, rest) = match line.split_once(' ') {
            Some((word, rest)) => match word.parse::<Level>() {
                Ok(level) => (level, rest.trim_start()),
                Err(_) => (Level::INFO, line),
            },
            None => (Level::INFO, line),
        };

        let (target, message) = match rest.split_once(':') {
            Some((target, message)) if !target.is_empty() && !target.contains(' ') => {
                (target, message.trim())
            }
            _ => ("general", rest),
        };

        self.buffer
            .push(LogEntry::new(level, target, message.to_string()));
    }
}

impl std::io::Write for RingBufferWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Ok(text) = std::str::from_utf8(buf) {
            for line in text.lines() {
                self.record(line);
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for RingBufferWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// The buffer installed by `init_tracing`, if any
pub fn get_log_buffer() -> Option<LogRingBuffer> {
    LOG_BUFFER.get().cloned()
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `default_directive` (e.g. `"info"` or
/// `"sql=debug,query=debug"`). Calling it again once a subscriber is
/// installed is a no-op returning the same buffer.
pub fn init_tracing(default_directive: &str) -> Result<LogRingBuffer> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(default_directive)
            .map_err(|e| anyhow!("invalid log directive '{}': {}", default_directive, e))?,
    };

    let buffer = LOG_BUFFER.get_or_init(LogRingBuffer::new).clone();
    let fmt_layer = fmt::layer()
        .with_writer(RingBufferWriter::new(buffer.clone()))
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .without_time()
        .compact();

    if tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .is_ok()
    {
        tracing::info!(target: "system", "Tracing initialized");
    }
    Ok(buffer)
}
