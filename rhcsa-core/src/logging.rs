use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::Mutex;

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogEvent {
    pub ts: DateTime<Utc>,
    pub level: LogLevel,
    pub task_id: Option<String>,
    pub category: Option<String>,
    pub message: String,
    pub fields: HashMap<String, String>,
}

pub trait EventLogger: Send + Sync {
    fn log(&self, event: LogEvent);
}

#[derive(Default)]
pub struct NoopEventLogger;

impl EventLogger for NoopEventLogger {
    fn log(&self, _event: LogEvent) {}
}

pub type SharedEventLogger = Arc<dyn EventLogger>;

pub fn noop_logger() -> SharedEventLogger {
    Arc::new(NoopEventLogger)
}

/// Keeps the most recent events in memory and optionally appends every event
/// to a JSONL file.
pub struct BufferedEventLogger {
    seq: AtomicU64,
    max_events: usize,
    max_events_per_task: usize,
    file: Option<PathBuf>,
    state: Mutex<BufferedEventLoggerState>,
}

struct BufferedEventLoggerState {
    events: VecDeque<(u64, LogEvent)>,
    task_events: HashMap<String, VecDeque<(u64, LogEvent)>>,
}

impl BufferedEventLogger {
    pub fn new(max_events: usize, max_events_per_task: usize) -> Self {
        Self {
            seq: AtomicU64::new(0),
            max_events: max_events.max(1),
            max_events_per_task: max_events_per_task.max(1),
            file: None,
            state: Mutex::new(BufferedEventLoggerState {
                events: VecDeque::new(),
                task_events: HashMap::new(),
            }),
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }

    pub fn events_since(&self, last_seq: u64) -> (u64, Vec<LogEvent>) {
        let Ok(state) = self.state.lock() else {
            return (last_seq, Vec::new());
        };
        let mut out = Vec::new();
        let mut new_last = last_seq;
        for (seq, ev) in state.events.iter() {
            if *seq > last_seq {
                out.push(ev.clone());
                new_last = new_last.max(*seq);
            }
        }
        (new_last, out)
    }

    pub fn task_events_tail(&self, task_id: &str, max: usize) -> Vec<LogEvent> {
        let Ok(state) = self.state.lock() else {
            return Vec::new();
        };
        let Some(q) = state.task_events.get(task_id) else {
            return Vec::new();
        };
        let skip = q.len().saturating_sub(max);
        q.iter().skip(skip).map(|(_, ev)| ev.clone()).collect()
    }

    fn write_to_file(&self, event: &LogEvent) {
        let Some(path) = &self.file else {
            return;
        };
        if let Some(parent) = path.parent() {
            if std::fs::create_dir_all(parent).is_err() {
                return;
            }
        }
        let Ok(line) = serde_json::to_string(event) else {
            return;
        };
        let Ok(mut f) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        else {
            return;
        };
        let _ = writeln!(f, "{line}");
    }
}

impl EventLogger for BufferedEventLogger {
    fn log(&self, event: LogEvent) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed) + 1;

        self.write_to_file(&event);

        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.events.push_back((seq, event.clone()));
        while state.events.len() > self.max_events {
            state.events.pop_front();
        }

        if let Some(task_id) = event.task_id.clone() {
            let q = state.task_events.entry(task_id).or_default();
            q.push_back((seq, event));
            while q.len() > self.max_events_per_task {
                q.pop_front();
            }
        }
    }
}

/// Writes events at or above `min_level` to stderr, one line each.
pub struct StderrEventLogger {
    min_level: LogLevel,
}

impl StderrEventLogger {
    pub fn new(min_level: LogLevel) -> Self {
        Self { min_level }
    }
}

impl EventLogger for StderrEventLogger {
    fn log(&self, event: LogEvent) {
        if event.level < self.min_level {
            return;
        }
        let mut line = format!(
            "{} {:?} {}",
            event.ts.format("%Y-%m-%d %H:%M:%S"),
            event.level,
            event.message
        );
        if let Some(task_id) = &event.task_id {
            line.push_str(&format!(" task={task_id}"));
        }
        let mut fields: Vec<_> = event.fields.iter().collect();
        fields.sort();
        for (k, v) in fields {
            line.push_str(&format!(" {k}={v:?}"));
        }
        eprintln!("{line}");
    }
}

impl LogEvent {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            level,
            task_id: None,
            category: None,
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    pub fn with_task(mut self, task_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_field(mut self, k: impl Into<String>, v: impl Into<String>) -> Self {
        self.fields.insert(k.into(), v.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_logger_keeps_bounded_tail() {
        let logger = BufferedEventLogger::new(2, 1);
        logger.log(LogEvent::new(LogLevel::Info, "a").with_task("t1"));
        logger.log(LogEvent::new(LogLevel::Info, "b").with_task("t1"));
        logger.log(LogEvent::new(LogLevel::Warn, "c"));

        let (last, events) = logger.events_since(0);
        assert_eq!(last, 3);
        let names: Vec<_> = events.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(names, vec!["b", "c"]);

        let tail = logger.task_events_tail("t1", 10);
        assert_eq!(tail.len(), 1);
        assert_eq!(tail[0].message, "b");
    }

    #[test]
    fn buffered_logger_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("events.jsonl");
        let logger = BufferedEventLogger::new(10, 10).with_file(&path);
        logger.log(LogEvent::new(LogLevel::Info, "sandbox.executed").with_field("command", "id"));
        logger.log(LogEvent::new(LogLevel::Warn, "sandbox.rejected"));

        let body = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: LogEvent = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first.fields.get("command").map(String::as_str), Some("id"));
    }
}
