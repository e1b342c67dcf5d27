//! Log capture for integration tests
//!
//! A tracing layer that records every event with its message and structured
//! fields, so tests can assert on what was logged and, as importantly, on
//! what never was (credentials, remote error bodies).

use std::fmt::Debug;
use std::sync::{Arc, Mutex};
use tracing::field::{Field, Visit};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: Level,
    pub target: String,
    pub message: String,
    pub fields: Vec<(String, String)>,
}

impl LogRecord {
    /// Message and all field values in one string
    pub fn rendered(&self) -> String {
        let mut text = self.message.clone();
        for (name, value) in &self.fields {
            text.push_str(&format!(" {}={}", name, value));
        }
        text
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone, Default)]
pub struct LogCapture {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.records.lock().unwrap().clear();
    }

    /// True if any record's message contains `pattern`
    pub fn contains(&self, pattern: &str) -> bool {
        self.records().iter().any(|r| r.message.contains(pattern))
    }

    /// Records whose message contains `pattern`
    pub fn matching(&self, pattern: &str) -> Vec<LogRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.message.contains(pattern))
            .collect()
    }

    /// Panic if `needle` appears anywhere: message or any field value
    pub fn assert_never_logged(&self, needle: &str) {
        let leaks: Vec<String> = self
            .records()
            .iter()
            .map(LogRecord::rendered)
            .filter(|text| text.contains(needle))
            .collect();
        assert!(
            leaks.is_empty(),
            "Expected '{}' never to be logged, found in {} records:\n{}",
            needle,
            leaks.len(),
            leaks.join("\n")
        );
    }

    pub fn assert_contains(&self, pattern: &str) {
        assert!(
            self.contains(pattern),
            "Expected log matching '{}', but none found. All logs:\n{}",
            pattern,
            self.records()
                .iter()
                .map(LogRecord::rendered)
                .collect::<Vec<_>>()
                .join("\n")
        );
    }
}

struct RecordVisitor {
    message: String,
    fields: Vec<(String, String)>,
}

impl Visit for RecordVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push((field.name().to_string(), value.to_string()));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn Debug) {
        let text = format!("{:?}", value);
        if field.name() == "message" {
            self.message = text.trim_matches('"').to_string();
        } else {
            self.fields.push((field.name().to_string(), text));
        }
    }
}

impl<S> tracing_subscriber::Layer<S> for LogCapture
where
    S: tracing::Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: tracing_subscriber::layer::Context<'_, S>) {
        let mut visitor = RecordVisitor {
            message: String::new(),
            fields: Vec::new(),
        };
        event.record(&mut visitor);

        self.records.lock().unwrap().push(LogRecord {
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message: visitor.message,
            fields: visitor.fields,
        });
    }
}

/// Install a global subscriber at debug level with a capture layer
///
/// Only the first call in a test binary installs; later calls get a capture
/// that records nothing, so keep one capturing test per binary.
pub fn init_test_logging() -> LogCapture {
    let capture = LogCapture::new();

    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dam_tagger=debug".into()),
        )
        .with(capture.clone())
        .try_init();

    capture
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(capture: &LogCapture, message: &str, fields: &[(&str, &str)]) {
        capture.records.lock().unwrap().push(LogRecord {
            level: Level::INFO,
            target: "test".to_string(),
            message: message.to_string(),
            fields: fields
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        });
    }

    #[test]
    fn test_field_values_are_searched() {
        let capture = LogCapture::new();
        push(&capture, "DAM login failed", &[("identity", "svc")]);

        assert!(capture.contains("login failed"));
        assert_eq!(capture.matching("login")[0].field("identity"), Some("svc"));
        capture.assert_never_logged("hunter2");
    }

    #[test]
    #[should_panic(expected = "never to be logged")]
    fn test_leak_in_field_detected() {
        let capture = LogCapture::new();
        push(&capture, "Calling DAM", &[("cookie", "sid=abc")]);

        capture.assert_never_logged("sid=abc");
    }
}
