//! Normalized log record produced by every schema parser.

pub mod level;
mod serde_utils;

use chrono::{DateTime, Local};
use serde::Serialize;

use serde_utils::serialize_properties_as_map;

pub use level::{LevelRegistry, LogLevel, SeverityLevel};

/// Property key that carries exception text instead of a free-form value.
pub const EXCEPTIONS_PROPERTY: &str = "exceptions";

/// Thread name used on records the receiver synthesizes itself.
pub const SYNTHETIC_THREAD: &str = "NA";

/// One log event, independent of the schema it arrived in.
///
/// Records are immutable once handed to a sink; the receiver only rewrites
/// `logger_name` before publishing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub logger_name: String,

    pub level: SeverityLevel,

    pub thread_name: String,

    /// Event time converted to local time. `None` when the wire value was
    /// missing or unparsable.
    pub time_stamp: Option<DateTime<Local>>,

    /// May span several lines; some schemas append throwable text here.
    pub message: String,

    pub exception_string: Option<String>,

    pub call_site_class: Option<String>,
    pub call_site_method: Option<String>,
    pub source_file_name: Option<String>,
    pub source_file_line_nr: Option<u32>,

    pub sequence_nr: Option<u64>,

    /// Free-form key/value pairs in wire order, keys unique.
    #[serde(serialize_with = "serialize_properties_as_map")]
    pub properties: Vec<(String, String)>,
}

impl LogRecord {
    pub fn new(logger_name: impl Into<String>, level: SeverityLevel) -> Self {
        Self {
            logger_name: logger_name.into(),
            level,
            thread_name: String::new(),
            time_stamp: None,
            message: String::new(),
            exception_string: None,
            call_site_class: None,
            call_site_method: None,
            source_file_name: None,
            source_file_line_nr: None,
            sequence_nr: None,
            properties: Vec::new(),
        }
    }

    /// Error record standing in for an event that could not be parsed.
    pub fn parse_failure(default_logger: &str, error: &dyn std::fmt::Display, context: &str) -> Self {
        let text = error.to_string();
        let mut record = Self::new(default_logger, SeverityLevel::error());
        record.thread_name = SYNTHETIC_THREAD.to_string();
        record.time_stamp = Some(Local::now());
        record.exception_string = Some(format!("{}\n{}", text, context));
        record.message = text;
        record
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or overwrite a property. A key equal to "exceptions" (any case)
    /// replaces `exception_string` instead.
    pub fn set_property(&mut self, key: String, value: String) {
        if key.eq_ignore_ascii_case(EXCEPTIONS_PROPERTY) {
            self.exception_string = Some(value);
            return;
        }
        match self.properties.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((key, value)),
        }
    }
}
