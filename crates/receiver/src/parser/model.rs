use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// XML event vocabularies a remote logging framework may speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `<log4j:event>` (log4j 1.x XMLLayout, NLog log4jxmlevent)
    Log4j,
    /// `<log4net:event>` (log4net XmlLayoutSchemaLog4j / XmlLayout)
    Log4Net,
    /// `<Event>` (log4j2 XmlLayout)
    Log4j2,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Log4j => "log4j",
            LogFormat::Log4Net => "log4net",
            LogFormat::Log4j2 => "log4j2",
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "log4j" | "nlog" => Ok(LogFormat::Log4j),
            "log4net" => Ok(LogFormat::Log4Net),
            "log4j2" => Ok(LogFormat::Log4j2),
            other => Err(format!("unknown parser type '{}'", other)),
        }
    }
}

/// Outcome of offering a byte sample to one parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recognition {
    /// The first element matches; the cursor should start at `offset`
    /// (leading prolog, comments and whitespace already skipped).
    Match { offset: usize },
    /// The sample ends before the first element's name is complete.
    Incomplete,
    /// Malformed prolog or a different root element.
    NoMatch,
}

impl Recognition {
    pub fn is_match(&self) -> bool {
        matches!(self, Recognition::Match { .. })
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed XML: {0}")]
    Malformed(String),

    #[error("Unexpected root element <{found}>, expected <{expected}>")]
    UnexpectedRoot { expected: String, found: String },

    #[error("Stream desynchronized at byte {offset}: {reason}")]
    Desync { offset: usize, reason: String },

    #[error("Event too large: {0} bytes (max: {1} bytes)")]
    EventTooLarge(usize, usize),

    #[error("Non-UTF8 content")]
    NonUtf8,
}

impl ParseError {
    /// Fatal errors leave the cursor without a trustworthy event boundary;
    /// the connection has to be dropped and detection redone.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ParseError::Desync { .. } | ParseError::EventTooLarge(..))
    }
}

impl From<quick_xml::Error> for ParseError {
    fn from(err: quick_xml::Error) -> Self {
        ParseError::Malformed(err.to_string())
    }
}

impl From<quick_xml::events::attributes::AttrError> for ParseError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        ParseError::Malformed(err.to_string())
    }
}

impl From<std::str::Utf8Error> for ParseError {
    fn from(_: std::str::Utf8Error) -> Self {
        ParseError::NonUtf8
    }
}
