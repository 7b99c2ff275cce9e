pub use super::model::{LogFormat, ParseError, Recognition};
use super::xml::{sniff_root, Prolog};
use crate::record::LogRecord;

pub trait EventParser: Send + Sync {
    fn format(&self) -> LogFormat;

    /// Qualified name of the element wrapping one event.
    fn event_tag(&self) -> &'static str;

    /// Wrapper some layouts put around the whole event sequence.
    fn envelope_tag(&self) -> Option<&'static str> {
        None
    }

    /// Decide from the first element of `sample` whether this schema applies.
    fn recognize(&self, sample: &[u8]) -> Recognition {
        match sniff_root(sample) {
            Prolog::Root { name, offset } => {
                let is_event = name == self.event_tag().as_bytes();
                let is_envelope = self.envelope_tag().is_some_and(|tag| name == tag.as_bytes());
                if is_event || is_envelope {
                    Recognition::Match { offset }
                } else {
                    Recognition::NoMatch
                }
            }
            Prolog::Incomplete => Recognition::Incomplete,
            Prolog::Invalid => Recognition::NoMatch,
        }
    }

    /// Translate one complete event element into a record.
    fn parse_event(&self, raw: &[u8], default_logger: &str) -> Result<LogRecord, ParseError>;
}
