use std::sync::Arc;
use std::time::Instant;

use tracing::{trace, warn};

use super::cursor::XmlCursor;
use super::formats::{Log4NetParser, Log4j2Parser, Log4jParser};
use super::metrics::ParsingMetrics;
use super::traits::*;
use crate::conf::model::ReceiverConfig;
use crate::record::LogRecord;

/// Outcome of offering the first bytes of a connection to the selector.
pub enum Selection {
    Bound(ParserBinding),
    /// Not enough bytes yet to see the first element name.
    Pending,
    /// No registered schema matches; permanent for this connection.
    Unrecognized,
}

/// Immutable registry of schema parsers, consulted once per connection.
///
/// Order matters for ambiguous input: log4j2 first, then log4j, then log4net.
pub struct FormatSelector {
    parsers: Vec<Arc<dyn EventParser>>,
    max_event_size: usize,
    sniff_limit: usize,
    metrics: Arc<ParsingMetrics>,
}

fn parser_for(format: LogFormat) -> Arc<dyn EventParser> {
    match format {
        LogFormat::Log4j => Arc::new(Log4jParser),
        LogFormat::Log4Net => Arc::new(Log4NetParser),
        LogFormat::Log4j2 => Arc::new(Log4j2Parser),
    }
}

impl FormatSelector {
    pub fn new(metrics: Arc<ParsingMetrics>) -> Self {
        let parsers: Vec<Arc<dyn EventParser>> = vec![
            Arc::new(Log4j2Parser),
            Arc::new(Log4jParser),
            Arc::new(Log4NetParser),
        ];

        Self {
            parsers,
            max_event_size: super::MAX_EVENT_SIZE,
            sniff_limit: super::SNIFF_LIMIT,
            metrics,
        }
    }

    /// Skip detection candidates and accept only `format`.
    pub fn pinned(format: LogFormat, metrics: Arc<ParsingMetrics>) -> Self {
        Self {
            parsers: vec![parser_for(format)],
            ..Self::new(metrics)
        }
    }

    pub fn from_config(config: &ReceiverConfig, metrics: Arc<ParsingMetrics>) -> Self {
        let selector = match config.parser {
            Some(format) => Self::pinned(format, metrics),
            None => Self::new(metrics),
        };
        selector.with_limits(config.max_event_size, config.sniff_limit)
    }

    pub fn with_limits(mut self, max_event_size: usize, sniff_limit: usize) -> Self {
        self.max_event_size = max_event_size;
        self.sniff_limit = sniff_limit;
        self
    }

    /// Candidate schemas in the order they are tried.
    pub fn formats(&self) -> Vec<LogFormat> {
        self.parsers.iter().map(|p| p.format()).collect()
    }

    pub fn metrics(&self) -> &Arc<ParsingMetrics> {
        &self.metrics
    }

    /// Offer everything received so far on a fresh connection.
    ///
    /// The sample is not consumed on failure; on success the binding's
    /// cursor already holds it, positioned at the first event.
    pub fn select(&self, sample: &[u8]) -> Selection {
        let mut incomplete = false;

        for parser in &self.parsers {
            match parser.recognize(sample) {
                Recognition::Match { offset } => {
                    self.metrics.record_detection(true);
                    let cursor = XmlCursor::new(
                        &sample[offset..],
                        parser.envelope_tag(),
                        self.max_event_size,
                    );
                    return Selection::Bound(ParserBinding {
                        parser: Arc::clone(parser),
                        cursor,
                        metrics: Arc::clone(&self.metrics),
                    });
                }
                Recognition::Incomplete => incomplete = true,
                Recognition::NoMatch => {}
            }
        }

        if incomplete && sample.len() < self.sniff_limit {
            return Selection::Pending;
        }
        self.metrics.record_detection(false);
        Selection::Unrecognized
    }
}

impl Default for FormatSelector {
    fn default() -> Self {
        Self::new(Arc::new(ParsingMetrics::new()))
    }
}

/// A selected parser plus its cursor over one connection's stream.
pub struct ParserBinding {
    parser: Arc<dyn EventParser>,
    cursor: XmlCursor,
    metrics: Arc<ParsingMetrics>,
}

impl ParserBinding {
    pub fn format(&self) -> LogFormat {
        self.parser.format()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.cursor.feed(bytes);
    }

    /// Translate every complete buffered event, in stream order.
    ///
    /// A broken event becomes one synthetic error record and the stream
    /// continues. A fatal cursor error also emits a synthetic record, then
    /// returns the error: the binding is no longer usable.
    pub fn consume_available<F>(&mut self, default_logger: &str, mut emit: F) -> Result<usize, ParseError>
    where
        F: FnMut(LogRecord),
    {
        let format = self.parser.format();
        let mut emitted = 0;

        loop {
            let raw = match self.cursor.next_event() {
                Ok(Some(raw)) => raw,
                Ok(None) => return Ok(emitted),
                Err(e) => {
                    self.metrics.record_error((&e).into());
                    warn!(format = %format, error = %e, "Dropping connection stream");
                    let context = format!("{} stream discarded", format);
                    emit(LogRecord::parse_failure(default_logger, &e, &context));
                    return Err(e);
                }
            };

            let start = Instant::now();
            match self.parser.parse_event(&raw, default_logger) {
                Ok(record) => {
                    self.metrics.record_parse(format, start.elapsed().as_nanos() as u64);
                    trace!(format = %format, bytes = raw.len(), "Parsed event");
                    emit(record);
                }
                Err(e) => {
                    self.metrics.record_error((&e).into());
                    warn!(format = %format, error = %e, "Skipping malformed event");
                    let context = format!("{} event of {} bytes", format, raw.len());
                    emit(LogRecord::parse_failure(default_logger, &e, &context));
                }
            }
            emitted += 1;
        }
    }
}
