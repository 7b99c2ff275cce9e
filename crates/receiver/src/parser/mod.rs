/// XML event parsing and schema detection
///
/// Turns the raw byte stream of one TCP connection into `LogRecord`s.
///
/// # Architecture
///
/// - `traits.rs`: the `EventParser` capability every schema implements
/// - `xml.rs`: streaming-XML helpers shared by the schemas
/// - `cursor.rs`: frames back-to-back top-level events out of a byte buffer
/// - `formats/`: log4j, log4net and log4j2 parsers
/// - `detector.rs`: picks a parser for a fresh connection and binds it to a cursor
/// - `metrics.rs`: detection and parsing counters
///
/// # Safety Guarantees
///
/// - Bounded memory: one buffered event may not exceed `MAX_EVENT_SIZE`
/// - A malformed event yields one error record, never a dropped connection
/// - Detection reads at most `SNIFF_LIMIT` bytes before giving up

pub mod traits;
pub mod detector;
pub mod cursor;
pub mod metrics;
pub mod formats;
pub mod model;
pub mod xml;

pub use detector::{FormatSelector, ParserBinding, Selection};
pub use model::{LogFormat, ParseError};
pub use traits::EventParser;

pub const MAX_EVENT_SIZE: usize = 1_048_576; // 1MB
pub const SNIFF_LIMIT: usize = 65_536;
