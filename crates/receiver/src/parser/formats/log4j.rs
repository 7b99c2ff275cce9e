use chrono::{DateTime, Local};

use crate::parser::traits::{EventParser, LogFormat, ParseError};
use crate::parser::xml::{self, RecordBuilder, SEQUENCE_NUMBER_TAG};
use crate::record::LogRecord;

/// Element names of the log4j event vocabulary under one namespace prefix.
///
/// log4j 1.x, NLog and log4net all emit this shape; only the prefix and a
/// few optional elements differ.
pub(crate) struct Vocabulary {
    pub event: &'static str,
    pub envelope: Option<&'static str>,
    pub message: &'static str,
    pub throwables: &'static [&'static str],
    pub location: &'static str,
    pub ndc: Option<&'static str>,
    pub data: &'static str,
    /// Parses the `timestamp` attribute of the event element.
    pub timestamp: fn(Option<&str>) -> Option<DateTime<Local>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Event,
    Message,
    Throwable,
    Location,
    Ndc,
    Data,
    SequenceNumber,
}

impl Vocabulary {
    fn classify(&self, name: &[u8]) -> Option<Tag> {
        if name == self.event.as_bytes() {
            Some(Tag::Event)
        } else if name == self.message.as_bytes() {
            Some(Tag::Message)
        } else if self.throwables.iter().any(|t| name == t.as_bytes()) {
            Some(Tag::Throwable)
        } else if name == self.location.as_bytes() {
            Some(Tag::Location)
        } else if self.ndc.is_some_and(|t| name == t.as_bytes()) {
            Some(Tag::Ndc)
        } else if name == self.data.as_bytes() {
            Some(Tag::Data)
        } else if name == SEQUENCE_NUMBER_TAG {
            Some(Tag::SequenceNumber)
        } else {
            None
        }
    }

    /// Walk one `<prefix:event>` element.
    ///
    /// ```xml
    /// <log4j:event logger="Statyk7.Another.Name.DummyManager" timestamp="1184286222308" level="ERROR" thread="1">
    ///     <log4j:message>This is an Message</log4j:message>
    ///     <log4j:properties>
    ///         <log4j:data name="log4jmachinename" value="remserver" />
    ///         <log4j:data name="log4japp" value="Test.exe" />
    ///     </log4j:properties>
    /// </log4j:event>
    /// ```
    pub(crate) fn parse(&self, raw: &[u8], default_logger: &str) -> Result<LogRecord, ParseError> {
        let mut record = RecordBuilder::new();
        let mut seen_event = false;

        xml::walk_event(raw, |reader, element, empty| {
            let tag = self.classify(element.name().as_ref());
            if !seen_event && tag != Some(Tag::Event) {
                return Err(ParseError::UnexpectedRoot {
                    expected: self.event.to_string(),
                    found: xml::display_name(element),
                });
            }

            match tag {
                Some(Tag::Event) if seen_event => {
                    return Err(ParseError::Malformed(format!("nested <{}>", self.event)));
                }
                Some(Tag::Event) => {
                    seen_event = true;
                    record.logger(xml::attr(element, "logger"));
                    record.level(xml::attr(element, "level").as_deref());
                    record.thread(xml::attr(element, "thread"));
                    record.time_stamp((self.timestamp)(xml::attr(element, "timestamp").as_deref()));
                }
                Some(Tag::Message) => {
                    record.message(xml::read_text(reader, element, empty)?);
                }
                Some(Tag::Throwable) => {
                    let text = xml::read_text(reader, element, empty)?;
                    record.append_message_line(&text);
                    record.append_exception_line(&text);
                }
                Some(Tag::Location) => {
                    record.call_site(
                        xml::attr(element, "class"),
                        xml::attr(element, "method"),
                        xml::attr(element, "file"),
                        xml::parse_u32(xml::attr(element, "line").as_deref()),
                    );
                }
                Some(Tag::Ndc) => {
                    let ndc = xml::read_text(reader, element, empty)?;
                    record.property(Some("NDC".to_string()), Some(ndc));
                }
                Some(Tag::Data) => {
                    record.property(xml::attr(element, "name"), xml::attr(element, "value"));
                }
                Some(Tag::SequenceNumber) => {
                    let text = xml::read_text(reader, element, empty)?;
                    record.sequence_nr(xml::parse_u64(Some(&text)));
                }
                None => {}
            }
            Ok(())
        })?;

        Ok(record.finish(default_logger))
    }
}

const LOG4J: Vocabulary = Vocabulary {
    event: "log4j:event",
    envelope: Some("log4j:eventSet"),
    message: "log4j:message",
    throwables: &["log4j:throwable"],
    location: "log4j:locationInfo",
    ndc: Some("log4j:NDC"),
    data: "log4j:data",
    timestamp: xml::epoch_millis,
};

/// Schema A: log4j 1.x XMLLayout, also what NLog's `log4jxmlevent` layout
/// and NLogViewer target send.
#[derive(Debug, Default, Clone, Copy)]
pub struct Log4jParser;

impl EventParser for Log4jParser {
    fn format(&self) -> LogFormat {
        LogFormat::Log4j
    }

    fn event_tag(&self) -> &'static str {
        LOG4J.event
    }

    fn envelope_tag(&self) -> Option<&'static str> {
        LOG4J.envelope
    }

    fn parse_event(&self, raw: &[u8], default_logger: &str) -> Result<LogRecord, ParseError> {
        LOG4J.parse(raw, default_logger)
    }
}
