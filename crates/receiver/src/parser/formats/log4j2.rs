use crate::parser::traits::{EventParser, LogFormat, ParseError};
use crate::parser::xml::{self, RecordBuilder, SEQUENCE_NUMBER_TAG};
use crate::record::{LogLevel, LogRecord};

const EVENT: &str = "Event";
const ENVELOPE: &str = "Events";

/// Schema C: log4j2 XmlLayout.
///
/// ```xml
/// <Event timeMillis="1493121664118" thread="main" level="ERROR" loggerName="App.Worker">
///   <Message>disk full</Message>
///   <Thrown name="java.io.IOException" localizedMessage="No space left on device">
///     <ExtendedStackTrace>
///       <ExtendedStackTraceItem class="App.Worker" method="flush" file="Worker.java" line="42" location="app.jar"/>
///     </ExtendedStackTrace>
///   </Thrown>
///   <ContextMap><item key="user" value="bob"/></ContextMap>
/// </Event>
/// ```
///
/// With `complete="true"` the layout wraps the stream in `<Events>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Log4j2Parser;

impl EventParser for Log4j2Parser {
    fn format(&self) -> LogFormat {
        LogFormat::Log4j2
    }

    fn event_tag(&self) -> &'static str {
        EVENT
    }

    fn envelope_tag(&self) -> Option<&'static str> {
        Some(ENVELOPE)
    }

    fn parse_event(&self, raw: &[u8], default_logger: &str) -> Result<LogRecord, ParseError> {
        let mut record = RecordBuilder::new();
        let mut seen_event = false;

        xml::walk_event(raw, |reader, element, empty| {
            let name = element.name();
            let name = name.as_ref();

            if !seen_event {
                if name != EVENT.as_bytes() {
                    return Err(ParseError::UnexpectedRoot {
                        expected: EVENT.to_string(),
                        found: xml::display_name(element),
                    });
                }
                seen_event = true;
                record.logger(xml::attr(element, "loggerName"));
                record.level(xml::attr(element, "level").as_deref());
                record.thread(xml::attr(element, "thread").or_else(|| xml::attr(element, "threadId")));
                record.time_stamp(xml::epoch_millis(xml::attr(element, "timeMillis").as_deref()));
                return Ok(());
            }

            match name {
                b"Event" => {
                    return Err(ParseError::Malformed("nested <Event>".to_string()));
                }
                b"Instant" if !record.has_time_stamp() => {
                    record.time_stamp(xml::epoch_seconds(
                        xml::attr(element, "epochSecond").as_deref(),
                        xml::attr(element, "nanoOfSecond").as_deref(),
                    ));
                }
                b"Message" => {
                    record.message(xml::read_text(reader, element, empty)?);
                }
                b"Thrown" => {
                    let class = xml::attr(element, "name");
                    let text = xml::attr(element, "localizedMessage")
                        .or_else(|| xml::attr(element, "message"));
                    if let Some(text) = text.as_deref().or(class.as_deref()) {
                        record.append_message_line(text);
                    }
                    let header = match (class, text) {
                        (Some(class), Some(text)) => Some(format!("{}: {}", class, text)),
                        (Some(only), None) | (None, Some(only)) => Some(only),
                        (None, None) => None,
                    };
                    if let Some(header) = header {
                        record.append_exception_line(&header);
                    }
                    record.force_level(LogLevel::Error);
                }
                b"ExtendedStackTraceItem" => {
                    record.stack_frame(
                        xml::attr(element, "class"),
                        xml::attr(element, "method"),
                        xml::attr(element, "file"),
                        xml::parse_u32(xml::attr(element, "line").as_deref()),
                        xml::attr(element, "location"),
                    );
                }
                b"Source" => {
                    record.call_site(
                        xml::attr(element, "class"),
                        xml::attr(element, "method"),
                        xml::attr(element, "file"),
                        xml::parse_u32(xml::attr(element, "line").as_deref()),
                    );
                }
                b"item" => {
                    record.property(xml::attr(element, "key"), xml::attr(element, "value"));
                }
                b"log4j:data" => {
                    record.property(xml::attr(element, "name"), xml::attr(element, "value"));
                }
                n if n == SEQUENCE_NUMBER_TAG => {
                    let text = xml::read_text(reader, element, empty)?;
                    record.sequence_nr(xml::parse_u64(Some(&text)));
                }
                _ => {}
            }
            Ok(())
        })?;

        Ok(record.finish(default_logger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::traits::Recognition;

    #[test]
    fn test_recognize_event_and_envelope() {
        let parser = Log4j2Parser;
        assert!(parser.recognize(b"<Event loggerName=\"a\">").is_match());
        assert!(parser.recognize(b"<?xml version=\"1.0\"?><Events xmlns=\"http://logging.apache.org/log4j/2.0/events\">").is_match());
        assert_eq!(parser.recognize(b"<log4j:event>"), Recognition::NoMatch);
        assert_eq!(parser.recognize(b"<EventLog>"), Recognition::NoMatch);
    }

    #[test]
    fn test_parse_scalar_fields() {
        let raw = br#"<Event xmlns="http://logging.apache.org/log4j/2.0/events" timeMillis="1493121664118" thread="main" level="ERROR" loggerName="App.Worker" endOfBatch="false">
            <Message>disk full</Message>
        </Event>"#;
        let record = Log4j2Parser.parse_event(raw, "TcpLogger").unwrap();

        assert_eq!(record.logger_name, "App.Worker");
        assert_eq!(record.level.level, LogLevel::Error);
        assert_eq!(record.thread_name, "main");
        assert_eq!(record.time_stamp.unwrap().timestamp_millis(), 1_493_121_664_118);
        assert_eq!(record.message, "disk full");
    }

    #[test]
    fn test_thrown_forces_error_and_frames() {
        let raw = br#"<Event timeMillis="1" threadId="12" level="INFO" loggerName="App">
            <Message>write failed</Message>
            <Thrown name="java.io.IOException" localizedMessage="No space left on device">
                <ExtendedStackTrace>
                    <ExtendedStackTraceItem class="App.Writer" method="flush" file="Writer.java" line="42" location="app.jar"/>
                    <ExtendedStackTraceItem class="App.Main" method="main" file="Main.java" line="7" location="app.jar"/>
                </ExtendedStackTrace>
            </Thrown>
        </Event>"#;
        let record = Log4j2Parser.parse_event(raw, "TcpLogger").unwrap();

        assert_eq!(record.level.level, LogLevel::Error);
        assert_eq!(record.thread_name, "12");
        assert_eq!(record.message, "write failed\nNo space left on device");
        assert_eq!(record.call_site_class.as_deref(), Some("App.Writer"));
        assert_eq!(record.call_site_method.as_deref(), Some("flush"));
        assert_eq!(record.source_file_line_nr, Some(42));

        let exception = record.exception_string.unwrap();
        let lines: Vec<&str> = exception.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "java.io.IOException: No space left on device");
        assert_eq!(lines[2], "Class: App.Main Method: main File: Main.java Line: 7 Location: app.jar");
    }

    #[test]
    fn test_instant_and_context_map() {
        let raw = br#"<Event thread="main" level="DEBUG" loggerName="App">
            <Instant epochSecond="1700000000" nanoOfSecond="123000000"/>
            <Message><![CDATA[a <b> c]]></Message>
            <ContextMap>
                <item key="user" value="bob"/>
                <item key="Exceptions" value="java.lang.Error: x"/>
            </ContextMap>
            <Source class="App.Main" method="run" file="Main.java" line="3"/>
        </Event>"#;
        let record = Log4j2Parser.parse_event(raw, "TcpLogger").unwrap();

        assert_eq!(record.time_stamp.unwrap().timestamp_millis(), 1_700_000_000_123);
        assert_eq!(record.message, "a <b> c");
        assert_eq!(record.properties, vec![("user".to_string(), "bob".to_string())]);
        assert_eq!(record.exception_string.as_deref(), Some("java.lang.Error: x"));
        assert_eq!(record.call_site_class.as_deref(), Some("App.Main"));
    }

    #[test]
    fn test_bad_numbers_skip_only_the_field() {
        let raw = br#"<Event timeMillis="12abc" thread="t" level="WARN" loggerName="App">
            <Message>ok</Message>
            <nlog:eventSequenceNumber>many</nlog:eventSequenceNumber>
        </Event>"#;
        let record = Log4j2Parser.parse_event(raw, "TcpLogger").unwrap();
        assert!(record.time_stamp.is_none());
        assert!(record.sequence_nr.is_none());
        assert_eq!(record.level.level, LogLevel::Warn);
        assert_eq!(record.message, "ok");
    }

    #[test]
    fn test_mismatched_end_tag_is_malformed() {
        let raw = br#"<Event level="INFO" loggerName="App"><Message>x</Msg></Event>"#;
        let err = Log4j2Parser.parse_event(raw, "TcpLogger").unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
        assert!(!err.is_fatal());
    }
}
