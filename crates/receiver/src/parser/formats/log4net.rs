use chrono::{DateTime, Local};

use super::log4j::Vocabulary;
use crate::parser::traits::{EventParser, LogFormat, ParseError};
use crate::parser::xml;
use crate::record::LogRecord;

/// log4net's own XmlLayout writes ISO-8601 timestamps, its log4j-compatible
/// layout writes epoch milliseconds. Accept both.
fn timestamp(value: Option<&str>) -> Option<DateTime<Local>> {
    xml::epoch_millis(value).or_else(|| xml::rfc3339(value))
}

const LOG4NET: Vocabulary = Vocabulary {
    event: "log4net:event",
    envelope: None,
    message: "log4net:message",
    throwables: &["log4net:throwable", "log4net:exception"],
    location: "log4net:locationInfo",
    ndc: None,
    data: "log4net:data",
    timestamp,
};

/// Schema B: `<log4net:event>` from log4net's XmlLayout family.
#[derive(Debug, Default, Clone, Copy)]
pub struct Log4NetParser;

impl EventParser for Log4NetParser {
    fn format(&self) -> LogFormat {
        LogFormat::Log4Net
    }

    fn event_tag(&self) -> &'static str {
        LOG4NET.event
    }

    fn parse_event(&self, raw: &[u8], default_logger: &str) -> Result<LogRecord, ParseError> {
        LOG4NET.parse(raw, default_logger)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::traits::Recognition;
    use crate::record::LogLevel;

    #[test]
    fn test_recognize() {
        let parser = Log4NetParser;
        assert!(parser.recognize(b"<log4net:event logger=\"a\">").is_match());
        assert_eq!(parser.recognize(b"<log4j:event logger=\"a\">"), Recognition::NoMatch);
        assert_eq!(parser.recognize(b"<Event/>"), Recognition::NoMatch);
    }

    #[test]
    fn test_parse_event() {
        let raw = br#"<log4net:event logger="Statyk7.Another.Name.DummyManager" timestamp="1184286222308" level="ERROR" thread="1">
            <log4net:message>This is an Message</log4net:message>
            <log4net:properties>
                <log4net:data name="log4netmachinename" value="remserver" />
                <log4net:data name="log4netapp" value="Test.exe" />
            </log4net:properties>
        </log4net:event>"#;
        let record = Log4NetParser.parse_event(raw, "TcpLogger").unwrap();

        assert_eq!(record.logger_name, "Statyk7.Another.Name.DummyManager");
        assert_eq!(record.level.level, LogLevel::Error);
        assert_eq!(record.thread_name, "1");
        assert_eq!(record.time_stamp.unwrap().timestamp_millis(), 1_184_286_222_308);
        assert_eq!(record.message, "This is an Message");
        assert_eq!(record.property("log4netapp"), Some("Test.exe"));
    }

    #[test]
    fn test_iso_timestamp_and_exception_element() {
        let raw = br#"<log4net:event logger="Worker" timestamp="2024-03-01T12:00:00.250+01:00" level="FATAL" thread="7" domain="svc.exe" username="NT\svc">
            <log4net:message>crashed</log4net:message>
            <log4net:exception>System.InvalidOperationException: nope</log4net:exception>
            <log4net:locationInfo class="Svc.Worker" method="Run" file="Worker.cs" line="88"/>
        </log4net:event>"#;
        let record = Log4NetParser.parse_event(raw, "TcpLogger").unwrap();

        assert_eq!(record.time_stamp.unwrap().timestamp_millis(), 1_709_290_800_250);
        assert_eq!(record.level.level, LogLevel::Fatal);
        assert_eq!(record.message, "crashed\nSystem.InvalidOperationException: nope");
        assert_eq!(record.source_file_line_nr, Some(88));
    }

    #[test]
    fn test_unparsable_timestamp_left_unset() {
        let raw = br#"<log4net:event logger="a" timestamp="someday" level="INFO" thread="1"/>"#;
        let record = Log4NetParser.parse_event(raw, "TcpLogger").unwrap();
        assert!(record.time_stamp.is_none());
        assert_eq!(record.logger_name, "a");
    }
}
