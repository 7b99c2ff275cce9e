//! Streaming XML helpers shared by the schema parsers.

use std::borrow::Cow;

use chrono::{DateTime, Local, Utc};
use quick_xml::errors::SyntaxError;
use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::Reader;

use crate::parser::model::ParseError;
use crate::record::{LevelRegistry, LogLevel, LogRecord, SeverityLevel};

pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Element carrying NLog's event sequence counter in every schema.
pub const SEQUENCE_NUMBER_TAG: &[u8] = b"nlog:eventSequenceNumber";

/// What sits at the front of a byte sample.
#[derive(Debug, PartialEq, Eq)]
pub enum Prolog<'a> {
    /// First element found; `offset` points at its `<`.
    Root { name: &'a [u8], offset: usize },
    /// Ran out of bytes before the first element name was complete.
    Incomplete,
    /// Character data, a stray end tag or broken markup before any element.
    Invalid,
}

/// Skip BOM, declaration, comments, PIs and whitespace, then report the
/// qualified name of the first element.
pub fn sniff_root(sample: &[u8]) -> Prolog<'_> {
    let base = if sample.starts_with(UTF8_BOM) { UTF8_BOM.len() } else { 0 };
    let mut reader = Reader::from_reader(&sample[base..]);

    loop {
        let before = reader.buffer_position() as usize;
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                let offset = base + before;
                let len = e.name().as_ref().len();
                return Prolog::Root {
                    name: &sample[offset + 1..offset + 1 + len],
                    offset,
                };
            }
            Ok(Event::Text(t)) if !is_blank(&t) => return Prolog::Invalid,
            Ok(Event::End(_)) | Ok(Event::CData(_)) => return Prolog::Invalid,
            Ok(Event::Eof) => return Prolog::Incomplete,
            Ok(_) => {}
            Err(e) if is_truncated(&e, &sample[base + before..]) => return Prolog::Incomplete,
            Err(_) => return Prolog::Invalid,
        }
    }
}

/// Errors that only mean "the buffer stops inside this construct".
/// `rest` is the input from the start of the markup that failed.
pub fn is_truncated(err: &quick_xml::Error, rest: &[u8]) -> bool {
    match err {
        // `<!` alone cannot tell a comment from CDATA or a doctype yet
        quick_xml::Error::Syntax(SyntaxError::InvalidBangMarkup) => is_bang_prefix(rest),
        quick_xml::Error::Syntax(e) => matches!(
            e,
            SyntaxError::UnclosedTag
                | SyntaxError::UnclosedComment
                | SyntaxError::UnclosedCData
                | SyntaxError::UnclosedDoctype
                | SyntaxError::UnclosedPIOrXmlDecl
        ),
        _ => false,
    }
}

fn is_bang_prefix(rest: &[u8]) -> bool {
    const BANG_MARKUP: [&[u8]; 3] = [b"<!--", b"<![CDATA[", b"<!DOCTYPE"];
    BANG_MARKUP
        .iter()
        .any(|markup| rest.len() < markup.len() && markup[..rest.len()].eq_ignore_ascii_case(rest))
}

pub fn is_blank(text: &BytesText<'_>) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

pub fn display_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

/// Walk one complete event element, handing every opened element to
/// `on_element` together with the reader so handlers can pull text.
/// The flag tells whether the element was self-closing.
pub fn walk_event<'a, F>(raw: &'a [u8], mut on_element: F) -> Result<(), ParseError>
where
    F: FnMut(&mut Reader<&'a [u8]>, &BytesStart<'a>, bool) -> Result<(), ParseError>,
{
    let mut reader = Reader::from_reader(raw);
    loop {
        match reader.read_event()? {
            Event::Start(e) => on_element(&mut reader, &e, false)?,
            Event::Empty(e) => on_element(&mut reader, &e, true)?,
            Event::Eof => return Ok(()),
            _ => {}
        }
    }
}

/// Unescaped attribute value; missing or broken attributes read as `None`.
pub fn attr(element: &BytesStart<'_>, key: &str) -> Option<String> {
    element
        .try_get_attribute(key)
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(Cow::into_owned))
}

/// Character data of the element just opened, up to its end tag.
/// Text of nested elements is included, markup is not.
pub fn read_text(
    reader: &mut Reader<&[u8]>,
    element: &BytesStart<'_>,
    empty: bool,
) -> Result<String, ParseError> {
    if empty {
        return Ok(String::new());
    }

    let mut text = String::new();
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Text(t) => text.push_str(&t.unescape()?),
            Event::CData(c) => text.push_str(std::str::from_utf8(&c)?),
            Event::Start(_) => depth += 1,
            Event::End(_) if depth == 0 => return Ok(text),
            Event::End(_) => depth -= 1,
            Event::Eof => {
                return Err(ParseError::Malformed(format!(
                    "event ended inside <{}>",
                    display_name(element)
                )))
            }
            _ => {}
        }
    }
}

pub fn epoch_millis(value: Option<&str>) -> Option<DateTime<Local>> {
    let millis = value?.trim().parse::<i64>().ok()?;
    DateTime::<Utc>::from_timestamp_millis(millis).map(|dt| dt.with_timezone(&Local))
}

pub fn epoch_seconds(seconds: Option<&str>, nanos: Option<&str>) -> Option<DateTime<Local>> {
    let seconds = seconds?.trim().parse::<i64>().ok()?;
    let nanos = nanos.and_then(|n| n.trim().parse::<u32>().ok()).unwrap_or(0);
    DateTime::<Utc>::from_timestamp(seconds, nanos).map(|dt| dt.with_timezone(&Local))
}

pub fn rfc3339(value: Option<&str>) -> Option<DateTime<Local>> {
    DateTime::parse_from_rfc3339(value?.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Local))
}

pub fn parse_u32(value: Option<&str>) -> Option<u32> {
    value?.trim().parse().ok()
}

pub fn parse_u64(value: Option<&str>) -> Option<u64> {
    value?.trim().parse().ok()
}

/// A record under construction while its event element is being walked.
#[derive(Debug)]
pub struct RecordBuilder {
    record: LogRecord,
}

impl RecordBuilder {
    pub fn new() -> Self {
        Self {
            record: LogRecord::new(String::new(), SeverityLevel::from(LevelRegistry::FALLBACK)),
        }
    }

    pub fn logger(&mut self, name: Option<String>) {
        if let Some(name) = name {
            self.record.logger_name = name;
        }
    }

    pub fn level(&mut self, name: Option<&str>) {
        self.record.level = LevelRegistry::global().resolve(name);
    }

    pub fn force_level(&mut self, level: LogLevel) {
        self.record.level = LevelRegistry::global().level(level);
    }

    pub fn thread(&mut self, name: Option<String>) {
        if let Some(name) = name {
            self.record.thread_name = name;
        }
    }

    pub fn time_stamp(&mut self, time: Option<DateTime<Local>>) {
        if time.is_some() {
            self.record.time_stamp = time;
        }
    }

    pub fn has_time_stamp(&self) -> bool {
        self.record.time_stamp.is_some()
    }

    pub fn message(&mut self, text: String) {
        self.record.message = text;
    }

    pub fn append_message_line(&mut self, text: &str) {
        if !self.record.message.is_empty() {
            self.record.message.push('\n');
        }
        self.record.message.push_str(text);
    }

    pub fn append_exception_line(&mut self, text: &str) {
        match self.record.exception_string.as_mut() {
            Some(existing) if !existing.is_empty() => {
                existing.push('\n');
                existing.push_str(text);
            }
            _ => self.record.exception_string = Some(text.to_string()),
        }
    }

    /// Set the call site unless an earlier element already did.
    pub fn call_site(
        &mut self,
        class: Option<String>,
        method: Option<String>,
        file: Option<String>,
        line: Option<u32>,
    ) {
        if self.record.call_site_class.as_deref().is_some_and(|c| !c.is_empty()) {
            return;
        }
        self.record.call_site_class = class;
        self.record.call_site_method = method;
        self.record.source_file_name = file;
        self.record.source_file_line_nr = line;
    }

    /// One stack frame: the first one also becomes the call site.
    pub fn stack_frame(
        &mut self,
        class: Option<String>,
        method: Option<String>,
        file: Option<String>,
        line: Option<u32>,
        location: Option<String>,
    ) {
        let entry = format!(
            "Class: {} Method: {} File: {} Line: {} Location: {}",
            class.as_deref().unwrap_or_default(),
            method.as_deref().unwrap_or_default(),
            file.as_deref().unwrap_or_default(),
            line.unwrap_or_default(),
            location.as_deref().unwrap_or_default(),
        );
        self.append_exception_line(&entry);
        self.call_site(class, method, file, line);
    }

    pub fn sequence_nr(&mut self, value: Option<u64>) {
        if value.is_some() {
            self.record.sequence_nr = value;
        }
    }

    pub fn property(&mut self, name: Option<String>, value: Option<String>) {
        if let Some(name) = name {
            self.record.set_property(name, value.unwrap_or_default());
        }
    }

    pub fn finish(mut self, default_logger: &str) -> LogRecord {
        if self.record.logger_name.is_empty() {
            self.record.logger_name = default_logger.to_string();
        }
        self.record
    }
}

impl Default for RecordBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff_skips_prolog() {
        let sample = b"\xEF\xBB\xBF<?xml version=\"1.0\"?>\n<!-- stream -->\n  <log4j:event logger=\"a\">";
        match sniff_root(sample) {
            Prolog::Root { name, offset } => {
                assert_eq!(name, b"log4j:event");
                assert!(sample[offset..].starts_with(b"<log4j:event"));
            }
            other => panic!("expected root, got {:?}", other),
        }
    }

    #[test]
    fn test_sniff_incomplete() {
        assert_eq!(sniff_root(b""), Prolog::Incomplete);
        assert_eq!(sniff_root(b"   "), Prolog::Incomplete);
        assert_eq!(sniff_root(b"<log4j:ev"), Prolog::Incomplete);
        assert_eq!(sniff_root(b"<!-- not done"), Prolog::Incomplete);
    }

    #[test]
    fn test_sniff_waits_on_partial_bang_markup() {
        assert_eq!(sniff_root(b"<!"), Prolog::Incomplete);
        assert_eq!(sniff_root(b"<?xml version=\"1.0\"?>\n<!-"), Prolog::Incomplete);
        assert_eq!(sniff_root(b"<![CDA"), Prolog::Incomplete);
        assert_eq!(sniff_root(b"<!DOC"), Prolog::Incomplete);
        assert_eq!(sniff_root(b"<!x>"), Prolog::Invalid);
    }

    #[test]
    fn test_sniff_invalid() {
        assert_eq!(sniff_root(b"hello world <Event/>"), Prolog::Invalid);
        assert_eq!(sniff_root(b"</Event>"), Prolog::Invalid);
    }

    #[test]
    fn test_read_text_with_entities_and_cdata() {
        let raw = b"<m>a &lt; b <![CDATA[<raw>]]></m><next/>";
        let mut out = None;
        walk_event(raw, |reader, element, empty| {
            if element.name().as_ref() == b"m" {
                out = Some(read_text(reader, element, empty)?);
            }
            Ok(())
        })
        .unwrap();
        assert_eq!(out.as_deref(), Some("a < b <raw>"));
    }

    #[test]
    fn test_walk_reports_mismatched_end() {
        let result = walk_event(b"<a><b></c></a>", |_, _, _| Ok(()));
        assert!(matches!(result, Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_epoch_millis() {
        let time = epoch_millis(Some("1184286222308")).unwrap();
        assert_eq!(time.timestamp_millis(), 1_184_286_222_308);
        assert!(epoch_millis(Some("yesterday")).is_none());
        assert!(epoch_millis(None).is_none());
    }

    #[test]
    fn test_epoch_seconds_with_nanos() {
        let time = epoch_seconds(Some("1700000000"), Some("500000000")).unwrap();
        assert_eq!(time.timestamp_millis(), 1_700_000_000_500);
    }

    #[test]
    fn test_builder_first_frame_wins_call_site() {
        let mut builder = RecordBuilder::new();
        builder.stack_frame(Some("A".into()), Some("run".into()), Some("A.java".into()), Some(10), None);
        builder.stack_frame(Some("B".into()), Some("call".into()), Some("B.java".into()), Some(20), None);
        let record = builder.finish("fallback");

        assert_eq!(record.call_site_class.as_deref(), Some("A"));
        assert_eq!(record.source_file_line_nr, Some(10));
        let exception = record.exception_string.unwrap();
        assert_eq!(exception.lines().count(), 2);
        assert!(exception.contains("Class: B Method: call"));
    }

    #[test]
    fn test_builder_defaults_logger() {
        let record = RecordBuilder::new().finish("TcpLogger");
        assert_eq!(record.logger_name, "TcpLogger");
        assert_eq!(record.level.level, LevelRegistry::FALLBACK);
    }
}
