use bytes::{Buf, Bytes, BytesMut};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::model::ParseError;
use super::xml::{is_blank, is_truncated};

/// Forward-only position in one connection's byte stream.
///
/// The wire carries top-level event elements back to back with no framing,
/// so the cursor buffers bytes until an element closes at depth zero and then
/// hands out exactly that slice. Whitespace, comments and PIs between events
/// are dropped. An optional envelope element (e.g. log4j2 `<Events>`) is
/// stepped into rather than treated as an event.
///
/// Scanning resumes where the previous call stopped, so an event arriving in
/// many small reads is tokenized once.
#[derive(Debug)]
pub struct XmlCursor {
    buf: BytesMut,
    envelope: Option<&'static str>,
    in_envelope: bool,
    max_event_size: usize,
    /// Names of the elements open inside the current event, outermost first.
    open: Vec<Vec<u8>>,
    /// Offset in `buf` up to which the current event has been scanned.
    scanned: usize,
    /// Bytes already handed out or skipped, for error offsets.
    consumed: usize,
}

enum Scan {
    Event { start: usize, end: usize },
    /// `skip` bytes in front of the event can go; scanning resumes at `resume`.
    Pending { skip: usize, resume: usize },
    Desync { offset: usize, reason: String },
}

impl XmlCursor {
    pub fn new(initial: &[u8], envelope: Option<&'static str>, max_event_size: usize) -> Self {
        Self {
            buf: BytesMut::from(initial),
            envelope,
            in_envelope: false,
            max_event_size,
            open: Vec::new(),
            scanned: 0,
            consumed: 0,
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Bytes held for an event that has not closed yet.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Next complete event element, `Ok(None)` when more bytes are needed.
    pub fn next_event(&mut self) -> Result<Option<Bytes>, ParseError> {
        match self.scan() {
            Scan::Event { start, end } => {
                self.skip(start);
                let event = self.buf.split_to(end - start).freeze();
                self.consumed += event.len();
                self.scanned = 0;
                Ok(Some(event))
            }
            Scan::Pending { skip, resume } => {
                self.skip(skip);
                self.scanned = resume - skip;
                if self.buf.len() > self.max_event_size {
                    let size = self.buf.len();
                    self.discard();
                    return Err(ParseError::EventTooLarge(size, self.max_event_size));
                }
                Ok(None)
            }
            Scan::Desync { offset, reason } => {
                let offset = self.consumed + offset;
                self.discard();
                Err(ParseError::Desync { offset, reason })
            }
        }
    }

    fn skip(&mut self, n: usize) {
        self.buf.advance(n);
        self.consumed += n;
    }

    fn discard(&mut self) {
        self.consumed += self.buf.len();
        self.buf.clear();
        self.open.clear();
        self.scanned = 0;
    }

    fn is_envelope(&self, name: &[u8]) -> bool {
        self.envelope.is_some_and(|tag| tag.as_bytes() == name)
    }

    /// Continue tokenizing from `scanned`. Offsets returned are into `buf`.
    fn scan(&mut self) -> Scan {
        let base = self.scanned;
        let mut reader = Reader::from_reader(&self.buf[base..]);
        let config = reader.config_mut();
        // end tags are matched against `open`, which outlives the reader
        config.check_end_names = false;
        config.allow_unmatched_ends = true;

        let mut start = 0usize;
        let mut skip = 0usize;

        loop {
            let before = base + reader.buffer_position() as usize;
            let event = match reader.read_event() {
                Ok(event) => event,
                Err(e) if is_truncated(&e, &self.buf[before..]) => {
                    return Scan::Pending { skip, resume: before }
                }
                Err(e) => {
                    return Scan::Desync {
                        offset: base + reader.error_position() as usize,
                        reason: e.to_string(),
                    }
                }
            };
            let after = base + reader.buffer_position() as usize;

            if self.open.is_empty() {
                match event {
                    Event::Start(e) => {
                        let name = e.name();
                        if !self.in_envelope && self.is_envelope(name.as_ref()) {
                            self.in_envelope = true;
                            skip = after;
                        } else {
                            self.open.push(name.as_ref().to_vec());
                            start = before;
                        }
                    }
                    Event::Empty(e) => {
                        if self.is_envelope(e.name().as_ref()) {
                            skip = after;
                        } else {
                            return Scan::Event { start: before, end: after };
                        }
                    }
                    Event::End(e) => {
                        if self.in_envelope && self.is_envelope(e.name().as_ref()) {
                            self.in_envelope = false;
                            skip = after;
                        } else {
                            return Scan::Desync {
                                offset: before,
                                reason: format!(
                                    "closing tag </{}> without an open event",
                                    String::from_utf8_lossy(e.name().as_ref())
                                ),
                            };
                        }
                    }
                    Event::Text(t) => {
                        if !is_blank(&t) {
                            return Scan::Desync {
                                offset: before,
                                reason: "character data between events".to_string(),
                            };
                        }
                        skip = after;
                    }
                    Event::Eof => return Scan::Pending { skip, resume: skip },
                    _ => skip = after,
                }
                continue;
            }

            match event {
                Event::Start(e) => self.open.push(e.name().as_ref().to_vec()),
                Event::End(e) => {
                    let name = e.name();
                    // Closing an open ancestor closes everything opened inside
                    // it. Names that are not open are left for the parser.
                    if let Some(at) = self.open.iter().rposition(|open| open.as_slice() == name.as_ref()) {
                        self.open.truncate(at);
                    }
                    if self.open.is_empty() {
                        return Scan::Event { start, end: after };
                    }
                }
                Event::Eof => return Scan::Pending { skip, resume: before },
                _ => {}
            }
        }
    }
}
