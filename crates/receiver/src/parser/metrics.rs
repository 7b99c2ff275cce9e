use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

use super::model::{LogFormat, ParseError};

/// Error categories for metrics recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricErrorType {
    /// One event was not well-formed or had the wrong root
    Malformed,
    /// The stream could no longer be framed into events
    Desync,
    /// A single event exceeded the configured size
    TooLarge,
    /// Non-UTF8 content encountered
    NonUtf8,
}

impl From<&ParseError> for MetricErrorType {
    fn from(err: &ParseError) -> Self {
        match err {
            ParseError::Malformed(_) | ParseError::UnexpectedRoot { .. } => MetricErrorType::Malformed,
            ParseError::Desync { .. } => MetricErrorType::Desync,
            ParseError::EventTooLarge(..) => MetricErrorType::TooLarge,
            ParseError::NonUtf8 => MetricErrorType::NonUtf8,
        }
    }
}

/// Forces the wrapped data onto its own 64-byte cache line so counters
/// updated by different workers do not share a line.
#[repr(align(64))]
#[derive(Debug, Default)]
pub struct CacheAligned<T>(pub T);

/// Detection metrics (one attempt per connection)
#[derive(Debug, Default)]
pub struct DetectionMetrics {
    pub attempts: AtomicU64,
    pub success: AtomicU64,
    pub rejected: AtomicU64,
}

/// Per-schema event counters (updated per event)
#[derive(Debug, Default)]
pub struct FormatMetrics {
    pub log4j: AtomicU64,
    pub log4net: AtomicU64,
    pub log4j2: AtomicU64,
}

#[derive(Debug, Default)]
pub struct TotalMetrics {
    pub time_nanos: AtomicU64,
    pub count: AtomicU64,
}

#[derive(Debug, Default)]
pub struct ErrorMetrics {
    pub malformed: AtomicU64,
    pub desync: AtomicU64,
    pub too_large: AtomicU64,
    pub non_utf8: AtomicU64,
}

/// Connection gauges
#[derive(Debug, Default)]
pub struct GaugeMetrics {
    pub active_connections: AtomicI64,
    pub reconnects: AtomicU64,
}

/// Counters shared by a receiver's selector, bindings and worker.
///
/// Each group sits on its own cache line. All operations use
/// `Ordering::Relaxed`; `snapshot()` reads are not transactional across
/// fields, which is fine for observability.
#[derive(Debug, Default)]
pub struct ParsingMetrics {
    pub detection: CacheAligned<DetectionMetrics>,
    pub formats: CacheAligned<FormatMetrics>,
    pub totals: CacheAligned<TotalMetrics>,
    pub errors: CacheAligned<ErrorMetrics>,
    pub gauges: CacheAligned<GaugeMetrics>,
}

impl ParsingMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_detection(&self, success: bool) {
        self.detection.0.attempts.fetch_add(1, Ordering::Relaxed);
        if success {
            self.detection.0.success.fetch_add(1, Ordering::Relaxed);
        } else {
            self.detection.0.rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one event translated into a record. Called once per event.
    #[inline]
    pub fn record_parse(&self, format: LogFormat, time_nanos: u64) {
        self.totals.0.count.fetch_add(1, Ordering::Relaxed);
        self.totals.0.time_nanos.fetch_add(time_nanos, Ordering::Relaxed);

        match format {
            LogFormat::Log4j => self.formats.0.log4j.fetch_add(1, Ordering::Relaxed),
            LogFormat::Log4Net => self.formats.0.log4net.fetch_add(1, Ordering::Relaxed),
            LogFormat::Log4j2 => self.formats.0.log4j2.fetch_add(1, Ordering::Relaxed),
        };
    }

    #[inline]
    pub fn record_error(&self, error_type: MetricErrorType) {
        match error_type {
            MetricErrorType::Malformed => self.errors.0.malformed.fetch_add(1, Ordering::Relaxed),
            MetricErrorType::Desync => self.errors.0.desync.fetch_add(1, Ordering::Relaxed),
            MetricErrorType::TooLarge => self.errors.0.too_large.fetch_add(1, Ordering::Relaxed),
            MetricErrorType::NonUtf8 => self.errors.0.non_utf8.fetch_add(1, Ordering::Relaxed),
        };
    }

    // --- Gauge Management ---

    #[inline]
    pub fn inc_connections(&self) {
        self.gauges.0.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn dec_connections(&self) {
        self.gauges.0.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reconnect(&self) {
        self.gauges.0.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    /// Serializable copy of the current counters, for logging or display.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_parsed = self.totals.0.count.load(Ordering::Relaxed);
        let total_time_ns = self.totals.0.time_nanos.load(Ordering::Relaxed);

        let malformed = self.errors.0.malformed.load(Ordering::Relaxed);
        let desync = self.errors.0.desync.load(Ordering::Relaxed);
        let too_large = self.errors.0.too_large.load(Ordering::Relaxed);
        let non_utf8 = self.errors.0.non_utf8.load(Ordering::Relaxed);
        let total_attempts = total_parsed + malformed + desync + too_large + non_utf8;

        MetricsSnapshot {
            detection_attempts: self.detection.0.attempts.load(Ordering::Relaxed),
            detection_success: self.detection.0.success.load(Ordering::Relaxed),
            detection_rejected: self.detection.0.rejected.load(Ordering::Relaxed),

            log4j_parsed: self.formats.0.log4j.load(Ordering::Relaxed),
            log4net_parsed: self.formats.0.log4net.load(Ordering::Relaxed),
            log4j2_parsed: self.formats.0.log4j2.load(Ordering::Relaxed),

            total_parsed,
            avg_parse_time_us: if total_parsed > 0 {
                (total_time_ns as f64 / total_parsed as f64) / 1000.0
            } else {
                0.0
            },

            malformed_events: malformed,
            stream_desyncs: desync,
            events_too_large: too_large,
            non_utf8_content: non_utf8,
            success_rate: if total_attempts > 0 {
                total_parsed as f64 / total_attempts as f64
            } else {
                1.0
            },

            active_connections: self.gauges.0.active_connections.load(Ordering::Relaxed),
            reconnects: self.gauges.0.reconnects.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    // Detection
    pub detection_attempts: u64,
    pub detection_success: u64,
    pub detection_rejected: u64,

    // Per schema
    pub log4j_parsed: u64,
    pub log4net_parsed: u64,
    pub log4j2_parsed: u64,

    // Performance
    pub total_parsed: u64,
    pub avg_parse_time_us: f64,

    // Errors
    pub malformed_events: u64,
    pub stream_desyncs: u64,
    pub events_too_large: u64,
    pub non_utf8_content: u64,
    pub success_rate: f64,

    // Gauges
    pub active_connections: i64,
    pub reconnects: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_metrics_are_empty() {
        let snap = ParsingMetrics::new().snapshot();

        assert_eq!(snap.total_parsed, 0);
        assert_eq!(snap.malformed_events, 0);
        assert_eq!(snap.avg_parse_time_us, 0.0);
        assert_eq!(snap.success_rate, 1.0);
    }

    #[test]
    fn test_record_detection() {
        let metrics = ParsingMetrics::new();
        metrics.record_detection(true);
        metrics.record_detection(false);
        metrics.record_detection(true);

        let snap = metrics.snapshot();
        assert_eq!(snap.detection_attempts, 3);
        assert_eq!(snap.detection_success, 2);
        assert_eq!(snap.detection_rejected, 1);
    }

    #[test]
    fn test_record_parse_counts_and_times() {
        let metrics = ParsingMetrics::new();
        metrics.record_parse(LogFormat::Log4j, 1000);
        metrics.record_parse(LogFormat::Log4j2, 2000);

        let snap = metrics.snapshot();
        assert_eq!(snap.total_parsed, 2);
        assert_eq!(snap.log4j_parsed, 1);
        assert_eq!(snap.log4j2_parsed, 1);
        assert_eq!(snap.log4net_parsed, 0);
        assert!((snap.avg_parse_time_us - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_error_classification_and_success_rate() {
        let metrics = ParsingMetrics::new();
        metrics.record_parse(LogFormat::Log4Net, 100);
        metrics.record_parse(LogFormat::Log4Net, 100);

        let desync = ParseError::Desync { offset: 3, reason: "x".into() };
        let root = ParseError::UnexpectedRoot { expected: "a".into(), found: "b".into() };
        metrics.record_error((&desync).into());
        metrics.record_error((&root).into());

        let snap = metrics.snapshot();
        assert_eq!(snap.stream_desyncs, 1);
        assert_eq!(snap.malformed_events, 1);
        assert_eq!(snap.success_rate, 0.5);
    }

    #[test]
    fn test_gauges() {
        let metrics = ParsingMetrics::new();
        metrics.inc_connections();
        metrics.inc_connections();
        metrics.dec_connections();
        metrics.record_reconnect();

        let snap = metrics.snapshot();
        assert_eq!(snap.active_connections, 1);
        assert_eq!(snap.reconnects, 1);
    }
}
