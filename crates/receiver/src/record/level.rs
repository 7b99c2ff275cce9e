use std::collections::HashMap;
use std::fmt;
use std::sync::OnceLock;

use serde::Serialize;

/// Severity buckets the viewer orders and colours by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    /// Numeric rank, spaced like log4net's level values so framework-specific
    /// levels can sit between the buckets.
    pub fn rank(&self) -> u32 {
        match self {
            LogLevel::Trace => 20_000,
            LogLevel::Debug => 30_000,
            LogLevel::Info => 40_000,
            LogLevel::Warn => 60_000,
            LogLevel::Error => 70_000,
            LogLevel::Fatal => 110_000,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resolved severity: the bucket plus the rank used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SeverityLevel {
    pub level: LogLevel,
    pub rank: u32,
}

impl SeverityLevel {
    pub const fn new(level: LogLevel, rank: u32) -> Self {
        Self { level, rank }
    }

    pub fn error() -> Self {
        LevelRegistry::global().level(LogLevel::Error)
    }

    pub fn info() -> Self {
        LevelRegistry::global().level(LogLevel::Info)
    }
}

impl From<LogLevel> for SeverityLevel {
    fn from(level: LogLevel) -> Self {
        Self::new(level, level.rank())
    }
}

impl fmt::Display for SeverityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.level.fmt(f)
    }
}

/// Name → severity table shared by every parser.
///
/// Lookups are case-sensitive and total: names the table does not know
/// resolve to [`LevelRegistry::FALLBACK`] instead of failing the event.
#[derive(Debug)]
pub struct LevelRegistry {
    by_name: HashMap<&'static str, SeverityLevel>,
}

/// Wire names emitted by log4j, log4net, log4j2, NLog and java.util.logging bridges.
const KNOWN_LEVELS: &[(&str, LogLevel, u32)] = &[
    ("ALL", LogLevel::Trace, 0),
    ("FINEST", LogLevel::Trace, 10_000),
    ("VERBOSE", LogLevel::Trace, 10_000),
    ("TRACE", LogLevel::Trace, 20_000),
    ("Trace", LogLevel::Trace, 20_000),
    ("FINER", LogLevel::Debug, 25_000),
    ("FINE", LogLevel::Debug, 30_000),
    ("DEBUG", LogLevel::Debug, 30_000),
    ("Debug", LogLevel::Debug, 30_000),
    ("CONFIG", LogLevel::Info, 35_000),
    ("INFO", LogLevel::Info, 40_000),
    ("Info", LogLevel::Info, 40_000),
    ("NOTICE", LogLevel::Info, 50_000),
    ("WARN", LogLevel::Warn, 60_000),
    ("Warn", LogLevel::Warn, 60_000),
    ("WARNING", LogLevel::Warn, 60_000),
    ("ERROR", LogLevel::Error, 70_000),
    ("Error", LogLevel::Error, 70_000),
    ("SEVERE", LogLevel::Error, 80_000),
    ("CRITICAL", LogLevel::Fatal, 90_000),
    ("ALERT", LogLevel::Fatal, 100_000),
    ("FATAL", LogLevel::Fatal, 110_000),
    ("Fatal", LogLevel::Fatal, 110_000),
    ("EMERGENCY", LogLevel::Fatal, 120_000),
    ("OFF", LogLevel::Fatal, 2_147_483_647),
];

impl LevelRegistry {
    /// Severity used for missing or unrecognised level names.
    pub const FALLBACK: LogLevel = LogLevel::Info;

    pub fn new() -> Self {
        let by_name = KNOWN_LEVELS
            .iter()
            .map(|(name, level, rank)| (*name, SeverityLevel::new(*level, *rank)))
            .collect();
        Self { by_name }
    }

    /// Process-wide registry, built on first use.
    pub fn global() -> &'static LevelRegistry {
        static REGISTRY: OnceLock<LevelRegistry> = OnceLock::new();
        REGISTRY.get_or_init(LevelRegistry::new)
    }

    pub fn lookup(&self, name: &str) -> SeverityLevel {
        self.by_name
            .get(name)
            .copied()
            .unwrap_or_else(|| SeverityLevel::from(Self::FALLBACK))
    }

    /// Lookup for an optional wire attribute.
    pub fn resolve(&self, name: Option<&str>) -> SeverityLevel {
        match name {
            Some(name) => self.lookup(name.trim()),
            None => SeverityLevel::from(Self::FALLBACK),
        }
    }

    /// Canonical severity for a bucket.
    pub fn level(&self, level: LogLevel) -> SeverityLevel {
        self.lookup(level.as_str())
    }
}

impl Default for LevelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_levels() {
        let registry = LevelRegistry::new();
        assert_eq!(registry.lookup("ERROR").level, LogLevel::Error);
        assert_eq!(registry.lookup("WARN").level, LogLevel::Warn);
        assert_eq!(registry.lookup("DEBUG").level, LogLevel::Debug);
        assert_eq!(registry.lookup("FATAL").level, LogLevel::Fatal);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let registry = LevelRegistry::new();
        // "error" is not in the table, only "ERROR" and "Error"
        assert_eq!(registry.lookup("error").level, LevelRegistry::FALLBACK);
        assert_eq!(registry.lookup("Error").level, LogLevel::Error);
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let registry = LevelRegistry::new();
        let level = registry.lookup("CHATTY");
        assert_eq!(level.level, LogLevel::Info);
        assert_eq!(level.rank, LogLevel::Info.rank());
    }

    #[test]
    fn test_resolve_missing_attribute() {
        let registry = LevelRegistry::new();
        assert_eq!(registry.resolve(None).level, LevelRegistry::FALLBACK);
        assert_eq!(registry.resolve(Some(" ERROR ")).level, LogLevel::Error);
    }

    #[test]
    fn test_ranks_are_ordered() {
        let registry = LevelRegistry::global();
        let ranks: Vec<u32> = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR", "FATAL"]
            .iter()
            .map(|n| registry.lookup(n).rank)
            .collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
    }

    #[test]
    fn test_severe_sits_between_error_and_fatal() {
        let registry = LevelRegistry::global();
        let severe = registry.lookup("SEVERE");
        assert_eq!(severe.level, LogLevel::Error);
        assert!(severe.rank > registry.lookup("ERROR").rank);
        assert!(severe.rank < registry.lookup("FATAL").rank);
    }
}
