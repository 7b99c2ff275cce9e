//! Load: config loading from file and environment variables.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use super::model::ReceiverConfig;

impl ReceiverConfig {
    /// Load configuration from file or environment variables
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = std::env::var("RECEIVER_CONFIG_FILE")
            .unwrap_or_else(|_| "receiver.toml".to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using defaults", config_path);
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let mut file = File::open(path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        let config: ReceiverConfig = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Apply `RECEIVER_*` overrides read through `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), String>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("RECEIVER_PORT") {
            self.port = parse_var("RECEIVER_PORT", &port)?;
        }
        if let Some(ipv6) = lookup("RECEIVER_IPV6") {
            self.ipv6 = parse_var("RECEIVER_IPV6", &ipv6)?;
        }
        if let Some(size) = lookup("RECEIVER_BUFFER_SIZE") {
            self.buffer_size = parse_var("RECEIVER_BUFFER_SIZE", &size)?;
        }
        if let Some(parser) = lookup("RECEIVER_PARSER") {
            // "auto" clears a pin set in the file
            self.parser = match parser.trim() {
                "" | "auto" => None,
                name => Some(name.parse()?),
            };
        }
        if let Some(logger) = lookup("RECEIVER_DEFAULT_LOGGER") {
            self.default_logger = logger;
        }
        Ok(())
    }

    /// Reject values the receiver cannot run with
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_size == 0 {
            return Err("buffer_size must be > 0".to_string());
        }
        if self.poll_interval_ms == 0 {
            return Err("poll_interval_ms must be > 0".to_string());
        }
        if self.reconnect_backoff_ms == 0 {
            return Err("reconnect_backoff_ms must be > 0".to_string());
        }
        if self.max_event_size == 0 {
            return Err("max_event_size must be > 0".to_string());
        }
        if self.sniff_limit == 0 {
            return Err("sniff_limit must be > 0".to_string());
        }
        if self.default_logger.is_empty() {
            return Err("default_logger must not be empty".to_string());
        }
        Ok(())
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, String> {
    value
        .trim()
        .parse()
        .map_err(|_| format!("{} has an invalid value: '{}'", key, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::LogFormat;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_overrides_applied() {
        let env = vars(&[
            ("RECEIVER_PORT", "9999"),
            ("RECEIVER_IPV6", "true"),
            ("RECEIVER_PARSER", "log4j2"),
            ("RECEIVER_BUFFER_SIZE", "4096"),
            ("RECEIVER_DEFAULT_LOGGER", "Remote"),
        ]);
        let mut cfg = ReceiverConfig::default();
        cfg.apply_overrides(|k| env.get(k).cloned()).unwrap();

        assert_eq!(cfg.port, 9999);
        assert!(cfg.ipv6);
        assert_eq!(cfg.parser, Some(LogFormat::Log4j2));
        assert_eq!(cfg.buffer_size, 4096);
        assert_eq!(cfg.default_logger, "Remote");
    }

    #[test]
    fn test_auto_parser_clears_pin() {
        let env = vars(&[("RECEIVER_PARSER", "auto")]);
        let mut cfg = ReceiverConfig {
            parser: Some(LogFormat::Log4j),
            ..Default::default()
        };
        cfg.apply_overrides(|k| env.get(k).cloned()).unwrap();
        assert!(cfg.parser.is_none());
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let env = vars(&[("RECEIVER_PORT", "seventy")]);
        let mut cfg = ReceiverConfig::default();
        let err = cfg.apply_overrides(|k| env.get(k).cloned()).unwrap_err();
        assert!(err.contains("RECEIVER_PORT"));
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("receiver-conf-{}.toml", std::process::id()));
        std::fs::write(&path, "port = 5000\nipv6 = true\nreconnect_backoff_ms = 250\n").unwrap();

        let cfg = ReceiverConfig::from_file(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(cfg.port, 5000);
        assert!(cfg.ipv6);
        assert_eq!(cfg.reconnect_backoff_ms, 250);
        assert_eq!(cfg.poll_interval_ms, 300);
    }

    #[test]
    fn test_validate() {
        assert!(ReceiverConfig::default().validate().is_ok());

        let zero_buffer = ReceiverConfig { buffer_size: 0, ..Default::default() };
        assert!(zero_buffer.validate().is_err());

        let zero_poll = ReceiverConfig { poll_interval_ms: 0, ..Default::default() };
        assert!(zero_poll.validate().is_err());

        let zero_sniff = ReceiverConfig { sniff_limit: 0, ..Default::default() };
        assert!(zero_sniff.validate().unwrap_err().contains("sniff_limit"));
    }
}
