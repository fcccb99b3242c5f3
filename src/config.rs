use crate::correction::{ConfusablePair, CorrectionOptions};
use crate::error::ConfigError;
use regex::Regex;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// GB registration formats: current, prefix, suffix and the dateless schemes.
pub const UK_PLATE_PATTERN: &str = concat!(
    r"(?P<Current>^[A-Z]{2}[0-9]{2}[A-Z]{3}$)",
    r"|(?P<Prefix>^[A-Z][0-9]{1,3}[A-Z]{3}$)",
    r"|(?P<Suffix>^[A-Z]{3}[0-9]{1,3}[A-Z]$)",
    r"|(?P<DatelessLongNumberPrefix>^[0-9]{1,4}[A-Z]{1,2}$)",
    r"|(?P<DatelessShortNumberPrefix>^[0-9]{1,3}[A-Z]{1,3}$)",
    r"|(?P<DatelessLongNumberSuffix>^[A-Z]{1,2}[0-9]{1,4}$)",
    r"|(?P<DatelessShortNumberSuffix>^[A-Z]{1,3}[0-9]{1,3}$)",
);

/// Upper bound for the recognition and source rates.
pub const MAX_RATE_HZ: u32 = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory of stills or an http(s) snapshot URL.
    pub source: String,
    pub source_fps: u32,
    pub recognition_hz: u32,
    pub confidence_threshold: f32,
    pub top_n: usize,
    /// Compiled plate grammar; `None` when regex validation is off.
    pub plate_filter: Option<Regex>,
    pub confusable_pairs: Vec<ConfusablePair>,
    pub correction: CorrectionOptions,
    pub verify_attempts: u32,
    pub verify_workers: usize,
    pub verify_timeout: Duration,
    pub lookup_url: String,
    pub db_path: PathBuf,
    pub alpr_binary: String,
    pub alpr_country: String,
    pub alpr_config: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: "frames".to_string(),
            source_fps: 5,
            recognition_hz: 1,
            confidence_threshold: 80.0,
            top_n: 10,
            plate_filter: Some(Regex::new(UK_PLATE_PATTERN).expect("UK pattern compiles")),
            confusable_pairs: ConfusablePair::defaults(),
            correction: CorrectionOptions::default(),
            verify_attempts: 3,
            verify_workers: 4,
            verify_timeout: Duration::from_secs(10),
            lookup_url: "http://localhost:8080/vehicles".to_string(),
            db_path: PathBuf::from("/data/plates.db"),
            alpr_binary: "alpr".to_string(),
            alpr_country: "eu".to_string(),
            alpr_config: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a config from any variable lookup, falling back to defaults for
    /// unset variables.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let recognition_hz: u32 =
            parse_or(&lookup, "PLATES_RECOGNITION_HZ", defaults.recognition_hz)?;
        if !(1..=MAX_RATE_HZ).contains(&recognition_hz) {
            return Err(invalid("PLATES_RECOGNITION_HZ", "between 1 and 1000", recognition_hz));
        }
        let source_fps: u32 = parse_or(&lookup, "PLATES_SOURCE_FPS", defaults.source_fps)?;
        if !(1..=MAX_RATE_HZ).contains(&source_fps) {
            return Err(invalid("PLATES_SOURCE_FPS", "between 1 and 1000", source_fps));
        }
        let confidence_threshold: f32 = parse_or(
            &lookup,
            "PLATES_CONFIDENCE_THRESHOLD",
            defaults.confidence_threshold,
        )?;
        if !(0.0..=100.0).contains(&confidence_threshold) {
            return Err(invalid(
                "PLATES_CONFIDENCE_THRESHOLD",
                "between 0 and 100",
                confidence_threshold,
            ));
        }
        let top_n: usize = parse_or(&lookup, "PLATES_TOP_N", defaults.top_n)?;
        if top_n < 1 {
            return Err(invalid("PLATES_TOP_N", "at least 1", top_n));
        }

        let plate_filter = if parse_or(&lookup, "PLATES_REGEX_VALIDATION", true)? {
            let pattern =
                lookup("PLATES_PATTERN").unwrap_or_else(|| UK_PLATE_PATTERN.to_string());
            Some(Regex::new(&pattern).map_err(ConfigError::Pattern)?)
        } else {
            None
        };

        let confusable_pairs = match lookup("PLATES_CONFUSABLE_PAIRS") {
            Some(pairs) => ConfusablePair::parse_list(&pairs)?,
            None => defaults.confusable_pairs,
        };
        let correction = CorrectionOptions {
            include_equalized: parse_or(
                &lookup,
                "PLATES_INCLUDE_EQUALIZED",
                defaults.correction.include_equalized,
            )?,
            max_ambiguous: parse_or(
                &lookup,
                "PLATES_MAX_AMBIGUOUS",
                defaults.correction.max_ambiguous,
            )?,
        };

        let verify_attempts: u32 =
            parse_or(&lookup, "PLATES_VERIFY_ATTEMPTS", defaults.verify_attempts)?;
        if verify_attempts < 1 {
            return Err(invalid("PLATES_VERIFY_ATTEMPTS", "at least 1", verify_attempts));
        }
        let verify_workers: usize =
            parse_or(&lookup, "PLATES_VERIFY_WORKERS", defaults.verify_workers)?;
        if verify_workers < 1 {
            return Err(invalid("PLATES_VERIFY_WORKERS", "at least 1", verify_workers));
        }
        let verify_timeout_secs: u64 = parse_or(
            &lookup,
            "PLATES_VERIFY_TIMEOUT_SECS",
            defaults.verify_timeout.as_secs(),
        )?;
        if verify_timeout_secs < 1 {
            return Err(invalid(
                "PLATES_VERIFY_TIMEOUT_SECS",
                "at least 1",
                verify_timeout_secs,
            ));
        }
        let verify_timeout = Duration::from_secs(verify_timeout_secs);

        Ok(Config {
            source: lookup("PLATES_SOURCE").unwrap_or(defaults.source),
            source_fps,
            recognition_hz,
            confidence_threshold,
            top_n,
            plate_filter,
            confusable_pairs,
            correction,
            verify_attempts,
            verify_workers,
            verify_timeout,
            lookup_url: lookup("PLATES_LOOKUP_URL").unwrap_or(defaults.lookup_url),
            db_path: lookup("PLATES_DB")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            alpr_binary: lookup("ALPR_BINARY").unwrap_or(defaults.alpr_binary),
            alpr_country: lookup("ALPR_COUNTRY").unwrap_or(defaults.alpr_country),
            alpr_config: lookup("ALPR_CONFIG").map(PathBuf::from),
        })
    }

    pub fn tick_period(&self) -> Duration {
        period_for(self.recognition_hz)
    }
}

/// Interval for a rate in Hz, never shorter than one millisecond.
pub fn period_for(hz: u32) -> Duration {
    Duration::from_millis((1000 / u64::from(hz.max(1))).max(1))
}

fn parse_or<F, T>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(name) {
        Some(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            expected: "a valid value",
            value,
        }),
        None => Ok(default),
    }
}

fn invalid<T: ToString>(name: &'static str, expected: &'static str, value: T) -> ConfigError {
    ConfigError::Invalid {
        name,
        expected,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.recognition_hz, 1);
        assert_eq!(config.tick_period(), Duration::from_millis(1000));
        assert_eq!(config.confusable_pairs, ConfusablePair::defaults());
        assert!(config.plate_filter.is_some());
        assert!(config.correction.include_equalized);
        assert_eq!(config.correction.max_ambiguous, 6);
    }

    #[test]
    fn uk_pattern_accepts_gb_formats() {
        let filter = Regex::new(UK_PLATE_PATTERN).unwrap();
        assert!(filter.is_match("AB12CDE"));
        assert!(filter.is_match("A123BCD"));
        assert!(filter.is_match("ABC123D"));
        assert!(!filter.is_match("1234"));
        assert!(!filter.is_match("AB12CDEF"));
    }

    #[test]
    fn parses_overrides() {
        let config = config_from(&[
            ("PLATES_RECOGNITION_HZ", "4"),
            ("PLATES_CONFIDENCE_THRESHOLD", "72.5"),
            ("PLATES_REGEX_VALIDATION", "false"),
            ("PLATES_CONFUSABLE_PAIRS", "5S, 8B"),
            ("PLATES_DB", "/tmp/plates.db"),
        ])
        .unwrap();
        assert_eq!(config.tick_period(), Duration::from_millis(250));
        assert_eq!(config.confidence_threshold, 72.5);
        assert!(config.plate_filter.is_none());
        assert_eq!(
            config.confusable_pairs,
            vec![ConfusablePair::new('5', 'S'), ConfusablePair::new('8', 'B')]
        );
        assert_eq!(config.db_path, PathBuf::from("/tmp/plates.db"));
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(config_from(&[("PLATES_RECOGNITION_HZ", "0")]).is_err());
        assert!(config_from(&[("PLATES_CONFIDENCE_THRESHOLD", "101")]).is_err());
        assert!(config_from(&[("PLATES_TOP_N", "zero")]).is_err());
        assert!(config_from(&[("PLATES_PATTERN", "([A-Z")]).is_err());
        assert!(config_from(&[("PLATES_CONFUSABLE_PAIRS", "0OX")]).is_err());
        assert!(config_from(&[("PLATES_VERIFY_TIMEOUT_SECS", "0")]).is_err());
    }

    #[test]
    fn rates_are_bounded() {
        assert!(config_from(&[("PLATES_RECOGNITION_HZ", "1000")]).is_ok());
        assert!(config_from(&[("PLATES_RECOGNITION_HZ", "2000")]).is_err());
        assert!(config_from(&[("PLATES_SOURCE_FPS", "1001")]).is_err());

        let config = Config {
            recognition_hz: 5000,
            ..Config::default()
        };
        assert_eq!(config.tick_period(), Duration::from_millis(1));
        assert_eq!(period_for(0), Duration::from_millis(1000));
    }
}
