use std::env;

use chrono::NaiveDate;

const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-pro";
const DEFAULT_TRANSLATE_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_FOOTBALL_HOST: &str = "api-football-v1.p.rapidapi.com";
const DEFAULT_FOOTBALL_TIMEZONE: &str = "Asia/Yangon";
const DEFAULT_THINKING_BUDGET: u32 = 4000;
const DEFAULT_BATCH_SIZE: usize = 3;
const DEFAULT_USAGE_LIMIT: u32 = 50;
const DEFAULT_CACHE_MINUTES: u64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureSource {
    Api,
    Demo,
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub translate_model: String,
    pub thinking_budget: u32,
}

#[derive(Debug, Clone)]
pub struct FootballConfig {
    pub api_key: Option<String>,
    pub host: String,
    pub timezone: String,
    pub cache_minutes: u64,
    pub source: FixtureSource,
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub gemini: GeminiConfig,
    pub football: FootballConfig,
    pub batch_size: usize,
    pub usage_limit: u32,
    pub translate_language: String,
    pub start_date: Option<NaiveDate>,
    pub log_filter: String,
    pub log_file: Option<String>,
}

impl OracleConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests do not touch the process env.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let opt = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let gemini = GeminiConfig {
            api_key: opt("GEMINI_API_KEY").or_else(|| opt("API_KEY")),
            base_url: opt("GEMINI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_GEMINI_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            model: opt("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_GEMINI_MODEL.to_string()),
            translate_model: opt("GEMINI_TRANSLATE_MODEL")
                .unwrap_or_else(|| DEFAULT_TRANSLATE_MODEL.to_string()),
            thinking_budget: opt("GEMINI_THINKING_BUDGET")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(DEFAULT_THINKING_BUDGET)
                .min(32_768),
        };

        let football_key = opt("FOOTBALL_API_KEY");
        let source = match opt("FIXTURE_SOURCE").map(|v| v.to_ascii_lowercase()).as_deref() {
            Some("demo") => FixtureSource::Demo,
            Some("api") => FixtureSource::Api,
            _ if football_key.is_some() => FixtureSource::Api,
            _ => FixtureSource::Demo,
        };
        let football = FootballConfig {
            api_key: football_key,
            host: opt("FOOTBALL_API_HOST").unwrap_or_else(|| DEFAULT_FOOTBALL_HOST.to_string()),
            timezone: opt("FOOTBALL_TIMEZONE")
                .unwrap_or_else(|| DEFAULT_FOOTBALL_TIMEZONE.to_string()),
            cache_minutes: opt("FIXTURE_CACHE_MINUTES")
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_CACHE_MINUTES)
                .clamp(1, 1440),
            source,
        };

        Self {
            gemini,
            football,
            batch_size: opt("PREDICTION_BATCH_SIZE")
                .and_then(|v| v.parse::<usize>().ok())
                .unwrap_or(DEFAULT_BATCH_SIZE)
                .clamp(1, 10),
            usage_limit: opt("API_USAGE_LIMIT")
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(DEFAULT_USAGE_LIMIT)
                .clamp(1, 10_000),
            translate_language: opt("TRANSLATE_LANGUAGE").unwrap_or_else(|| "Burmese".to_string()),
            start_date: opt("ORACLE_DATE").and_then(|v| parse_date(&v)),
            log_filter: opt("ORACLE_LOG").unwrap_or_else(|| "info".to_string()),
            log_file: opt("ORACLE_LOG_FILE"),
        }
    }
}

/// Accepts `YYYY-MM-DD` or any string carrying exactly eight digits.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 8 {
        NaiveDate::parse_from_str(&digits, "%Y%m%d").ok()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{FixtureSource, OracleConfig, parse_date};

    fn config_from(pairs: &[(&str, &str)]) -> OracleConfig {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        OracleConfig::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_keys_select_demo_sources() {
        let cfg = config_from(&[]);
        assert!(cfg.gemini.api_key.is_none());
        assert_eq!(cfg.football.source, FixtureSource::Demo);
        assert_eq!(cfg.batch_size, 3);
        assert_eq!(cfg.usage_limit, 50);
        assert_eq!(cfg.football.cache_minutes, 15);
        assert_eq!(cfg.gemini.model, "gemini-2.5-pro");
    }

    #[test]
    fn values_are_trimmed_and_clamped() {
        let cfg = config_from(&[
            ("GEMINI_API_KEY", "  abc  "),
            ("PREDICTION_BATCH_SIZE", "99"),
            ("API_USAGE_LIMIT", "0"),
            ("FOOTBALL_API_KEY", "k"),
            ("GEMINI_BASE_URL", "http://localhost:9/v1/"),
        ]);
        assert_eq!(cfg.gemini.api_key.as_deref(), Some("abc"));
        assert_eq!(cfg.batch_size, 10);
        assert_eq!(cfg.usage_limit, 1);
        assert_eq!(cfg.football.source, FixtureSource::Api);
        assert_eq!(cfg.gemini.base_url, "http://localhost:9/v1");
    }

    #[test]
    fn explicit_demo_source_wins_over_key() {
        let cfg = config_from(&[("FOOTBALL_API_KEY", "k"), ("FIXTURE_SOURCE", "DEMO")]);
        assert_eq!(cfg.football.source, FixtureSource::Demo);
    }

    #[test]
    fn parse_date_accepts_dashed_and_compact() {
        assert_eq!(parse_date("2025-03-09"), parse_date("20250309"));
        assert!(parse_date("2025-03").is_none());
    }
}
