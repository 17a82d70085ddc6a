//! Runtime configuration from the process environment and `.env` files.
//! Defaults target a local run writing under `data/`.

use chrono::NaiveDate;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::locations::LocationTable;
use crate::models::forecast::Tolerances;
use crate::services::tracker::TrackerSettings;
use crate::utils::parse_date;

pub const DEFAULT_DATABASE_URL: &str = "data/forecast_tracker.sqlite";
pub const DEFAULT_RESULTS_FILE: &str = "data/results.json";
pub const DEFAULT_LEAD_TIMES: [u32; 4] = [1, 3, 7, 15];
pub const MAX_LEAD_DAYS: u32 = 15;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_MAX_REQUEST_RETRIES: u32 = 3;
/// Open-Meteo archive data trails real time by several days.
pub const DEFAULT_SCORE_LOOKBACK_DAYS: u32 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenMeteo,
    /// Deterministic offline data, no network.
    Fake,
}

impl ProviderKind {
    fn parse(raw: &str) -> Result<Self, String> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "open-meteo" | "openmeteo" => Ok(ProviderKind::OpenMeteo),
            "fake" => Ok(ProviderKind::Fake),
            other => Err(format!("PROVIDER must be `open-meteo` or `fake`, got `{}`", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// `None` disables the JSON export.
    pub results_file: Option<PathBuf>,
    /// `None` uses the built-in airport table.
    pub locations_file: Option<PathBuf>,
    pub lead_times: Vec<u32>,
    pub tolerances: Tolerances,
    pub score_lookback_days: u32,
    pub http_timeout: Duration,
    pub max_request_retries: NonZeroU32,
    pub nws_enabled: bool,
    pub nws_user_agent: String,
    pub provider: ProviderKind,
    pub issue_enabled: bool,
    pub score_enabled: bool,
    /// Processing date override; `None` means the local date.
    pub run_date: Option<NaiveDate>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let results_file = match lookup("RESULTS_FILE") {
            Some(v) if v.trim().is_empty() => None,
            Some(v) => Some(PathBuf::from(v.trim())),
            None => Some(PathBuf::from(DEFAULT_RESULTS_FILE)),
        };

        let lead_times = match get("LEAD_TIMES") {
            Some(raw) => parse_lead_times(&raw)?,
            None => DEFAULT_LEAD_TIMES.to_vec(),
        };

        let defaults = Tolerances::default();
        let tolerances = Tolerances {
            temp_high_f: parse_or(get("TEMP_HIGH_TOLERANCE_F"), "TEMP_HIGH_TOLERANCE_F", defaults.temp_high_f)?,
            temp_low_f: parse_or(get("TEMP_LOW_TOLERANCE_F"), "TEMP_LOW_TOLERANCE_F", defaults.temp_low_f)?,
            precip_threshold_in: parse_or(get("PRECIP_THRESHOLD_IN"), "PRECIP_THRESHOLD_IN", defaults.precip_threshold_in)?,
        };
        for (name, value) in [
            ("TEMP_HIGH_TOLERANCE_F", tolerances.temp_high_f),
            ("TEMP_LOW_TOLERANCE_F", tolerances.temp_low_f),
            ("PRECIP_THRESHOLD_IN", tolerances.precip_threshold_in),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(format!("{} must be a non-negative number, got {}", name, value));
            }
        }

        let http_timeout_secs: u64 = parse_or(get("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        if http_timeout_secs == 0 {
            return Err("HTTP_TIMEOUT_SECS must be greater than zero".to_string());
        }

        let retries: u32 = parse_or(get("MAX_REQUEST_RETRIES"), "MAX_REQUEST_RETRIES", DEFAULT_MAX_REQUEST_RETRIES)?;
        let max_request_retries =
            NonZeroU32::new(retries).ok_or_else(|| "MAX_REQUEST_RETRIES must be greater than zero".to_string())?;

        let provider = match get("PROVIDER") {
            Some(raw) => ProviderKind::parse(&raw)?,
            None => ProviderKind::OpenMeteo,
        };

        Ok(Config {
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            results_file,
            locations_file: get("LOCATIONS_FILE").map(PathBuf::from),
            lead_times,
            tolerances,
            score_lookback_days: parse_or(
                get("SCORE_LOOKBACK_DAYS"),
                "SCORE_LOOKBACK_DAYS",
                DEFAULT_SCORE_LOOKBACK_DAYS,
            )?,
            http_timeout: Duration::from_secs(http_timeout_secs),
            max_request_retries,
            nws_enabled: parse_flag(get("NWS_ENABLED"), "NWS_ENABLED", true)?,
            nws_user_agent: get("NWS_USER_AGENT")
                .unwrap_or_else(|| format!("forecast-tracker/{}", env!("CARGO_PKG_VERSION"))),
            provider,
            issue_enabled: parse_flag(get("ISSUE_ENABLED"), "ISSUE_ENABLED", true)?,
            score_enabled: parse_flag(get("SCORE_ENABLED"), "SCORE_ENABLED", true)?,
            run_date: get("RUN_DATE").map(|s| parse_date(&s, "RUN_DATE")).transpose()?,
        })
    }

    pub fn tracker_settings(&self) -> Result<TrackerSettings, String> {
        let locations = match &self.locations_file {
            Some(path) => LocationTable::from_json_file(path)?,
            None => LocationTable::builtin(),
        };
        Ok(TrackerSettings {
            locations,
            lead_times: self.lead_times.clone(),
            tolerances: self.tolerances,
            score_lookback_days: self.score_lookback_days,
        })
    }
}

fn parse_or<T: std::str::FromStr>(raw: Option<String>, name: &str, default: T) -> Result<T, String> {
    match raw {
        Some(s) => s.parse::<T>().map_err(|_| format!("{} has an invalid value: `{}`", name, s)),
        None => Ok(default),
    }
}

fn parse_flag(raw: Option<String>, name: &str, default: bool) -> Result<bool, String> {
    let Some(s) = raw else {
        return Ok(default);
    };
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(format!("{} must be true or false, got `{}`", name, s)),
    }
}

/// Comma-separated lead days, each in `1..=15`; sorted and deduplicated.
pub fn parse_lead_times(raw: &str) -> Result<Vec<u32>, String> {
    let mut out = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let lead: u32 = part
            .parse()
            .map_err(|_| format!("LEAD_TIMES entry `{}` is not a whole number of days", part))?;
        if !(1..=MAX_LEAD_DAYS).contains(&lead) {
            return Err(format!("LEAD_TIMES entry {} is outside 1..={}", lead, MAX_LEAD_DAYS));
        }
        out.push(lead);
    }
    if out.is_empty() {
        return Err("LEAD_TIMES must name at least one lead time".to_string());
    }
    out.sort_unstable();
    out.dedup();
    Ok(out)
}

/// Load `KEY=value` lines into the process environment without overriding
/// variables that are already set.
pub fn load_env_file(path: &Path) -> Result<(), String> {
    let contents = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    for (key, value) in parse_env_file(&contents).map_err(|e| format!("{}:{}", path.display(), e))? {
        if std::env::var_os(&key).is_none() {
            // Mutating the environment is only sound before other threads start.
            unsafe {
                std::env::set_var(key, value);
            }
        }
    }
    Ok(())
}

/// Parse `.env` contents. Errors are prefixed with the 1-based line number.
pub fn parse_env_file(contents: &str) -> Result<Vec<(String, String)>, String> {
    let mut pairs = Vec::new();
    for (index, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);
        let (key, raw) = line
            .split_once('=')
            .ok_or_else(|| format!("{}: expected KEY=value", index + 1))?;
        let key = key.trim();
        if key.is_empty() || key.contains(char::is_whitespace) {
            return Err(format!("{}: invalid variable name `{}`", index + 1, key));
        }
        let value = env_value(raw.trim()).map_err(|e| format!("{}: {}", index + 1, e))?;
        pairs.push((key.to_string(), value));
    }
    Ok(pairs)
}

fn env_value(raw: &str) -> Result<String, String> {
    let Some(quote) = raw.chars().next().filter(|c| *c == '"' || *c == '\'') else {
        // unquoted: an inline comment ends the value
        let value = raw.split_once(" #").map(|(v, _)| v).unwrap_or(raw);
        return Ok(value.trim_end().to_string());
    };

    let mut value = String::new();
    let mut chars = raw[1..].chars();
    while let Some(c) = chars.next() {
        if c == quote {
            let rest = chars.as_str().trim();
            return if rest.is_empty() || rest.starts_with('#') {
                Ok(value)
            } else {
                Err(format!("unexpected `{}` after closing quote", rest))
            };
        }
        if c == '\\' && quote == '"' {
            match chars.next() {
                Some('n') => value.push('\n'),
                Some('t') => value.push('\t'),
                Some(other) => value.push(other),
                None => break,
            }
        } else {
            value.push(c);
        }
    }
    Err("unterminated quoted value".to_string())
}
