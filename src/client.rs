//! Blocking HTTP client for the two weather providers.
//!
//! - Open-Meteo (primary, scored): daily forecast and archive endpoints.
//! - api.weather.gov (secondary, stored raw): points lookup and grid forecast.
//!
//! Retries with exponential backoff live here and only here; callers see a
//! single success or failure per fetch.

use chrono::NaiveDate;
use http::StatusCode;
use log::debug;
use rand::Rng;
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::thread;
use std::time::Duration;

use crate::models::forecast::{GridPoint, Location, Reading};
use crate::models::nws::{GridForecastResponse, PointResponse};
use crate::models::open_meteo::{DAILY_FIELDS, DailyResponse};

const OPEN_METEO_FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";
const OPEN_METEO_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";
const NWS_POINTS_URL: &str = "https://api.weather.gov/points";

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_MAX_MS: u64 = 8_000;
const BACKOFF_JITTER_MS: u64 = 250;

/// Primary provider: forecasts to be scored and the observed weather to score them against.
pub trait WeatherProvider {
    fn fetch_forecast(&self, location: &Location, lead_days: u32, target_date: NaiveDate)
    -> Result<Reading, ProviderError>;

    fn fetch_actual(&self, location: &Location, date: NaiveDate) -> Result<Reading, ProviderError>;
}

/// Secondary provider addressed by grid tokens rather than coordinates.
pub trait GridProvider {
    fn resolve_grid(&self, location: &Location) -> Result<GridPoint, ProviderError>;

    fn fetch_grid_forecast(&self, grid: &GridPoint) -> Result<serde_json::Value, ProviderError>;
}

#[derive(Debug)]
pub enum ProviderError {
    /// Connection, DNS, TLS or timeout failure.
    Transport(String),
    Http { status: u16, message: String },
    /// Body was not the JSON we expected.
    Decode(String),
    /// JSON parsed but required values were absent.
    DataShape(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Transport(_) => true,
            ProviderError::Http { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || StatusCode::from_u16(*status).is_ok_and(|s| s.is_server_error())
            }
            ProviderError::Decode(_) | ProviderError::DataShape(_) => false,
        }
    }
}

impl core::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ProviderError::Transport(s) => write!(f, "transport error: {}", s),
            ProviderError::Http { status, message } => write!(f, "http {}: {}", status, message),
            ProviderError::Decode(s) => write!(f, "decode error: {}", s),
            ProviderError::DataShape(s) => write!(f, "unexpected data: {}", s),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<ureq::Error> for ProviderError {
    fn from(value: ureq::Error) -> Self {
        match value {
            ureq::Error::StatusCode(status) => ProviderError::Http {
                status,
                message: StatusCode::from_u16(status)
                    .ok()
                    .and_then(|s| s.canonical_reason())
                    .unwrap_or("unknown status")
                    .to_string(),
            },
            other => ProviderError::Transport(other.to_string()),
        }
    }
}

pub struct WeatherClient {
    agent: ureq::Agent,
    user_agent: String,
    max_attempts: NonZeroU32,
}

impl WeatherClient {
    pub fn new(timeout: Duration, user_agent: impl Into<String>, max_attempts: NonZeroU32) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .into();
        WeatherClient {
            agent,
            user_agent: user_agent.into(),
            max_attempts,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, ProviderError> {
        let mut attempt: u32 = 1;
        loop {
            match self.get_json_once(url, query) {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < self.max_attempts.get() => {
                    let delay = backoff_delay(attempt);
                    debug!(
                        "GET {} failed (attempt {}/{}): {}; retrying in {}ms",
                        url,
                        attempt,
                        self.max_attempts,
                        e,
                        delay.as_millis()
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn get_json_once<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, ProviderError> {
        let mut req = self
            .agent
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/json");
        for (k, v) in query {
            req = req.query(*k, v);
        }

        let mut res = req.call()?;
        let body = res
            .body_mut()
            .read_to_string()
            .map_err(|e| ProviderError::Transport(format!("reading body failed: {}", e)))?;
        let de = &mut serde_json::Deserializer::from_str(&body);
        serde_path_to_error::deserialize(de).map_err(|e| ProviderError::Decode(e.to_string()))
    }

    fn get_daily(&self, url: &str, location: &Location, date: NaiveDate) -> Result<Reading, ProviderError> {
        let resp: DailyResponse = self.get_json(url, &daily_query(location, date))?;
        resp.reading_for(date).map_err(ProviderError::DataShape)
    }
}

fn daily_query(location: &Location, date: NaiveDate) -> Vec<(&'static str, String)> {
    let day = date.format("%Y-%m-%d").to_string();
    vec![
        ("latitude", location.lat.to_string()),
        ("longitude", location.lon.to_string()),
        ("daily", DAILY_FIELDS.to_string()),
        ("temperature_unit", "fahrenheit".to_string()),
        ("precipitation_unit", "inch".to_string()),
        ("timezone", "auto".to_string()),
        ("start_date", day.clone()),
        ("end_date", day),
    ]
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.saturating_sub(1).min(16));
    let jitter = rand::rng().random_range(0..=BACKOFF_JITTER_MS);
    Duration::from_millis(exp.min(BACKOFF_MAX_MS) + jitter)
}

impl WeatherProvider for WeatherClient {
    fn fetch_forecast(
        &self,
        location: &Location,
        _lead_days: u32,
        target_date: NaiveDate,
    ) -> Result<Reading, ProviderError> {
        self.get_daily(OPEN_METEO_FORECAST_URL, location, target_date)
    }

    fn fetch_actual(&self, location: &Location, date: NaiveDate) -> Result<Reading, ProviderError> {
        self.get_daily(OPEN_METEO_ARCHIVE_URL, location, date)
    }
}

impl GridProvider for WeatherClient {
    fn resolve_grid(&self, location: &Location) -> Result<GridPoint, ProviderError> {
        let url = format!("{}/{:.4},{:.4}", NWS_POINTS_URL, location.lat, location.lon);
        let resp: PointResponse = self.get_json(&url, &[])?;
        resp.properties.into_grid_point().map_err(ProviderError::DataShape)
    }

    fn fetch_grid_forecast(&self, grid: &GridPoint) -> Result<serde_json::Value, ProviderError> {
        let resp: GridForecastResponse = self.get_json(&grid.forecast_url, &[])?;
        serde_json::to_value(&resp.properties.periods).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}
