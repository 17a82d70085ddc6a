//! Response models for the Open-Meteo forecast and archive endpoints.
//!
//! Both endpoints return the same `daily` block when queried with
//! `daily=temperature_2m_max,temperature_2m_min,precipitation_sum,weather_code`.
//! Individual values may be `null` (e.g. archive data not yet available).

use chrono::NaiveDate;
use serde::Deserialize;

use crate::models::forecast::Reading;

pub const DAILY_FIELDS: &str = "temperature_2m_max,temperature_2m_min,precipitation_sum,weather_code";

#[derive(Debug, Clone, Deserialize)]
pub struct DailyResponse {
    /// Zone the daily buckets are aligned to (`timezone=auto`).
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub daily: Option<Daily>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Daily {
    pub time: Vec<NaiveDate>,
    pub temperature_2m_max: Vec<Option<f64>>,
    pub temperature_2m_min: Vec<Option<f64>>,
    pub precipitation_sum: Vec<Option<f64>>,
    #[serde(default)]
    pub weather_code: Vec<Option<i32>>,
}

impl DailyResponse {
    /// Extract the reading for `date`, or describe what is missing.
    pub fn reading_for(&self, date: NaiveDate) -> Result<Reading, String> {
        let daily = self
            .daily
            .as_ref()
            .ok_or_else(|| "response has no `daily` block".to_string())?;
        daily.reading_for(date).map_err(|e| match &self.timezone {
            Some(tz) => format!("{} ({})", e, tz),
            None => e,
        })
    }
}

impl Daily {
    pub fn reading_for(&self, date: NaiveDate) -> Result<Reading, String> {
        let idx = self
            .time
            .iter()
            .position(|d| *d == date)
            .ok_or_else(|| format!("no daily entry for {}", date))?;

        let value = |series: &[Option<f64>], name: &str| -> Result<f64, String> {
            series
                .get(idx)
                .copied()
                .flatten()
                .ok_or_else(|| format!("`{}` missing for {}", name, date))
        };

        let high = value(&self.temperature_2m_max, "temperature_2m_max")?;
        let low = value(&self.temperature_2m_min, "temperature_2m_min")?;
        let precip = value(&self.precipitation_sum, "precipitation_sum")?;
        let code = self.weather_code.get(idx).copied().flatten();
        Ok(Reading::new(high, low, precip, code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forecast::Condition;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn parses_single_day_payload() {
        let body = r#"{
            "latitude": 42.36, "longitude": -71.01, "timezone": "America/New_York",
            "daily": {
                "time": ["2025-07-04"],
                "temperature_2m_max": [84.2],
                "temperature_2m_min": [67.9],
                "precipitation_sum": [0.12],
                "weather_code": [61]
            }
        }"#;
        let resp: DailyResponse = serde_json::from_str(body).unwrap();
        let reading = resp.reading_for(date("2025-07-04")).unwrap();
        assert_eq!(reading.temp_high_f, 84.2);
        assert_eq!(reading.temp_low_f, 67.9);
        assert_eq!(reading.precip_in, 0.12);
        assert_eq!(reading.condition, Condition::Rainy);
    }

    #[test]
    fn null_weather_code_is_unknown_condition() {
        let body = r#"{"daily": {
            "time": ["2025-07-04"],
            "temperature_2m_max": [84.2],
            "temperature_2m_min": [67.9],
            "precipitation_sum": [0.0],
            "weather_code": [null]
        }}"#;
        let resp: DailyResponse = serde_json::from_str(body).unwrap();
        let reading = resp.reading_for(date("2025-07-04")).unwrap();
        assert_eq!(reading.condition_code, None);
        assert_eq!(reading.condition, Condition::Unknown);
    }

    #[test]
    fn missing_values_are_data_shape_errors() {
        let body = r#"{"daily": {
            "time": ["2025-07-04"],
            "temperature_2m_max": [null],
            "temperature_2m_min": [67.9],
            "precipitation_sum": [0.0]
        }}"#;
        let resp: DailyResponse = serde_json::from_str(body).unwrap();
        let err = resp.reading_for(date("2025-07-04")).unwrap_err();
        assert!(err.contains("temperature_2m_max"), "{}", err);

        let err = resp.reading_for(date("2025-07-05")).unwrap_err();
        assert!(err.contains("no daily entry"), "{}", err);

        let with_zone: DailyResponse = serde_json::from_str(
            r#"{"timezone": "America/Phoenix", "daily": {
                "time": ["2025-07-04"],
                "temperature_2m_max": [null],
                "temperature_2m_min": [null],
                "precipitation_sum": [null]
            }}"#,
        )
        .unwrap();
        assert_eq!(
            with_zone.reading_for(date("2025-07-04")).unwrap_err(),
            "`temperature_2m_max` missing for 2025-07-04 (America/Phoenix)"
        );

        let empty: DailyResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.reading_for(date("2025-07-04")).is_err());
    }
}
