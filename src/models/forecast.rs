//! Domain types shared by the stores, the scoring engine and the tracker.
//!
//! Notes
//! - Temperatures are degrees Fahrenheit, precipitation is inches.
//! - A `Reading` is used both for forecasts and for observed weather.
//! - The identity of both forecast and score records is `ForecastKey`.

use chrono::{Days, NaiveDate};
use core::fmt;
use serde::{Deserialize, Serialize};

/// A tracked location. Built once at startup and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub code: String,
    pub lat: f64,
    pub lon: f64,
    #[serde(alias = "name")]
    pub display_name: String,
}

/// Coarse weather condition derived from a WMO weather interpretation code.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Foggy,
    Drizzle,
    Rainy,
    Snowy,
    Stormy,
    Unknown,
}

impl Condition {
    pub const ALL: [Condition; 9] = [
        Condition::Clear,
        Condition::PartlyCloudy,
        Condition::Cloudy,
        Condition::Foggy,
        Condition::Drizzle,
        Condition::Rainy,
        Condition::Snowy,
        Condition::Stormy,
        Condition::Unknown,
    ];

    /// Classify a WMO code. Absent or unmapped codes are `Unknown`.
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_wmo_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Clear,
            Some(1 | 2) => Self::PartlyCloudy,
            Some(3) => Self::Cloudy,
            Some(45 | 48) => Self::Foggy,
            Some(51 | 53 | 55 | 56 | 57) => Self::Drizzle,
            Some(61 | 63 | 65 | 66 | 67 | 80 | 81 | 82) => Self::Rainy,
            Some(71 | 73 | 75 | 77 | 85 | 86) => Self::Snowy,
            Some(95 | 96 | 99) => Self::Stormy,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::PartlyCloudy => "partly_cloudy",
            Self::Cloudy => "cloudy",
            Self::Foggy => "foggy",
            Self::Drizzle => "drizzle",
            Self::Rainy => "rainy",
            Self::Snowy => "snowy",
            Self::Stormy => "stormy",
            Self::Unknown => "unknown",
        }
    }

    /// Inverse of `as_str`; anything unrecognised maps to `Unknown`.
    pub fn from_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == name)
            .unwrap_or(Self::Unknown)
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized daily weather, either forecast or observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub temp_high_f: f64,
    pub temp_low_f: f64,
    pub precip_in: f64,
    pub condition_code: Option<i32>,
    pub condition: Condition,
}

impl Reading {
    /// Build a reading; the condition always follows the code.
    pub fn new(temp_high_f: f64, temp_low_f: f64, precip_in: f64, condition_code: Option<i32>) -> Self {
        Reading {
            temp_high_f,
            temp_low_f,
            precip_in,
            condition_code,
            condition: Condition::from_wmo_code(condition_code),
        }
    }

    /// Strictly greater than the threshold counts as measurable.
    pub fn has_measurable_precip(&self, threshold_in: f64) -> bool {
        self.precip_in > threshold_in
    }
}

/// Identity of a forecast and of the score computed from it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ForecastKey {
    pub location: String,
    pub lead_days: u32,
    pub target_date: NaiveDate,
}

impl fmt::Display for ForecastKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/lead{}/{}", self.location, self.lead_days, self.target_date)
    }
}

/// A forecast issued on `issued_on` for `target_date = issued_on + lead_days`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub location: String,
    pub lead_days: u32,
    pub issued_on: NaiveDate,
    pub target_date: NaiveDate,
    pub forecast: Reading,
    /// Raw NWS forecast periods, kept for later analysis; never scored.
    pub secondary: Option<serde_json::Value>,
}

/// `issued_on + lead_days`, or `None` past the end of the calendar.
pub fn target_date_for(issued_on: NaiveDate, lead_days: u32) -> Option<NaiveDate> {
    issued_on.checked_add_days(Days::new(u64::from(lead_days)))
}

impl ForecastRecord {
    pub fn issue(
        location: impl Into<String>,
        lead_days: u32,
        issued_on: NaiveDate,
        forecast: Reading,
        secondary: Option<serde_json::Value>,
    ) -> Option<Self> {
        Some(ForecastRecord {
            location: location.into(),
            lead_days,
            issued_on,
            target_date: target_date_for(issued_on, lead_days)?,
            forecast,
            secondary,
        })
    }

    pub fn key(&self) -> ForecastKey {
        ForecastKey {
            location: self.location.clone(),
            lead_days: self.lead_days,
            target_date: self.target_date,
        }
    }
}

/// Per-field outcome of comparing a forecast with the observed weather.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FieldAccuracy {
    pub temp_high: bool,
    pub temp_low: bool,
    pub precipitation: bool,
    pub condition: bool,
}

impl FieldAccuracy {
    pub const FIELD_COUNT: usize = 4;

    pub fn accurate_count(&self) -> usize {
        [self.temp_high, self.temp_low, self.precipitation, self.condition]
            .into_iter()
            .filter(|hit| *hit)
            .count()
    }
}

/// A scored forecast. Written once per key and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRecord {
    pub location: String,
    pub lead_days: u32,
    pub issued_on: NaiveDate,
    pub target_date: NaiveDate,
    pub scored_on: NaiveDate,
    pub forecast: Reading,
    pub actual: Reading,
    pub field_accuracy: FieldAccuracy,
    pub temp_high_diff_f: f64,
    pub temp_low_diff_f: f64,
    pub overall_percent: f64,
}

impl ScoreRecord {
    pub fn key(&self) -> ForecastKey {
        ForecastKey {
            location: self.location.clone(),
            lead_days: self.lead_days,
            target_date: self.target_date,
        }
    }
}

/// Scoring tolerances. Temperatures compare with `<=`, precipitation with `>`.
#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tolerances {
    pub temp_high_f: f64,
    pub temp_low_f: f64,
    pub precip_threshold_in: f64,
}

impl Default for Tolerances {
    fn default() -> Self {
        Tolerances {
            temp_high_f: 3.0,
            temp_low_f: 3.0,
            precip_threshold_in: 0.1,
        }
    }
}

/// NWS grid addressing for a location, resolved once and cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPoint {
    pub grid_id: String,
    pub grid_x: i32,
    pub grid_y: i32,
    pub forecast_url: String,
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{},{}", self.grid_id, self.grid_x, self.grid_y)
    }
}
