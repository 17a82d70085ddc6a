//! Forecast accuracy rules.
//!
//! Four fields, equally weighted:
//! - high and low temperature: accurate when within the tolerance (inclusive)
//! - precipitation: accurate when forecast and actual agree on "measurable"
//!   (amount strictly above the threshold)
//! - condition: accurate only on an exact category match
//!
//! `overall_percent` is the share of accurate fields, rounded half away
//! from zero to one decimal.

use chrono::NaiveDate;

use crate::models::forecast::{FieldAccuracy, ForecastRecord, Reading, ScoreRecord, Tolerances};
use crate::utils::{approx_le, round_to};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Assessment {
    pub field_accuracy: FieldAccuracy,
    pub temp_high_diff_f: f64,
    pub temp_low_diff_f: f64,
    pub overall_percent: f64,
}

pub fn score(forecast: &Reading, actual: &Reading, tolerances: &Tolerances) -> Assessment {
    let temp_high_diff = (forecast.temp_high_f - actual.temp_high_f).abs();
    let temp_low_diff = (forecast.temp_low_f - actual.temp_low_f).abs();

    let field_accuracy = FieldAccuracy {
        temp_high: approx_le(temp_high_diff, tolerances.temp_high_f),
        temp_low: approx_le(temp_low_diff, tolerances.temp_low_f),
        precipitation: forecast.has_measurable_precip(tolerances.precip_threshold_in)
            == actual.has_measurable_precip(tolerances.precip_threshold_in),
        condition: forecast.condition == actual.condition,
    };

    Assessment {
        field_accuracy,
        temp_high_diff_f: round_to(temp_high_diff, 1),
        temp_low_diff_f: round_to(temp_low_diff, 1),
        overall_percent: overall_percent(&field_accuracy),
    }
}

pub fn overall_percent(accuracy: &FieldAccuracy) -> f64 {
    let ratio = accuracy.accurate_count() as f64 / FieldAccuracy::FIELD_COUNT as f64;
    round_to(ratio * 100.0, 1)
}

/// Score a stored forecast against the observed reading for its target date.
pub fn score_record(
    record: &ForecastRecord,
    actual: Reading,
    tolerances: &Tolerances,
    scored_on: NaiveDate,
) -> ScoreRecord {
    let assessment = score(&record.forecast, &actual, tolerances);
    ScoreRecord {
        location: record.location.clone(),
        lead_days: record.lead_days,
        issued_on: record.issued_on,
        target_date: record.target_date,
        scored_on,
        forecast: record.forecast.clone(),
        actual,
        field_accuracy: assessment.field_accuracy,
        temp_high_diff_f: assessment.temp_high_diff_f,
        temp_low_diff_f: assessment.temp_low_diff_f,
        overall_percent: assessment.overall_percent,
    }
}
