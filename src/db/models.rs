//! Diesel row structs and their conversions to the domain types.
//!
//! Rows are flat: a `Reading` becomes five columns (with a prefix on the
//! score table, which holds two readings). Conversions are exact so that a
//! record read back compares equal to the record written.

use chrono::NaiveDate;
use diesel::prelude::*;

use crate::models::forecast::{
    Condition, FieldAccuracy, ForecastRecord, GridPoint, Reading, ScoreRecord,
};
use crate::schema;

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::forecasts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ForecastRow {
    pub location: String,
    pub lead_days: i32,
    pub target_date: NaiveDate,
    pub issued_on: NaiveDate,
    pub temp_high_f: f64,
    pub temp_low_f: f64,
    pub precip_in: f64,
    pub condition_code: Option<i32>,
    pub condition: String,
    pub secondary_payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::scores)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ScoreRow {
    pub location: String,
    pub lead_days: i32,
    pub target_date: NaiveDate,
    pub issued_on: NaiveDate,
    pub scored_on: NaiveDate,
    pub forecast_temp_high_f: f64,
    pub forecast_temp_low_f: f64,
    pub forecast_precip_in: f64,
    pub forecast_condition_code: Option<i32>,
    pub forecast_condition: String,
    pub actual_temp_high_f: f64,
    pub actual_temp_low_f: f64,
    pub actual_precip_in: f64,
    pub actual_condition_code: Option<i32>,
    pub actual_condition: String,
    pub temp_high_accurate: bool,
    pub temp_low_accurate: bool,
    pub precip_accurate: bool,
    pub condition_accurate: bool,
    pub temp_high_diff_f: f64,
    pub temp_low_diff_f: f64,
    pub overall_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Queryable, Selectable, Insertable)]
#[diesel(table_name = schema::grid_cache)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct GridCacheRow {
    pub location: String,
    pub grid_id: String,
    pub grid_x: i32,
    pub grid_y: i32,
    pub forecast_url: String,
    pub resolved_on: NaiveDate,
}

pub fn lead_days_to_db(lead_days: u32) -> Result<i32, String> {
    i32::try_from(lead_days).map_err(|_| format!("lead time {} out of range", lead_days))
}

fn lead_days_from_db(lead_days: i32) -> Result<u32, String> {
    u32::try_from(lead_days).map_err(|_| format!("stored lead time {} is negative", lead_days))
}

fn reading_from_columns(high: f64, low: f64, precip: f64, code: Option<i32>, condition: &str) -> Reading {
    Reading {
        temp_high_f: high,
        temp_low_f: low,
        precip_in: precip,
        condition_code: code,
        condition: Condition::from_name(condition),
    }
}

impl TryFrom<&ForecastRecord> for ForecastRow {
    type Error = String;

    fn try_from(r: &ForecastRecord) -> Result<Self, Self::Error> {
        let secondary_payload = r
            .secondary
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| format!("serializing secondary payload failed: {}", e))?;
        Ok(ForecastRow {
            location: r.location.clone(),
            lead_days: lead_days_to_db(r.lead_days)?,
            target_date: r.target_date,
            issued_on: r.issued_on,
            temp_high_f: r.forecast.temp_high_f,
            temp_low_f: r.forecast.temp_low_f,
            precip_in: r.forecast.precip_in,
            condition_code: r.forecast.condition_code,
            condition: r.forecast.condition.as_str().to_string(),
            secondary_payload,
        })
    }
}

impl TryFrom<ForecastRow> for ForecastRecord {
    type Error = String;

    fn try_from(row: ForecastRow) -> Result<Self, Self::Error> {
        let secondary = row
            .secondary_payload
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| format!("stored secondary payload for {} is not JSON: {}", row.location, e))?;
        Ok(ForecastRecord {
            lead_days: lead_days_from_db(row.lead_days)?,
            issued_on: row.issued_on,
            target_date: row.target_date,
            forecast: reading_from_columns(
                row.temp_high_f,
                row.temp_low_f,
                row.precip_in,
                row.condition_code,
                &row.condition,
            ),
            secondary,
            location: row.location,
        })
    }
}

impl TryFrom<&ScoreRecord> for ScoreRow {
    type Error = String;

    fn try_from(s: &ScoreRecord) -> Result<Self, Self::Error> {
        Ok(ScoreRow {
            location: s.location.clone(),
            lead_days: lead_days_to_db(s.lead_days)?,
            target_date: s.target_date,
            issued_on: s.issued_on,
            scored_on: s.scored_on,
            forecast_temp_high_f: s.forecast.temp_high_f,
            forecast_temp_low_f: s.forecast.temp_low_f,
            forecast_precip_in: s.forecast.precip_in,
            forecast_condition_code: s.forecast.condition_code,
            forecast_condition: s.forecast.condition.as_str().to_string(),
            actual_temp_high_f: s.actual.temp_high_f,
            actual_temp_low_f: s.actual.temp_low_f,
            actual_precip_in: s.actual.precip_in,
            actual_condition_code: s.actual.condition_code,
            actual_condition: s.actual.condition.as_str().to_string(),
            temp_high_accurate: s.field_accuracy.temp_high,
            temp_low_accurate: s.field_accuracy.temp_low,
            precip_accurate: s.field_accuracy.precipitation,
            condition_accurate: s.field_accuracy.condition,
            temp_high_diff_f: s.temp_high_diff_f,
            temp_low_diff_f: s.temp_low_diff_f,
            overall_percent: s.overall_percent,
        })
    }
}

impl TryFrom<ScoreRow> for ScoreRecord {
    type Error = String;

    fn try_from(row: ScoreRow) -> Result<Self, Self::Error> {
        Ok(ScoreRecord {
            lead_days: lead_days_from_db(row.lead_days)?,
            issued_on: row.issued_on,
            target_date: row.target_date,
            scored_on: row.scored_on,
            forecast: reading_from_columns(
                row.forecast_temp_high_f,
                row.forecast_temp_low_f,
                row.forecast_precip_in,
                row.forecast_condition_code,
                &row.forecast_condition,
            ),
            actual: reading_from_columns(
                row.actual_temp_high_f,
                row.actual_temp_low_f,
                row.actual_precip_in,
                row.actual_condition_code,
                &row.actual_condition,
            ),
            field_accuracy: FieldAccuracy {
                temp_high: row.temp_high_accurate,
                temp_low: row.temp_low_accurate,
                precipitation: row.precip_accurate,
                condition: row.condition_accurate,
            },
            temp_high_diff_f: row.temp_high_diff_f,
            temp_low_diff_f: row.temp_low_diff_f,
            overall_percent: row.overall_percent,
            location: row.location,
        })
    }
}

impl GridCacheRow {
    pub fn new(location: &str, grid: &GridPoint, resolved_on: NaiveDate) -> Self {
        GridCacheRow {
            location: location.to_string(),
            grid_id: grid.grid_id.clone(),
            grid_x: grid.grid_x,
            grid_y: grid.grid_y,
            forecast_url: grid.forecast_url.clone(),
            resolved_on,
        }
    }
}

impl From<GridCacheRow> for GridPoint {
    fn from(row: GridCacheRow) -> Self {
        GridPoint {
            grid_id: row.grid_id,
            grid_x: row.grid_x,
            grid_y: row.grid_y,
            forecast_url: row.forecast_url,
        }
    }
}
