//! Subset of the api.weather.gov models used by the tracker.
//!
//! Only the `/points/{lat},{lon}` lookup and the gridpoint forecast are
//! modelled. Forecast periods are stored verbatim as the secondary payload
//! of a forecast record, so they serialize back in the API's camelCase.

use serde::{Deserialize, Serialize};

use crate::models::forecast::GridPoint;

#[derive(Debug, Clone, Deserialize)]
pub struct PointResponse {
    pub properties: PointProperties,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointProperties {
    #[serde(default)]
    pub grid_id: Option<String>,
    #[serde(default)]
    pub grid_x: Option<i32>,
    #[serde(default)]
    pub grid_y: Option<i32>,
    #[serde(default)]
    pub forecast: Option<String>,
}

impl PointProperties {
    pub fn into_grid_point(self) -> Result<GridPoint, String> {
        match (self.grid_id, self.grid_x, self.grid_y, self.forecast) {
            (Some(grid_id), Some(grid_x), Some(grid_y), Some(forecast_url)) => Ok(GridPoint {
                grid_id,
                grid_x,
                grid_y,
                forecast_url,
            }),
            _ => Err("points response lacks gridId/gridX/gridY/forecast".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridForecastResponse {
    pub properties: GridForecastProperties,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GridForecastProperties {
    #[serde(default)]
    pub periods: Vec<ForecastPeriod>,
}

/// `{ "unitCode": "wmoUnit:percent", "value": 40 }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantitativeValue {
    #[serde(default)]
    pub unit_code: Option<String>,
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForecastPeriod {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub is_daytime: Option<bool>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub temperature_unit: Option<String>,
    #[serde(default)]
    pub temperature_trend: Option<String>,
    #[serde(default)]
    pub probability_of_precipitation: Option<QuantitativeValue>,
    #[serde(default)]
    pub wind_speed: Option<String>,
    #[serde(default)]
    pub wind_direction: Option<String>,
    #[serde(default)]
    pub short_forecast: Option<String>,
    #[serde(default)]
    pub detailed_forecast: Option<String>,
}
