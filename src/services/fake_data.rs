//! Deterministic offline weather for dry runs (`PROVIDER=fake`).
//!
//! Every value is a pure function of (seed, location, date[, lead]), so a
//! forecast issued today and the "observed" weather fetched on the target
//! date agree run after run. Forecast error widens with lead time.

use chrono::{Datelike, NaiveDate};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::f64::consts::PI;

use crate::client::{GridProvider, ProviderError, WeatherProvider};
use crate::models::forecast::{GridPoint, Location, Reading};
use crate::utils::round_to;

const DEFAULT_SEED: u64 = 0x0420_1337_DEAD_BEEF;
const WET_CODES: [i32; 6] = [51, 61, 63, 80, 81, 95];
const SNOW_CODES: [i32; 4] = [71, 73, 75, 85];
const DRY_CODES: [i32; 5] = [0, 1, 2, 3, 45];
const FREEZING_F: f64 = 32.0;

#[derive(Debug, Clone, Copy)]
pub struct FakeWeather {
    seed: u64,
}

impl Default for FakeWeather {
    fn default() -> Self {
        FakeWeather { seed: DEFAULT_SEED }
    }
}

impl FakeWeather {
    pub fn new(seed: u64) -> Self {
        FakeWeather { seed }
    }

    fn rng(&self, code: &str, date: NaiveDate, salt: u64) -> SmallRng {
        // FNV-1a over the inputs; stable across platforms and releases
        let mut h: u64 = 0xcbf2_9ce4_8422_2325 ^ self.seed;
        let mut mix = |bytes: &[u8]| {
            for b in bytes {
                h ^= u64::from(*b);
                h = h.wrapping_mul(0x0000_0100_0000_01b3);
            }
        };
        mix(code.as_bytes());
        mix(&date.num_days_from_ce().to_le_bytes());
        mix(&salt.to_le_bytes());
        SmallRng::seed_from_u64(h)
    }

    /// Synthetic "observed" weather for a day.
    pub fn observed(&self, location: &Location, date: NaiveDate) -> Reading {
        let mut rng = self.rng(&location.code, date, 0);

        let lat = location.lat.abs();
        let annual_mean = 78.0 - 0.9 * (lat - 25.0).max(0.0);
        let amplitude = 6.0 + 0.75 * (lat - 25.0).max(0.0);
        // warmest around mid-July
        let annual_fraction = f64::from(date.ordinal0()) / 365.0;
        let seasonal = amplitude * (2.0 * PI * (annual_fraction - 0.54)).cos();
        let mean = annual_mean + seasonal + rng.random_range(-5.0..5.0);

        let high = mean + 9.0 + rng.random_range(-3.0..3.0);
        let low = mean - 9.0 + rng.random_range(-3.0..3.0);

        let wet = rng.random_bool(0.3);
        let (precip, code) = if wet {
            let codes: &[i32] = if low < FREEZING_F { &SNOW_CODES } else { &WET_CODES };
            (rng.random_range(0.02..1.5), codes[rng.random_range(0..codes.len())])
        } else {
            (0.0, DRY_CODES[rng.random_range(0..DRY_CODES.len())])
        };

        Reading::new(round_to(high, 1), round_to(low, 1), round_to(precip, 2), Some(code))
    }

    /// The observed day perturbed by an error that grows with lead time.
    pub fn forecast(&self, location: &Location, lead_days: u32, target_date: NaiveDate) -> Reading {
        let truth = self.observed(location, target_date);
        let mut rng = self.rng(&location.code, target_date, u64::from(lead_days) + 1);
        let spread = 1.0 + 0.6 * f64::from(lead_days);

        let high = truth.temp_high_f + rng.random_range(-spread..spread);
        let low = truth.temp_low_f + rng.random_range(-spread..spread);
        let precip = (truth.precip_in + rng.random_range(-0.05 * spread..0.05 * spread)).max(0.0);

        let miss_chance = (0.08 * f64::from(lead_days)).min(0.8);
        let code = if rng.random_bool(miss_chance) {
            let pool: &[i32] = if precip > 0.0 { &WET_CODES } else { &DRY_CODES };
            Some(pool[rng.random_range(0..pool.len())])
        } else {
            truth.condition_code
        };

        Reading::new(round_to(high, 1), round_to(low, 1), round_to(precip, 2), code)
    }
}

impl WeatherProvider for FakeWeather {
    fn fetch_forecast(
        &self,
        location: &Location,
        lead_days: u32,
        target_date: NaiveDate,
    ) -> Result<Reading, ProviderError> {
        Ok(self.forecast(location, lead_days, target_date))
    }

    fn fetch_actual(&self, location: &Location, date: NaiveDate) -> Result<Reading, ProviderError> {
        Ok(self.observed(location, date))
    }
}

impl GridProvider for FakeWeather {
    fn resolve_grid(&self, location: &Location) -> Result<GridPoint, ProviderError> {
        let grid_x = (location.lon.abs() * 2.5).round() as i32;
        let grid_y = (location.lat.abs() * 2.5).round() as i32;
        Ok(GridPoint {
            grid_id: "FAKE".to_string(),
            grid_x,
            grid_y,
            forecast_url: format!("fake://gridpoints/FAKE/{},{}/forecast", grid_x, grid_y),
        })
    }

    fn fetch_grid_forecast(&self, grid: &GridPoint) -> Result<serde_json::Value, ProviderError> {
        Ok(json!([
            {
                "name": "Today",
                "isDaytime": true,
                "shortForecast": format!("Synthetic forecast for {}", grid),
            }
        ]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::forecast::Condition;

    fn denver() -> Location {
        Location {
            code: "KDEN".into(),
            lat: 39.8561,
            lon: -104.6737,
            display_name: "Denver Intl".into(),
        }
    }

    fn miami() -> Location {
        Location {
            code: "KMIA".into(),
            lat: 25.7959,
            lon: -80.287,
            display_name: "Miami Intl".into(),
        }
    }

    #[test]
    fn readings_are_deterministic() {
        let fake = FakeWeather::default();
        let day = NaiveDate::from_ymd_opt(2025, 4, 12).unwrap();
        assert_eq!(fake.observed(&denver(), day), fake.observed(&denver(), day));
        assert_eq!(fake.forecast(&denver(), 7, day), fake.forecast(&denver(), 7, day));
        assert_ne!(fake.observed(&denver(), day), FakeWeather::new(1).observed(&denver(), day));
    }

    #[test]
    fn readings_are_physically_plausible() {
        let fake = FakeWeather::default();
        let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        for loc in [denver(), miami()] {
            for day in start.iter_days().take(365) {
                let r = fake.observed(&loc, day);
                assert!(r.temp_high_f > r.temp_low_f - 6.0, "{:?}", r);
                assert!(r.precip_in >= 0.0);
                assert_ne!(r.condition, Condition::Unknown);
                let f = fake.forecast(&loc, 15, day);
                assert!(f.precip_in >= 0.0);
            }
        }
    }

    #[test]
    fn summer_is_warmer_than_winter() {
        let fake = FakeWeather::default();
        let mean_high = |month: u32| {
            let start = NaiveDate::from_ymd_opt(2025, month, 1).unwrap();
            let days: Vec<f64> = start.iter_days().take(28).map(|d| fake.observed(&denver(), d).temp_high_f).collect();
            days.iter().sum::<f64>() / days.len() as f64
        };
        assert!(mean_high(7) > mean_high(1) + 15.0);
    }

    #[test]
    fn grid_is_stable_per_location() {
        let fake = FakeWeather::default();
        let a = fake.resolve_grid(&denver()).unwrap();
        assert_eq!(a, fake.resolve_grid(&denver()).unwrap());
        assert!(fake.fetch_grid_forecast(&a).unwrap().is_array());
    }
}
