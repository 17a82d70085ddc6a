//! Issue and score passes.
//!
//! Issue: fetch a forecast for every (location, lead time) pair and store it.
//! Score: for every stored forecast due today, fetch the observed weather,
//! score it and append the result unless that key was already scored.
//!
//! Failures are isolated per pair/record; only a run in which every forecast
//! fetch failed is reported as a failure.

use chrono::{Days, NaiveDate};
use core::fmt;
use log::{debug, error, info, warn};

use crate::client::{GridProvider, WeatherProvider};
use crate::db::connection::DbConn;
use crate::locations::LocationTable;
use crate::models::forecast::{ForecastRecord, Location, ScoreRecord, Tolerances, target_date_for};
use crate::services::grid::GridResolver;
use crate::services::scoring::score_record;
use crate::services::store::{self, StoreError};

/// Immutable run configuration handed to the tracker.
#[derive(Debug, Clone)]
pub struct TrackerSettings {
    pub locations: LocationTable,
    pub lead_times: Vec<u32>,
    pub tolerances: Tolerances,
    /// Also score still-unscored forecasts due up to this many days ago.
    pub score_lookback_days: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PairFailure {
    pub location: String,
    pub lead_days: u32,
    pub reason: String,
}

impl fmt::Display for PairFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} lead {}d ({})", self.location, self.lead_days, self.reason)
    }
}

#[derive(Debug, Default)]
pub struct IssueSummary {
    pub attempted: usize,
    pub fetched: usize,
    pub stored: usize,
    pub duplicates: usize,
    pub store_failures: usize,
    pub secondary_attached: usize,
    pub failures: Vec<PairFailure>,
}

impl IssueSummary {
    /// Every attempted fetch failed: a provider-wide outage rather than flakiness.
    pub fn all_fetches_failed(&self) -> bool {
        self.attempted > 0 && self.fetched == 0
    }
}

#[derive(Debug, Default)]
pub struct ScoreSummary {
    pub due: usize,
    pub already_scored: usize,
    pub unknown_location: usize,
    pub fetch_failures: usize,
    pub store_failures: usize,
    pub scored: Vec<ScoreRecord>,
}

pub struct Tracker<'a> {
    settings: &'a TrackerSettings,
    provider: &'a dyn WeatherProvider,
    secondary: Option<&'a dyn GridProvider>,
    grids: GridResolver,
}

impl<'a> Tracker<'a> {
    pub fn new(
        settings: &'a TrackerSettings,
        provider: &'a dyn WeatherProvider,
        secondary: Option<&'a dyn GridProvider>,
    ) -> Self {
        Tracker {
            settings,
            provider,
            secondary,
            grids: GridResolver::new(),
        }
    }

    pub fn issue_pass(&mut self, conn: &mut DbConn, today: NaiveDate) -> IssueSummary {
        let settings = self.settings;
        let mut summary = IssueSummary::default();
        info!(
            "Issue: {} location(s) x lead times {:?} as of {}",
            settings.locations.len(),
            settings.lead_times,
            today
        );

        for location in settings.locations.iter() {
            let secondary = self.fetch_secondary(conn, location, today);

            for &lead_days in &settings.lead_times {
                summary.attempted += 1;
                let Some(target) = target_date_for(today, lead_days) else {
                    warn!("Issue: {} lead {}d from {} has no representable target date", location.code, lead_days, today);
                    summary.failures.push(PairFailure {
                        location: location.code.clone(),
                        lead_days,
                        reason: format!("target date overflows from {}", today),
                    });
                    continue;
                };

                let reading = match self.provider.fetch_forecast(location, lead_days, target) {
                    Ok(r) => r,
                    Err(e) => {
                        warn!("Issue: {} lead {}d for {} fetch failed: {}", location.code, lead_days, target, e);
                        summary.failures.push(PairFailure {
                            location: location.code.clone(),
                            lead_days,
                            reason: e.to_string(),
                        });
                        continue;
                    }
                };
                summary.fetched += 1;

                let record = ForecastRecord {
                    location: location.code.clone(),
                    lead_days,
                    issued_on: today,
                    target_date: target,
                    forecast: reading,
                    secondary: secondary.clone(),
                };
                if record.secondary.is_some() {
                    summary.secondary_attached += 1;
                }
                match store::save_forecast(conn, &record) {
                    Ok(()) => {
                        summary.stored += 1;
                        info!(
                            "Issue: {} lead {}d for {}: high {:.1}F low {:.1}F precip {:.2}in {}",
                            location.code,
                            lead_days,
                            target,
                            record.forecast.temp_high_f,
                            record.forecast.temp_low_f,
                            record.forecast.precip_in,
                            record.forecast.condition
                        );
                    }
                    Err(StoreError::DuplicateKey(key)) => {
                        summary.duplicates += 1;
                        debug!("Issue: {} already stored, keeping the first forecast", key);
                    }
                    Err(e) => {
                        summary.store_failures += 1;
                        error!("Issue: {} lead {}d store failed: {}", location.code, lead_days, e);
                    }
                }
            }
        }

        info!(
            "Issue complete: {}/{} fetched, {} stored, {} already stored, {} fetch failure(s), {} store failure(s)",
            summary.fetched,
            summary.attempted,
            summary.stored,
            summary.duplicates,
            summary.failures.len(),
            summary.store_failures
        );
        if !summary.failures.is_empty() {
            let pairs: Vec<String> = summary.failures.iter().map(PairFailure::to_string).collect();
            warn!("Issue: unfetched pairs: {}", pairs.join("; "));
        }
        summary
    }

    fn fetch_secondary(&mut self, conn: &mut DbConn, location: &Location, today: NaiveDate) -> Option<serde_json::Value> {
        let provider = self.secondary?;
        let grid = self.grids.resolve(conn, provider, location, today)?;
        match provider.fetch_grid_forecast(&grid) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("Issue: {} secondary forecast unavailable ({}): {}", location.code, grid, e);
                None
            }
        }
    }

    pub fn score_pass(&self, conn: &mut DbConn, today: NaiveDate) -> ScoreSummary {
        let mut summary = ScoreSummary::default();

        for back in (0..=self.settings.score_lookback_days).rev() {
            let Some(as_of) = today.checked_sub_days(Days::new(u64::from(back))) else {
                continue;
            };
            let due = match store::list_due(conn, as_of) {
                Ok(d) => d,
                Err(e) => {
                    error!("Score: listing forecasts due {} failed: {}", as_of, e);
                    continue;
                }
            };
            summary.due += due.len();
            for record in &due {
                self.score_one(conn, record, today, &mut summary);
            }
        }

        info!(
            "Score complete: {} due, {} scored, {} already scored, {} awaiting observations, {} unknown location(s), {} store failure(s)",
            summary.due,
            summary.scored.len(),
            summary.already_scored,
            summary.fetch_failures,
            summary.unknown_location,
            summary.store_failures
        );
        summary
    }

    fn score_one(&self, conn: &mut DbConn, record: &ForecastRecord, today: NaiveDate, summary: &mut ScoreSummary) {
        let key = record.key();

        let Some(location) = self.settings.locations.get(&record.location) else {
            warn!("Score: {} refers to unknown location {}, skipping", key, record.location);
            summary.unknown_location += 1;
            return;
        };

        match store::score_exists(conn, &key) {
            Ok(true) => {
                debug!("Score: {} already scored, skipping", key);
                summary.already_scored += 1;
                return;
            }
            Ok(false) => {}
            Err(e) => {
                error!("Score: {} existence check failed: {}", key, e);
                summary.store_failures += 1;
                return;
            }
        }

        let actual = match self.provider.fetch_actual(location, record.target_date) {
            Ok(a) => a,
            Err(e) => {
                warn!("Score: {} observation unavailable, will retry on a later run: {}", key, e);
                summary.fetch_failures += 1;
                return;
            }
        };

        let score = score_record(record, actual, &self.settings.tolerances, today);
        match store::append_score(conn, &score) {
            Ok(true) => {
                info!(
                    "Score: {} high {:.1}->{:.1}F ({}) low {:.1}->{:.1}F ({}) precip {:.2}->{:.2}in ({}) {}->{} ({}) overall {:.1}%",
                    key,
                    score.forecast.temp_high_f,
                    score.actual.temp_high_f,
                    mark(score.field_accuracy.temp_high),
                    score.forecast.temp_low_f,
                    score.actual.temp_low_f,
                    mark(score.field_accuracy.temp_low),
                    score.forecast.precip_in,
                    score.actual.precip_in,
                    mark(score.field_accuracy.precipitation),
                    score.forecast.condition,
                    score.actual.condition,
                    mark(score.field_accuracy.condition),
                    score.overall_percent
                );
                summary.scored.push(score);
            }
            Ok(false) => {
                debug!("Score: {} was scored concurrently, skipping", key);
                summary.already_scored += 1;
            }
            Err(e) => {
                error!("Score: {} store failed: {}", key, e);
                summary.store_failures += 1;
            }
        }
    }
}

fn mark(hit: bool) -> &'static str {
    if hit { "hit" } else { "miss" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProviderError;
    use crate::config::Config;
    use crate::db::connection::in_memory;
    use crate::models::forecast::{GridPoint, Reading};
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeSet;

    /// Provider with switchable outages per location.
    struct Scripted {
        down_forecast: RefCell<BTreeSet<String>>,
        down_actual: RefCell<BTreeSet<String>>,
        forecast_calls: Cell<usize>,
        actual_calls: Cell<usize>,
        grid_calls: Cell<usize>,
    }

    impl Scripted {
        fn new() -> Self {
            Scripted {
                down_forecast: RefCell::new(BTreeSet::new()),
                down_actual: RefCell::new(BTreeSet::new()),
                forecast_calls: Cell::new(0),
                actual_calls: Cell::new(0),
                grid_calls: Cell::new(0),
            }
        }

        fn outage(&self, code: &str) -> ProviderError {
            ProviderError::Transport(format!("{} timed out", code))
        }
    }

    impl WeatherProvider for Scripted {
        fn fetch_forecast(&self, location: &Location, lead_days: u32, _target: NaiveDate) -> Result<Reading, ProviderError> {
            self.forecast_calls.set(self.forecast_calls.get() + 1);
            if self.down_forecast.borrow().contains(&location.code) {
                return Err(self.outage(&location.code));
            }
            Ok(Reading::new(70.0 + f64::from(lead_days), 50.0, 0.0, Some(0)))
        }

        fn fetch_actual(&self, location: &Location, _date: NaiveDate) -> Result<Reading, ProviderError> {
            self.actual_calls.set(self.actual_calls.get() + 1);
            if self.down_actual.borrow().contains(&location.code) {
                return Err(self.outage(&location.code));
            }
            Ok(Reading::new(72.0, 51.0, 0.0, Some(1)))
        }
    }

    impl GridProvider for Scripted {
        fn resolve_grid(&self, location: &Location) -> Result<GridPoint, ProviderError> {
            self.grid_calls.set(self.grid_calls.get() + 1);
            Ok(GridPoint {
                grid_id: "TST".into(),
                grid_x: 1,
                grid_y: 2,
                forecast_url: format!("test://{}", location.code),
            })
        }

        fn fetch_grid_forecast(&self, grid: &GridPoint) -> Result<serde_json::Value, ProviderError> {
            Ok(serde_json::json!([{ "name": "Today", "source": grid.forecast_url }]))
        }
    }

    fn loc(code: &str) -> Location {
        Location {
            code: code.into(),
            lat: 40.0,
            lon: -90.0,
            display_name: code.into(),
        }
    }

    fn settings(codes: &[&str], lead_times: &[u32]) -> TrackerSettings {
        TrackerSettings {
            locations: LocationTable::from_locations(codes.iter().map(|c| loc(c))).unwrap(),
            lead_times: lead_times.to_vec(),
            tolerances: Tolerances::default(),
            score_lookback_days: 0,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn issue_pass_stores_every_pair_with_exact_target_dates() {
        let mut conn = in_memory();
        let cfg = settings(&["KBOS", "KORD"], &[1, 3, 7, 15]);
        let provider = Scripted::new();
        let mut tracker = Tracker::new(&cfg, &provider, None);

        let summary = tracker.issue_pass(&mut conn, date("2025-12-30"));
        assert_eq!(summary.attempted, 8);
        assert_eq!(summary.stored, 8);
        assert!(!summary.all_fetches_failed());

        let stored = store::list_forecasts(&mut conn).unwrap();
        assert_eq!(stored.len(), 8);
        let targets: BTreeSet<NaiveDate> = stored.iter().map(|r| r.target_date).collect();
        let expected: BTreeSet<NaiveDate> = ["2025-12-31", "2026-01-02", "2026-01-06", "2026-01-14"]
            .iter()
            .map(|s| date(s))
            .collect();
        assert_eq!(targets, expected);
        assert!(stored.iter().all(|r| r.issued_on == date("2025-12-30") && r.secondary.is_none()));
    }

    #[test]
    fn partial_outage_does_not_abort_the_run() {
        let mut conn = in_memory();
        let cfg = settings(&["KBOS", "KDEN", "KORD"], &[1, 3]);
        let provider = Scripted::new();
        provider.down_forecast.borrow_mut().insert("KDEN".into());
        let mut tracker = Tracker::new(&cfg, &provider, None);

        let summary = tracker.issue_pass(&mut conn, date("2025-03-01"));
        assert_eq!(summary.attempted, 6);
        assert_eq!(summary.fetched, 4);
        assert_eq!(summary.failures.len(), 2);
        assert!(summary.failures.iter().all(|f| f.location == "KDEN"));
        assert_eq!(summary.failures[0].to_string(), "KDEN lead 1d (transport error: KDEN timed out)");
        assert!(!summary.all_fetches_failed());
    }

    #[test]
    fn target_past_calendar_end_is_a_pair_failure() {
        let mut conn = in_memory();
        let cfg = settings(&["KBOS"], &[1, 3]);
        let provider = Scripted::new();
        let mut tracker = Tracker::new(&cfg, &provider, None);

        let summary = tracker.issue_pass(&mut conn, NaiveDate::MAX);
        assert_eq!(summary.attempted, 2);
        assert_eq!(summary.failures.len(), 2);
        assert!(summary.all_fetches_failed());
        assert_eq!(provider.forecast_calls.get(), 0);
        assert!(store::list_forecasts(&mut conn).unwrap().is_empty());
    }

    #[test]
    fn total_outage_is_reported() {
        let mut conn = in_memory();
        let cfg = settings(&["KBOS", "KORD"], &[1]);
        let provider = Scripted::new();
        provider.down_forecast.borrow_mut().extend(["KBOS".to_string(), "KORD".to_string()]);
        let mut tracker = Tracker::new(&cfg, &provider, None);

        let summary = tracker.issue_pass(&mut conn, date("2025-03-01"));
        assert!(summary.all_fetches_failed());
        assert!(store::list_forecasts(&mut conn).unwrap().is_empty());
        assert!(!IssueSummary::default().all_fetches_failed());
    }

    #[test]
    fn repeated_issue_pass_is_idempotent() {
        let mut conn = in_memory();
        let cfg = settings(&["KMIA"], &[1, 3]);
        let provider = Scripted::new();
        let mut tracker = Tracker::new(&cfg, &provider, None);

        tracker.issue_pass(&mut conn, date("2025-07-01"));
        let again = tracker.issue_pass(&mut conn, date("2025-07-01"));
        assert_eq!(again.fetched, 2);
        assert_eq!(again.stored, 0);
        assert_eq!(again.duplicates, 2);
        assert!(!again.all_fetches_failed());
        assert_eq!(store::list_forecasts(&mut conn).unwrap().len(), 2);
    }

    #[test]
    fn secondary_payload_is_attached_and_grid_resolved_once() {
        let mut conn = in_memory();
        let cfg = settings(&["KPDX"], &[1, 3, 7]);
        let provider = Scripted::new();
        let mut tracker = Tracker::new(&cfg, &provider, Some(&provider));

        let summary = tracker.issue_pass(&mut conn, date("2025-02-10"));
        tracker.issue_pass(&mut conn, date("2025-02-11"));
        assert_eq!(summary.secondary_attached, 3);
        assert_eq!(provider.grid_calls.get(), 1);

        let stored = store::list_forecasts(&mut conn).unwrap();
        assert!(stored.iter().all(|r| r.secondary.as_ref().is_some_and(|v| v[0]["source"] == "test://KPDX")));
    }

    #[test]
    fn score_pass_runs_twice_without_duplicates() {
        let mut conn = in_memory();
        let cfg = settings(&["KBOS", "KORD"], &[1, 3]);
        let provider = Scripted::new();
        let mut tracker = Tracker::new(&cfg, &provider, None);

        tracker.issue_pass(&mut conn, date("2025-04-01"));
        tracker.issue_pass(&mut conn, date("2025-04-03"));

        let first = tracker.score_pass(&mut conn, date("2025-04-04"));
        // due on 04-04: lead 3 from 04-01 and lead 1 from 04-03, for both locations
        assert_eq!(first.due, 4);
        assert_eq!(first.scored.len(), 4);

        for _ in 0..3 {
            let again = tracker.score_pass(&mut conn, date("2025-04-04"));
            assert_eq!(again.due, 4);
            assert!(again.scored.is_empty());
            assert_eq!(again.already_scored, 4);
        }
        assert_eq!(provider.actual_calls.get(), 4);

        let scores = store::list_scores(&mut conn).unwrap();
        assert_eq!(scores.len(), 4);
        let keys: BTreeSet<_> = scores.iter().map(|s| s.key()).collect();
        assert_eq!(keys.len(), 4);
        assert!(scores.iter().all(|s| s.scored_on == date("2025-04-04")));
    }

    #[test]
    fn missing_observation_leaves_record_for_a_later_run() {
        let mut conn = in_memory();
        let cfg = settings(&["KPHX"], &[1]);
        let provider = Scripted::new();
        let mut tracker = Tracker::new(&cfg, &provider, None);
        tracker.issue_pass(&mut conn, date("2025-08-01"));

        provider.down_actual.borrow_mut().insert("KPHX".into());
        let failed = tracker.score_pass(&mut conn, date("2025-08-02"));
        assert_eq!(failed.fetch_failures, 1);
        assert!(store::list_scores(&mut conn).unwrap().is_empty());

        provider.down_actual.borrow_mut().clear();
        let recovered = tracker.score_pass(&mut conn, date("2025-08-02"));
        assert_eq!(recovered.scored.len(), 1);
        tracker.score_pass(&mut conn, date("2025-08-02"));
        assert_eq!(store::list_scores(&mut conn).unwrap().len(), 1);
    }

    #[test]
    fn observation_failure_is_retried_on_later_days_by_default() {
        let mut conn = in_memory();
        let cfg = Config::from_lookup(|_| None).unwrap().tracker_settings().unwrap();
        let provider = Scripted::new();
        let mut tracker = Tracker::new(&cfg, &provider, None);
        let codes: Vec<String> = cfg.locations.iter().map(|l| l.code.clone()).collect();
        tracker.issue_pass(&mut conn, date("2025-08-01"));

        // observations for the due date are not published yet
        provider.down_actual.borrow_mut().extend(codes.iter().cloned());
        let day1 = tracker.score_pass(&mut conn, date("2025-08-02"));
        assert_eq!(day1.due, codes.len());
        assert_eq!(day1.fetch_failures, codes.len());

        provider.down_actual.borrow_mut().clear();
        let day2 = tracker.score_pass(&mut conn, date("2025-08-03"));
        assert_eq!(day2.scored.len(), codes.len());
        assert!(day2.scored.iter().all(|s| s.target_date == date("2025-08-02") && s.lead_days == 1));

        // the lead 3 forecasts come due; the retried ones stay scored once
        let day3 = tracker.score_pass(&mut conn, date("2025-08-04"));
        assert_eq!(day3.already_scored, codes.len());
        assert_eq!(day3.scored.len(), codes.len());
        assert_eq!(store::list_scores(&mut conn).unwrap().len(), 2 * codes.len());
    }

    #[test]
    fn lookback_picks_up_records_missed_on_their_due_date() {
        let mut conn = in_memory();
        let mut cfg = settings(&["KOMA"], &[1]);
        let provider = Scripted::new();
        Tracker::new(&cfg, &provider, None).issue_pass(&mut conn, date("2025-08-01"));

        // due 08-02 but the job only runs again on 08-04
        let strict = Tracker::new(&cfg, &provider, None).score_pass(&mut conn, date("2025-08-04"));
        assert_eq!(strict.due, 0);

        cfg.score_lookback_days = 3;
        let relaxed = Tracker::new(&cfg, &provider, None).score_pass(&mut conn, date("2025-08-04"));
        assert_eq!(relaxed.due, 1);
        assert_eq!(relaxed.scored.len(), 1);
        assert_eq!(relaxed.scored[0].target_date, date("2025-08-02"));
        assert_eq!(relaxed.scored[0].scored_on, date("2025-08-04"));
    }

    #[test]
    fn unknown_location_is_skipped_not_fatal() {
        let mut conn = in_memory();
        let provider = Scripted::new();
        let old = settings(&["KBIS", "KLAX"], &[1]);
        Tracker::new(&old, &provider, None).issue_pass(&mut conn, date("2025-05-05"));

        // KBIS dropped from the configuration since the forecast was issued
        let current = settings(&["KLAX"], &[1]);
        let summary = Tracker::new(&current, &provider, None).score_pass(&mut conn, date("2025-05-06"));
        assert_eq!(summary.due, 2);
        assert_eq!(summary.unknown_location, 1);
        assert_eq!(summary.scored.len(), 1);
        assert_eq!(summary.scored[0].location, "KLAX");
    }

    #[test]
    fn duplicate_key_keeps_first_forecast_for_scoring() {
        let mut conn = in_memory();
        let cfg = settings(&["KDFW"], &[3]);
        let provider = Scripted::new();

        let first = ForecastRecord::issue("KDFW", 3, date("2025-10-01"), Reading::new(80.0, 60.0, 0.0, Some(0)), None).unwrap();
        let mut second = first.clone();
        second.issued_on = date("2025-09-30");
        second.forecast = Reading::new(50.0, 30.0, 1.0, Some(95));
        store::save_forecast(&mut conn, &first).unwrap();
        assert!(matches!(store::save_forecast(&mut conn, &second), Err(StoreError::DuplicateKey(_))));

        let summary = Tracker::new(&cfg, &provider, None).score_pass(&mut conn, first.target_date);
        assert_eq!(summary.scored.len(), 1);
        assert_eq!(summary.scored[0].issued_on, date("2025-10-01"));
        assert_eq!(summary.scored[0].forecast, first.forecast);
    }
}
