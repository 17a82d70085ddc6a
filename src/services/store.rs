//! Forecast and score persistence.
//!
//! Both tables are keyed by (location, lead_days, target_date). Forecasts are
//! reject-on-duplicate; scores are skip-if-exists, with the existence check
//! and the insert in one immediate transaction.

use chrono::NaiveDate;
use core::fmt;
use diesel::dsl::exists;
use diesel::prelude::*;
use std::error::Error;

use crate::db::connection::DbConn;
use crate::db::models::{ForecastRow, ScoreRow, lead_days_to_db};
use crate::models::forecast::{ForecastKey, ForecastRecord, ScoreRecord};
use crate::schema;

#[derive(Debug)]
pub enum StoreError {
    /// A record with the same identity key is already stored.
    DuplicateKey(ForecastKey),
    Database(diesel::result::Error),
    /// A row could not be converted to or from its domain record.
    Invalid(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::DuplicateKey(key) => write!(f, "duplicate key {}", key),
            StoreError::Database(e) => write!(f, "database error: {}", e),
            StoreError::Invalid(s) => write!(f, "invalid record: {}", s),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StoreError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<diesel::result::Error> for StoreError {
    fn from(value: diesel::result::Error) -> Self {
        StoreError::Database(value)
    }
}

pub fn save_forecast(conn: &mut DbConn, record: &ForecastRecord) -> Result<(), StoreError> {
    use schema::forecasts::dsl as F;

    let row = ForecastRow::try_from(record).map_err(StoreError::Invalid)?;
    let inserted = diesel::insert_into(F::forecasts)
        .values(&row)
        .on_conflict((F::location, F::lead_days, F::target_date))
        .do_nothing()
        .execute(conn)?;

    if inserted == 0 {
        Err(StoreError::DuplicateKey(record.key()))
    } else {
        Ok(())
    }
}

/// Forecasts whose target date is `as_of`, ordered by location then lead time.
pub fn list_due(conn: &mut DbConn, as_of: NaiveDate) -> Result<Vec<ForecastRecord>, StoreError> {
    use schema::forecasts::dsl as F;

    let rows = F::forecasts
        .filter(F::target_date.eq(as_of))
        .order((F::location.asc(), F::lead_days.asc()))
        .select(ForecastRow::as_select())
        .load(conn)?;
    rows_into(rows)
}

/// Every stored forecast, ordered by target date, location and lead time.
pub fn list_forecasts(conn: &mut DbConn) -> Result<Vec<ForecastRecord>, StoreError> {
    use schema::forecasts::dsl as F;

    let rows = F::forecasts
        .order((F::target_date.asc(), F::location.asc(), F::lead_days.asc()))
        .select(ForecastRow::as_select())
        .load(conn)?;
    rows_into(rows)
}

pub fn score_exists(conn: &mut DbConn, key: &ForecastKey) -> Result<bool, StoreError> {
    use schema::scores::dsl as S;

    let lead = lead_days_to_db(key.lead_days).map_err(StoreError::Invalid)?;
    let found = diesel::select(exists(
        S::scores
            .filter(S::location.eq(&key.location))
            .filter(S::lead_days.eq(lead))
            .filter(S::target_date.eq(key.target_date)),
    ))
    .get_result::<bool>(conn)?;
    Ok(found)
}

/// Append a score unless its key is already scored. Returns whether a row was written.
pub fn append_score(conn: &mut DbConn, score: &ScoreRecord) -> Result<bool, StoreError> {
    use schema::scores::dsl as S;

    let row = ScoreRow::try_from(score).map_err(StoreError::Invalid)?;
    let key = score.key();
    conn.immediate_transaction::<_, StoreError, _>(|conn| {
        if score_exists(conn, &key)? {
            return Ok(false);
        }
        let inserted = diesel::insert_into(S::scores)
            .values(&row)
            .on_conflict((S::location, S::lead_days, S::target_date))
            .do_nothing()
            .execute(conn)?;
        Ok(inserted == 1)
    })
}

/// Every stored score, ordered by target date, location and lead time.
pub fn list_scores(conn: &mut DbConn) -> Result<Vec<ScoreRecord>, StoreError> {
    use schema::scores::dsl as S;

    let rows = S::scores
        .order((S::target_date.asc(), S::location.asc(), S::lead_days.asc()))
        .select(ScoreRow::as_select())
        .load(conn)?;
    rows_into(rows)
}

fn rows_into<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = String>,
{
    rows.into_iter()
        .map(|r| T::try_from(r).map_err(StoreError::Invalid))
        .collect()
}
