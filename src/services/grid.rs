//! NWS grid resolution with a write-once persistent cache.
//!
//! Lookup order: in-process map, then the `grid_cache` table, then the
//! provider. A freshly resolved grid is persisted before it is returned.
//! Entries never expire; station coordinates do not move.

use chrono::NaiveDate;
use diesel::prelude::*;
use log::{debug, info, warn};
use std::collections::BTreeMap;

use crate::client::GridProvider;
use crate::db::connection::DbConn;
use crate::db::models::GridCacheRow;
use crate::models::forecast::{GridPoint, Location};
use crate::schema;
use crate::services::store::StoreError;

#[derive(Debug, Default)]
pub struct GridResolver {
    memo: BTreeMap<String, GridPoint>,
}

impl GridResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` means the secondary provider is unavailable for this location.
    pub fn resolve(
        &mut self,
        conn: &mut DbConn,
        provider: &dyn GridProvider,
        location: &Location,
        today: NaiveDate,
    ) -> Option<GridPoint> {
        if let Some(grid) = self.memo.get(&location.code) {
            return Some(grid.clone());
        }

        match load_cached(conn, &location.code) {
            Ok(Some(grid)) => {
                debug!("Grid: {} cache hit ({})", location.code, grid);
                self.memo.insert(location.code.clone(), grid.clone());
                return Some(grid);
            }
            Ok(None) => {}
            Err(e) => warn!("Grid: {} cache read failed: {}", location.code, e),
        }

        let grid = match provider.resolve_grid(location) {
            Ok(g) => g,
            Err(e) => {
                warn!("Grid: {} resolution failed, continuing without secondary data: {}", location.code, e);
                return None;
            }
        };

        match store_cached(conn, &location.code, &grid, today) {
            Ok(()) => info!("Grid: cached {} -> {}", location.code, grid),
            Err(e) => warn!("Grid: {} resolved to {} but caching failed: {}", location.code, grid, e),
        }
        self.memo.insert(location.code.clone(), grid.clone());
        Some(grid)
    }
}

pub fn load_cached(conn: &mut DbConn, code: &str) -> Result<Option<GridPoint>, StoreError> {
    use schema::grid_cache::dsl as G;

    let row = G::grid_cache
        .filter(G::location.eq(code))
        .select(GridCacheRow::as_select())
        .first(conn)
        .optional()?;
    Ok(row.map(GridPoint::from))
}

/// Write-once: an existing entry for `code` is left untouched.
pub fn store_cached(conn: &mut DbConn, code: &str, grid: &GridPoint, resolved_on: NaiveDate) -> Result<(), StoreError> {
    use schema::grid_cache::dsl as G;

    diesel::insert_into(G::grid_cache)
        .values(&GridCacheRow::new(code, grid, resolved_on))
        .on_conflict(G::location)
        .do_nothing()
        .execute(conn)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ProviderError;
    use crate::db::connection::in_memory;
    use std::cell::{Cell, RefCell};

    struct CountingGrids {
        calls: Cell<usize>,
        fail: bool,
        log: RefCell<Vec<String>>,
    }

    impl CountingGrids {
        fn new(fail: bool) -> Self {
            CountingGrids {
                calls: Cell::new(0),
                fail,
                log: RefCell::new(Vec::new()),
            }
        }
    }

    impl GridProvider for CountingGrids {
        fn resolve_grid(&self, location: &Location) -> Result<GridPoint, ProviderError> {
            self.calls.set(self.calls.get() + 1);
            self.log.borrow_mut().push(location.code.clone());
            if self.fail {
                return Err(ProviderError::Http {
                    status: 500,
                    message: "Internal Server Error".into(),
                });
            }
            Ok(GridPoint {
                grid_id: "LOT".into(),
                grid_x: 65,
                grid_y: 76,
                forecast_url: format!("https://api.weather.gov/gridpoints/LOT/65,76/forecast?{}", location.code),
            })
        }

        fn fetch_grid_forecast(&self, _grid: &GridPoint) -> Result<serde_json::Value, ProviderError> {
            Ok(serde_json::Value::Array(Vec::new()))
        }
    }

    fn ord() -> Location {
        Location {
            code: "KORD".into(),
            lat: 41.9742,
            lon: -87.9073,
            display_name: "Chicago O'Hare".into(),
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()
    }

    #[test]
    fn miss_persists_then_hits_without_provider() {
        let mut conn = in_memory();
        let provider = CountingGrids::new(false);
        let mut resolver = GridResolver::new();

        let first = resolver.resolve(&mut conn, &provider, &ord(), today()).unwrap();
        assert_eq!(provider.calls.get(), 1);
        assert_eq!(load_cached(&mut conn, "KORD").unwrap(), Some(first.clone()));

        let second = resolver.resolve(&mut conn, &provider, &ord(), today()).unwrap();
        assert_eq!(second, first);
        assert_eq!(provider.calls.get(), 1);
    }

    #[test]
    fn fresh_resolver_reuses_persisted_entry() {
        let mut conn = in_memory();
        let provider = CountingGrids::new(false);
        GridResolver::new().resolve(&mut conn, &provider, &ord(), today()).unwrap();

        // a new process has no in-memory state, only the table
        let failing = CountingGrids::new(true);
        let grid = GridResolver::new().resolve(&mut conn, &failing, &ord(), today());
        assert!(grid.is_some());
        assert_eq!(failing.calls.get(), 0);
    }

    #[test]
    fn provider_failure_yields_none_and_caches_nothing() {
        let mut conn = in_memory();
        let failing = CountingGrids::new(true);
        let mut resolver = GridResolver::new();

        assert!(resolver.resolve(&mut conn, &failing, &ord(), today()).is_none());
        assert_eq!(load_cached(&mut conn, "KORD").unwrap(), None);

        // retried on the next call rather than remembered as absent
        assert!(resolver.resolve(&mut conn, &failing, &ord(), today()).is_none());
        assert_eq!(failing.calls.get(), 2);
        assert_eq!(*failing.log.borrow(), vec!["KORD".to_string(), "KORD".to_string()]);
    }

    #[test]
    fn cache_entries_are_write_once() {
        let mut conn = in_memory();
        let original = GridPoint {
            grid_id: "BOX".into(),
            grid_x: 71,
            grid_y: 90,
            forecast_url: "https://api.weather.gov/gridpoints/BOX/71,90/forecast".into(),
        };
        store_cached(&mut conn, "KBOS", &original, today()).unwrap();
        let replacement = GridPoint {
            grid_x: 1,
            ..original.clone()
        };
        store_cached(&mut conn, "KBOS", &replacement, today()).unwrap();
        assert_eq!(load_cached(&mut conn, "KBOS").unwrap(), Some(original));
    }
}
