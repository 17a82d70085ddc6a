//! Tracked locations.
//!
//! The built-in table lists the ten airport stations tracked by default.
//! A JSON file (`LOCATIONS_FILE`) may replace it; either way the result is
//! an immutable `LocationTable` handed to the tracker at startup.

use std::collections::BTreeMap;
use std::path::Path;

use crate::models::forecast::Location;

struct BuiltinLocation {
    code: &'static str,
    lat: f64,
    lon: f64,
    name: &'static str,
}

static DEFAULT_LOCATIONS: &[BuiltinLocation] = &[
    BuiltinLocation { code: "KBIS", lat: 46.7727, lon: -100.7467, name: "Bismarck" },
    BuiltinLocation { code: "KBOS", lat: 42.3656, lon: -71.0096, name: "Boston Logan" },
    BuiltinLocation { code: "KDEN", lat: 39.8561, lon: -104.6737, name: "Denver Intl" },
    BuiltinLocation { code: "KDFW", lat: 32.8998, lon: -97.0403, name: "Dallas/Fort Worth" },
    BuiltinLocation { code: "KLAX", lat: 33.9416, lon: -118.4085, name: "Los Angeles Intl" },
    BuiltinLocation { code: "KMIA", lat: 25.7959, lon: -80.2870, name: "Miami Intl" },
    BuiltinLocation { code: "KOMA", lat: 41.3032, lon: -95.8941, name: "Omaha Eppley" },
    BuiltinLocation { code: "KORD", lat: 41.9742, lon: -87.9073, name: "Chicago O'Hare" },
    BuiltinLocation { code: "KPDX", lat: 45.5898, lon: -122.5951, name: "Portland Intl" },
    BuiltinLocation { code: "KPHX", lat: 33.4342, lon: -112.0080, name: "Phoenix Sky Harbor" },
];

/// Immutable set of locations keyed (and iterated) by code.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationTable {
    by_code: BTreeMap<String, Location>,
}

impl LocationTable {
    pub fn builtin() -> Self {
        let locations = DEFAULT_LOCATIONS.iter().map(|b| Location {
            code: b.code.to_string(),
            lat: b.lat,
            lon: b.lon,
            display_name: b.name.to_string(),
        });
        // codes in the static table are unique
        Self::from_locations(locations).unwrap_or_else(|_| LocationTable { by_code: BTreeMap::new() })
    }

    /// Build a table, rejecting empty input, duplicate codes and bad coordinates.
    pub fn from_locations(locations: impl IntoIterator<Item = Location>) -> Result<Self, String> {
        let mut by_code = BTreeMap::new();
        for loc in locations {
            let code = loc.code.trim();
            if code.is_empty() {
                return Err("location code cannot be empty".to_string());
            }
            if !(-90.0..=90.0).contains(&loc.lat) || !(-180.0..=180.0).contains(&loc.lon) {
                return Err(format!("location {} has out-of-range coordinates {},{}", code, loc.lat, loc.lon));
            }
            let code = code.to_string();
            if by_code.contains_key(&code) {
                return Err(format!("duplicate location code: {}", code));
            }
            by_code.insert(code.clone(), Location { code, ..loc });
        }
        if by_code.is_empty() {
            return Err("location table is empty".to_string());
        }
        Ok(LocationTable { by_code })
    }

    /// Load a JSON array of `{code, lat, lon, name|display_name}` objects.
    pub fn from_json_file(path: &Path) -> Result<Self, String> {
        let body = std::fs::read_to_string(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
        let de = &mut serde_json::Deserializer::from_str(&body);
        let locations: Vec<Location> = serde_path_to_error::deserialize(de)
            .map_err(|e| format!("invalid locations file {}: {}", path.display(), e))?;
        Self::from_locations(locations)
    }

    pub fn get(&self, code: &str) -> Option<&Location> {
        self.by_code.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Location> {
        self.by_code.values()
    }

    pub fn len(&self) -> usize {
        self.by_code.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_code.is_empty()
    }
}
