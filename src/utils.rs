use chrono::NaiveDate;

/// Differences smaller than this are floating-point noise, not weather.
pub const FLOAT_EPSILON: f64 = 1e-9;

/// `lhs <= rhs`, treating representation noise as equality (75.1 - 72.1 is 3.0).
pub fn approx_le(lhs: f64, rhs: f64) -> bool {
    lhs <= rhs + FLOAT_EPSILON
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Parse a `YYYY-MM-DD` date, naming the offending setting on failure.
pub fn parse_date(raw: &str, what: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| format!("{} must be in YYYY-MM-DD format", what))
}
