//! Year extraction from dataset file names.
//!
//! Input files are named after the year they cover, e.g.
//! `archive/flood_data_2022.geojson`. The year becomes the sublayer key.

use regex::Regex;
use std::sync::OnceLock;

fn year_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    // ASCII digits only: `\d` would also match other Unicode digit classes.
    PATTERN.get_or_init(|| Regex::new(r"[0-9]{4}").expect("Valid regex"))
}

/// Returns the base name of a storage key or path.
pub fn base_name(path: &str) -> &str {
    path.rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or(path)
}

/// Extracts the first run of four decimal digits from the base name of `path`.
///
/// Directory components are ignored, so `2021/flood.geojson` has no year.
/// Returns `None` when the name carries no such run; callers must skip the file.
///
/// # Example
/// ```
/// use flood_sync::ingest::extract_year;
/// assert_eq!(extract_year("raw/flood_data_2022.geojson"), Some("2022"));
/// assert_eq!(extract_year("raw/flood_data.geojson"), None);
/// ```
pub fn extract_year(path: &str) -> Option<&str> {
    let name = base_name(path);
    year_pattern().find(name).map(|m| m.as_str())
}
