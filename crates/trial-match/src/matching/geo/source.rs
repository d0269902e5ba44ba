use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{debug, warn};

use super::country::CountryCode;

/// Resolved coordinates for a postal code.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Reference-table seam for postal-code geodata.
///
/// `pair_distance` lets a country ship a native pairwise table for extra
/// precision; the default says "no such table" and callers fall back to
/// great-circle distance between the two resolved coordinates.
pub trait PostalCodeSource: Send + Sync {
    /// Coordinates for a normalized (uppercased, space-free) postal code.
    fn coordinates(&self, country: CountryCode, code: &str) -> Option<GeoPoint>;

    fn pair_distance(&self, _country: CountryCode, _a: &str, _b: &str) -> Option<f64> {
        None
    }
}

/// Loads GeoNames-format postal code dumps (`<dir>/<CC>.txt`, tab-separated)
/// lazily, one table per country, keeping failed loads as negative entries so
/// a missing file is probed once per process, not once per lookup.
pub struct GeoNamesSource {
    data_dir: PathBuf,
    tables: Mutex<HashMap<CountryCode, Option<Arc<HashMap<String, GeoPoint>>>>>,
}

impl GeoNamesSource {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            tables: Mutex::new(HashMap::new()),
        }
    }

    fn table(&self, country: CountryCode) -> Option<Arc<HashMap<String, GeoPoint>>> {
        let mut guard = self.tables.lock().expect("geo table lock poisoned");
        guard
            .entry(country)
            .or_insert_with(|| self.load_table(country).map(Arc::new))
            .clone()
    }

    fn load_table(&self, country: CountryCode) -> Option<HashMap<String, GeoPoint>> {
        let path = self.data_dir.join(format!("{}.txt", country.alpha2()));
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(error) => {
                warn!(
                    country = country.alpha2(),
                    path = %path.display(),
                    %error,
                    "postal code table unavailable"
                );
                return None;
            }
        };

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(file);

        let mut table = HashMap::new();
        for row in reader.records() {
            let record = match row {
                Ok(record) => record,
                Err(error) => {
                    warn!(country = country.alpha2(), %error, "skipping malformed geodata row");
                    continue;
                }
            };
            let (Some(code), Some(lat), Some(lon)) =
                (record.get(1), record.get(9), record.get(10))
            else {
                continue;
            };
            let (Ok(latitude), Ok(longitude)) =
                (lat.trim().parse::<f64>(), lon.trim().parse::<f64>())
            else {
                continue;
            };
            table.insert(
                normalize_code(code),
                GeoPoint {
                    latitude,
                    longitude,
                },
            );
        }

        debug!(
            country = country.alpha2(),
            entries = table.len(),
            "postal code table loaded"
        );
        Some(table)
    }
}

impl PostalCodeSource for GeoNamesSource {
    fn coordinates(&self, country: CountryCode, code: &str) -> Option<GeoPoint> {
        self.table(country)?.get(code).copied()
    }
}

/// Uppercase and strip spaces, the key form used by every table.
pub(crate) fn normalize_code(code: &str) -> String {
    code.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect()
}
