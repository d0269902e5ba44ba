mod country;
mod source;

pub use country::CountryCode;
pub use source::{GeoNamesSource, GeoPoint, PostalCodeSource};

use std::num::NonZeroUsize;
use std::sync::Mutex;

use futures::future::join_all;
use lru::LruCache;

use source::normalize_code;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance between two postal codes, or the reserved "unknown" value when
/// coordinates could not be resolved for at least one side. Unknown is
/// distinct from every real distance, including zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedDistance {
    Kilometers(f64),
    Unknown,
}

impl ResolvedDistance {
    pub fn kilometers(self) -> Option<f64> {
        match self {
            ResolvedDistance::Kilometers(value) => Some(value),
            ResolvedDistance::Unknown => None,
        }
    }

    pub fn is_unknown(self) -> bool {
        matches!(self, ResolvedDistance::Unknown)
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedCode {
    country: CountryCode,
    point: GeoPoint,
}

/// Resolves postal codes to coordinates and computes pairwise distances.
///
/// Per-code resolution is a pure function of the raw code string and is
/// cached as such; same-country pair lookups against a native table are
/// cached under an order-normalized key. Both caches are bounded LRUs owned
/// by the instance, so tests construct isolated resolvers.
pub struct GeoResolver<S> {
    source: S,
    codes: Mutex<LruCache<String, Option<ResolvedCode>>>,
    pairs: Mutex<LruCache<(String, String), Option<f64>>>,
}

impl<S: PostalCodeSource> GeoResolver<S> {
    pub fn new(source: S, cache_size: NonZeroUsize) -> Self {
        Self {
            source,
            codes: Mutex::new(LruCache::new(cache_size)),
            pairs: Mutex::new(LruCache::new(cache_size)),
        }
    }

    /// Resolution order: literal equality, per-code country+coordinate
    /// detection, same-country native table, great-circle fallback,
    /// `Unknown` when either side stays unresolved.
    pub async fn distance(&self, code_a: &str, code_b: &str) -> ResolvedDistance {
        let code_a = code_a.trim();
        let code_b = code_b.trim();
        if !code_a.is_empty() && code_a == code_b {
            return ResolvedDistance::Kilometers(0.0);
        }

        let (Some(resolved_a), Some(resolved_b)) =
            (self.resolve_code(code_a), self.resolve_code(code_b))
        else {
            return ResolvedDistance::Unknown;
        };

        if resolved_a.country == resolved_b.country {
            if let Some(native) = self.native_pair_distance(resolved_a.country, code_a, code_b) {
                return ResolvedDistance::Kilometers(native);
            }
        }

        ResolvedDistance::Kilometers(haversine_km(resolved_a.point, resolved_b.point))
    }

    /// Minimum distance from `origin` to any of `sites`. Unresolved sites are
    /// dropped from the minimum; the result is `Unknown` only when no site
    /// resolves at all (or none were given).
    pub async fn closest_distance(&self, origin: &str, sites: &[String]) -> ResolvedDistance {
        if sites.is_empty() {
            return ResolvedDistance::Unknown;
        }

        let lookups = sites.iter().map(|site| self.distance(origin, site));
        let resolved = join_all(lookups).await;

        resolved
            .into_iter()
            .filter_map(ResolvedDistance::kilometers)
            .fold(None, |closest: Option<f64>, distance| {
                Some(closest.map_or(distance, |current| current.min(distance)))
            })
            .map_or(ResolvedDistance::Unknown, ResolvedDistance::Kilometers)
    }

    /// Country and coordinates for one raw code string.
    ///
    /// Detection order: explicit country prefix, shape-based candidate list,
    /// full fixed-order scan; the first country whose table yields
    /// coordinates wins. Negative results are cached too.
    fn resolve_code(&self, raw: &str) -> Option<ResolvedCode> {
        if raw.is_empty() {
            return None;
        }

        if let Some(cached) = self
            .codes
            .lock()
            .expect("geo code cache poisoned")
            .get(raw)
        {
            return *cached;
        }

        let resolved = self.resolve_code_uncached(raw);
        self.codes
            .lock()
            .expect("geo code cache poisoned")
            .put(raw.to_string(), resolved);
        resolved
    }

    fn resolve_code_uncached(&self, raw: &str) -> Option<ResolvedCode> {
        let (hint, bare) = match country::split_country_prefix(raw) {
            Some((country, rest)) => (Some(country), rest),
            None => (None, raw),
        };
        let normalized = normalize_code(bare);
        if normalized.is_empty() {
            return None;
        }

        if let Some(country) = hint {
            if let Some(point) = self.source.coordinates(country, &normalized) {
                return Some(ResolvedCode { country, point });
            }
        }

        country::candidate_countries(&normalized)
            .iter()
            .filter(|country| hint != Some(**country))
            .find_map(|&country| {
                self.source
                    .coordinates(country, &normalized)
                    .map(|point| ResolvedCode { country, point })
            })
    }

    fn native_pair_distance(&self, country: CountryCode, code_a: &str, code_b: &str) -> Option<f64> {
        let mut key = (normalize_code(code_a), normalize_code(code_b));
        if key.0 > key.1 {
            key = (key.1, key.0);
        }

        if let Some(cached) = self
            .pairs
            .lock()
            .expect("geo pair cache poisoned")
            .get(&key)
        {
            return *cached;
        }

        let native = self.source.pair_distance(country, &key.0, &key.1);
        self.pairs
            .lock()
            .expect("geo pair cache poisoned")
            .put(key, native);
        native
    }
}

/// Great-circle distance between two coordinate pairs.
fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TableSource {
        points: HashMap<(CountryCode, String), GeoPoint>,
        pairs: HashMap<(CountryCode, String, String), f64>,
        lookups: AtomicUsize,
    }

    impl TableSource {
        fn with_point(mut self, country: CountryCode, code: &str, lat: f64, lon: f64) -> Self {
            self.points.insert(
                (country, code.to_string()),
                GeoPoint {
                    latitude: lat,
                    longitude: lon,
                },
            );
            self
        }

        fn with_pair(mut self, country: CountryCode, a: &str, b: &str, distance: f64) -> Self {
            self.pairs
                .insert((country, a.to_string(), b.to_string()), distance);
            self
        }
    }

    impl PostalCodeSource for TableSource {
        fn coordinates(&self, country: CountryCode, code: &str) -> Option<GeoPoint> {
            self.lookups.fetch_add(1, Ordering::Relaxed);
            self.points.get(&(country, code.to_string())).copied()
        }

        fn pair_distance(&self, country: CountryCode, a: &str, b: &str) -> Option<f64> {
            self.pairs
                .get(&(country, a.to_string(), b.to_string()))
                .copied()
        }
    }

    fn resolver(source: TableSource) -> GeoResolver<TableSource> {
        GeoResolver::new(source, NonZeroUsize::new(64).expect("non-zero"))
    }

    #[tokio::test]
    async fn identical_codes_are_zero_distance_without_resolution() {
        let resolver = resolver(TableSource::default());
        assert_eq!(
            resolver.distance("99999", "99999").await,
            ResolvedDistance::Kilometers(0.0)
        );
    }

    #[tokio::test]
    async fn unknown_when_either_side_fails_to_resolve() {
        let source = TableSource::default().with_point(CountryCode::Us, "10001", 40.75, -73.99);
        let resolver = resolver(source);
        assert!(resolver.distance("10001", "99999").await.is_unknown());
        assert!(resolver.distance("99999", "10001").await.is_unknown());
    }

    #[tokio::test]
    async fn cross_country_pairs_use_great_circle_distance() {
        let source = TableSource::default()
            .with_point(CountryCode::Us, "10001", 40.7506, -73.9972)
            .with_point(CountryCode::Ca, "K1A0B1", 45.4208, -75.7001);
        let resolver = resolver(source);

        let distance = resolver
            .distance("10001", "K1A 0B1")
            .await
            .kilometers()
            .expect("both codes resolve");
        // New York to Ottawa is roughly 540 km.
        assert!((500.0..600.0).contains(&distance), "got {distance}");
    }

    #[tokio::test]
    async fn same_country_prefers_native_pair_table() {
        let source = TableSource::default()
            .with_point(CountryCode::Us, "10001", 40.7506, -73.9972)
            .with_point(CountryCode::Us, "90210", 34.0901, -118.4065)
            .with_pair(CountryCode::Us, "10001", "90210", 3941.5);
        let resolver = resolver(source);

        assert_eq!(
            resolver.distance("10001", "90210").await,
            ResolvedDistance::Kilometers(3941.5)
        );
    }

    #[tokio::test]
    async fn explicit_prefix_overrides_shape_heuristics() {
        // 80331 would scan Us first by shape; the prefix pins Germany.
        let source = TableSource::default()
            .with_point(CountryCode::De, "80331", 48.1351, 11.5820)
            .with_point(CountryCode::Us, "80331", 39.0, -105.0);
        let resolver = resolver(source);

        let munich = resolver.distance("DE:80331", "DE:80331").await;
        assert_eq!(munich, ResolvedDistance::Kilometers(0.0));

        let cross = resolver
            .distance("DE:80331", "US:80331")
            .await
            .kilometers()
            .expect("both resolve");
        assert!(cross > 1_000.0);
    }

    #[tokio::test]
    async fn closest_distance_ignores_unresolved_sites() {
        let source = TableSource::default()
            .with_point(CountryCode::Us, "10001", 40.7506, -73.9972)
            .with_point(CountryCode::Us, "07030", 40.7440, -74.0324);
        let resolver = resolver(source);

        let sites = vec!["99999".to_string(), "07030".to_string()];
        let distance = resolver
            .closest_distance("10001", &sites)
            .await
            .kilometers()
            .expect("one site resolves");
        assert!(distance < 10.0, "got {distance}");

        let unresolved = vec!["99999".to_string(), "88888".to_string()];
        assert!(resolver
            .closest_distance("10001", &unresolved)
            .await
            .is_unknown());

        assert!(resolver.closest_distance("10001", &[]).await.is_unknown());
    }

    #[tokio::test]
    async fn per_code_resolution_is_cached() {
        let source = TableSource::default()
            .with_point(CountryCode::Us, "10001", 40.7506, -73.9972)
            .with_point(CountryCode::Us, "07030", 40.7440, -74.0324);
        let resolver = resolver(source);

        resolver.distance("10001", "07030").await;
        let after_first = resolver.source.lookups.load(Ordering::Relaxed);
        resolver.distance("10001", "07030").await;
        let after_second = resolver.source.lookups.load(Ordering::Relaxed);
        assert_eq!(after_first, after_second);
    }
}
