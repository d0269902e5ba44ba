use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::PathBuf;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub datasets: DatasetConfig,
    pub matching: MatchingConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            datasets: DatasetConfig::from_env(),
            matching: MatchingConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Locations of the read-only reference datasets.
#[derive(Debug, Clone)]
pub struct DatasetConfig {
    /// Scored patient population table, one row per patient.
    pub patients_path: PathBuf,
    /// Activity history table, many rows per patient.
    pub activities_path: PathBuf,
    /// Directory holding per-country GeoNames postal-code dumps (`US.txt`, ...).
    pub geo_data_dir: PathBuf,
}

impl DatasetConfig {
    fn from_env() -> Self {
        Self {
            patients_path: env::var("APP_PATIENTS_DATASET")
                .unwrap_or_else(|_| "data/patient_scores.csv".to_string())
                .into(),
            activities_path: env::var("APP_ACTIVITIES_DATASET")
                .unwrap_or_else(|_| "data/patient_activity.csv".to_string())
                .into(),
            geo_data_dir: env::var("APP_GEO_DATA_DIR")
                .unwrap_or_else(|_| "data/geonames".to_string())
                .into(),
        }
    }
}

/// Tunables for the matching pipeline.
///
/// `promotion_ceiling` and `promotion_factor` bound how many filtered
/// candidates are promoted to full scoring per request. The cap is a latency
/// heuristic, not a proven bound: a candidate just outside the promoted window
/// could in principle outscore one inside it once distance bonuses apply.
/// Exact top-K would require scoring the entire candidate set.
#[derive(Debug, Clone)]
pub struct MatchingConfig {
    /// Similarity ratio (0-100) a canonical value must reach on the primary pass.
    pub fuzzy_exact_threshold: f64,
    /// Looser threshold for the partial/token-sort fallback pass.
    pub fuzzy_fallback_threshold: f64,
    /// Maximum in-flight per-patient scoring tasks.
    pub scoring_concurrency: usize,
    /// Hard upper bound on candidates promoted to full scoring.
    pub promotion_ceiling: usize,
    /// Multiplier applied to the requested result limit when one is given.
    pub promotion_factor: usize,
    pub vocabulary_cache_size: NonZeroUsize,
    pub geo_cache_size: NonZeroUsize,
}

impl MatchingConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            fuzzy_exact_threshold: read_f64("APP_FUZZY_EXACT_THRESHOLD", 85.0)?,
            fuzzy_fallback_threshold: read_f64("APP_FUZZY_FALLBACK_THRESHOLD", 60.0)?,
            scoring_concurrency: read_usize("APP_SCORING_CONCURRENCY", 100)?,
            promotion_ceiling: read_usize("APP_PROMOTION_CEILING", 5_000)?,
            promotion_factor: read_usize("APP_PROMOTION_FACTOR", 50)?,
            vocabulary_cache_size: read_cache_size("APP_VOCABULARY_CACHE_SIZE", 1_024)?,
            geo_cache_size: read_cache_size("APP_GEO_CACHE_SIZE", 8_192)?,
        })
    }

    /// Number of candidates promoted to full scoring for a given result limit.
    pub fn promotion_cap(&self, limit: Option<usize>) -> usize {
        match limit {
            Some(limit) => limit
                .saturating_mul(self.promotion_factor)
                .min(self.promotion_ceiling),
            None => self.promotion_ceiling,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            fuzzy_exact_threshold: 85.0,
            fuzzy_fallback_threshold: 60.0,
            scoring_concurrency: 100,
            promotion_ceiling: 5_000,
            promotion_factor: 50,
            vocabulary_cache_size: NonZeroUsize::new(1_024).expect("literal is non-zero"),
            geo_cache_size: NonZeroUsize::new(8_192).expect("literal is non-zero"),
        }
    }
}

fn read_f64(var: &str, default: f64) -> Result<f64, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw.trim().parse::<f64>().map_err(|_| ConfigError::InvalidNumber {
            var: var.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

fn read_usize(var: &str, default: usize) -> Result<usize, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map_err(|_| ConfigError::InvalidNumber {
                var: var.to_string(),
                value: raw,
            }),
        Err(_) => Ok(default),
    }
}

fn read_cache_size(var: &str, default: usize) -> Result<NonZeroUsize, ConfigError> {
    let value = read_usize(var, default)?;
    NonZeroUsize::new(value).ok_or_else(|| ConfigError::InvalidNumber {
        var: var.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { var: String, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} must be a positive number, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort | ConfigError::InvalidNumber { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
