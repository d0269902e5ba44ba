use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use trial_match::config::{DatasetConfig, MatchingConfig};
use trial_match::error::AppError;
use trial_match::matching::dataset::load_from_paths;
use trial_match::matching::{
    DatasetHandle, GeoNamesSource, GeoResolver, MatchDataset, MatchService,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Context the admin reload endpoint needs: the live service plus the
/// dataset locations to re-read.
#[derive(Clone)]
pub(crate) struct ReloadContext {
    pub(crate) service: Arc<MatchService<GeoNamesSource>>,
    pub(crate) datasets: DatasetConfig,
}

pub(crate) fn build_service(
    datasets: &DatasetConfig,
    matching: MatchingConfig,
) -> Arc<MatchService<GeoNamesSource>> {
    let source = GeoNamesSource::new(datasets.geo_data_dir.clone());
    let resolver = GeoResolver::new(source, matching.geo_cache_size);
    Arc::new(MatchService::new(DatasetHandle::new(), resolver, matching))
}

/// Read both CSVs off the async runtime and build a fresh snapshot.
pub(crate) async fn load_dataset(config: &DatasetConfig) -> Result<MatchDataset, AppError> {
    let patients = config.patients_path.clone();
    let activities = config.activities_path.clone();
    let dataset = tokio::task::spawn_blocking(move || load_from_paths(&patients, &activities))
        .await
        .map_err(|join_error| {
            AppError::Io(std::io::Error::new(std::io::ErrorKind::Other, join_error))
        })??;
    Ok(dataset)
}
