use crate::cli::ServeArgs;
use crate::infra::{build_service, load_dataset, AppState, ReloadContext};
use crate::routes::with_match_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;
use trial_match::config::AppConfig;
use trial_match::error::AppError;
use trial_match::telemetry;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let service = build_service(&config.datasets, config.matching.clone());

    // Requests are rejected with 503 until this completes; loading is a
    // startup precondition, not a per-request recoverable.
    info!(
        patients = %config.datasets.patients_path.display(),
        activities = %config.datasets.activities_path.display(),
        "loading reference datasets"
    );
    let dataset = load_dataset(&config.datasets).await?;
    service.install_dataset(dataset);

    let reload_context = ReloadContext {
        service: service.clone(),
        datasets: config.datasets.clone(),
    };

    let app = with_match_routes(&reload_context)
        .layer(Extension(app_state))
        .layer(Extension(reload_context))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "patient matching service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
