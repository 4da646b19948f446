use crate::cli::ServeArgs;
use crate::infra::{screening_api, AppState};
use crate::routes::with_screening_routes;
use applicant_screening::config::AppConfig;
use applicant_screening::error::AppError;
use applicant_screening::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

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
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let api = screening_api(&config.screening)?;
    let app = with_screening_routes(api)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        sandbox_identity = config.screening.idenfy.is_none(),
        sandbox_background = config.screening.checkr.is_none(),
        "applicant screening service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
