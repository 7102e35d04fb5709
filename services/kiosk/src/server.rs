use crate::cli::ServeArgs;
use crate::infra::{AppState, KioskState};
use crate::routes::kiosk_router;
use academy_desk::config::AppConfig;
use academy_desk::error::AppError;
use academy_desk::intake::HttpIntakeBackend;
use academy_desk::notifications::{HttpNotificationTransport, NotificationDispatcher};
use academy_desk::telemetry;
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

    let backend = Arc::new(HttpIntakeBackend::new(
        config.backend.base_url.clone(),
        config.backend.token.clone(),
        config.backend.timeout,
    )?);
    let transport = Arc::new(HttpNotificationTransport::new(
        config.notifications.base_url.clone(),
        config.backend.timeout,
    )?);
    let dispatcher = NotificationDispatcher::new(transport);
    let (queue, _worker) = dispatcher.spawn_queue(config.notifications.max_batch);

    let kiosk = Arc::new(KioskState::build(&config, backend, dispatcher, queue));

    let app = kiosk_router(kiosk)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, backend = %config.backend.base_url, "academy desk kiosk ready");

    axum::serve(listener, app).await?;
    Ok(())
}
