use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use amalianur::config::AppConfig;
use amalianur::enrollment::{EnrollmentRecord, EnrollmentRepository};
use amalianur::error::AppError;
use amalianur::feed::{ChangeEvent, Subscription};
use amalianur::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use tracing::info;

use crate::cli::ServeArgs;
use crate::infra::{build_backoffice, AppState};
use crate::routes::with_backoffice_routes;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;
    config.warn_missing();

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));

    let backoffice = build_backoffice(&config);
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        files: backoffice.files.clone(),
    };
    let registrations = backoffice.enrollment.repository().record_feed().subscribe();
    tokio::spawn(watch_registrations(registrations));

    let app = with_backoffice_routes(backoffice)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "enrollment back-office ready");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Logs every registrant as it is committed, for operators tailing the service.
async fn watch_registrations(mut feed: Subscription<EnrollmentRecord>) {
    while let Some(event) = feed.next().await {
        match event {
            ChangeEvent::Insert(record) => info!(
                id = %record.id,
                name = %record.applicant.name,
                tier = record.applicant.tier.code(),
                "new registrant"
            ),
            ChangeEvent::Delete { id } => info!(%id, "registrant removed"),
            ChangeEvent::Update(_) => {}
        }
    }
}
