use crate::cli::ServeArgs;
use crate::infra::{
    AppState, HeuristicVerificationPipeline, InMemoryApplicationRepository, InMemoryEvidenceStore,
    StaticTokenAuthenticator,
};
use crate::routes::with_application_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use solar_verify::applications::{ApplicationRouterState, ApplicationService};
use solar_verify::config::AppConfig;
use solar_verify::error::AppError;
use solar_verify::telemetry;
use solar_verify::verification::{VerificationOrchestrator, VerificationWorkerPool};
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
    if let Some(workers) = args.workers.take() {
        config.verification.workers = workers;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemoryApplicationRepository::default());
    let evidence = Arc::new(InMemoryEvidenceStore::default());
    let pipeline = Arc::new(HeuristicVerificationPipeline);
    let authenticator = Arc::new(StaticTokenAuthenticator::demo());

    let orchestrator = Arc::new(VerificationOrchestrator::new(
        Arc::clone(&repository),
        pipeline,
    ));
    let (scheduler, _workers) =
        VerificationWorkerPool::spawn(config.verification.workers, orchestrator);

    let service = Arc::new(ApplicationService::new(
        repository,
        evidence,
        Arc::new(scheduler),
    ));

    let app = with_application_routes(ApplicationRouterState {
        service,
        authenticator,
    })
    .layer(Extension(app_state))
    .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        workers = config.verification.workers,
        "solar verification service ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
