use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemorySubmissionStore, LoggingEmailSink, LoggingSmsSink};
use crate::routes::with_submission_routes;
use advocacy_intake::config::{AppConfig, EnvParameterSource, ParameterCache};
use advocacy_intake::error::AppError;
use advocacy_intake::submissions::audit::AuditLogger;
use advocacy_intake::submissions::auth::{InMemoryTokenStore, Role};
use advocacy_intake::submissions::notify::{EmailSink, NotificationDispatcher, SmsSink};
use advocacy_intake::submissions::ratelimit::RateLimiter;
use advocacy_intake::submissions::router::ApiGateway;
use advocacy_intake::submissions::service::SubmissionService;
use advocacy_intake::telemetry;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

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

    let store = Arc::new(InMemorySubmissionStore::default());
    let params = Arc::new(ParameterCache::new(
        Arc::new(EnvParameterSource),
        ParameterCache::DEFAULT_TTL,
    ));

    let email: Vec<Arc<dyn EmailSink>> = vec![
        Arc::new(LoggingEmailSink::new("sendgrid")),
        Arc::new(LoggingEmailSink::new("ses")),
    ];
    let sms: Vec<Arc<dyn SmsSink>> = vec![
        Arc::new(LoggingSmsSink::new("twilio")),
        Arc::new(LoggingSmsSink::new("sns")),
    ];
    let dispatcher = NotificationDispatcher::new(email, sms, store.clone(), params.clone());
    let audit = AuditLogger::new(store.clone());
    let service = SubmissionService::new(store.clone(), dispatcher, audit);

    let tokens = InMemoryTokenStore::new();
    match &config.auth.admin_token {
        Some(token) => tokens.issue(token.as_str(), "admin", Role::Admin, chrono::Duration::hours(12)),
        None => warn!("APP_ADMIN_TOKEN not set, admin surface is unreachable"),
    }
    match &config.auth.staff_token {
        Some(token) => tokens.issue(token.as_str(), "staff", Role::Staff, chrono::Duration::hours(12)),
        None => warn!("APP_STAFF_TOKEN not set, staff surface is unreachable"),
    }

    let gateway = Arc::new(ApiGateway {
        service,
        auth: Arc::new(tokens),
        limiter: RateLimiter::new(&config.rate_limit),
        params,
    });

    let app = with_submission_routes(gateway)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "submission intake service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
