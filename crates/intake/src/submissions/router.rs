//! HTTP surface for intake and staff review.
//!
//! Request flow: rate-limit gate, then (for protected routes) bearer-token
//! authentication and role authorization, then the endpoint body. Every
//! response carries permissive CORS plus the standard security headers, and
//! `OPTIONS` always short-circuits to an empty 200.

use std::sync::Arc;

use axum::extract::{Path, Query, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use crate::config::ParameterCache;
use crate::error::ApiError;

use super::audit::AuditAction;
use super::auth::{self, Role, Session, TokenStore};
use super::domain::{
    PatientIntake, ProviderIntake, SubmissionKind, SubmissionRow, SubmissionStatus,
};
use super::export::ExportFormat;
use super::ratelimit::RateLimiter;
use super::repository::{ListFilter, PageRequest, RepositoryError, SubmissionRepository};
use super::service::{
    CommunicationRequest, RequestContext, SubmissionService, SubmissionServiceError,
};

const STAFF_ROLES: &[Role] = &[Role::Staff, Role::Admin];
const ADMIN_ONLY: &[Role] = &[Role::Admin];

/// Shared state behind the submission API.
pub struct ApiGateway<R> {
    pub service: SubmissionService<R>,
    pub auth: Arc<dyn TokenStore>,
    pub limiter: RateLimiter,
    pub params: Arc<ParameterCache>,
}

/// Router builder exposing the full intake and review surface.
pub fn submission_router<R>(gateway: Arc<ApiGateway<R>>) -> Router
where
    R: SubmissionRepository + 'static,
{
    Router::new()
        .route("/api/patient-assistance", post(patient_assistance_handler::<R>))
        .route("/api/provider-application", post(provider_application_handler::<R>))
        .route("/api/submissions", get(list_submissions_handler::<R>))
        .route("/api/submissions/:id/status", put(update_status_handler::<R>))
        .route("/api/communications/send", post(send_communication_handler::<R>))
        .route("/api/export/:format", get(export_handler::<R>))
        .route("/api/analytics", get(analytics_handler::<R>))
        .route("/api/health", get(health_handler::<R>))
        .fallback(fallback_handler)
        .layer(middleware::from_fn_with_state(
            gateway.clone(),
            throttle_layer::<R>,
        ))
        .layer(middleware::from_fn(standard_headers_layer))
        .with_state(gateway)
}

/// Identity of the inbound request: source address (from the proxy's
/// `x-forwarded-for`) and a correlation id, honoring a caller-supplied
/// `x-request-id` when it parses.
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub ip: String,
    pub request_id: Uuid,
}

impl RequestMeta {
    fn from_headers(headers: &HeaderMap) -> Self {
        let ip = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "unknown".to_string());
        let request_id = headers
            .get("x-request-id")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok())
            .unwrap_or_else(Uuid::new_v4);
        Self { ip, request_id }
    }
}

async fn standard_headers_layer(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::OK.into_response();
        apply_standard_headers(response.headers_mut());
        return response;
    }
    let mut response = next.run(request).await;
    apply_standard_headers(response.headers_mut());
    response
}

fn apply_standard_headers(headers: &mut HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, PUT, DELETE, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type, Authorization"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    headers.insert(header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY"));
    headers.insert(
        header::STRICT_TRANSPORT_SECURITY,
        HeaderValue::from_static("max-age=31536000; includeSubDomains"),
    );
}

async fn throttle_layer<R>(
    State(gateway): State<Arc<ApiGateway<R>>>,
    request: Request,
    next: Next,
) -> Response
where
    R: SubmissionRepository + 'static,
{
    let meta = RequestMeta::from_headers(request.headers());
    if !gateway.limiter.allow(&meta.ip) {
        let path = request.uri().path().to_string();
        gateway.service.audit().record(
            None,
            AuditAction::RateLimitExceeded,
            &path,
            json!({ "ip": meta.ip }),
            &meta.ip,
            meta.request_id,
        );
        return ApiError::RateLimited.into_response();
    }
    next.run(request).await
}

fn authorize<R>(
    gateway: &ApiGateway<R>,
    headers: &HeaderMap,
    meta: &RequestMeta,
    resource: &str,
    allowed: &[Role],
) -> Result<Session, ApiError>
where
    R: SubmissionRepository + 'static,
{
    let session = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(auth::bearer_token)
        .and_then(|token| gateway.auth.resolve(token));

    let Some(session) = session else {
        gateway.service.audit().record(
            None,
            AuditAction::Unauthorized,
            resource,
            json!({ "path": resource }),
            &meta.ip,
            meta.request_id,
        );
        return Err(ApiError::Unauthenticated);
    };

    if !session.role.permits(allowed) {
        gateway.service.audit().record(
            Some(&session.user_id),
            AuditAction::UnauthorizedAccessAttempt,
            resource,
            json!({ "path": resource, "role": session.role.label() }),
            &meta.ip,
            meta.request_id,
        );
        return Err(ApiError::Forbidden);
    }

    Ok(session)
}

/// Convert a service failure into the wire taxonomy, auditing dependency
/// errors with the request's correlation id before hiding the detail.
fn map_service_error<R>(
    gateway: &ApiGateway<R>,
    meta: &RequestMeta,
    resource: &str,
    not_found: &str,
    error: SubmissionServiceError,
) -> ApiError
where
    R: SubmissionRepository + 'static,
{
    match error {
        SubmissionServiceError::Validation(errors) => ApiError::Validation(errors),
        SubmissionServiceError::Repository(RepositoryError::NotFound) => {
            ApiError::NotFound(not_found.to_string())
        }
        SubmissionServiceError::Repository(RepositoryError::Unavailable(detail)) => {
            audit_dependency_error(gateway, meta, resource, &detail);
            ApiError::Dependency {
                request_id: meta.request_id,
            }
        }
        SubmissionServiceError::Export(err) => {
            audit_dependency_error(gateway, meta, resource, &err.to_string());
            ApiError::Dependency {
                request_id: meta.request_id,
            }
        }
    }
}

fn audit_dependency_error<R>(
    gateway: &ApiGateway<R>,
    meta: &RequestMeta,
    resource: &str,
    detail: &str,
) where
    R: SubmissionRepository + 'static,
{
    tracing::error!(%resource, %detail, request_id = %meta.request_id, "request failed");
    gateway.service.audit().record(
        None,
        AuditAction::Error,
        resource,
        json!({ "error": detail, "path": resource }),
        &meta.ip,
        meta.request_id,
    );
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListQuery {
    status: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    from_date: Option<String>,
    to_date: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::BadRequest(format!("Invalid date '{raw}', expected YYYY-MM-DD")))
}

fn parse_filter(query: &ListQuery) -> Result<ListFilter, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(|raw| {
            SubmissionStatus::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown status '{raw}'")))
        })
        .transpose()?;
    let kind = query
        .kind
        .as_deref()
        .map(|raw| {
            SubmissionKind::parse(raw)
                .ok_or_else(|| ApiError::BadRequest(format!("Unknown type '{raw}'")))
        })
        .transpose()?;
    let from = query
        .from_date
        .as_deref()
        .map(parse_date)
        .transpose()?
        .map(|date| {
            date.and_hms_opt(0, 0, 0)
                .expect("midnight is a valid time")
                .and_utc()
        });
    let to = query
        .to_date
        .as_deref()
        .map(parse_date)
        .transpose()?
        .map(|date| {
            date.and_hms_opt(23, 59, 59)
                .expect("end of day is a valid time")
                .and_utc()
        });

    Ok(ListFilter {
        status,
        kind,
        from,
        to,
    })
}

#[derive(Debug, Serialize)]
pub(crate) struct SubmissionListResponse {
    pub(crate) submissions: Vec<SubmissionRow>,
    pub(crate) total: u64,
    pub(crate) page: u32,
    pub(crate) pages: u32,
}

pub(crate) async fn patient_assistance_handler<R>(
    State(gateway): State<Arc<ApiGateway<R>>>,
    headers: HeaderMap,
    Json(intake): Json<PatientIntake>,
) -> Result<Response, ApiError>
where
    R: SubmissionRepository + 'static,
{
    let meta = RequestMeta::from_headers(&headers);
    let ctx = RequestContext::anonymous(meta.ip.clone(), meta.request_id);

    let stored = gateway.service.submit_patient(&ctx, intake).map_err(|err| {
        map_service_error(
            &gateway,
            &meta,
            "/api/patient-assistance",
            "Submission not found",
            err,
        )
    })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Your request has been submitted successfully. We will contact you within 24 hours.",
            "requestId": stored.id,
        })),
    )
        .into_response())
}

pub(crate) async fn provider_application_handler<R>(
    State(gateway): State<Arc<ApiGateway<R>>>,
    headers: HeaderMap,
    Json(intake): Json<ProviderIntake>,
) -> Result<Response, ApiError>
where
    R: SubmissionRepository + 'static,
{
    let meta = RequestMeta::from_headers(&headers);
    let ctx = RequestContext::anonymous(meta.ip.clone(), meta.request_id);

    let stored = gateway
        .service
        .submit_provider(&ctx, intake)
        .map_err(|err| {
            map_service_error(
                &gateway,
                &meta,
                "/api/provider-application",
                "Submission not found",
                err,
            )
        })?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Your application has been submitted successfully. We will review it within 48 hours.",
            "applicationId": stored.id,
        })),
    )
        .into_response())
}

pub(crate) async fn list_submissions_handler<R>(
    State(gateway): State<Arc<ApiGateway<R>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError>
where
    R: SubmissionRepository + 'static,
{
    let meta = RequestMeta::from_headers(&headers);
    let session = authorize(&gateway, &headers, &meta, "/api/submissions", STAFF_ROLES)?;

    let filter = parse_filter(&query)?;
    let page = PageRequest {
        page: query.page.unwrap_or(1),
        limit: query.limit.unwrap_or(20),
    };
    let ctx = RequestContext::authenticated(session.user_id, meta.ip.clone(), meta.request_id);

    let result = gateway
        .service
        .list(&ctx, &filter, page)
        .map_err(|err| {
            map_service_error(&gateway, &meta, "/api/submissions", "Submission not found", err)
        })?;

    Ok(Json(SubmissionListResponse {
        submissions: result.rows,
        total: result.total,
        page: result.page,
        pages: result.pages,
    })
    .into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct UpdateStatusBody {
    status: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    notes: Option<String>,
}

pub(crate) async fn update_status_handler<R>(
    State(gateway): State<Arc<ApiGateway<R>>>,
    Path(id): Path<u64>,
    headers: HeaderMap,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Response, ApiError>
where
    R: SubmissionRepository + 'static,
{
    let meta = RequestMeta::from_headers(&headers);
    let resource = "/api/submissions/{id}/status";
    let session = authorize(&gateway, &headers, &meta, resource, STAFF_ROLES)?;

    let (Some(status_raw), Some(kind_raw)) = (body.status, body.kind) else {
        return Err(ApiError::BadRequest("Missing status or type".to_string()));
    };
    let status = SubmissionStatus::parse(&status_raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown status '{status_raw}'")))?;
    let kind = SubmissionKind::parse(&kind_raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown type '{kind_raw}'")))?;

    let ctx = RequestContext::authenticated(session.user_id, meta.ip.clone(), meta.request_id);
    let submission = gateway
        .service
        .update_status(&ctx, kind, id, status, body.notes.as_deref())
        .map_err(|err| map_service_error(&gateway, &meta, resource, "Submission not found", err))?;

    Ok(Json(json!({ "success": true, "submission": submission })).into_response())
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommunicationBody {
    #[serde(rename = "recipientId")]
    recipient_id: Option<u64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    method: Option<String>,
    subject: Option<String>,
    message: Option<String>,
}

pub(crate) async fn send_communication_handler<R>(
    State(gateway): State<Arc<ApiGateway<R>>>,
    headers: HeaderMap,
    Json(body): Json<CommunicationBody>,
) -> Result<Response, ApiError>
where
    R: SubmissionRepository + 'static,
{
    let meta = RequestMeta::from_headers(&headers);
    let resource = "/api/communications/send";
    let session = authorize(&gateway, &headers, &meta, resource, STAFF_ROLES)?;

    let (Some(recipient_id), Some(kind_raw), Some(method_raw), Some(message)) =
        (body.recipient_id, body.kind, body.method, body.message)
    else {
        return Err(ApiError::BadRequest("Missing required fields".to_string()));
    };
    let kind = SubmissionKind::parse(&kind_raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown type '{kind_raw}'")))?;
    let method = super::notify::Channel::parse(&method_raw)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown method '{method_raw}'")))?;

    let ctx = RequestContext::authenticated(session.user_id, meta.ip.clone(), meta.request_id);
    let request = CommunicationRequest {
        recipient_id,
        kind,
        method,
        subject: body.subject,
        message,
    };
    let outcome = gateway
        .service
        .send_communication(&ctx, &request)
        .map_err(|err| map_service_error(&gateway, &meta, resource, "Recipient not found", err))?;

    Ok(Json(json!({
        "success": outcome.delivered,
        "message": if outcome.delivered {
            "Communication sent successfully"
        } else {
            "Communication could not be delivered"
        },
        "method": outcome.method.label(),
    }))
    .into_response())
}

pub(crate) async fn export_handler<R>(
    State(gateway): State<Arc<ApiGateway<R>>>,
    Path(format): Path<String>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError>
where
    R: SubmissionRepository + 'static,
{
    let meta = RequestMeta::from_headers(&headers);
    let resource = "/api/export";
    let session = authorize(&gateway, &headers, &meta, resource, ADMIN_ONLY)?;

    let format = ExportFormat::parse(&format)
        .ok_or_else(|| ApiError::BadRequest(format!("Unsupported export format '{format}'")))?;
    let filter = parse_filter(&query)?;

    let ctx = RequestContext::authenticated(session.user_id, meta.ip.clone(), meta.request_id);
    let body = gateway
        .service
        .export(&ctx, format, &filter)
        .map_err(|err| map_service_error(&gateway, &meta, resource, "Submission not found", err))?;

    let disposition = format!(
        "attachment; filename=\"submissions-export.{}\"",
        format.extension()
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

pub(crate) async fn analytics_handler<R>(
    State(gateway): State<Arc<ApiGateway<R>>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, ApiError>
where
    R: SubmissionRepository + 'static,
{
    let meta = RequestMeta::from_headers(&headers);
    let resource = "/api/analytics";
    let session = authorize(&gateway, &headers, &meta, resource, STAFF_ROLES)?;

    let filter = parse_filter(&query)?;
    let ctx = RequestContext::authenticated(session.user_id, meta.ip.clone(), meta.request_id);

    let report = gateway
        .service
        .analytics(&ctx, &filter)
        .map_err(|err| map_service_error(&gateway, &meta, resource, "Submission not found", err))?;

    Ok(Json(report).into_response())
}

pub(crate) async fn health_handler<R>(
    State(gateway): State<Arc<ApiGateway<R>>>,
) -> Response
where
    R: SubmissionRepository + 'static,
{
    let database = match gateway.service.ping() {
        Ok(()) => "healthy",
        Err(_) => "unhealthy",
    };
    let parameters = if gateway.params.is_healthy() {
        "healthy"
    } else {
        "missing"
    };

    let healthy = database == "healthy" && parameters == "healthy";
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if healthy { "healthy" } else { "degraded" },
            "checks": {
                "database": database,
                "parameters": parameters,
                "timestamp": Utc::now().to_rfc3339(),
            },
        })),
    )
        .into_response()
}

async fn fallback_handler() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Endpoint not found" })),
    )
        .into_response()
}
