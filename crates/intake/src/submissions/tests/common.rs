use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use chrono::Utc;
use serde_json::Value;

use crate::config::{ConfigError, ParameterCache, ParameterSource, RateLimitConfig, keys};
use crate::submissions::audit::{AuditLogEntry, AuditLogger};
use crate::submissions::auth::{InMemoryTokenStore, Role};
use crate::submissions::domain::{
    NewPatientRequest, NewProviderApplication, PatientRequest, ProviderApplication, Submission,
    SubmissionKind, SubmissionRow, SubmissionStatus,
};
use crate::submissions::notify::{
    EmailMessage, EmailSink, NotificationDispatcher, NotificationRecord, SinkError, SmsMessage,
    SmsSink,
};
use crate::submissions::ratelimit::RateLimiter;
use crate::submissions::repository::{
    AuditSink, ListFilter, NotificationLog, Page, PageRequest, RepositoryError, StatusTransition,
    SubmissionRepository,
};
use crate::submissions::router::{submission_router, ApiGateway};
use crate::submissions::service::SubmissionService;

#[derive(Default)]
struct Tables {
    patients: BTreeMap<u64, PatientRequest>,
    providers: BTreeMap<u64, ProviderApplication>,
    next_id: u64,
}

/// Reference repository used across the service and routing tests.
#[derive(Default)]
pub(super) struct MemoryRepository {
    tables: Mutex<Tables>,
}

impl MemoryRepository {
    fn submissions(tables: &Tables, filter: &ListFilter) -> Vec<Submission> {
        let mut all: Vec<Submission> = Vec::new();
        if filter.kind != Some(SubmissionKind::Provider) {
            all.extend(tables.patients.values().cloned().map(Submission::Patient));
        }
        if filter.kind != Some(SubmissionKind::Patient) {
            all.extend(tables.providers.values().cloned().map(Submission::Provider));
        }
        all.retain(|submission| filter.matches(&submission.row()));
        all.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        all
    }
}

impl SubmissionRepository for MemoryRepository {
    fn create_patient(&self, new: NewPatientRequest) -> Result<PatientRequest, RepositoryError> {
        let mut tables = self.tables.lock().expect("tables mutex poisoned");
        tables.next_id += 1;
        let now = Utc::now();
        let record = PatientRequest {
            id: tables.next_id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            location: new.location,
            wound_type: new.wound_type,
            urgency: new.urgency,
            message: new.message,
            status: SubmissionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.patients.insert(record.id, record.clone());
        Ok(record)
    }

    fn create_provider(
        &self,
        new: NewProviderApplication,
    ) -> Result<ProviderApplication, RepositoryError> {
        let mut tables = self.tables.lock().expect("tables mutex poisoned");
        tables.next_id += 1;
        let now = Utc::now();
        let record = ProviderApplication {
            id: tables.next_id,
            name: new.name,
            email: new.email,
            phone: new.phone,
            credentials: new.credentials,
            specialties: new.specialties,
            location: new.location,
            status: SubmissionStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        tables.providers.insert(record.id, record.clone());
        Ok(record)
    }

    fn list(
        &self,
        filter: &ListFilter,
        page: PageRequest,
    ) -> Result<Page<SubmissionRow>, RepositoryError> {
        let tables = self.tables.lock().expect("tables mutex poisoned");
        let rows = Self::submissions(&tables, filter)
            .iter()
            .map(Submission::row)
            .collect();
        Ok(Page::build(rows, page))
    }

    fn get(&self, kind: SubmissionKind, id: u64) -> Result<Option<Submission>, RepositoryError> {
        let tables = self.tables.lock().expect("tables mutex poisoned");
        Ok(match kind {
            SubmissionKind::Patient => tables.patients.get(&id).cloned().map(Submission::Patient),
            SubmissionKind::Provider => {
                tables.providers.get(&id).cloned().map(Submission::Provider)
            }
        })
    }

    fn update_status(
        &self,
        kind: SubmissionKind,
        id: u64,
        status: SubmissionStatus,
    ) -> Result<StatusTransition, RepositoryError> {
        let mut tables = self.tables.lock().expect("tables mutex poisoned");
        let now = Utc::now();
        match kind {
            SubmissionKind::Patient => {
                let record = tables
                    .patients
                    .get_mut(&id)
                    .ok_or(RepositoryError::NotFound)?;
                let previous = record.status;
                record.status = status;
                record.updated_at = now;
                Ok(StatusTransition {
                    previous,
                    submission: Submission::Patient(record.clone()),
                })
            }
            SubmissionKind::Provider => {
                let record = tables
                    .providers
                    .get_mut(&id)
                    .ok_or(RepositoryError::NotFound)?;
                let previous = record.status;
                record.status = status;
                record.updated_at = now;
                Ok(StatusTransition {
                    previous,
                    submission: Submission::Provider(record.clone()),
                })
            }
        }
    }

    fn snapshot(&self, filter: &ListFilter) -> Result<Vec<Submission>, RepositoryError> {
        let tables = self.tables.lock().expect("tables mutex poisoned");
        Ok(Self::submissions(&tables, filter))
    }

    fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

/// Repository whose every call fails, for dependency-error paths.
pub(super) struct UnavailableRepository;

impl SubmissionRepository for UnavailableRepository {
    fn create_patient(&self, _new: NewPatientRequest) -> Result<PatientRequest, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    fn create_provider(
        &self,
        _new: NewProviderApplication,
    ) -> Result<ProviderApplication, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    fn list(
        &self,
        _filter: &ListFilter,
        _page: PageRequest,
    ) -> Result<Page<SubmissionRow>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    fn get(&self, _kind: SubmissionKind, _id: u64) -> Result<Option<Submission>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    fn update_status(
        &self,
        _kind: SubmissionKind,
        _id: u64,
        _status: SubmissionStatus,
    ) -> Result<StatusTransition, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    fn snapshot(&self, _filter: &ListFilter) -> Result<Vec<Submission>, RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }

    fn ping(&self) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("connection refused".to_string()))
    }
}

#[derive(Default)]
pub(super) struct RecordingAudit {
    pub(super) entries: Mutex<Vec<AuditLogEntry>>,
}

impl RecordingAudit {
    pub(super) fn labels(&self) -> Vec<&'static str> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .iter()
            .map(|entry| entry.action.label())
            .collect()
    }
}

impl AuditSink for RecordingAudit {
    fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), RepositoryError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryNotifications {
    pub(super) records: Mutex<Vec<NotificationRecord>>,
}

impl NotificationLog for MemoryNotifications {
    fn append_notification(&self, record: &NotificationRecord) -> Result<(), RepositoryError> {
        self.records
            .lock()
            .expect("notification mutex poisoned")
            .push(record.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct AcceptingEmail {
    pub(super) sent: Mutex<Vec<EmailMessage>>,
}

impl EmailSink for AcceptingEmail {
    fn name(&self) -> &str {
        "sendgrid"
    }

    fn send(&self, message: &EmailMessage) -> Result<(), SinkError> {
        self.sent
            .lock()
            .expect("email mutex poisoned")
            .push(message.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct AcceptingSms {
    pub(super) sent: Mutex<Vec<SmsMessage>>,
}

impl SmsSink for AcceptingSms {
    fn name(&self) -> &str {
        "twilio"
    }

    fn send(&self, message: &SmsMessage) -> Result<(), SinkError> {
        self.sent
            .lock()
            .expect("sms mutex poisoned")
            .push(message.clone());
        Ok(())
    }
}

struct FixedParams(HashMap<String, String>);

impl ParameterSource for FixedParams {
    fn fetch(&self) -> Result<HashMap<String, String>, ConfigError> {
        Ok(self.0.clone())
    }
}

pub(super) fn params() -> Arc<ParameterCache> {
    let mut values = HashMap::new();
    values.insert(keys::ADMIN_EMAIL.to_string(), "admin@tna.org".to_string());
    values.insert(keys::ADMIN_PHONE.to_string(), "+15125550100".to_string());
    values.insert(keys::EMAIL_FROM.to_string(), "no-reply@tna.org".to_string());
    Arc::new(ParameterCache::new(
        Arc::new(FixedParams(values)),
        Duration::from_secs(300),
    ))
}

pub(super) struct Harness {
    pub(super) repository: Arc<MemoryRepository>,
    pub(super) audit: Arc<RecordingAudit>,
    pub(super) notifications: Arc<MemoryNotifications>,
    pub(super) email: Arc<AcceptingEmail>,
    pub(super) sms: Arc<AcceptingSms>,
    pub(super) service: SubmissionService<MemoryRepository>,
}

pub(super) fn harness() -> Harness {
    let repository = Arc::new(MemoryRepository::default());
    let audit = Arc::new(RecordingAudit::default());
    let notifications = Arc::new(MemoryNotifications::default());
    let email = Arc::new(AcceptingEmail::default());
    let sms = Arc::new(AcceptingSms::default());
    let dispatcher = NotificationDispatcher::new(
        vec![email.clone()],
        vec![sms.clone()],
        notifications.clone(),
        params(),
    );
    let service = SubmissionService::new(
        repository.clone(),
        dispatcher,
        AuditLogger::new(audit.clone()),
    );
    Harness {
        repository,
        audit,
        notifications,
        email,
        sms,
        service,
    }
}

/// Router wired to in-memory everything, with one token per role.
pub(super) fn router_with_limit(max_requests: usize) -> (Router, Arc<RecordingAudit>) {
    let Harness {
        audit, service, ..
    } = harness();

    let tokens = InMemoryTokenStore::new();
    tokens.issue("admin-token", "admin-1", Role::Admin, chrono::Duration::hours(12));
    tokens.issue("staff-token", "staff-7", Role::Staff, chrono::Duration::hours(12));
    tokens.issue("user-token", "user-3", Role::User, chrono::Duration::hours(12));

    let gateway = Arc::new(ApiGateway {
        service,
        auth: Arc::new(tokens),
        limiter: RateLimiter::new(&RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests,
        }),
        params: params(),
    });
    (submission_router(gateway), audit)
}

pub(super) fn router() -> (Router, Arc<RecordingAudit>) {
    router_with_limit(100)
}

/// Router over a repository whose every call fails.
pub(super) fn unavailable_router() -> (Router, Arc<RecordingAudit>) {
    let audit = Arc::new(RecordingAudit::default());
    let dispatcher = NotificationDispatcher::new(
        Vec::new(),
        Vec::new(),
        Arc::new(MemoryNotifications::default()),
        params(),
    );
    let service = SubmissionService::new(
        Arc::new(UnavailableRepository),
        dispatcher,
        AuditLogger::new(audit.clone()),
    );

    let tokens = InMemoryTokenStore::new();
    tokens.issue("staff-token", "staff-7", Role::Staff, chrono::Duration::hours(12));

    let gateway = Arc::new(ApiGateway {
        service,
        auth: Arc::new(tokens),
        limiter: RateLimiter::new(&RateLimitConfig {
            window: Duration::from_secs(60),
            max_requests: 100,
        }),
        params: params(),
    });
    (submission_router(gateway), audit)
}

pub(super) fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

pub(super) fn authed(request: axum::http::request::Builder, token: &str) -> axum::http::request::Builder {
    request.header("authorization", format!("Bearer {token}"))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    serde_json::from_slice(&bytes).expect("body is JSON")
}

pub(super) async fn read_text_body(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body reads");
    String::from_utf8(bytes.to_vec()).expect("body is UTF-8")
}
