//! Submission intake, review, and notification pipeline.
//!
//! `domain` and `validate` define the intake contract, `repository` the
//! persistence seam, and `service` orchestrates the two with the audit
//! logger and the notification dispatcher. `router` exposes the whole
//! pipeline over HTTP behind the rate limiter and bearer-token auth.

pub mod analytics;
pub mod audit;
pub mod auth;
pub mod domain;
pub mod export;
pub mod notify;
pub mod ratelimit;
pub mod repository;
pub mod router;
pub mod service;
pub mod validate;

#[cfg(test)]
mod tests;

pub use analytics::{build_report, AnalyticsReport};
pub use audit::{AuditAction, AuditLogEntry, AuditLogger};
pub use auth::{bearer_token, InMemoryTokenStore, Role, Session, TokenStore};
pub use domain::{
    NewPatientRequest, NewProviderApplication, PatientIntake, PatientRequest, ProviderApplication,
    ProviderIntake, Submission, SubmissionKind, SubmissionRow, SubmissionStatus, Urgency,
};
pub use export::ExportFormat;
pub use notify::{
    Channel, CommunicationOutcome, DeliveryOutcome, EmailMessage, EmailSink, NotificationDispatcher,
    NotificationRecord, SinkError, SmsMessage, SmsSink,
};
pub use ratelimit::{RateLimiter, SharedCounter, SharedCounterError};
pub use repository::{
    AuditSink, ListFilter, NotificationLog, Page, PageRequest, RepositoryError, StatusTransition,
    SubmissionRepository,
};
pub use router::{submission_router, ApiGateway};
pub use service::{
    CommunicationRequest, RequestContext, SubmissionService, SubmissionServiceError,
};
