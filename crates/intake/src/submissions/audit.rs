//! Append-only audit trail for security-relevant actions.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::repository::{AuditSink, RepositoryError};

/// Enumerated action tags. Labels are the stable strings written to the
/// audit table and must not change once deployed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    PatientRequestCreated,
    ProviderApplicationCreated,
    ViewSubmissions,
    UpdateSubmissionStatus,
    SendCommunication,
    ExportData,
    ViewAnalytics,
    Unauthorized,
    UnauthorizedAccessAttempt,
    RateLimitExceeded,
    Error,
}

impl AuditAction {
    pub const fn label(self) -> &'static str {
        match self {
            AuditAction::PatientRequestCreated => "PATIENT_REQUEST_CREATED",
            AuditAction::ProviderApplicationCreated => "PROVIDER_APPLICATION_CREATED",
            AuditAction::ViewSubmissions => "VIEW_SUBMISSIONS",
            AuditAction::UpdateSubmissionStatus => "UPDATE_SUBMISSION_STATUS",
            AuditAction::SendCommunication => "SEND_COMMUNICATION",
            AuditAction::ExportData => "EXPORT_DATA",
            AuditAction::ViewAnalytics => "VIEW_ANALYTICS",
            AuditAction::Unauthorized => "UNAUTHORIZED",
            AuditAction::UnauthorizedAccessAttempt => "UNAUTHORIZED_ACCESS_ATTEMPT",
            AuditAction::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AuditAction::Error => "ERROR",
        }
    }
}

/// Immutable audit record. Never mutated or deleted once appended.
#[derive(Debug, Clone, Serialize)]
pub struct AuditLogEntry {
    pub timestamp: DateTime<Utc>,
    pub actor: String,
    pub action: AuditAction,
    pub resource: String,
    pub details: serde_json::Value,
    pub source_ip: String,
    pub correlation_id: Uuid,
}

/// Best-effort writer over a durable [`AuditSink`].
///
/// `record` is synchronous from the caller's perspective but never
/// propagates sink failures; an unreachable sink is logged locally and the
/// primary request flow continues.
#[derive(Clone)]
pub struct AuditLogger {
    sink: Arc<dyn AuditSink>,
}

impl AuditLogger {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    pub fn record(
        &self,
        actor: Option<&str>,
        action: AuditAction,
        resource: &str,
        details: serde_json::Value,
        source_ip: &str,
        correlation_id: Uuid,
    ) {
        let entry = AuditLogEntry {
            timestamp: Utc::now(),
            actor: actor.unwrap_or("anonymous").to_string(),
            action,
            resource: resource.to_string(),
            details,
            source_ip: source_ip.to_string(),
            correlation_id,
        };

        tracing::info!(
            action = entry.action.label(),
            actor = %entry.actor,
            resource = %entry.resource,
            correlation_id = %entry.correlation_id,
            "audit"
        );

        if let Err(err) = self.sink.append_audit(&entry) {
            tracing::error!(%err, action = entry.action.label(), "audit sink write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        entries: Mutex<Vec<AuditLogEntry>>,
        fail: bool,
    }

    impl AuditSink for RecordingSink {
        fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), RepositoryError> {
            if self.fail {
                return Err(RepositoryError::Unavailable("sink offline".to_string()));
            }
            self.entries
                .lock()
                .expect("sink mutex poisoned")
                .push(entry.clone());
            Ok(())
        }
    }

    #[test]
    fn records_carry_actor_and_correlation_id() {
        let sink = Arc::new(RecordingSink::default());
        let logger = AuditLogger::new(sink.clone());
        let correlation_id = Uuid::new_v4();

        logger.record(
            Some("staff-7"),
            AuditAction::ViewSubmissions,
            "submissions",
            serde_json::json!({ "page": 1 }),
            "203.0.113.9",
            correlation_id,
        );

        let entries = sink.entries.lock().expect("sink mutex poisoned");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor, "staff-7");
        assert_eq!(entries[0].correlation_id, correlation_id);
        assert_eq!(entries[0].action.label(), "VIEW_SUBMISSIONS");
    }

    #[test]
    fn anonymous_actor_when_unauthenticated() {
        let sink = Arc::new(RecordingSink::default());
        let logger = AuditLogger::new(sink.clone());

        logger.record(
            None,
            AuditAction::RateLimitExceeded,
            "/api/patient-assistance",
            serde_json::Value::Null,
            "198.51.100.2",
            Uuid::new_v4(),
        );

        let entries = sink.entries.lock().expect("sink mutex poisoned");
        assert_eq!(entries[0].actor, "anonymous");
    }

    #[test]
    fn sink_failure_is_swallowed() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let logger = AuditLogger::new(sink);

        // Must not panic or propagate.
        logger.record(
            None,
            AuditAction::Error,
            "/api/submissions",
            serde_json::Value::Null,
            "unknown",
            Uuid::new_v4(),
        );
    }
}
