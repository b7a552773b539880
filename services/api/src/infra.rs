use std::collections::BTreeMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};

use advocacy_intake::submissions::audit::AuditLogEntry;
use advocacy_intake::submissions::domain::{
    NewPatientRequest, NewProviderApplication, PatientRequest, ProviderApplication, Submission,
    SubmissionKind, SubmissionRow, SubmissionStatus,
};
use advocacy_intake::submissions::notify::{
    EmailMessage, EmailSink, NotificationRecord, SinkError, SmsMessage, SmsSink,
};
use advocacy_intake::submissions::repository::{
    AuditSink, ListFilter, NotificationLog, Page, PageRequest, RepositoryError, StatusTransition,
    SubmissionRepository,
};
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct StoreInner {
    patients: BTreeMap<u64, PatientRequest>,
    providers: BTreeMap<u64, ProviderApplication>,
    audit: Vec<AuditLogEntry>,
    notifications: Vec<NotificationRecord>,
    next_id: u64,
}

impl StoreInner {
    fn submissions(&self, filter: &ListFilter) -> Vec<Submission> {
        let mut all: Vec<Submission> = Vec::new();
        if filter.kind != Some(SubmissionKind::Provider) {
            all.extend(self.patients.values().cloned().map(Submission::Patient));
        }
        if filter.kind != Some(SubmissionKind::Patient) {
            all.extend(self.providers.values().cloned().map(Submission::Provider));
        }
        all.retain(|submission| filter.matches(&submission.row()));
        all.sort_by(|a, b| b.created_at().cmp(&a.created_at()));
        all
    }
}

/// Single-process backing store holding both submission tables plus the
/// audit and notification logs behind one lock, so every repository call is
/// one logical transaction.
#[derive(Default)]
pub(crate) struct InMemorySubmissionStore {
    inner: Mutex<StoreInner>,
}

impl InMemorySubmissionStore {
    #[cfg(test)]
    pub(crate) fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.inner.lock().expect("store mutex poisoned").audit.clone()
    }

    #[cfg(test)]
    pub(crate) fn notifications(&self) -> Vec<NotificationRecord> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .notifications
            .clone()
    }
}

impl SubmissionRepository for InMemorySubmissionStore {
    fn create_patient(&self, new: NewPatientRequest) -> Result<PatientRequest, RepositoryError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.next_id += 1;
        let now = Utc::now();
        let record = PatientRequest {
            id: inner.next_id,
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
        inner.patients.insert(record.id, record.clone());
        Ok(record)
    }

    fn create_provider(
        &self,
        new: NewProviderApplication,
    ) -> Result<ProviderApplication, RepositoryError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        inner.next_id += 1;
        let now = Utc::now();
        let record = ProviderApplication {
            id: inner.next_id,
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
        inner.providers.insert(record.id, record.clone());
        Ok(record)
    }

    fn list(
        &self,
        filter: &ListFilter,
        page: PageRequest,
    ) -> Result<Page<SubmissionRow>, RepositoryError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        let rows = inner
            .submissions(filter)
            .iter()
            .map(Submission::row)
            .collect();
        Ok(Page::build(rows, page))
    }

    fn get(&self, kind: SubmissionKind, id: u64) -> Result<Option<Submission>, RepositoryError> {
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(match kind {
            SubmissionKind::Patient => inner.patients.get(&id).cloned().map(Submission::Patient),
            SubmissionKind::Provider => {
                inner.providers.get(&id).cloned().map(Submission::Provider)
            }
        })
    }

    fn update_status(
        &self,
        kind: SubmissionKind,
        id: u64,
        status: SubmissionStatus,
    ) -> Result<StatusTransition, RepositoryError> {
        let mut inner = self.inner.lock().expect("store mutex poisoned");
        let now = Utc::now();
        match kind {
            SubmissionKind::Patient => {
                let record = inner
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
                let record = inner
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
        let inner = self.inner.lock().expect("store mutex poisoned");
        Ok(inner.submissions(filter))
    }

    fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

impl AuditSink for InMemorySubmissionStore {
    fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), RepositoryError> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .audit
            .push(entry.clone());
        Ok(())
    }
}

impl NotificationLog for InMemorySubmissionStore {
    fn append_notification(&self, record: &NotificationRecord) -> Result<(), RepositoryError> {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .notifications
            .push(record.clone());
        Ok(())
    }
}

/// Email provider stand-in that logs instead of calling a vendor API. The
/// deployment wires real SendGrid and SES adapters in the same positions.
pub(crate) struct LoggingEmailSink {
    name: &'static str,
}

impl LoggingEmailSink {
    pub(crate) fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl EmailSink for LoggingEmailSink {
    fn name(&self) -> &str {
        self.name
    }

    fn send(&self, message: &EmailMessage) -> Result<(), SinkError> {
        tracing::info!(
            provider = self.name,
            to = %message.to,
            subject = %message.subject,
            "email dispatched"
        );
        Ok(())
    }
}

/// SMS provider stand-in, mirroring the Twilio and SNS positions.
pub(crate) struct LoggingSmsSink {
    name: &'static str,
}

impl LoggingSmsSink {
    pub(crate) fn new(name: &'static str) -> Self {
        Self { name }
    }
}

impl SmsSink for LoggingSmsSink {
    fn name(&self) -> &str {
        self.name
    }

    fn send(&self, message: &SmsMessage) -> Result<(), SinkError> {
        tracing::info!(provider = self.name, to = %message.to, "sms dispatched");
        Ok(())
    }
}
