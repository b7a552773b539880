//! Service composing validation, persistence, notification fan-out, and the
//! audit trail behind the HTTP surface.

use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use super::analytics::{build_report, AnalyticsReport};
use super::audit::{AuditAction, AuditLogger};
use super::domain::{
    PatientIntake, PatientRequest, ProviderApplication, ProviderIntake, Submission,
    SubmissionKind, SubmissionRow, SubmissionStatus,
};
use super::export::{self, ExportError, ExportFormat};
use super::notify::{Channel, CommunicationOutcome, NotificationDispatcher};
use super::repository::{
    ListFilter, Page, PageRequest, RepositoryError, SubmissionRepository,
};
use super::validate;

/// Per-request context threaded through every operation so audit entries can
/// be joined on the originating request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub actor: Option<String>,
    pub source_ip: String,
    pub request_id: Uuid,
}

impl RequestContext {
    pub fn anonymous(source_ip: impl Into<String>, request_id: Uuid) -> Self {
        Self {
            actor: None,
            source_ip: source_ip.into(),
            request_id,
        }
    }

    pub fn authenticated(
        actor: impl Into<String>,
        source_ip: impl Into<String>,
        request_id: Uuid,
    ) -> Self {
        Self {
            actor: Some(actor.into()),
            source_ip: source_ip.into(),
            request_id,
        }
    }

    fn actor(&self) -> Option<&str> {
        self.actor.as_deref()
    }
}

/// Ad hoc staff communication request.
#[derive(Debug, Clone)]
pub struct CommunicationRequest {
    pub recipient_id: u64,
    pub kind: SubmissionKind,
    pub method: Channel,
    pub subject: Option<String>,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionServiceError {
    #[error("validation failed")]
    Validation(Vec<String>),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

pub struct SubmissionService<R> {
    repository: Arc<R>,
    dispatcher: NotificationDispatcher,
    audit: AuditLogger,
}

impl<R> SubmissionService<R>
where
    R: SubmissionRepository + 'static,
{
    pub fn new(repository: Arc<R>, dispatcher: NotificationDispatcher, audit: AuditLogger) -> Self {
        Self {
            repository,
            dispatcher,
            audit,
        }
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    /// Validate, persist, notify, and audit a public patient-assistance
    /// submission. Notification failures never surface here.
    pub fn submit_patient(
        &self,
        ctx: &RequestContext,
        intake: PatientIntake,
    ) -> Result<PatientRequest, SubmissionServiceError> {
        let new = validate::patient_request(intake).map_err(SubmissionServiceError::Validation)?;
        let stored = self.repository.create_patient(new)?;

        self.dispatcher
            .notify_new_submission(&Submission::Patient(stored.clone()));

        self.audit.record(
            ctx.actor(),
            AuditAction::PatientRequestCreated,
            SubmissionKind::Patient.table(),
            json!({ "submissionId": stored.id, "urgency": stored.urgency.label() }),
            &ctx.source_ip,
            ctx.request_id,
        );

        Ok(stored)
    }

    /// Public provider-application intake, same pipeline as patient intake.
    pub fn submit_provider(
        &self,
        ctx: &RequestContext,
        intake: ProviderIntake,
    ) -> Result<ProviderApplication, SubmissionServiceError> {
        let new =
            validate::provider_application(intake).map_err(SubmissionServiceError::Validation)?;
        let stored = self.repository.create_provider(new)?;

        self.dispatcher
            .notify_new_submission(&Submission::Provider(stored.clone()));

        self.audit.record(
            ctx.actor(),
            AuditAction::ProviderApplicationCreated,
            SubmissionKind::Provider.table(),
            json!({ "applicationId": stored.id }),
            &ctx.source_ip,
            ctx.request_id,
        );

        Ok(stored)
    }

    /// Staff listing across both tables.
    pub fn list(
        &self,
        ctx: &RequestContext,
        filter: &ListFilter,
        page: PageRequest,
    ) -> Result<Page<SubmissionRow>, SubmissionServiceError> {
        let result = self.repository.list(filter, page)?;

        self.audit.record(
            ctx.actor(),
            AuditAction::ViewSubmissions,
            "submissions",
            json!({
                "status": filter.status.map(SubmissionStatus::label),
                "type": filter.kind.map(SubmissionKind::label),
                "page": result.page,
            }),
            &ctx.source_ip,
            ctx.request_id,
        );

        Ok(result)
    }

    /// Staff status transition. The audit entry carries both the old and new
    /// status; a repeat call with the same target status succeeds and audits
    /// old == new.
    pub fn update_status(
        &self,
        ctx: &RequestContext,
        kind: SubmissionKind,
        id: u64,
        status: SubmissionStatus,
        notes: Option<&str>,
    ) -> Result<Submission, SubmissionServiceError> {
        let transition = self.repository.update_status(kind, id, status)?;

        self.dispatcher
            .notify_status_change(&transition.submission, status);

        self.audit.record(
            ctx.actor(),
            AuditAction::UpdateSubmissionStatus,
            kind.table(),
            json!({
                "submissionId": id,
                "oldStatus": transition.previous.label(),
                "newStatus": status.label(),
                "notes": notes,
            }),
            &ctx.source_ip,
            ctx.request_id,
        );

        Ok(transition.submission)
    }

    /// Ad hoc message to a submitter; NotFound when the recipient id is
    /// unknown in the requested table.
    pub fn send_communication(
        &self,
        ctx: &RequestContext,
        request: &CommunicationRequest,
    ) -> Result<CommunicationOutcome, SubmissionServiceError> {
        let submission = self
            .repository
            .get(request.kind, request.recipient_id)?
            .ok_or(RepositoryError::NotFound)?;

        let outcome = self.dispatcher.send_direct(
            &submission,
            request.method,
            request.subject.as_deref(),
            &request.message,
        );

        self.audit.record(
            ctx.actor(),
            AuditAction::SendCommunication,
            "communications",
            json!({
                "recipientId": request.recipient_id,
                "type": request.kind.label(),
                "method": request.method.label(),
                "delivered": outcome.delivered,
            }),
            &ctx.source_ip,
            ctx.request_id,
        );

        Ok(outcome)
    }

    /// Filtered dump in the requested format.
    pub fn export(
        &self,
        ctx: &RequestContext,
        format: ExportFormat,
        filter: &ListFilter,
    ) -> Result<String, SubmissionServiceError> {
        let submissions = self.repository.snapshot(filter)?;
        let body = export::render(format, &submissions, filter.kind)?;

        self.audit.record(
            ctx.actor(),
            AuditAction::ExportData,
            "export",
            json!({
                "format": format.extension(),
                "type": filter.kind.map(SubmissionKind::label),
                "rows": submissions.len(),
            }),
            &ctx.source_ip,
            ctx.request_id,
        );

        Ok(body)
    }

    /// Aggregates over an optional date range.
    pub fn analytics(
        &self,
        ctx: &RequestContext,
        filter: &ListFilter,
    ) -> Result<AnalyticsReport, SubmissionServiceError> {
        let submissions = self.repository.snapshot(filter)?;
        let report = build_report(&submissions);

        self.audit.record(
            ctx.actor(),
            AuditAction::ViewAnalytics,
            "analytics",
            json!({
                "from": filter.from.map(|at| at.to_rfc3339()),
                "to": filter.to.map(|at| at.to_rfc3339()),
            }),
            &ctx.source_ip,
            ctx.request_id,
        );

        Ok(report)
    }

    /// Datastore liveness for the health endpoint.
    pub fn ping(&self) -> Result<(), RepositoryError> {
        self.repository.ping()
    }
}
