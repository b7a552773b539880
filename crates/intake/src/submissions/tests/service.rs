use serde_json::json;
use uuid::Uuid;

use super::common::*;
use crate::submissions::domain::{PatientIntake, ProviderIntake, SubmissionKind, SubmissionStatus};
use crate::submissions::notify::Channel;
use crate::submissions::repository::{
    ListFilter, PageRequest, RepositoryError, SubmissionRepository,
};
use crate::submissions::service::{
    CommunicationRequest, RequestContext, SubmissionServiceError,
};

fn anonymous() -> RequestContext {
    RequestContext::anonymous("203.0.113.9", Uuid::new_v4())
}

fn staff() -> RequestContext {
    RequestContext::authenticated("staff-7", "203.0.113.9", Uuid::new_v4())
}

fn patient_intake(urgency: &str) -> PatientIntake {
    serde_json::from_value(json!({
        "name": "Jane Doe",
        "email": "jane@example.com",
        "phone": "+1 512 555 0111",
        "location": "Austin, TX",
        "urgency": urgency,
    }))
    .expect("intake deserializes")
}

#[test]
fn patient_submission_persists_notifies_and_audits() {
    let harness = harness();

    let stored = harness
        .service
        .submit_patient(&anonymous(), patient_intake("medium"))
        .expect("submission succeeds");

    assert_eq!(stored.id, 1);
    assert_eq!(stored.status, SubmissionStatus::Pending);
    assert_eq!(stored.created_at, stored.updated_at);

    // Admin alert plus submitter confirmation.
    let sent = harness.email.sent.lock().expect("email mutex poisoned");
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].to, "admin@tna.org");
    assert_eq!(sent[1].to, "jane@example.com");

    let entries = harness.audit.entries.lock().expect("audit mutex poisoned");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action.label(), "PATIENT_REQUEST_CREATED");
    assert_eq!(entries[0].actor, "anonymous");
    assert_eq!(entries[0].details["submissionId"], json!(1));
}

#[test]
fn emergency_submission_escalates_over_sms() {
    let harness = harness();

    harness
        .service
        .submit_patient(&anonymous(), patient_intake("emergency"))
        .expect("submission succeeds");

    let texts = harness.sms.sent.lock().expect("sms mutex poisoned");
    assert_eq!(texts.len(), 1);
    assert_eq!(texts[0].to, "+15125550100");

    // Two email records and one SMS record in the delivery log.
    let records = harness
        .notifications
        .records
        .lock()
        .expect("notification mutex poisoned");
    assert_eq!(records.len(), 3);
}

#[test]
fn invalid_intake_reports_every_field_error() {
    let harness = harness();

    let err = harness
        .service
        .submit_patient(&anonymous(), PatientIntake::default())
        .expect_err("empty intake rejected");

    let SubmissionServiceError::Validation(errors) = err else {
        panic!("expected validation failure");
    };
    assert!(errors.iter().any(|e| e.contains("name")));
    assert!(errors.iter().any(|e| e.contains("email")));
    assert!(errors.iter().any(|e| e.contains("location")));

    // Nothing persisted, nothing audited.
    assert!(harness
        .repository
        .snapshot(&ListFilter::default())
        .expect("snapshot succeeds")
        .is_empty());
    assert!(harness.audit.labels().is_empty());
}

#[test]
fn provider_submission_requires_phone_and_credentials() {
    let harness = harness();

    let intake: ProviderIntake = serde_json::from_value(json!({
        "name": "Dr. Smith",
        "email": "smith@clinic.example",
        "location": "Dallas, TX",
    }))
    .expect("intake deserializes");

    let err = harness
        .service
        .submit_provider(&anonymous(), intake)
        .expect_err("incomplete application rejected");
    let SubmissionServiceError::Validation(errors) = err else {
        panic!("expected validation failure");
    };
    assert!(errors.iter().any(|e| e.contains("phone")));
    assert!(errors.iter().any(|e| e.contains("credentials")));
}

#[test]
fn status_update_records_old_and_new_status() {
    let harness = harness();
    let stored = harness
        .service
        .submit_patient(&anonymous(), patient_intake("low"))
        .expect("submission succeeds");

    let updated = harness
        .service
        .update_status(
            &staff(),
            SubmissionKind::Patient,
            stored.id,
            SubmissionStatus::Approved,
            Some("verified insurance"),
        )
        .expect("update succeeds");

    assert_eq!(updated.status(), SubmissionStatus::Approved);

    let entries = harness.audit.entries.lock().expect("audit mutex poisoned");
    let entry = entries.last().expect("audit entry written");
    assert_eq!(entry.action.label(), "UPDATE_SUBMISSION_STATUS");
    assert_eq!(entry.actor, "staff-7");
    assert_eq!(entry.details["oldStatus"], json!("pending"));
    assert_eq!(entry.details["newStatus"], json!("approved"));
    assert_eq!(entry.details["notes"], json!("verified insurance"));
}

#[test]
fn reapplying_the_current_status_still_succeeds() {
    let harness = harness();
    let stored = harness
        .service
        .submit_patient(&anonymous(), patient_intake("low"))
        .expect("submission succeeds");

    let updated = harness
        .service
        .update_status(
            &staff(),
            SubmissionKind::Patient,
            stored.id,
            SubmissionStatus::Pending,
            None,
        )
        .expect("idempotent update succeeds");
    assert_eq!(updated.status(), SubmissionStatus::Pending);
}

#[test]
fn status_change_emails_the_submitter() {
    let harness = harness();
    let stored = harness
        .service
        .submit_patient(&anonymous(), patient_intake("low"))
        .expect("submission succeeds");

    harness
        .service
        .update_status(
            &staff(),
            SubmissionKind::Patient,
            stored.id,
            SubmissionStatus::Approved,
            None,
        )
        .expect("update succeeds");

    let sent = harness.email.sent.lock().expect("email mutex poisoned");
    let update = sent.last().expect("status email sent");
    assert_eq!(update.to, "jane@example.com");
    assert!(update.body.contains("has been approved"));
}

#[test]
fn communication_to_unknown_recipient_is_not_found() {
    let harness = harness();

    let err = harness
        .service
        .send_communication(
            &staff(),
            &CommunicationRequest {
                recipient_id: 999,
                kind: SubmissionKind::Patient,
                method: Channel::Email,
                subject: None,
                message: "checking in".to_string(),
            },
        )
        .expect_err("unknown recipient rejected");
    assert!(matches!(
        err,
        SubmissionServiceError::Repository(RepositoryError::NotFound)
    ));
}

#[test]
fn listing_is_audited_with_the_actor() {
    let harness = harness();
    harness
        .service
        .submit_patient(&anonymous(), patient_intake("low"))
        .expect("submission succeeds");

    let page = harness
        .service
        .list(&staff(), &ListFilter::default(), PageRequest::default())
        .expect("list succeeds");
    assert_eq!(page.total, 1);
    assert_eq!(
        harness.audit.labels(),
        vec!["PATIENT_REQUEST_CREATED", "VIEW_SUBMISSIONS"]
    );
}
