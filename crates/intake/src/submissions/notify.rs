//! Outbound notification dispatch with fallback provider chains.
//!
//! Email and SMS providers are modeled as ordered lists of
//! capability-equivalent sinks tried in sequence, first success wins. The
//! dispatcher never raises to the caller: every failure is logged, and each
//! attempted channel produces exactly one [`NotificationRecord`] reflecting
//! the outcome, so a delivery problem can never fail the business operation
//! that triggered it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{keys, ParameterCache};

use super::domain::{PatientRequest, Submission, SubmissionKind, SubmissionStatus};
use super::repository::NotificationLog;

/// SMS bodies are truncated to a single segment.
const SMS_SEGMENT_LIMIT: usize = 160;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
}

impl Channel {
    pub const fn label(self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "email" => Some(Channel::Email),
            "sms" => Some(Channel::Sms),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Delivered,
    Failed,
}

/// Traceability record written after each attempted channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub channel: Channel,
    pub recipient: String,
    pub summary: String,
    /// Provider that delivered, or the last provider tried on failure.
    pub provider: Option<String>,
    pub outcome: DeliveryOutcome,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SmsMessage {
    pub to: String,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("transport unavailable: {0}")]
    Transport(String),
    #[error("provider rejected message: {0}")]
    Rejected(String),
}

/// Email delivery adapter (SendGrid, SES, and friends).
pub trait EmailSink: Send + Sync {
    fn name(&self) -> &str;
    fn send(&self, message: &EmailMessage) -> Result<(), SinkError>;
}

/// SMS delivery adapter (Twilio, SNS, and friends).
pub trait SmsSink: Send + Sync {
    fn name(&self) -> &str;
    fn send(&self, message: &SmsMessage) -> Result<(), SinkError>;
}

/// Outcome of an ad hoc staff communication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommunicationOutcome {
    pub delivered: bool,
    pub method: Channel,
}

pub struct NotificationDispatcher {
    email: Vec<Arc<dyn EmailSink>>,
    sms: Vec<Arc<dyn SmsSink>>,
    log: Arc<dyn NotificationLog>,
    params: Arc<ParameterCache>,
}

impl NotificationDispatcher {
    pub fn new(
        email: Vec<Arc<dyn EmailSink>>,
        sms: Vec<Arc<dyn SmsSink>>,
        log: Arc<dyn NotificationLog>,
        params: Arc<ParameterCache>,
    ) -> Self {
        Self {
            email,
            sms,
            log,
            params,
        }
    }

    /// Admin alert plus submitter confirmation, with SMS escalation for
    /// urgent patient requests. Confirmation failures never block the admin
    /// alert; nothing here blocks the API response.
    pub fn notify_new_submission(&self, submission: &Submission) {
        if let Some(admin_email) = self.params.get(keys::ADMIN_EMAIL) {
            let message = EmailMessage {
                to: admin_email,
                subject: admin_alert_subject(submission),
                body: admin_alert_body(submission, self.params.get(keys::FRONTEND_URL).as_deref()),
            };
            self.deliver_email(message, &format!("new {}", submission.kind().label()));
        } else {
            tracing::warn!("no admin email configured, skipping admin alert");
        }

        if !submission.email().is_empty() {
            let message = EmailMessage {
                to: submission.email().to_string(),
                subject: "We received your request - True North Advocates".to_string(),
                body: confirmation_body(submission),
            };
            self.deliver_email(message, "submitter confirmation");
        }

        if let Submission::Patient(request) = submission {
            if request.urgency.is_urgent() {
                match self.params.get(keys::ADMIN_PHONE) {
                    Some(admin_phone) => {
                        let message = SmsMessage {
                            to: admin_phone,
                            body: urgent_sms_body(request),
                        };
                        self.deliver_sms(message, "urgent escalation");
                    }
                    // Absence of a phone is a no-op, not an error.
                    None => tracing::debug!("no admin phone configured, skipping SMS escalation"),
                }
            }
        }
    }

    /// Status-specific message to the submitter; skipped without an email.
    pub fn notify_status_change(&self, submission: &Submission, status: SubmissionStatus) {
        if submission.email().is_empty() {
            return;
        }
        let message = EmailMessage {
            to: submission.email().to_string(),
            subject: "Update on Your True North Advocates Request".to_string(),
            body: status_change_body(submission, status),
        };
        self.deliver_email(message, &format!("status {}", status.label()));
    }

    /// Ad hoc staff message to a submitter over the requested channel.
    pub fn send_direct(
        &self,
        submission: &Submission,
        method: Channel,
        subject: Option<&str>,
        body: &str,
    ) -> CommunicationOutcome {
        let delivered = match method {
            Channel::Email => {
                let message = EmailMessage {
                    to: submission.email().to_string(),
                    subject: subject
                        .unwrap_or("Update from True North Advocates")
                        .to_string(),
                    body: body.to_string(),
                };
                self.deliver_email(message, "staff communication")
            }
            Channel::Sms => match submission.phone() {
                Some(phone) => {
                    let message = SmsMessage {
                        to: phone.to_string(),
                        body: truncate_sms(body),
                    };
                    self.deliver_sms(message, "staff communication")
                }
                None => {
                    tracing::warn!(
                        submission_id = submission.id(),
                        "no phone on file, cannot send SMS communication"
                    );
                    false
                }
            },
        };
        CommunicationOutcome { delivered, method }
    }

    fn deliver_email(&self, message: EmailMessage, summary: &str) -> bool {
        let mut last_provider = None;
        let mut delivered = None;
        for sink in &self.email {
            last_provider = Some(sink.name().to_string());
            match sink.send(&message) {
                Ok(()) => {
                    delivered = Some(sink.name().to_string());
                    break;
                }
                Err(err) => {
                    tracing::warn!(provider = sink.name(), %err, "email delivery failed");
                }
            }
        }
        self.record(Channel::Email, &message.to, summary, last_provider, delivered.is_some());
        delivered.is_some()
    }

    fn deliver_sms(&self, message: SmsMessage, summary: &str) -> bool {
        let mut last_provider = None;
        let mut delivered = None;
        for sink in &self.sms {
            last_provider = Some(sink.name().to_string());
            match sink.send(&message) {
                Ok(()) => {
                    delivered = Some(sink.name().to_string());
                    break;
                }
                Err(err) => {
                    tracing::warn!(provider = sink.name(), %err, "sms delivery failed");
                }
            }
        }
        self.record(Channel::Sms, &message.to, summary, last_provider, delivered.is_some());
        delivered.is_some()
    }

    fn record(
        &self,
        channel: Channel,
        recipient: &str,
        summary: &str,
        provider: Option<String>,
        delivered: bool,
    ) {
        let record = NotificationRecord {
            channel,
            recipient: recipient.to_string(),
            summary: summary.to_string(),
            provider,
            outcome: if delivered {
                DeliveryOutcome::Delivered
            } else {
                DeliveryOutcome::Failed
            },
            created_at: Utc::now(),
        };
        if let Err(err) = self.log.append_notification(&record) {
            tracing::error!(%err, channel = channel.label(), "notification record write failed");
        }
    }
}

fn admin_alert_subject(submission: &Submission) -> String {
    match submission.kind() {
        SubmissionKind::Patient => "New Patient Request".to_string(),
        SubmissionKind::Provider => "New Provider Application".to_string(),
    }
}

fn admin_alert_body(submission: &Submission, frontend_url: Option<&str>) -> String {
    let mut body = String::new();
    match submission {
        Submission::Patient(request) => {
            match request.urgency.label() {
                "emergency" => body.push_str("EMERGENCY REQUEST\n\n"),
                "high" => body.push_str("HIGH PRIORITY\n\n"),
                _ => {}
            }
            body.push_str("New Patient Request\n\n");
            body.push_str(&format!("Name: {}\n", request.name));
            body.push_str(&format!("Email: {}\n", request.email));
            body.push_str(&format!(
                "Phone: {}\n",
                request.phone.as_deref().unwrap_or("Not provided")
            ));
            body.push_str(&format!("Location: {}\n", request.location));
            body.push_str(&format!("Urgency: {}\n", request.urgency.label().to_uppercase()));
            if let Some(wound_type) = &request.wound_type {
                body.push_str(&format!("Wound Type: {wound_type}\n"));
            }
            if let Some(message) = &request.message {
                body.push_str(&format!("\nMessage:\n{message}\n"));
            }
        }
        Submission::Provider(application) => {
            body.push_str("New Provider Application\n\n");
            body.push_str(&format!("Name: {}\n", application.name));
            body.push_str(&format!("Email: {}\n", application.email));
            body.push_str(&format!("Phone: {}\n", application.phone));
            body.push_str(&format!("Location: {}\n", application.location));
            body.push_str(&format!("Credentials: {}\n", application.credentials));
            if !application.specialties.is_empty() {
                body.push_str(&format!(
                    "Specialties: {}\n",
                    application.specialties.join(", ")
                ));
            }
        }
    }
    if let Some(url) = frontend_url {
        body.push_str(&format!("\nReview: {url}/admin/submissions.html\n"));
    } else {
        body.push_str("\nLogin to the admin dashboard to view and respond.\n");
    }
    body
}

fn confirmation_body(submission: &Submission) -> String {
    let (kind_phrase, review_window) = match submission {
        Submission::Patient(request) => (
            "patient assistance request",
            if request.urgency == super::domain::Urgency::Emergency {
                "2-4 hours"
            } else {
                "24-48 hours"
            },
        ),
        Submission::Provider(_) => ("provider application", "24-48 hours"),
    };
    format!(
        "Thank you for reaching out, {}!\n\n\
         We have received your {kind_phrase}.\n\n\
         What happens next:\n\
         - Review within {review_window}\n\
         - We'll contact you via {}\n\
         - For urgent needs, call 1-800-TRUENORTH\n\n\
         Your reference number: #{}\n\n\
         Questions? Email help@truenorthadvocates.org",
        submission.name(),
        if submission.phone().is_some() {
            "phone or email"
        } else {
            "email"
        },
        submission.id(),
    )
}

fn urgent_sms_body(request: &PatientRequest) -> String {
    truncate_sms(&format!(
        "URGENT: New patient request from {} in {}. Check dashboard immediately.",
        request.name, request.location
    ))
}

fn status_change_body(submission: &Submission, status: SubmissionStatus) -> String {
    let copy = match status {
        SubmissionStatus::Approved => {
            "Your request has been approved! We will be contacting you shortly with next steps."
        }
        SubmissionStatus::Contacted => {
            "We have attempted to contact you. Please check your email and phone for our message."
        }
        SubmissionStatus::InProgress => {
            "Your request is being actively processed by our team."
        }
        SubmissionStatus::Completed => {
            "Your request has been completed. Thank you for choosing True North Advocates!"
        }
        SubmissionStatus::Rejected => {
            "Unfortunately, we are unable to process your request at this time. \
             Please contact us for more information."
        }
        _ => "Your request status has been updated.",
    };
    format!(
        "Status Update\n\n\
         Dear {},\n\n\
         {copy}\n\n\
         New Status: {}\n\
         Reference Number: #{}\n\n\
         Questions? Contact us at help@truenorthadvocates.org or call 1-800-TRUENORTH.",
        submission.name(),
        status.label().to_uppercase(),
        submission.id(),
    )
}

fn truncate_sms(body: &str) -> String {
    body.chars().take(SMS_SEGMENT_LIMIT).collect()
}
