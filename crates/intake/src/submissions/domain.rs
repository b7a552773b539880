use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Escalation level attached to a patient-assistance request.
///
/// `high` and `emergency` drive SMS escalation to the admin phone in addition
/// to the usual email alert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Emergency,
}

impl Urgency {
    pub const fn label(self) -> &'static str {
        match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Emergency => "emergency",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Urgency::Low),
            "medium" => Some(Urgency::Medium),
            "high" => Some(Urgency::High),
            "emergency" => Some(Urgency::Emergency),
            _ => None,
        }
    }

    pub const fn is_urgent(self) -> bool {
        matches!(self, Urgency::High | Urgency::Emergency)
    }
}

/// Review status shared by both submission kinds. Transitions are driven
/// exclusively by staff action; the system never advances a status on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Pending,
    InProgress,
    Approved,
    Contacted,
    Completed,
    Rejected,
    Cancelled,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::InProgress => "in_progress",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Contacted => "contacted",
            SubmissionStatus::Completed => "completed",
            SubmissionStatus::Rejected => "rejected",
            SubmissionStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(SubmissionStatus::Pending),
            "in_progress" => Some(SubmissionStatus::InProgress),
            "approved" => Some(SubmissionStatus::Approved),
            "contacted" => Some(SubmissionStatus::Contacted),
            "completed" => Some(SubmissionStatus::Completed),
            "rejected" => Some(SubmissionStatus::Rejected),
            "cancelled" => Some(SubmissionStatus::Cancelled),
            _ => None,
        }
    }
}

/// Which of the two submission tables a record belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionKind {
    Patient,
    Provider,
}

impl SubmissionKind {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionKind::Patient => "patient",
            SubmissionKind::Provider => "provider",
        }
    }

    pub const fn table(self) -> &'static str {
        match self {
            SubmissionKind::Patient => "patient_requests",
            SubmissionKind::Provider => "provider_applications",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "patient" => Some(SubmissionKind::Patient),
            "provider" => Some(SubmissionKind::Provider),
            _ => None,
        }
    }
}

/// Stored patient-assistance request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatientRequest {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: String,
    pub wound_type: Option<String>,
    pub urgency: Urgency,
    pub message: Option<String>,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Stored provider application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderApplication {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub credentials: String,
    pub specialties: Vec<String>,
    pub location: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sanitized payload accepted by the repository when creating a patient
/// request. Ids and timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPatientRequest {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub location: String,
    pub wound_type: Option<String>,
    pub urgency: Urgency,
    pub message: Option<String>,
}

/// Sanitized payload accepted when creating a provider application.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProviderApplication {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub credentials: String,
    pub specialties: Vec<String>,
    pub location: String,
}

/// A record from either submission table, tagged for export and listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record_type", rename_all = "snake_case")]
pub enum Submission {
    Patient(PatientRequest),
    Provider(ProviderApplication),
}

impl Submission {
    pub fn id(&self) -> u64 {
        match self {
            Submission::Patient(record) => record.id,
            Submission::Provider(record) => record.id,
        }
    }

    pub const fn kind(&self) -> SubmissionKind {
        match self {
            Submission::Patient(_) => SubmissionKind::Patient,
            Submission::Provider(_) => SubmissionKind::Provider,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Submission::Patient(record) => &record.name,
            Submission::Provider(record) => &record.name,
        }
    }

    pub fn email(&self) -> &str {
        match self {
            Submission::Patient(record) => &record.email,
            Submission::Provider(record) => &record.email,
        }
    }

    pub fn phone(&self) -> Option<&str> {
        match self {
            Submission::Patient(record) => record.phone.as_deref(),
            Submission::Provider(record) => Some(&record.phone),
        }
    }

    pub fn location(&self) -> &str {
        match self {
            Submission::Patient(record) => &record.location,
            Submission::Provider(record) => &record.location,
        }
    }

    pub const fn status(&self) -> SubmissionStatus {
        match self {
            Submission::Patient(record) => record.status,
            Submission::Provider(record) => record.status,
        }
    }

    pub const fn created_at(&self) -> DateTime<Utc> {
        match self {
            Submission::Patient(record) => record.created_at,
            Submission::Provider(record) => record.created_at,
        }
    }

    pub const fn urgency(&self) -> Option<Urgency> {
        match self {
            Submission::Patient(record) => Some(record.urgency),
            Submission::Provider(_) => None,
        }
    }

    /// Unified listing view combining both tables.
    pub fn row(&self) -> SubmissionRow {
        SubmissionRow {
            id: self.id(),
            kind: self.kind(),
            name: self.name().to_string(),
            email: self.email().to_string(),
            location: self.location().to_string(),
            status: self.status(),
            created_at: self.created_at(),
            urgency: self.urgency(),
        }
    }
}

/// Flattened row returned by listing queries across both tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRow {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: SubmissionKind,
    pub name: String,
    pub email: String,
    pub location: String,
    pub status: SubmissionStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
}

/// Raw patient-assistance payload as posted by the public form. The body-map
/// widget submits the picked locations as a comma-joined string under either
/// `location` or `wound_location`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PatientIntake {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    #[serde(alias = "wound_location")]
    pub location: Option<String>,
    pub wound_type: Option<String>,
    pub urgency: Option<String>,
    pub message: Option<String>,
}

/// Raw provider application payload as posted by the public form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderIntake {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub credentials: Option<String>,
    #[serde(default)]
    pub specialties: Vec<String>,
    pub location: Option<String>,
}
