//! Filtered export of submissions as CSV or JSON.

use super::domain::{Submission, SubmissionKind};

/// Column order matches the stored field order of each table.
const PATIENT_HEADER: [&str; 11] = [
    "id",
    "name",
    "email",
    "phone",
    "location",
    "wound_type",
    "urgency",
    "message",
    "status",
    "created_at",
    "updated_at",
];

const PROVIDER_HEADER: [&str; 10] = [
    "id",
    "name",
    "email",
    "phone",
    "credentials",
    "specialties",
    "location",
    "status",
    "created_at",
    "updated_at",
];

const COMBINED_HEADER: [&str; 8] = [
    "id",
    "type",
    "name",
    "email",
    "location",
    "status",
    "created_at",
    "urgency",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    pub const fn content_type(self) -> &'static str {
        match self {
            ExportFormat::Csv => "text/csv",
            ExportFormat::Json => "application/json",
        }
    }

    pub const fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("csv encoding failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("export buffer was not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Render the filtered records in the requested format. CSV headers are
/// per-kind when a single kind was requested; a mixed export falls back to
/// the unified row shape.
pub fn render(
    format: ExportFormat,
    submissions: &[Submission],
    kind: Option<SubmissionKind>,
) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(submissions)?),
        ExportFormat::Csv => render_csv(submissions, kind),
    }
}

fn render_csv(
    submissions: &[Submission],
    kind: Option<SubmissionKind>,
) -> Result<String, ExportError> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    match kind {
        Some(SubmissionKind::Patient) => {
            writer.write_record(PATIENT_HEADER)?;
            for submission in submissions {
                if let Submission::Patient(record) = submission {
                    writer.write_record([
                        record.id.to_string(),
                        record.name.clone(),
                        record.email.clone(),
                        record.phone.clone().unwrap_or_default(),
                        record.location.clone(),
                        record.wound_type.clone().unwrap_or_default(),
                        record.urgency.label().to_string(),
                        record.message.clone().unwrap_or_default(),
                        record.status.label().to_string(),
                        record.created_at.to_rfc3339(),
                        record.updated_at.to_rfc3339(),
                    ])?;
                }
            }
        }
        Some(SubmissionKind::Provider) => {
            writer.write_record(PROVIDER_HEADER)?;
            for submission in submissions {
                if let Submission::Provider(record) = submission {
                    writer.write_record([
                        record.id.to_string(),
                        record.name.clone(),
                        record.email.clone(),
                        record.phone.clone(),
                        record.credentials.clone(),
                        record.specialties.join(","),
                        record.location.clone(),
                        record.status.label().to_string(),
                        record.created_at.to_rfc3339(),
                        record.updated_at.to_rfc3339(),
                    ])?;
                }
            }
        }
        None => {
            writer.write_record(COMBINED_HEADER)?;
            for submission in submissions {
                let row = submission.row();
                writer.write_record([
                    row.id.to_string(),
                    row.kind.label().to_string(),
                    row.name,
                    row.email,
                    row.location,
                    row.status.label().to_string(),
                    row.created_at.to_rfc3339(),
                    row.urgency.map(|u| u.label().to_string()).unwrap_or_default(),
                ])?;
            }
        }
    }

    let buffer = writer
        .into_inner()
        .map_err(|err| ExportError::Csv(err.into_error().into()))?;
    Ok(String::from_utf8(buffer)?)
}
