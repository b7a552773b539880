//! Aggregate reporting over the submission tables.

use std::collections::BTreeMap;

use serde::Serialize;

use super::domain::{Submission, SubmissionStatus};

/// Counts and aggregates surfaced on the staff dashboard. Field names are
/// part of the public response shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsReport {
    pub total_submissions: u64,
    pub patient_requests: u64,
    pub provider_applications: u64,
    pub urgent_requests: u64,
    /// Average hours from creation to the first status change, rounded,
    /// over patient requests that have left `pending`.
    pub average_response_time: i64,
    pub status_breakdown: BTreeMap<String, u64>,
}

pub fn build_report(submissions: &[Submission]) -> AnalyticsReport {
    let mut patient_requests = 0;
    let mut provider_applications = 0;
    let mut urgent_requests = 0;
    let mut status_breakdown: BTreeMap<String, u64> = BTreeMap::new();
    let mut response_hours = 0.0_f64;
    let mut responded = 0_u64;

    for submission in submissions {
        *status_breakdown
            .entry(submission.status().label().to_string())
            .or_default() += 1;

        match submission {
            Submission::Patient(record) => {
                patient_requests += 1;
                if record.urgency.is_urgent() {
                    urgent_requests += 1;
                }
                if record.status != SubmissionStatus::Pending {
                    let elapsed = record.updated_at - record.created_at;
                    response_hours += elapsed.num_seconds() as f64 / 3600.0;
                    responded += 1;
                }
            }
            Submission::Provider(_) => provider_applications += 1,
        }
    }

    let average_response_time = if responded > 0 {
        (response_hours / responded as f64).round() as i64
    } else {
        0
    };

    AnalyticsReport {
        total_submissions: patient_requests + provider_applications,
        patient_requests,
        provider_applications,
        urgent_requests,
        average_response_time,
        status_breakdown,
    }
}
