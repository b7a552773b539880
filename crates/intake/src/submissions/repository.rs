//! Persistence abstraction owning the two submission tables plus the audit
//! and notification tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::audit::AuditLogEntry;
use super::domain::{
    NewPatientRequest, NewProviderApplication, PatientRequest, ProviderApplication, Submission,
    SubmissionKind, SubmissionRow, SubmissionStatus,
};
use super::notify::NotificationRecord;

/// Filter applied to listing, export, and analytics queries. Date bounds are
/// inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub status: Option<SubmissionStatus>,
    pub kind: Option<SubmissionKind>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl ListFilter {
    pub fn matches(&self, row: &SubmissionRow) -> bool {
        if let Some(status) = self.status {
            if row.status != status {
                return false;
            }
        }
        if let Some(kind) = self.kind {
            if row.kind != kind {
                return false;
            }
        }
        if let Some(from) = self.from {
            if row.created_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if row.created_at > to {
                return false;
            }
        }
        true
    }
}

/// 1-indexed pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 20 }
    }
}

impl PageRequest {
    /// Clamp out-of-range values rather than erroring; page 0 reads as 1.
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            limit: self.limit.max(1),
        }
    }

    pub fn offset(self) -> usize {
        let normalized = self.normalized();
        (normalized.page as usize - 1) * normalized.limit as usize
    }
}

/// A page of rows plus the total count for the unpaginated query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub pages: u32,
}

impl<T> Page<T> {
    /// Slice an already-filtered, already-sorted row set down to one page.
    pub fn build(rows: Vec<T>, request: PageRequest) -> Self {
        let request = request.normalized();
        let total = rows.len() as u64;
        let pages = (total as u32).div_ceil(request.limit);
        let rows = rows
            .into_iter()
            .skip(request.offset())
            .take(request.limit as usize)
            .collect();
        Self {
            rows,
            total,
            page: request.page,
            pages,
        }
    }
}

/// Result of a status update: the prior status is retained for the audit
/// trail, the record carries the bumped `updated_at`.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusTransition {
    pub previous: SubmissionStatus,
    pub submission: Submission,
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("datastore unavailable: {0}")]
    Unavailable(String),
}

/// Storage contract for the intake service. Every method is a single logical
/// transaction: implementations must not expose partially applied writes to
/// concurrent callers.
pub trait SubmissionRepository: Send + Sync {
    fn create_patient(&self, new: NewPatientRequest) -> Result<PatientRequest, RepositoryError>;

    fn create_provider(
        &self,
        new: NewProviderApplication,
    ) -> Result<ProviderApplication, RepositoryError>;

    /// Combined listing across both tables, sorted by `created_at`
    /// descending when no kind is specified.
    fn list(
        &self,
        filter: &ListFilter,
        page: PageRequest,
    ) -> Result<Page<SubmissionRow>, RepositoryError>;

    fn get(&self, kind: SubmissionKind, id: u64) -> Result<Option<Submission>, RepositoryError>;

    /// Read-modify-write: returns the prior status alongside the updated
    /// record, failing with [`RepositoryError::NotFound`] on an unknown id.
    fn update_status(
        &self,
        kind: SubmissionKind,
        id: u64,
        status: SubmissionStatus,
    ) -> Result<StatusTransition, RepositoryError>;

    /// Full filtered records, newest first, for export and analytics.
    fn snapshot(&self, filter: &ListFilter) -> Result<Vec<Submission>, RepositoryError>;

    /// Cheap liveness probe used by the health endpoint.
    fn ping(&self) -> Result<(), RepositoryError>;
}

/// Durable sink for audit entries, implemented by the backing store.
pub trait AuditSink: Send + Sync {
    fn append_audit(&self, entry: &AuditLogEntry) -> Result<(), RepositoryError>;
}

/// Durable sink for notification delivery records.
pub trait NotificationLog: Send + Sync {
    fn append_notification(&self, record: &NotificationRecord) -> Result<(), RepositoryError>;
}
