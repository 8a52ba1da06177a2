use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicationId, ApplicationStatus, InstallationFacts, PrincipalId, VerificationReport,
};
use super::evidence::StorageKey;

/// Storage keys for all three mandatory evidence slots.
///
/// Constructed only once every slot has been durably stored, so a persisted
/// record can never reference partial evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceKeys {
    pub wide_rooftop: StorageKey,
    pub serial_number: StorageKey,
    pub inverter: StorageKey,
}

impl EvidenceKeys {
    pub fn keys(&self) -> [&StorageKey; 3] {
        [&self.wide_rooftop, &self.serial_number, &self.inverter]
    }
}

/// Document handed to the record store at creation; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub owner: PrincipalId,
    pub facts: InstallationFacts,
    pub evidence: EvidenceKeys,
    pub submitted_at: DateTime<Utc>,
}

/// Persisted application document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: ApplicationId,
    pub owner: PrincipalId,
    pub facts: InstallationFacts,
    pub evidence: EvidenceKeys,
    pub status: ApplicationStatus,
    pub report: Option<VerificationReport>,
    pub submitted_at: DateTime<Utc>,
}

impl ApplicationRecord {
    /// Owner-facing projection returned by the read endpoints.
    pub fn view(&self) -> ApplicationView {
        ApplicationView {
            application_id: self.id.clone(),
            status: self.status.label(),
            facts: self.facts.clone(),
            evidence: self.evidence.clone(),
            report: self.report.clone(),
            submitted_at: self.submitted_at,
        }
    }
}

/// Serialized representation of an application for API responses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationView {
    pub application_id: ApplicationId,
    pub status: &'static str,
    pub facts: InstallationFacts,
    pub evidence: EvidenceKeys,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<VerificationReport>,
    pub submitted_at: DateTime<Utc>,
}

/// Document store holding application records, keyed by id.
///
/// After creation the orchestrator is the sole writer of status and report;
/// read paths never mutate. `complete` must apply status and report as one
/// atomic update so concurrent readers observe either the pre- or the
/// post-transition document, never a mix.
#[async_trait]
pub trait ApplicationRepository: Send + Sync {
    /// Persists a new record with status `Submitted` and no report,
    /// returning the stored document with its assigned id.
    async fn insert(&self, application: NewApplication)
        -> Result<ApplicationRecord, RepositoryError>;

    /// Owner-scoped lookup. Returns `None` both for an unknown id and for a
    /// record owned by someone else, so existence never leaks to non-owners.
    async fn find_one(
        &self,
        id: &ApplicationId,
        owner: &PrincipalId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError>;

    /// Owner-agnostic lookup used by the verification orchestrator.
    async fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;

    /// Advances `Submitted -> Verifying`; any other starting status is an
    /// invalid transition.
    async fn mark_verifying(&self, id: &ApplicationId) -> Result<(), RepositoryError>;

    /// Atomically writes the terminal status and its report. Completing an
    /// already-terminal record is an invalid transition.
    async fn complete(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        report: VerificationReport,
    ) -> Result<(), RepositoryError>;
}

/// Error enumeration for record-store failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("record not found")]
    NotFound,
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: ApplicationStatus,
        to: ApplicationStatus,
    },
    #[error("record store unavailable: {0}")]
    Unavailable(String),
}
