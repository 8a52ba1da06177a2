use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::verification::queue::{ScheduleError, VerificationRequest, VerificationScheduler};

use super::auth::Principal;
use super::domain::{
    ApplicationId, ApplicationStatus, EvidenceKind, EvidenceUploads, InstallationFacts,
    ValidationError, ValidationReport, VerificationReport,
};
use super::evidence::{EvidenceStore, StorageError, StorageKey};
use super::repository::{
    ApplicationRecord, ApplicationRepository, EvidenceKeys, NewApplication, RepositoryError,
};

/// Lifecycle manager composing the evidence store, the record store, and the
/// verification scheduler. All collaborators are injected at construction.
pub struct ApplicationService<R, E> {
    repository: Arc<R>,
    evidence: Arc<E>,
    scheduler: Arc<dyn VerificationScheduler>,
}

impl<R, E> ApplicationService<R, E>
where
    R: ApplicationRepository + 'static,
    E: EvidenceStore + 'static,
{
    pub fn new(
        repository: Arc<R>,
        evidence: Arc<E>,
        scheduler: Arc<dyn VerificationScheduler>,
    ) -> Self {
        Self {
            repository,
            evidence,
            scheduler,
        }
    }

    /// Validates and persists a new application, then schedules exactly one
    /// verification run. Returns as soon as the record is durable; the caller
    /// never waits for verification.
    pub async fn submit(
        &self,
        principal: &Principal,
        facts: InstallationFacts,
        uploads: EvidenceUploads,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        // Single aggregated pass over facts and evidence slots, before any
        // storage write.
        let mut validation = ValidationReport::default();
        facts.validate_into(&mut validation);
        uploads.validate_into(&mut validation);
        validation.finish()?;

        let evidence = match self.store_evidence(principal, &uploads).await {
            Ok(evidence) => evidence,
            Err((stored, error)) => {
                self.discard_evidence(&stored).await;
                return Err(ApplicationServiceError::Storage(error));
            }
        };

        let stored_keys: Vec<StorageKey> = evidence.keys().into_iter().cloned().collect();
        let application = NewApplication {
            owner: principal.id.clone(),
            facts,
            evidence,
            submitted_at: Utc::now(),
        };

        let record = match self.repository.insert(application).await {
            Ok(record) => record,
            Err(error) => {
                self.discard_evidence(&stored_keys).await;
                return Err(ApplicationServiceError::Repository(error));
            }
        };

        self.scheduler.schedule(VerificationRequest {
            application_id: record.id.clone(),
            owner_contact: principal.contact.clone(),
        })?;

        info!(application_id = %record.id, owner = %record.owner, "application submitted");
        Ok(record)
    }

    /// Stores the three evidence files in slot order. On failure, returns the
    /// keys stored so far so the caller can discard them.
    async fn store_evidence(
        &self,
        principal: &Principal,
        uploads: &EvidenceUploads,
    ) -> Result<EvidenceKeys, (Vec<StorageKey>, StorageError)> {
        let mut stored: Vec<StorageKey> = Vec::with_capacity(3);

        let wide_rooftop = match self
            .store_slot(principal, uploads, EvidenceKind::WideRooftop, &mut stored)
            .await
        {
            Ok(key) => key,
            Err(error) => return Err((stored, error)),
        };
        let serial_number = match self
            .store_slot(principal, uploads, EvidenceKind::SerialNumber, &mut stored)
            .await
        {
            Ok(key) => key,
            Err(error) => return Err((stored, error)),
        };
        let inverter = match self
            .store_slot(principal, uploads, EvidenceKind::Inverter, &mut stored)
            .await
        {
            Ok(key) => key,
            Err(error) => return Err((stored, error)),
        };

        Ok(EvidenceKeys {
            wide_rooftop,
            serial_number,
            inverter,
        })
    }

    /// Stores one evidence slot and records its key so an aborted submission
    /// can discard everything written so far.
    async fn store_slot(
        &self,
        principal: &Principal,
        uploads: &EvidenceUploads,
        kind: EvidenceKind,
        stored: &mut Vec<StorageKey>,
    ) -> Result<StorageKey, StorageError> {
        // Presence was validated before any storage write.
        let content = uploads.slot(kind).unwrap_or_default();
        let key = self
            .evidence
            .store(&principal.id, kind.label(), content)
            .await?;
        stored.push(key.clone());
        Ok(key)
    }

    /// Best-effort cleanup after an aborted submission. Failures are logged
    /// and never raised; the submission has already failed.
    async fn discard_evidence(&self, keys: &[StorageKey]) {
        for key in keys {
            if let Err(error) = self.evidence.delete(key).await {
                warn!(%key, %error, "failed to discard orphaned evidence");
            }
        }
    }

    /// Returns the current record for its owner. Unknown ids and records
    /// owned by someone else fail identically.
    pub async fn get_application(
        &self,
        principal: &Principal,
        id: &ApplicationId,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        self.repository
            .find_one(id, &principal.id)
            .await?
            .ok_or(ApplicationServiceError::NotFound)
    }

    /// Returns the verification report once a terminal status is reached.
    pub async fn get_report(
        &self,
        principal: &Principal,
        id: &ApplicationId,
    ) -> Result<VerificationReport, ApplicationServiceError> {
        let record = self
            .repository
            .find_one(id, &principal.id)
            .await?
            .ok_or(ApplicationServiceError::NotFound)?;

        if !record.status.is_terminal() {
            return Err(ApplicationServiceError::ReportPending {
                status: record.status,
            });
        }

        // A terminal status without a report is a data-integrity fault and is
        // surfaced loudly rather than masked.
        record
            .report
            .ok_or(ApplicationServiceError::IntegrityViolation { id: id.clone() })
    }
}

/// Error raised by the application lifecycle manager.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("could not persist evidence: {0}")]
    Storage(#[from] StorageError),
    #[error("application not found")]
    NotFound,
    #[error("verification is still in progress (current status: {status})")]
    ReportPending { status: ApplicationStatus },
    #[error("application {id} reached a terminal status without a report")]
    IntegrityViolation { id: ApplicationId },
    #[error("verification could not be scheduled: {0}")]
    Schedule(#[from] ScheduleError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
