use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::applications::auth::{AuthError, Authenticator, Principal};
use crate::applications::domain::{
    ApplicationId, ApplicationStatus, EvidenceUploads, InstallationFacts, PrincipalId,
    VerificationReport,
};
use crate::applications::evidence::{EvidenceStore, StorageError, StorageKey};
use crate::applications::repository::{
    ApplicationRecord, ApplicationRepository, NewApplication, RepositoryError,
};
use crate::verification::queue::{ScheduleError, VerificationRequest, VerificationScheduler};

#[derive(Default)]
pub(super) struct MemoryRepository {
    records: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
    sequence: AtomicU64,
}

impl MemoryRepository {
    pub(super) fn len(&self) -> usize {
        self.records.lock().expect("repository mutex poisoned").len()
    }

    /// Test hook used to manufacture integrity violations: forces a status
    /// without touching the report.
    pub(super) fn force_status(&self, id: &ApplicationId, status: ApplicationStatus) {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).expect("record present");
        record.status = status;
    }
}

#[async_trait]
impl ApplicationRepository for MemoryRepository {
    async fn insert(
        &self,
        application: NewApplication,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let id = ApplicationId::parse(&format!("{sequence:024x}")).expect("generated id is hex");
        let record = ApplicationRecord {
            id: id.clone(),
            owner: application.owner,
            facts: application.facts,
            evidence: application.evidence,
            status: ApplicationStatus::Submitted,
            report: None,
            submitted_at: application.submitted_at,
        };
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(id, record.clone());
        Ok(record)
    }

    async fn find_one(
        &self,
        id: &ApplicationId,
        owner: &PrincipalId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .get(id)
            .filter(|record| record.owner == *owner)
            .cloned())
    }

    async fn fetch(
        &self,
        id: &ApplicationId,
    ) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    async fn mark_verifying(&self, id: &ApplicationId) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if record.status != ApplicationStatus::Submitted {
            return Err(RepositoryError::InvalidTransition {
                from: record.status,
                to: ApplicationStatus::Verifying,
            });
        }
        record.status = ApplicationStatus::Verifying;
        Ok(())
    }

    async fn complete(
        &self,
        id: &ApplicationId,
        status: ApplicationStatus,
        report: VerificationReport,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let record = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if record.status.is_terminal() {
            return Err(RepositoryError::InvalidTransition {
                from: record.status,
                to: status,
            });
        }
        record.status = status;
        record.report = Some(report);
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct MemoryEvidenceStore {
    stored: Mutex<Vec<StorageKey>>,
    deleted: Mutex<Vec<StorageKey>>,
    sequence: AtomicU64,
    pub(super) fail_on_label: Option<&'static str>,
}

impl MemoryEvidenceStore {
    pub(super) fn failing_on(label: &'static str) -> Self {
        Self {
            fail_on_label: Some(label),
            ..Self::default()
        }
    }

    pub(super) fn stored(&self) -> Vec<StorageKey> {
        self.stored.lock().expect("evidence mutex poisoned").clone()
    }

    pub(super) fn deleted(&self) -> Vec<StorageKey> {
        self.deleted.lock().expect("evidence mutex poisoned").clone()
    }
}

#[async_trait]
impl EvidenceStore for MemoryEvidenceStore {
    async fn store(
        &self,
        owner: &PrincipalId,
        label: &str,
        _content: &[u8],
    ) -> Result<StorageKey, StorageError> {
        if self.fail_on_label == Some(label) {
            return Err(StorageError::Io(format!("injected failure for {label}")));
        }
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let key = StorageKey(format!("evidence/{owner}/{label}-{sequence}"));
        self.stored
            .lock()
            .expect("evidence mutex poisoned")
            .push(key.clone());
        Ok(key)
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        self.deleted
            .lock()
            .expect("evidence mutex poisoned")
            .push(key.clone());
        Ok(())
    }
}

#[derive(Default)]
pub(super) struct RecordingScheduler {
    requests: Mutex<Vec<VerificationRequest>>,
}

impl RecordingScheduler {
    pub(super) fn requests(&self) -> Vec<VerificationRequest> {
        self.requests.lock().expect("scheduler mutex poisoned").clone()
    }
}

impl VerificationScheduler for RecordingScheduler {
    fn schedule(&self, request: VerificationRequest) -> Result<(), ScheduleError> {
        self.requests
            .lock()
            .expect("scheduler mutex poisoned")
            .push(request);
        Ok(())
    }
}

/// Scheduler whose queue is already closed; every schedule attempt fails.
pub(super) struct ClosedScheduler;

impl VerificationScheduler for ClosedScheduler {
    fn schedule(&self, _request: VerificationRequest) -> Result<(), ScheduleError> {
        Err(ScheduleError::QueueClosed)
    }
}

pub(super) struct StaticAuthenticator {
    principals: HashMap<String, Principal>,
}

impl StaticAuthenticator {
    pub(super) fn with_tokens(tokens: &[(&str, Principal)]) -> Self {
        Self {
            principals: tokens
                .iter()
                .map(|(token, principal)| (token.to_string(), principal.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticAuthenticator {
    async fn authenticate(&self, bearer_token: &str) -> Result<Principal, AuthError> {
        self.principals
            .get(bearer_token)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)
    }
}

pub(super) fn principal() -> Principal {
    Principal {
        id: PrincipalId("installer-001".to_string()),
        contact: "installer@example.com".to_string(),
    }
}

pub(super) fn other_principal() -> Principal {
    Principal {
        id: PrincipalId("installer-002".to_string()),
        contact: "rival@example.com".to_string(),
    }
}

pub(super) fn facts() -> InstallationFacts {
    InstallationFacts {
        address: "123 Main St".to_string(),
        latitude: 34.05,
        longitude: -118.25,
        system_capacity_kw: 5.2,
        declared_panel_count: 16,
    }
}

pub(super) fn uploads() -> EvidenceUploads {
    EvidenceUploads {
        wide_rooftop: Some(b"wide-rooftop-bytes".to_vec()),
        serial_number: Some(b"serial-number-bytes".to_vec()),
        inverter: Some(b"inverter-bytes".to_vec()),
    }
}

pub(super) type Service =
    crate::applications::service::ApplicationService<MemoryRepository, MemoryEvidenceStore>;

pub(super) fn service_with(
    repository: Arc<MemoryRepository>,
    evidence: Arc<MemoryEvidenceStore>,
    scheduler: Arc<RecordingScheduler>,
) -> Service {
    crate::applications::service::ApplicationService::new(repository, evidence, scheduler)
}
