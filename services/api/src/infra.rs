use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use metrics_exporter_prometheus::PrometheusHandle;
use solar_verify::applications::{
    ApplicationId, ApplicationRecord, ApplicationRepository, ApplicationStatus, AuthError,
    Authenticator, EvidenceStore, Finding, NewApplication, Principal, PrincipalId,
    RepositoryError, StorageError, StorageKey, VerificationReport,
};
use solar_verify::verification::{
    ApplicationSnapshot, PipelineError, PipelineOutput, PipelineVerdict, VerificationPipeline,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Process-local document store for application records.
///
/// Ids follow the 24-hex convention of the production store: 8 hex digits of
/// unix seconds followed by a 16 hex digit sequence number. All transitions
/// happen under one mutex, which is what makes `complete` atomic.
#[derive(Default)]
pub(crate) struct InMemoryApplicationRepository {
    records: Mutex<HashMap<ApplicationId, ApplicationRecord>>,
    sequence: AtomicU64,
}

impl InMemoryApplicationRepository {
    fn next_id(&self) -> ApplicationId {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let seconds = Utc::now().timestamp().max(0) as u32;
        let raw = format!("{seconds:08x}{sequence:016x}");
        ApplicationId::parse(&raw).expect("generated id is valid hex")
    }
}

#[async_trait]
impl ApplicationRepository for InMemoryApplicationRepository {
    async fn insert(
        &self,
        application: NewApplication,
    ) -> Result<ApplicationRecord, RepositoryError> {
        let record = ApplicationRecord {
            id: self.next_id(),
            owner: application.owner,
            facts: application.facts,
            evidence: application.evidence,
            status: ApplicationStatus::Submitted,
            report: None,
            submitted_at: application.submitted_at,
        };
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        guard.insert(record.id.clone(), record.clone());
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

/// Evidence store keeping photo bytes in memory, keyed like an object store.
#[derive(Default)]
pub(crate) struct InMemoryEvidenceStore {
    objects: Mutex<HashMap<StorageKey, Vec<u8>>>,
    sequence: AtomicU64,
}

#[async_trait]
impl EvidenceStore for InMemoryEvidenceStore {
    async fn store(
        &self,
        owner: &PrincipalId,
        label: &str,
        content: &[u8],
    ) -> Result<StorageKey, StorageError> {
        let sequence = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let key = StorageKey(format!("evidence/{owner}/{label}-{sequence}"));
        let mut guard = self.objects.lock().expect("evidence mutex poisoned");
        guard.insert(key.clone(), content.to_vec());
        Ok(key)
    }

    async fn delete(&self, key: &StorageKey) -> Result<(), StorageError> {
        let mut guard = self.objects.lock().expect("evidence mutex poisoned");
        guard.remove(key);
        Ok(())
    }
}

const MIN_PLAUSIBLE_KW_PER_PANEL: f64 = 0.2;
const MAX_PLAUSIBLE_KW_PER_PANEL: f64 = 0.8;

/// Stand-in for the image-analysis pipeline: judges whether the declared
/// capacity is plausible for the declared panel count. Declarations far
/// outside the plausible band fail outright; borderline ones go to manual
/// review.
pub(crate) struct HeuristicVerificationPipeline;

#[async_trait]
impl VerificationPipeline for HeuristicVerificationPipeline {
    async fn run(&self, snapshot: ApplicationSnapshot) -> Result<PipelineOutput, PipelineError> {
        let panels = f64::from(snapshot.facts.declared_panel_count);
        let kw_per_panel = snapshot.facts.system_capacity_kw / panels;

        let verdict = if (MIN_PLAUSIBLE_KW_PER_PANEL..=MAX_PLAUSIBLE_KW_PER_PANEL)
            .contains(&kw_per_panel)
        {
            PipelineVerdict::Pass
        } else if kw_per_panel > 4.0 * MAX_PLAUSIBLE_KW_PER_PANEL
            || kw_per_panel < MIN_PLAUSIBLE_KW_PER_PANEL / 4.0
        {
            PipelineVerdict::Fail
        } else {
            PipelineVerdict::Inconclusive
        };

        let findings = vec![
            Finding {
                check: "capacity_per_panel".to_string(),
                observation: format!("declared {kw_per_panel:.3} kW per panel"),
            },
            Finding {
                check: "evidence_reviewed".to_string(),
                observation: format!(
                    "photos {}, {}, {}",
                    snapshot.evidence.wide_rooftop,
                    snapshot.evidence.serial_number,
                    snapshot.evidence.inverter
                ),
            },
        ];

        Ok(PipelineOutput { verdict, findings })
    }
}

/// Token table standing in for the identity provider.
pub(crate) struct StaticTokenAuthenticator {
    principals: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    pub(crate) fn new() -> Self {
        Self {
            principals: HashMap::new(),
        }
    }

    pub(crate) fn with_token(mut self, token: &str, id: &str, contact: &str) -> Self {
        self.principals.insert(
            token.to_string(),
            Principal {
                id: PrincipalId(id.to_string()),
                contact: contact.to_string(),
            },
        );
        self
    }

    /// Demo credentials for local runs; replaced by a real identity provider
    /// in deployed environments.
    pub(crate) fn demo() -> Self {
        Self::new().with_token("demo-token", "installer-001", "installer@example.com")
    }
}

#[async_trait]
impl Authenticator for StaticTokenAuthenticator {
    async fn authenticate(&self, bearer_token: &str) -> Result<Principal, AuthError> {
        self.principals
            .get(bearer_token)
            .cloned()
            .ok_or(AuthError::InvalidCredentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use solar_verify::applications::{EvidenceKeys, InstallationFacts};

    fn snapshot(capacity_kw: f64, panels: u32) -> ApplicationSnapshot {
        ApplicationSnapshot {
            application_id: ApplicationId::parse("0000000000000000000000aa").expect("valid id"),
            facts: InstallationFacts {
                address: "123 Main St".to_string(),
                latitude: 34.05,
                longitude: -118.25,
                system_capacity_kw: capacity_kw,
                declared_panel_count: panels,
            },
            evidence: EvidenceKeys {
                wide_rooftop: StorageKey("evidence/a/wide_rooftop_photo-1".to_string()),
                serial_number: StorageKey("evidence/a/serial_number_photo-2".to_string()),
                inverter: StorageKey("evidence/a/inverter_photo-3".to_string()),
            },
            owner_contact: "installer@example.com".to_string(),
        }
    }

    #[tokio::test]
    async fn plausible_declarations_pass() {
        let output = HeuristicVerificationPipeline
            .run(snapshot(5.2, 16))
            .await
            .expect("pipeline runs");
        assert_eq!(output.verdict, PipelineVerdict::Pass);
    }

    #[tokio::test]
    async fn implausible_declarations_fail() {
        let output = HeuristicVerificationPipeline
            .run(snapshot(100.0, 2))
            .await
            .expect("pipeline runs");
        assert_eq!(output.verdict, PipelineVerdict::Fail);
    }

    #[tokio::test]
    async fn borderline_declarations_go_to_manual_review() {
        let output = HeuristicVerificationPipeline
            .run(snapshot(16.0, 16))
            .await
            .expect("pipeline runs");
        assert_eq!(output.verdict, PipelineVerdict::Inconclusive);
    }

    #[tokio::test]
    async fn repository_guards_monotonic_transitions() {
        let repository = InMemoryApplicationRepository::default();
        let record = repository
            .insert(NewApplication {
                owner: PrincipalId("installer-001".to_string()),
                facts: snapshot(5.2, 16).facts,
                evidence: snapshot(5.2, 16).evidence,
                submitted_at: Utc::now(),
            })
            .await
            .expect("insert succeeds");

        repository
            .mark_verifying(&record.id)
            .await
            .expect("submitted advances to verifying");

        // Verifying never reverts to submitted.
        match repository.mark_verifying(&record.id).await {
            Err(RepositoryError::InvalidTransition { .. }) => {}
            other => panic!("expected invalid transition, got {other:?}"),
        }

        let report = VerificationReport {
            verdict: solar_verify::applications::Verdict::Approved,
            findings: Vec::new(),
            completed_at: Utc::now(),
        };
        repository
            .complete(&record.id, ApplicationStatus::Approved, report.clone())
            .await
            .expect("completion succeeds");

        match repository
            .complete(&record.id, ApplicationStatus::Rejected, report)
            .await
        {
            Err(RepositoryError::InvalidTransition { .. }) => {}
            other => panic!("expected invalid transition, got {other:?}"),
        }
    }
}
