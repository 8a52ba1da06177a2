use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use crate::applications::domain::{ApplicationStatus, VerificationReport};
use crate::applications::repository::{ApplicationRepository, RepositoryError};

use super::pipeline::{ApplicationSnapshot, PipelineError, VerificationPipeline};
use super::queue::VerificationRequest;

/// Drives one verification run per application: marks the record as
/// verifying, invokes the pipeline, and writes back the terminal status and
/// report in a single atomic update.
pub struct VerificationOrchestrator<R, P> {
    repository: Arc<R>,
    pipeline: Arc<P>,
}

impl<R, P> VerificationOrchestrator<R, P>
where
    R: ApplicationRepository + 'static,
    P: VerificationPipeline + 'static,
{
    pub fn new(repository: Arc<R>, pipeline: Arc<P>) -> Self {
        Self {
            repository,
            pipeline,
        }
    }

    /// Executes the run for one request, absorbing every failure. A failed
    /// run leaves the application in `verifying` (no silent revert, no
    /// automatic retry) so operators can detect stuck applications.
    pub async fn run(&self, request: VerificationRequest) {
        match self.verify(&request).await {
            Ok(status) => {
                info!(application_id = %request.application_id, %status, "verification completed");
            }
            Err(error) => {
                warn!(
                    application_id = %request.application_id,
                    %error,
                    "verification run failed; application left for operator inspection"
                );
            }
        }
    }

    async fn verify(
        &self,
        request: &VerificationRequest,
    ) -> Result<ApplicationStatus, OrchestrationError> {
        let record = self
            .repository
            .fetch(&request.application_id)
            .await?
            .ok_or(OrchestrationError::MissingRecord)?;

        self.repository.mark_verifying(&request.application_id).await?;

        let snapshot = ApplicationSnapshot {
            application_id: record.id.clone(),
            facts: record.facts.clone(),
            evidence: record.evidence.clone(),
            owner_contact: request.owner_contact.clone(),
        };

        let output = self.pipeline.run(snapshot).await?;

        let verdict = output.verdict.decide();
        let status = verdict.terminal_status();
        let report = VerificationReport {
            verdict,
            findings: output.findings,
            completed_at: Utc::now(),
        };

        self.repository
            .complete(&request.application_id, status, report)
            .await?;

        Ok(status)
    }
}

/// Internal failure of an orchestrator run. Logged, never propagated to the
/// original submitter.
#[derive(Debug, thiserror::Error)]
pub enum OrchestrationError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("application record disappeared before verification started")]
    MissingRecord,
}
