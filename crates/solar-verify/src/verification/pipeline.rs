use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::applications::domain::{ApplicationId, Finding, InstallationFacts, Verdict};
use crate::applications::repository::EvidenceKeys;

/// Point-in-time view of an application handed to the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplicationSnapshot {
    pub application_id: ApplicationId,
    pub facts: InstallationFacts,
    pub evidence: EvidenceKeys,
    /// Notification address of the owning principal.
    pub owner_contact: String,
}

/// Raw verdict emitted by the pipeline.
///
/// Mapping onto terminal statuses: `Pass` approves, `Fail` rejects, and
/// `Inconclusive` routes the application to manual review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineVerdict {
    Pass,
    Fail,
    Inconclusive,
}

impl PipelineVerdict {
    pub const fn decide(self) -> Verdict {
        match self {
            PipelineVerdict::Pass => Verdict::Approved,
            PipelineVerdict::Fail => Verdict::Rejected,
            PipelineVerdict::Inconclusive => Verdict::ManualReview,
        }
    }
}

/// Structured result of a pipeline invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutput {
    pub verdict: PipelineVerdict,
    pub findings: Vec<Finding>,
}

/// Pipeline invocation failure. Absorbed by the orchestrator; never surfaced
/// to the submitter.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PipelineError {
    #[error("verification pipeline unavailable: {0}")]
    Unavailable(String),
    #[error("verification pipeline rejected the snapshot: {0}")]
    Invocation(String),
}

/// Black-box image-analysis pipeline. Invocations may be long-running and
/// carry no internal retry contract.
#[async_trait]
pub trait VerificationPipeline: Send + Sync {
    async fn run(&self, snapshot: ApplicationSnapshot) -> Result<PipelineOutput, PipelineError>;
}
