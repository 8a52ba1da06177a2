//! Application intake, ownership-scoped retrieval, and the lifecycle
//! invariants between them.
//!
//! The lifecycle manager ([`ApplicationService`]) is the only component that
//! creates records; after creation, status and report are written exclusively
//! by the verification orchestrator. Evidence storage, record persistence,
//! and credential validation are consumed through the traits in this module
//! so the workflow can be exercised against in-memory collaborators.

pub mod auth;
pub mod domain;
pub mod evidence;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use auth::{AuthError, Authenticator, Principal};
pub use domain::{
    ApplicationId, ApplicationStatus, EvidenceKind, EvidenceUploads, FieldViolation, Finding,
    InstallationFacts, InvalidIdentifierError, PrincipalId, ValidationError, ValidationReport,
    Verdict, VerificationReport,
};
pub use evidence::{EvidenceStore, StorageError, StorageKey};
pub use repository::{
    ApplicationRecord, ApplicationRepository, ApplicationView, EvidenceKeys, NewApplication,
    RepositoryError,
};
pub use router::{application_router, ApplicationRouterState};
pub use service::{ApplicationService, ApplicationServiceError};
