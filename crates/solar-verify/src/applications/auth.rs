use async_trait::async_trait;

use super::domain::PrincipalId;

/// Authenticated caller resolved from request credentials.
///
/// `contact` is the notification address handed to the verification pipeline
/// alongside the application snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: PrincipalId,
    pub contact: String,
}

/// Credential validation failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AuthError {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid or expired credentials")]
    InvalidCredentials,
}

/// External credential/session validator. The wire format of tokens is the
/// collaborator's concern; this core only consumes the resulting principal.
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn authenticate(&self, bearer_token: &str) -> Result<Principal, AuthError>;
}
