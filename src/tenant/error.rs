use thiserror::Error;

#[derive(Debug, Error)]
/// Errors from tenant/API-key directory lookups.
pub enum DirectoryError {
    /// Underlying database failure.
    #[error("directory lookup failed: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Debug, Error)]
/// Authentication outcomes for the tenant resolver.
pub enum AuthError {
    /// Missing, unknown, expired or revoked credential.
    #[error("missing or invalid credentials")]
    Unauthorized,

    /// Credential resolved, but the tenant is disabled. Fails closed.
    #[error("tenant is disabled")]
    Forbidden,

    /// Lookup infrastructure failed.
    #[error(transparent)]
    Directory(#[from] DirectoryError),
}
