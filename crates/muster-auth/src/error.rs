use thiserror::Error;

/// Errors produced by the credential layer.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Token signature or payload did not verify.
    #[error("Invalid token: {0}")]
    InvalidToken(String),

    /// Token could not be signed.
    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    /// Password hashing failed.
    #[error("Password hash error: {0}")]
    Hash(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
