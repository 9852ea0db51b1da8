//! Error types for the authentication subsystem.

/// Errors from session persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Io(String),

    #[error("storage error: {0}")]
    Serialize(String),
}

/// Errors from `authenticate`.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Provider(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from `sign_up`.
#[derive(Debug, thiserror::Error)]
pub enum SignupError {
    #[error("an account with this email already exists")]
    UsernameExists,

    #[error("password rejected: {0}")]
    PasswordPolicy(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Provider(String),
}

/// Errors from `confirm_sign_up`.
#[derive(Debug, thiserror::Error)]
pub enum ConfirmError {
    #[error("invalid verification code")]
    CodeMismatch,

    #[error("verification code has expired")]
    CodeExpired,

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Provider(String),
}

/// Errors from the OAuth redirect callback flow.
#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("no authorization code found in callback URL")]
    MissingCode,

    #[error("provider returned error: {error}{}", .description.as_deref().map(|d| format!(" ({d})")).unwrap_or_default())]
    Provider {
        error: String,
        description: Option<String>,
    },

    #[error("token exchange failed: {0}")]
    Exchange(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("identity token could not be decoded")]
    InvalidToken,

    #[error(transparent)]
    Store(#[from] StoreError),
}
