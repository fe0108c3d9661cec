use eservice_shared::error::{TransitionError, ValidationError};
use eservice_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Errors surfaced by client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("No user is signed in")]
    NotSignedIn,

    #[error("Request {0} not found")]
    RequestNotFound(Uuid),

    #[error("Conversation {0} not found")]
    ConversationNotFound(Uuid),

    #[error("Not permitted: {0}")]
    Forbidden(String),

    #[error("Not allowed in the current state: {0}")]
    InvalidState(String),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Background task failed: {0}")]
    Task(String),
}

/// Sign-up / sign-in failures.  The messages are short enough to show
/// inline on a form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email")]
    InvalidEmail,

    #[error("weak password")]
    WeakPassword,

    #[error("email already in use")]
    EmailInUse,

    #[error("invalid credential")]
    InvalidCredential,
}
