//! The transition engine: every write a view can make goes through here.
//!
//! Each operation checks, in order: a profile is signed in, the caller's
//! role and relationship to the request permit the action, the transition
//! table allows the change from the state in the synchronized snapshot,
//! and the input is valid.  The store then re-checks the starting state in
//! a conditional write, so a stale snapshot fails with a conflict instead
//! of overwriting a newer change.
//!
//! Failures are logged here and returned; callers may ignore them.

pub mod billing;
pub mod messaging;
pub mod ratings;
pub mod requests;

use eservice_shared::types::Role;
use eservice_store::{Profile, ServiceRequest, StoreError};
use tokio::sync::watch;
use tracing::error;
use uuid::Uuid;

use crate::error::ClientError;
use crate::state::SharedDb;

pub use requests::NewRequest;

/// Acts on behalf of the session's signed-in profile against the shared store.
///
/// The caller is read from the session on every operation, so an engine kept
/// across a sign-out stops acting for the previous user.
pub struct TransitionEngine {
    db: SharedDb,
    caller: watch::Receiver<Option<Profile>>,
    requests: watch::Receiver<Vec<ServiceRequest>>,
    opening_message: String,
}

impl TransitionEngine {
    pub fn new(
        db: SharedDb,
        caller: watch::Receiver<Option<Profile>>,
        requests: watch::Receiver<Vec<ServiceRequest>>,
        opening_message: String,
    ) -> Self {
        Self {
            db,
            caller,
            requests,
            opening_message,
        }
    }

    /// The profile operations currently run as.
    pub fn caller(&self) -> Option<Profile> {
        self.caller.borrow().clone()
    }

    fn signed_in(&self) -> Result<Profile, ClientError> {
        self.caller().ok_or(ClientError::NotSignedIn)
    }

    fn signed_in_as(&self, role: Role, action: &str) -> Result<Profile, ClientError> {
        let caller = self.signed_in()?;
        if caller.role != role {
            return Err(ClientError::Forbidden(format!(
                "only a {role} can {action}"
            )));
        }
        Ok(caller)
    }

    /// The request as the caller's live view currently shows it.
    fn lookup(&self, id: Uuid) -> Result<ServiceRequest, ClientError> {
        self.requests
            .borrow()
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(ClientError::RequestNotFound(id))
    }
}

fn is_owner(caller: &Profile, request: &ServiceRequest) -> bool {
    caller.role == Role::Customer && request.customer_id == caller.id
}

fn is_assignee(caller: &Profile, request: &ServiceRequest) -> bool {
    caller.role == Role::Technician && request.is_assigned_to(caller.id)
}

/// Map a store miss on a request write to a request-level error.
fn request_missing(id: Uuid) -> impl FnOnce(ClientError) -> ClientError {
    move |e| match e {
        ClientError::Store(StoreError::NotFound) => ClientError::RequestNotFound(id),
        other => other,
    }
}

fn logged<T>(action: &'static str, target: Uuid, result: Result<T, ClientError>) -> Result<T, ClientError> {
    if let Err(e) = &result {
        error!(action, target = %target, error = %e, "command failed");
    }
    result
}
