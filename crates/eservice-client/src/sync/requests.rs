//! Role-scoped live view of service requests.

use std::sync::Arc;

use eservice_shared::types::Role;
use eservice_store::{Change, Database, Profile, ServiceRequest};
use tokio::sync::watch;
use uuid::Uuid;

use super::Synchronizer;
use crate::error::ClientError;
use crate::state::SharedDb;

/// Which requests a profile may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestScope {
    /// A customer sees the requests they created.
    Customer(Uuid),
    /// Technicians see the whole pool.
    All,
}

impl RequestScope {
    pub fn for_profile(profile: &Profile) -> Self {
        match profile.role {
            Role::Customer => Self::Customer(profile.id),
            Role::Technician => Self::All,
        }
    }

    fn query(self, db: &Database) -> eservice_store::Result<Vec<ServiceRequest>> {
        match self {
            Self::Customer(id) => db.list_requests_for_customer(id),
            Self::All => db.list_requests(),
        }
    }
}

/// Keeps the request snapshot in step with the signed-in profile.
///
/// Snapshots are ordered newest scheduled date first.
pub struct RequestSynchronizer {
    inner: Synchronizer<ServiceRequest>,
    scope: Option<RequestScope>,
}

impl RequestSynchronizer {
    pub fn new(db: SharedDb) -> Self {
        Self {
            inner: Synchronizer::new(db, "requests"),
            scope: None,
        }
    }

    /// Re-scope to `profile`, or stop and clear when signed out.
    pub fn set_profile(&mut self, profile: Option<&Profile>) -> Result<(), ClientError> {
        match profile.map(RequestScope::for_profile) {
            None => {
                self.inner.clear();
                self.scope = None;
            }
            Some(scope) => {
                self.scope = None;
                self.inner.rescope(
                    |change| *change == Change::Requests,
                    Arc::new(move |db: &Database| scope.query(db)),
                )?;
                self.scope = Some(scope);
                tracing::debug!(?scope, "request view scoped");
            }
        }
        Ok(())
    }

    pub fn scope(&self) -> Option<RequestScope> {
        self.scope
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<ServiceRequest>> {
        self.inner.subscribe()
    }

    pub fn snapshot(&self) -> Vec<ServiceRequest> {
        self.inner.snapshot()
    }

    pub fn find(&self, id: Uuid) -> Option<ServiceRequest> {
        self.inner
            .with_snapshot(|requests| requests.iter().find(|r| r.id == id).cloned())
    }

    pub fn is_live(&self) -> bool {
        self.inner.is_live()
    }
}
