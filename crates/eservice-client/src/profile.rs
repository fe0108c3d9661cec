//! Identity-to-profile resolution.

use eservice_store::{Profile, StoreError};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::ClientError;
use crate::state::{with_db, SharedDb};

pub struct ProfileStore {
    db: SharedDb,
}

impl ProfileStore {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Fetch the profile of `identity`.
    ///
    /// A missing record and a failed read both come back as `None`; callers
    /// treat the identity as having no profile either way.
    pub async fn resolve(&self, identity: Uuid) -> Option<Profile> {
        match with_db(&self.db, move |db| db.get_profile(identity)).await {
            Ok(profile) => {
                debug!(user = %identity, role = %profile.role, "profile resolved");
                Some(profile)
            }
            Err(ClientError::Store(StoreError::NotFound)) => {
                error!(user = %identity, "no profile record for signed-in identity");
                None
            }
            Err(e) => {
                error!(user = %identity, error = %e, "failed to fetch profile");
                None
            }
        }
    }
}
