//! Live view of the conversations the signed-in identity takes part in.

use std::sync::Arc;

use eservice_store::{Change, Conversation, Database, Profile};
use tokio::sync::watch;
use uuid::Uuid;

use super::Synchronizer;
use crate::error::ClientError;
use crate::state::SharedDb;

/// Snapshots are ordered most recently updated first.
pub struct ConversationSynchronizer {
    inner: Synchronizer<Conversation>,
    uid: Option<Uuid>,
}

impl ConversationSynchronizer {
    pub fn new(db: SharedDb) -> Self {
        Self {
            inner: Synchronizer::new(db, "conversations"),
            uid: None,
        }
    }

    pub fn set_profile(&mut self, profile: Option<&Profile>) -> Result<(), ClientError> {
        self.uid = None;
        match profile {
            None => self.inner.clear(),
            Some(profile) => {
                let uid = profile.id;
                self.inner.rescope(
                    |change| *change == Change::Conversations,
                    Arc::new(move |db: &Database| db.list_conversations_for(uid)),
                )?;
                self.uid = Some(uid);
            }
        }
        Ok(())
    }

    pub fn participant(&self) -> Option<Uuid> {
        self.uid
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Conversation>> {
        self.inner.subscribe()
    }

    pub fn snapshot(&self) -> Vec<Conversation> {
        self.inner.snapshot()
    }

    pub fn find(&self, id: Uuid) -> Option<Conversation> {
        self.inner
            .with_snapshot(|conversations| conversations.iter().find(|c| c.id == id).cloned())
    }

    pub fn is_live(&self) -> bool {
        self.inner.is_live()
    }
}
