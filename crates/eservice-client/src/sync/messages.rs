//! Live, chronologically ordered view of one conversation's messages.

use std::sync::Arc;

use eservice_store::{Change, Database, Message};
use tokio::sync::watch;
use uuid::Uuid;

use super::Synchronizer;
use crate::error::ClientError;
use crate::state::SharedDb;

/// An open chat thread.  Dropping it stops following the conversation.
pub struct MessageThread {
    conversation_id: Uuid,
    inner: Synchronizer<Message>,
}

impl MessageThread {
    pub fn open(db: &SharedDb, conversation_id: Uuid) -> Result<Self, ClientError> {
        let mut inner = Synchronizer::new(Arc::clone(db), "messages");
        inner.rescope(
            move |change| *change == Change::Messages(conversation_id),
            Arc::new(move |db: &Database| db.list_messages(conversation_id)),
        )?;
        Ok(Self {
            conversation_id,
            inner,
        })
    }

    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Message>> {
        self.inner.subscribe()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.inner.snapshot()
    }

    /// Stop following the conversation and drop the snapshot.
    pub fn close(mut self) {
        self.inner.clear();
    }
}
