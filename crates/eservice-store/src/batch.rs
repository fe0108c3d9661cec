//! Atomic multi-document writes.
//!
//! A [`WriteBatch`] collects operations and [`Database::commit_batch`] applies
//! them inside one SQLite transaction: either every operation lands or none
//! does.  Change notifications are published only after the commit.

use uuid::Uuid;

use crate::changes::Change;
use crate::codec::now;
use crate::conversations::insert_conversation_on;
use crate::database::Database;
use crate::error::Result;
use crate::messages::insert_message_on;
use crate::models::{NewConversation, NewMessage};
use crate::requests::accept_request_on;

/// One write inside a [`WriteBatch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    /// Pending, unassigned request -> Accepted, assigned to `technician_id`.
    AcceptRequest { request_id: Uuid, technician_id: Uuid },
    CreateConversation(NewConversation),
    AppendMessage(NewMessage),
}

impl BatchOp {
    fn change(&self) -> Change {
        match self {
            BatchOp::AcceptRequest { .. } => Change::Requests,
            BatchOp::CreateConversation(_) => Change::Conversations,
            BatchOp::AppendMessage(m) => Change::Messages(m.conversation_id),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn accept_request(&mut self, request_id: Uuid, technician_id: Uuid) -> &mut Self {
        self.ops.push(BatchOp::AcceptRequest {
            request_id,
            technician_id,
        });
        self
    }

    pub fn create_conversation(&mut self, conversation: NewConversation) -> &mut Self {
        self.ops.push(BatchOp::CreateConversation(conversation));
        self
    }

    pub fn append_message(&mut self, message: NewMessage) -> &mut Self {
        self.ops.push(BatchOp::AppendMessage(message));
        self
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl Database {
    /// Apply every operation of `batch` atomically.
    ///
    /// All documents written by the batch share one server timestamp.
    pub fn commit_batch(&mut self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }

        let at = now();
        let tx = self.conn_mut().transaction()?;

        for op in &batch.ops {
            match op {
                BatchOp::AcceptRequest {
                    request_id,
                    technician_id,
                } => accept_request_on(&tx, *request_id, *technician_id)?,
                BatchOp::CreateConversation(conversation) => {
                    insert_conversation_on(&tx, conversation, at)?;
                }
                BatchOp::AppendMessage(message) => {
                    insert_message_on(&tx, message, at)?;
                }
            }
        }

        tx.commit()?;

        let mut announced: Vec<Change> = Vec::with_capacity(batch.len());
        for change in batch.ops.iter().map(BatchOp::change) {
            if !announced.contains(&change) {
                announced.push(change);
                self.notify(change);
            }
        }

        tracing::debug!(ops = batch.len(), "batch committed");
        Ok(())
    }
}
