use eservice_shared::validation::require_text;
use eservice_store::{Message, NewMessage, StoreError};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{logged, TransitionEngine};
use crate::error::ClientError;
use crate::state::with_db;

impl TransitionEngine {
    /// Post `text` to a conversation the caller takes part in.
    ///
    /// The message is appended first; refreshing the conversation preview
    /// is a separate write.  If only the second write fails the message
    /// still stands and the preview stays stale.
    pub async fn send_message(&self, conversation_id: Uuid, text: &str) -> Result<Message, ClientError> {
        logged(
            "send_message",
            conversation_id,
            self.send_message_inner(conversation_id, text).await,
        )
    }

    async fn send_message_inner(&self, conversation_id: Uuid, text: &str) -> Result<Message, ClientError> {
        let caller = self.signed_in()?;
        require_text("message", text)?;

        let conversation = with_db(&self.db, move |db| db.get_conversation(conversation_id))
            .await
            .map_err(|e| match e {
                ClientError::Store(StoreError::NotFound) => {
                    ClientError::ConversationNotFound(conversation_id)
                }
                other => other,
            })?;
        if !conversation.includes(caller.id) {
            return Err(ClientError::Forbidden(format!(
                "{} is not a participant of conversation {conversation_id}",
                caller.id
            )));
        }

        let new = NewMessage::new(conversation_id, caller.id, text);
        let message = with_db(&self.db, move |db| db.append_message(&new)).await?;

        let preview = message.clone();
        match with_db(&self.db, move |db| db.touch_conversation(&preview)).await {
            Ok(true) => {}
            Ok(false) => {
                debug!(conversation = %conversation_id, "preview already shows a newer message");
            }
            Err(e) => {
                warn!(conversation = %conversation_id, error = %e, "failed to refresh conversation preview");
            }
        }

        info!(conversation = %conversation_id, sender = %caller.id, "message sent");
        Ok(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::lock_db;
    use crate::sync::MessageThread;
    use crate::testing::{accepted_request, shared_temp_db, wait_for, Actor};
    use eservice_shared::error::ValidationError;
    use eservice_shared::types::Role;

    #[tokio::test]
    async fn message_lands_last_and_updates_preview() {
        let (_dir, db) = shared_temp_db();
        let alice = Actor::new(&db, "Alice", Role::Customer);
        let tess = Actor::new(&db, "Tess", Role::Technician);
        accepted_request(&alice, &tess).await;
        let conversation = alice.conversation_count(1).await.remove(0);

        let thread = MessageThread::open(&db, conversation.id).unwrap();
        let mut rx = thread.subscribe();
        wait_for(&mut rx, |m| m.len() == 1).await;

        let sent = alice
            .engine()
            .send_message(conversation.id, "See you Tuesday")
            .await
            .unwrap();
        let messages = wait_for(&mut rx, |m| m.len() == 2).await;
        assert_eq!(messages.last(), Some(&sent));
        assert!(messages[0].timestamp < sent.timestamp);

        let mut conversations = tess.conversations.subscribe();
        let updated = wait_for(&mut conversations, |rows| {
            rows.first().map(|c| c.last_message_text.as_str()) == Some("See you Tuesday")
        })
        .await;
        assert!(updated[0].updated_at >= sent.timestamp);
    }

    #[tokio::test]
    async fn only_participants_may_send() {
        let (_dir, db) = shared_temp_db();
        let alice = Actor::new(&db, "Alice", Role::Customer);
        let tess = Actor::new(&db, "Tess", Role::Technician);
        let tom = Actor::new(&db, "Tom", Role::Technician);
        accepted_request(&alice, &tess).await;
        let conversation = alice.conversation_count(1).await.remove(0);

        let err = tom
            .engine()
            .send_message(conversation.id, "hello?")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(_)));

        let err = tess.engine().send_message(conversation.id, "  ").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(ValidationError::Blank(_))));

        let missing = Uuid::new_v4();
        let err = tess.engine().send_message(missing, "hi").await.unwrap_err();
        assert!(matches!(err, ClientError::ConversationNotFound(id) if id == missing));

        let messages = lock_db(&db).unwrap().list_messages(conversation.id).unwrap();
        assert_eq!(messages.len(), 1);
    }
}
