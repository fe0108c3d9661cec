//! Request creation and status changes.

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use eservice_shared::types::{ParticipantInfo, PaymentStatus, RequestStatus, Role, Urgency};
use eservice_shared::validation::require_text;
use eservice_store::{
    store_timestamp, NewConversation, NewMessage, Profile, ServiceRequest, WriteBatch,
};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use super::{is_assignee, is_owner, logged, request_missing, TransitionEngine};
use crate::error::ClientError;
use crate::state::with_db;

/// The customer-supplied part of a new request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    pub service_category: String,
    pub description: String,
    pub location: String,
    pub date_time: DateTime<Utc>,
    pub urgency: Urgency,
    #[serde(default)]
    pub photo: Option<String>,
}

impl TransitionEngine {
    /// Submit a new `Pending` request owned by the signed-in customer.
    pub async fn create_request(&self, form: NewRequest) -> Result<ServiceRequest, ClientError> {
        let result = self.create_request_inner(form).await;
        if let Err(e) = &result {
            let caller = self.caller().map(|c| c.id);
            error!(action = "create_request", ?caller, error = %e, "command failed");
        }
        result
    }

    async fn create_request_inner(&self, form: NewRequest) -> Result<ServiceRequest, ClientError> {
        let caller = self.signed_in_as(Role::Customer, "create requests")?;
        require_text("service category", &form.service_category)?;
        require_text("description", &form.description)?;
        require_text("location", &form.location)?;

        let request = ServiceRequest {
            id: Uuid::new_v4(),
            customer_id: caller.id,
            assigned_technician_uid: None,
            customer_name: caller.full_name.clone(),
            customer_avatar: caller.avatar_url.clone(),
            service_category: form.service_category.trim().to_string(),
            description: form.description.trim().to_string(),
            location: form.location.trim().to_string(),
            date_time: form.date_time.trunc_subsecs(6),
            urgency: form.urgency,
            status: RequestStatus::Pending,
            invoice: None,
            payment_status: PaymentStatus::None,
            technician_rating: None,
            customer_rating: None,
            photo: form.photo.filter(|p| !p.trim().is_empty()),
            created_at: store_timestamp(),
        };

        let stored = request.clone();
        with_db(&self.db, move |db| db.insert_request(&stored)).await?;

        info!(request = %request.id, customer = %caller.id, "request created");
        Ok(request)
    }

    /// Move a request to `status`.
    ///
    /// Accepting goes through [`accept`](Self::accept) and also opens the
    /// conversation.
    pub async fn update_status(&self, id: Uuid, status: RequestStatus) -> Result<(), ClientError> {
        match status {
            RequestStatus::Accepted => self.accept(id).await.map(|_| ()),
            _ => logged("update_status", id, self.set_status(id, status).await),
        }
    }

    /// Accept a pending request as the signed-in technician.
    ///
    /// Assigns the technician, creates the conversation with the customer
    /// and posts the opening message in one atomic batch.  Returns the new
    /// conversation id.
    pub async fn accept(&self, id: Uuid) -> Result<Uuid, ClientError> {
        logged("accept", id, self.accept_inner(id).await)
    }

    pub async fn decline(&self, id: Uuid) -> Result<(), ClientError> {
        self.update_status(id, RequestStatus::Declined).await
    }

    pub async fn start_work(&self, id: Uuid) -> Result<(), ClientError> {
        self.update_status(id, RequestStatus::InProgress).await
    }

    pub async fn complete(&self, id: Uuid) -> Result<(), ClientError> {
        self.update_status(id, RequestStatus::Completed).await
    }

    async fn accept_inner(&self, id: Uuid) -> Result<Uuid, ClientError> {
        let caller = self.signed_in_as(Role::Technician, "accept requests")?;
        let request = self.lookup(id)?;
        request.status.transition(RequestStatus::Accepted)?;

        let conversation_id = Uuid::new_v4();
        let customer_info = ParticipantInfo {
            full_name: request.customer_name.clone(),
            avatar_url: request.customer_avatar.clone(),
        };

        let mut batch = WriteBatch::new();
        batch
            .accept_request(id, caller.id)
            .create_conversation(NewConversation {
                id: conversation_id,
                participant_uids: [request.customer_id, caller.id],
                participant_info: BTreeMap::from([
                    (request.customer_id, customer_info),
                    (caller.id, caller.participant_info()),
                ]),
                last_message_text: self.opening_message.clone(),
            })
            .append_message(NewMessage::new(
                conversation_id,
                caller.id,
                self.opening_message.clone(),
            ));

        with_db(&self.db, move |db| db.commit_batch(batch))
            .await
            .map_err(request_missing(id))?;

        info!(
            request = %id,
            technician = %caller.id,
            conversation = %conversation_id,
            "request accepted"
        );
        Ok(conversation_id)
    }

    async fn set_status(&self, id: Uuid, to: RequestStatus) -> Result<(), ClientError> {
        let caller = self.signed_in()?;
        let request = self.lookup(id)?;
        let from = request.status;
        from.transition(to)?;
        authorize_status(&caller, &request, to)?;

        with_db(&self.db, move |db| db.set_request_status(id, from, to))
            .await
            .map_err(request_missing(id))?;

        info!(request = %id, %from, %to, user = %caller.id, "status updated");
        Ok(())
    }
}

fn authorize_status(
    caller: &Profile,
    request: &ServiceRequest,
    to: RequestStatus,
) -> Result<(), ClientError> {
    let allowed = match to {
        RequestStatus::Accepted | RequestStatus::Declined => caller.role == Role::Technician,
        RequestStatus::InProgress => is_assignee(caller, request),
        RequestStatus::Completed => is_owner(caller, request) || is_assignee(caller, request),
        RequestStatus::Pending => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(ClientError::Forbidden(format!(
            "{} {} cannot move request {} to {to}",
            caller.role, caller.id, request.id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::lock_db;
    use crate::testing::{accepted_request, new_request, shared_temp_db, wait_for, Actor};
    use eservice_shared::constants::DEFAULT_OPENING_MESSAGE;
    use eservice_shared::error::{TransitionError, ValidationError};
    use eservice_store::StoreError;
    use std::sync::Arc;
    use tokio::sync::watch;

    #[tokio::test]
    async fn created_request_is_pending_in_both_views() {
        let (_dir, db) = shared_temp_db();
        let alice = Actor::new(&db, "Alice", Role::Customer);
        let tess = Actor::new(&db, "Tess", Role::Technician);

        let created = alice.engine().create_request(new_request("HVAC")).await.unwrap();
        assert_eq!(created.status, RequestStatus::Pending);
        assert_eq!(created.payment_status, PaymentStatus::None);
        assert_eq!(created.assigned_technician_uid, None);
        assert_eq!(created.customer_name, "Alice");
        assert_eq!(created.customer_avatar, alice.profile.avatar_url);

        let seen_by_customer = alice.request_where(created.id, |_| true).await;
        let seen_by_technician = tess.request_where(created.id, |_| true).await;
        assert_eq!(seen_by_customer, created);
        assert_eq!(seen_by_technician, created);
    }

    #[tokio::test]
    async fn create_guards() {
        let (_dir, db) = shared_temp_db();
        let alice = Actor::new(&db, "Alice", Role::Customer);
        let tess = Actor::new(&db, "Tess", Role::Technician);

        let err = tess.engine().create_request(new_request("HVAC")).await.unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(_)));

        let mut blank = new_request("HVAC");
        blank.location = "  ".into();
        let err = alice.engine().create_request(blank).await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::Blank("location"))
        ));

        let (_tx, rx) = watch::channel(Vec::new());
        let (_session, nobody) = watch::channel(None);
        let anonymous = TransitionEngine::new(Arc::clone(&db), nobody, rx, String::new());
        let err = anonymous.create_request(new_request("HVAC")).await.unwrap_err();
        assert!(matches!(err, ClientError::NotSignedIn));
    }

    #[tokio::test]
    async fn accept_opens_exactly_one_conversation() {
        let (_dir, db) = shared_temp_db();
        let alice = Actor::new(&db, "Alice", Role::Customer);
        let tess = Actor::new(&db, "Tess", Role::Technician);

        let id = accepted_request(&alice, &tess).await;
        let request = alice.request_where(id, |_| true).await;
        assert_eq!(request.assigned_technician_uid, Some(tess.id()));

        let conversations = alice.conversation_count(1).await;
        assert_eq!(tess.conversation_count(1).await, conversations);
        let conversation = &conversations[0];
        assert_eq!(conversation.participant_uids, [alice.id(), tess.id()]);
        assert_eq!(conversation.last_message_text, DEFAULT_OPENING_MESSAGE);
        let (other, info) = conversation.other_participant(alice.id()).unwrap();
        assert_eq!(other, tess.id());
        assert_eq!(info.full_name, "Tess");

        let messages = lock_db(&db).unwrap().list_messages(conversation.id).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender_uid, tess.id());
        assert_eq!(messages[0].text, DEFAULT_OPENING_MESSAGE);

        // Assignment is fixed once made.
        let tom = Actor::new(&db, "Tom", Role::Technician);
        tom.request_where(id, |r| r.status == RequestStatus::Accepted).await;
        let err = tom.engine().accept(id).await.unwrap_err();
        assert!(matches!(err, ClientError::Transition(TransitionError::Status { .. })));
    }

    #[tokio::test]
    async fn stale_accept_conflicts_without_side_effects() {
        let (_dir, db) = shared_temp_db();
        let alice = Actor::new(&db, "Alice", Role::Customer);
        let tess = Actor::new(&db, "Tess", Role::Technician);
        let tom = Actor::new(&db, "Tom", Role::Technician);

        let created = alice.engine().create_request(new_request("HVAC")).await.unwrap();
        tess.request_where(created.id, |_| true).await;
        tess.engine().accept(created.id).await.unwrap();

        // Tom still holds the Pending snapshot.
        let (_tx, stale) = watch::channel(vec![created.clone()]);
        let (_session, as_tom) = watch::channel(Some(tom.profile.clone()));
        let engine = TransitionEngine::new(
            Arc::clone(&db),
            as_tom,
            stale,
            "late".into(),
        );
        let err = engine.accept(created.id).await.unwrap_err();
        assert!(matches!(err, ClientError::Store(StoreError::Conflict(_))));

        let stored = lock_db(&db).unwrap().get_request(created.id).unwrap();
        assert_eq!(stored.assigned_technician_uid, Some(tess.id()));
        assert!(lock_db(&db)
            .unwrap()
            .list_conversations_for(tom.id())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn failed_conversation_leaves_request_pending() {
        let (_dir, db) = shared_temp_db();
        let alice = Actor::new(&db, "Alice", Role::Customer);
        let tess = Actor::new(&db, "Tess", Role::Technician);

        let created = alice.engine().create_request(new_request("HVAC")).await.unwrap();
        tess.request_where(created.id, |_| true).await;

        lock_db(&db)
            .unwrap()
            .conn()
            .execute_batch(
                "CREATE TRIGGER no_conversations BEFORE INSERT ON conversations
                 BEGIN SELECT RAISE(ABORT, 'conversation rejected'); END;",
            )
            .unwrap();

        let err = tess.engine().accept(created.id).await.unwrap_err();
        assert!(matches!(err, ClientError::Store(StoreError::Sqlite(_))));

        let stored = lock_db(&db).unwrap().get_request(created.id).unwrap();
        assert_eq!(stored.status, RequestStatus::Pending);
        assert_eq!(stored.assigned_technician_uid, None);
        assert!(lock_db(&db)
            .unwrap()
            .list_conversations_for(tess.id())
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn decline_keeps_assignee_empty() {
        let (_dir, db) = shared_temp_db();
        let alice = Actor::new(&db, "Alice", Role::Customer);
        let tess = Actor::new(&db, "Tess", Role::Technician);

        let created = alice.engine().create_request(new_request("HVAC")).await.unwrap();
        tess.request_where(created.id, |_| true).await;

        let err = alice.engine().decline(created.id).await.unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(_)));

        tess.engine().decline(created.id).await.unwrap();
        let declined = alice
            .request_where(created.id, |r| r.status == RequestStatus::Declined)
            .await;
        assert_eq!(declined.assigned_technician_uid, None);

        tess.request_where(created.id, |r| r.status == RequestStatus::Declined)
            .await;
        let err = tess.engine().accept(created.id).await.unwrap_err();
        assert!(matches!(err, ClientError::Transition(_)));
        assert!(tess.conversations.snapshot().is_empty());
    }

    #[tokio::test]
    async fn work_and_completion_guards() {
        let (_dir, db) = shared_temp_db();
        let alice = Actor::new(&db, "Alice", Role::Customer);
        let tess = Actor::new(&db, "Tess", Role::Technician);
        let tom = Actor::new(&db, "Tom", Role::Technician);

        let id = accepted_request(&alice, &tess).await;
        tom.request_where(id, |r| r.status == RequestStatus::Accepted).await;

        let err = tom.engine().start_work(id).await.unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(_)));
        let err = tom.engine().complete(id).await.unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(_)));
        let err = alice.engine().start_work(id).await.unwrap_err();
        assert!(matches!(err, ClientError::Forbidden(_)));

        tess.engine().start_work(id).await.unwrap();
        alice
            .request_where(id, |r| r.status == RequestStatus::InProgress)
            .await;
        alice.engine().complete(id).await.unwrap();
        let done = tess
            .request_where(id, |r| r.status == RequestStatus::Completed)
            .await;
        assert_eq!(done.assigned_technician_uid, Some(tess.id()));

        let err = tess
            .engine()
            .update_status(id, RequestStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Transition(_)));
    }

    #[tokio::test]
    async fn unknown_request_is_not_found() {
        let (_dir, db) = shared_temp_db();
        let tess = Actor::new(&db, "Tess", Role::Technician);
        let mut rx = tess.requests.subscribe();
        wait_for(&mut rx, |rows| rows.is_empty()).await;

        let missing = Uuid::new_v4();
        let err = tess.engine().accept(missing).await.unwrap_err();
        assert!(matches!(err, ClientError::RequestNotFound(id) if id == missing));
    }
}
