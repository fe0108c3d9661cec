//! Fixtures shared by the client test modules.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use eservice_shared::constants::{default_avatar_url, DEFAULT_OPENING_MESSAGE};
use eservice_shared::types::{PaymentStatus, RequestStatus, Role, Urgency};
use eservice_store::{
    store_timestamp, Conversation, Database, NewConversation, Profile, ServiceRequest,
    WriteBatch,
};
use tempfile::TempDir;
use tokio::sync::watch;
use uuid::Uuid;

use crate::auth::{Auth, SignUp};
use crate::commands::{NewRequest, TransitionEngine};
use crate::config::ClientConfig;
use crate::state::{lock_db, AppState, SharedDb};
use crate::sync::{ConversationSynchronizer, RequestSynchronizer};

pub(crate) fn temp_db() -> (TempDir, Database) {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open_at(&dir.path().join("test.db")).unwrap();
    (dir, db)
}

pub(crate) fn shared_temp_db() -> (TempDir, SharedDb) {
    let (dir, db) = temp_db();
    (dir, Arc::new(Mutex::new(db)))
}

pub(crate) fn temp_state() -> (TempDir, AppState) {
    let (dir, db) = temp_db();
    (dir, AppState::new(db, ClientConfig::default()))
}

pub(crate) fn profile(name: &str, role: Role) -> Profile {
    let id = Uuid::new_v4();
    Profile {
        id,
        full_name: name.to_string(),
        email: format!("{}@example.com", name.to_lowercase()),
        role,
        avatar_url: default_avatar_url(&id),
        skills: (role == Role::Technician).then(|| vec!["Plumbing".to_string()]),
        created_at: store_timestamp(),
    }
}

pub(crate) fn pending_request(customer_id: Uuid, day: u32) -> ServiceRequest {
    ServiceRequest {
        id: Uuid::new_v4(),
        customer_id,
        assigned_technician_uid: None,
        customer_name: "Customer".into(),
        customer_avatar: String::new(),
        service_category: "Plumbing".into(),
        description: "Leaky tap".into(),
        location: "12 Main St".into(),
        date_time: Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap(),
        urgency: Urgency::Normal,
        status: RequestStatus::Pending,
        invoice: None,
        payment_status: PaymentStatus::None,
        technician_rating: None,
        customer_rating: None,
        photo: None,
        created_at: store_timestamp(),
    }
}

/// Commit a conversation between `customer` and `technician`, returning its id.
pub(crate) fn conversation_between(db: &SharedDb, customer: &Profile, technician: &Profile) -> Uuid {
    let id = Uuid::new_v4();
    let mut batch = WriteBatch::new();
    batch.create_conversation(NewConversation {
        id,
        participant_uids: [customer.id, technician.id],
        participant_info: BTreeMap::from([
            (customer.id, customer.participant_info()),
            (technician.id, technician.participant_info()),
        ]),
        last_message_text: "opening".into(),
    });
    lock_db(db).unwrap().commit_batch(batch).unwrap();
    // Keep updated_at strictly increasing between fixtures.
    std::thread::sleep(Duration::from_millis(2));
    id
}

/// Register an identity through [`Auth`] and return its id.
pub(crate) async fn sign_up(state: &AppState, email: &str, role: Role) -> Uuid {
    let auth = Auth::new(Arc::clone(state.db()));
    let name = email.split('@').next().unwrap_or("user").to_string();
    auth.sign_up(SignUp {
        email: email.to_string(),
        password: "hunter22".to_string(),
        full_name: name,
        role,
        skills: (role == Role::Technician).then(|| vec!["Plumbing".to_string()]),
    })
    .await
    .unwrap()
}

/// A visit scheduled `days` from now.
pub(crate) fn in_days(days: i64) -> chrono::DateTime<Utc> {
    Utc::now() + ChronoDuration::days(days)
}

/// Wait until the watched value satisfies `pred`, then return a copy of it.
pub(crate) async fn wait_for<T: Clone>(
    rx: &mut watch::Receiver<T>,
    pred: impl FnMut(&T) -> bool,
) -> T {
    let value = tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for snapshot")
        .expect("snapshot channel closed");
    (*value).clone()
}

/// One signed-in user with live views over a shared database.
pub(crate) struct Actor {
    pub(crate) profile: Profile,
    pub(crate) requests: RequestSynchronizer,
    pub(crate) conversations: ConversationSynchronizer,
    session: watch::Sender<Option<Profile>>,
    db: SharedDb,
}

impl Actor {
    pub(crate) fn new(db: &SharedDb, name: &str, role: Role) -> Self {
        let profile = profile(name, role);
        lock_db(db).unwrap().insert_profile(&profile).unwrap();

        let mut requests = RequestSynchronizer::new(Arc::clone(db));
        requests.set_profile(Some(&profile)).unwrap();
        let mut conversations = ConversationSynchronizer::new(Arc::clone(db));
        conversations.set_profile(Some(&profile)).unwrap();

        let (session, _rx) = watch::channel(Some(profile.clone()));
        Self {
            profile,
            requests,
            conversations,
            session,
            db: Arc::clone(db),
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.profile.id
    }

    pub(crate) fn engine(&self) -> TransitionEngine {
        TransitionEngine::new(
            Arc::clone(&self.db),
            self.session.subscribe(),
            self.requests.subscribe(),
            DEFAULT_OPENING_MESSAGE.to_string(),
        )
    }

    /// Wait until this actor's view shows request `id` matching `pred`.
    pub(crate) async fn request_where(
        &self,
        id: Uuid,
        pred: impl Fn(&ServiceRequest) -> bool,
    ) -> ServiceRequest {
        let mut rx = self.requests.subscribe();
        let rows = wait_for(&mut rx, |rows| rows.iter().any(|r| r.id == id && pred(r))).await;
        rows.into_iter()
            .find(|r| r.id == id)
            .expect("request vanished from snapshot")
    }

    pub(crate) async fn conversation_count(&self, count: usize) -> Vec<Conversation> {
        let mut rx = self.conversations.subscribe();
        wait_for(&mut rx, |rows| rows.len() == count).await
    }
}

pub(crate) fn new_request(category: &str) -> NewRequest {
    NewRequest {
        service_category: category.to_string(),
        description: "Water under the sink".to_string(),
        location: "12 Main St".to_string(),
        date_time: in_days(3),
        urgency: Urgency::High,
        photo: None,
    }
}

/// Drive a fresh request from `customer` through acceptance by `technician`.
pub(crate) async fn accepted_request(customer: &Actor, technician: &Actor) -> Uuid {
    let id = customer
        .engine()
        .create_request(new_request("Plumbing"))
        .await
        .unwrap()
        .id;
    technician.request_where(id, |_| true).await;
    technician.engine().accept(id).await.unwrap();
    customer
        .request_where(id, |r| r.status == RequestStatus::Accepted)
        .await;
    technician
        .request_where(id, |r| r.status == RequestStatus::Accepted)
        .await;
    id
}

pub(crate) async fn completed_request(customer: &Actor, technician: &Actor) -> Uuid {
    let id = accepted_request(customer, technician).await;
    customer.engine().complete(id).await.unwrap();
    technician
        .request_where(id, |r| r.status == RequestStatus::Completed)
        .await;
    customer
        .request_where(id, |r| r.status == RequestStatus::Completed)
        .await;
    id
}

pub(crate) async fn paid_request(customer: &Actor, technician: &Actor) -> Uuid {
    use eservice_shared::types::{InvoiceDraft, InvoiceItem};

    let id = completed_request(customer, technician).await;
    technician
        .engine()
        .create_invoice(id, InvoiceDraft::from_items(vec![InvoiceItem::new("Labour", 80.0)]))
        .await
        .unwrap();
    customer
        .request_where(id, |r| r.payment_status == PaymentStatus::Pending)
        .await;
    customer.engine().mark_paid(id).await.unwrap();
    customer
        .request_where(id, |r| r.payment_status == PaymentStatus::Paid)
        .await;
    technician
        .request_where(id, |r| r.payment_status == PaymentStatus::Paid)
        .await;
    id
}
