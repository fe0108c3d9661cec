//! Session state shared by every view of the client.
//!
//! `AppState` follows the signed-in identity: it resolves the profile and
//! re-scopes both synchronizers whenever the identity changes.  Views read
//! the synchronizer snapshots and send writes through the
//! [`TransitionEngine`] it hands out.

use std::sync::{Arc, Mutex, MutexGuard};

use eservice_store::{Database, Profile, StoreError};
use tokio::sync::watch;
use tracing::info;
use uuid::Uuid;

use crate::commands::TransitionEngine;
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::profile::ProfileStore;
use crate::sync::{ConversationSynchronizer, MessageThread, RequestSynchronizer};

/// The database handle shared by the engine and the live queries.
///
/// The lock is only taken inside blocking sections and is never held
/// across an `.await`.
pub type SharedDb = Arc<Mutex<Database>>;

pub(crate) fn lock_db(db: &SharedDb) -> Result<MutexGuard<'_, Database>, ClientError> {
    db.lock().map_err(|_| ClientError::LockPoisoned)
}

/// Run `f` against the database on the blocking thread pool.
pub(crate) async fn with_db<T, F>(db: &SharedDb, f: F) -> Result<T, ClientError>
where
    F: FnOnce(&mut Database) -> Result<T, StoreError> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || {
        let mut guard = lock_db(&db)?;
        f(&mut guard).map_err(ClientError::from)
    })
    .await
    .map_err(|e| ClientError::Task(e.to_string()))?
}

pub struct AppState {
    db: SharedDb,
    config: ClientConfig,
    profiles: ProfileStore,
    profile: watch::Sender<Option<Profile>>,
    requests: RequestSynchronizer,
    conversations: ConversationSynchronizer,
}

impl AppState {
    pub fn new(db: Database, config: ClientConfig) -> Self {
        let db: SharedDb = Arc::new(Mutex::new(db));
        let (profile, _rx) = watch::channel(None);
        Self {
            profiles: ProfileStore::new(Arc::clone(&db)),
            requests: RequestSynchronizer::new(Arc::clone(&db)),
            conversations: ConversationSynchronizer::new(Arc::clone(&db)),
            profile,
            config,
            db,
        }
    }

    /// Open the configured database and build a signed-out state.
    pub fn open(config: ClientConfig) -> Result<Self, ClientError> {
        let db = config.open_database()?;
        Ok(Self::new(db, config))
    }

    pub fn db(&self) -> &SharedDb {
        &self.db
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// React to a sign-in, sign-out or account switch.
    ///
    /// An identity without a readable profile is treated as signed out for
    /// scoping purposes: both views go empty.
    pub async fn on_identity_changed(&mut self, identity: Option<Uuid>) -> Result<(), ClientError> {
        let current = self.profile.borrow().as_ref().map(|p| p.id);
        if current == identity && (identity.is_none() || self.requests.is_live()) {
            return Ok(());
        }

        let profile = match identity {
            Some(id) => self.profiles.resolve(id).await,
            None => None,
        };

        match &profile {
            Some(p) => info!(user = %p.id, role = %p.role, "session scoped to profile"),
            None => info!("session cleared"),
        }

        // Engines stop acting for the old profile before the views re-scope.
        self.profile.send_replace(profile.clone());
        self.requests.set_profile(profile.as_ref())?;
        self.conversations.set_profile(profile.as_ref())?;
        Ok(())
    }

    pub fn profile(&self) -> Option<Profile> {
        self.profile.borrow().clone()
    }

    /// Follow the resolved profile.
    pub fn watch_profile(&self) -> watch::Receiver<Option<Profile>> {
        self.profile.subscribe()
    }

    pub fn requests(&self) -> &RequestSynchronizer {
        &self.requests
    }

    pub fn conversations(&self) -> &ConversationSynchronizer {
        &self.conversations
    }

    /// An engine acting as whichever profile is signed in when it is used.
    pub fn engine(&self) -> TransitionEngine {
        TransitionEngine::new(
            Arc::clone(&self.db),
            self.profile.subscribe(),
            self.requests.subscribe(),
            self.config.opening_message.clone(),
        )
    }

    /// Start following the messages of one conversation.
    pub fn open_thread(&self, conversation_id: Uuid) -> Result<MessageThread, ClientError> {
        MessageThread::open(&self.db, conversation_id)
    }
}
