//! Live, scoped views over store collections.
//!
//! A live query is a background task that runs a query once, then re-runs
//! it whenever the change feed reports a write to a collection it watches.
//! Each run publishes the complete result set on a `watch` channel, so a
//! consumer only ever sees whole snapshots and never applies deltas.

pub mod conversations;
pub mod messages;
pub mod requests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use eservice_store::{Change, Database};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use crate::error::ClientError;
use crate::state::{lock_db, with_db, SharedDb};

pub use conversations::ConversationSynchronizer;
pub use messages::MessageThread;
pub use requests::{RequestScope, RequestSynchronizer};

type Query<T> = Arc<dyn Fn(&Database) -> eservice_store::Result<Vec<T>> + Send + Sync>;

/// Handle to a running live query.  Dropping it cancels the query.
#[derive(Debug)]
pub struct Subscription {
    label: &'static str,
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Stop the live query.  No snapshot is published after this returns.
    pub fn cancel(self) {
        drop(self);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        // Flag first: a run that already finished querying checks it while
        // holding the watch lock, so it cannot publish after this point.
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
        debug!(query = self.label, "live query cancelled");
    }
}

/// Spawn a live query that publishes into `out`.
///
/// Subscribes to the change feed before the first run so no write between
/// the initial query and the first notification is missed.
pub(crate) fn spawn_live_query<T, W>(
    db: &SharedDb,
    label: &'static str,
    watches: W,
    query: Query<T>,
    out: Arc<watch::Sender<Vec<T>>>,
) -> Result<Subscription, ClientError>
where
    T: Send + Sync + 'static,
    W: Fn(&Change) -> bool + Send + 'static,
{
    let changes = lock_db(db)?.subscribe_changes();
    let cancelled = Arc::new(AtomicBool::new(false));

    let task = tokio::spawn(run_live_query(
        Arc::clone(db),
        label,
        changes,
        watches,
        query,
        out,
        Arc::clone(&cancelled),
    ));

    debug!(query = label, "live query started");
    Ok(Subscription {
        label,
        cancelled,
        task,
    })
}

async fn run_live_query<T, W>(
    db: SharedDb,
    label: &'static str,
    mut changes: broadcast::Receiver<Change>,
    watches: W,
    query: Query<T>,
    out: Arc<watch::Sender<Vec<T>>>,
    cancelled: Arc<AtomicBool>,
) where
    T: Send + Sync + 'static,
    W: Fn(&Change) -> bool,
{
    refresh(&db, label, &query, &out, &cancelled).await;

    loop {
        match changes.recv().await {
            Ok(change) if watches(&change) => {
                refresh(&db, label, &query, &out, &cancelled).await;
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(query = label, skipped, "change feed lagged, re-querying");
                refresh(&db, label, &query, &out, &cancelled).await;
            }
            Err(RecvError::Closed) => {
                debug!(query = label, "change feed closed");
                break;
            }
        }
    }
}

async fn refresh<T>(
    db: &SharedDb,
    label: &'static str,
    query: &Query<T>,
    out: &watch::Sender<Vec<T>>,
    cancelled: &AtomicBool,
) where
    T: Send + Sync + 'static,
{
    let query = Arc::clone(query);
    match with_db(db, move |db| query(db)).await {
        Ok(rows) => {
            let count = rows.len();
            let published = out.send_if_modified(|snapshot| {
                if cancelled.load(Ordering::SeqCst) {
                    return false;
                }
                *snapshot = rows;
                true
            });
            if published {
                debug!(query = label, count, "snapshot published");
            }
        }
        // The last good snapshot stays visible.
        Err(e) => error!(query = label, error = %e, "live query failed"),
    }
}

/// Owns one snapshot channel and at most one live query feeding it.
///
/// Re-scoping cancels the current query and clears the snapshot before the
/// next query starts, so rows from an old scope never show up in a new one.
pub(crate) struct Synchronizer<T> {
    db: SharedDb,
    label: &'static str,
    snapshot: Arc<watch::Sender<Vec<T>>>,
    live: Option<Subscription>,
}

impl<T> Synchronizer<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub(crate) fn new(db: SharedDb, label: &'static str) -> Self {
        let (tx, _rx) = watch::channel(Vec::new());
        Self {
            db,
            label,
            snapshot: Arc::new(tx),
            live: None,
        }
    }

    pub(crate) fn rescope<W>(&mut self, watches: W, query: Query<T>) -> Result<(), ClientError>
    where
        W: Fn(&Change) -> bool + Send + 'static,
    {
        self.clear();
        let sub = spawn_live_query(
            &self.db,
            self.label,
            watches,
            query,
            Arc::clone(&self.snapshot),
        )?;
        self.live = Some(sub);
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        if let Some(live) = self.live.take() {
            live.cancel();
        }
        self.snapshot.send_replace(Vec::new());
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Vec<T>> {
        self.snapshot.subscribe()
    }

    pub(crate) fn snapshot(&self) -> Vec<T> {
        self.snapshot.borrow().clone()
    }

    pub(crate) fn with_snapshot<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.snapshot.borrow())
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live.as_ref().is_some_and(|live| !live.is_finished())
    }
}
