//! # eservice-client
//!
//! Client core of the service marketplace: auth, profile resolution, live
//! role-scoped views of requests and conversations, and the guarded
//! transition engine that every write goes through.
//!
//! A UI embeds this crate by opening an [`AppState`](state::AppState),
//! feeding it identity changes from [`Auth`](auth::Auth), rendering the
//! `watch` snapshots the synchronizers publish, and calling the
//! [`TransitionEngine`](commands::TransitionEngine) for writes.

pub mod auth;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod profile;
pub mod state;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global `tracing` subscriber.
///
/// Respects `RUST_LOG`; calling it more than once is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("eservice_client=debug,eservice_store=info,warn")
    });

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .try_init();
}
