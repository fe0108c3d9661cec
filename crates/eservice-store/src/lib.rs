//! # eservice-store
//!
//! Local document store for the service marketplace, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for every collection
//! (`profiles`, `accounts`, `requests`, `conversations`, `messages`).  Every
//! committed write is announced on a broadcast change feed so that live
//! queries can re-run, and multi-document writes go through an atomic
//! [`WriteBatch`].

pub mod accounts;
pub mod batch;
pub mod changes;
pub mod conversations;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod profiles;
pub mod requests;

mod codec;
mod error;

pub use batch::{BatchOp, WriteBatch};
pub use changes::Change;
pub use codec::now as store_timestamp;
pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
