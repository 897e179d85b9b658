//! # Tally Core
//!
//! Domain model and shared vocabulary for Tally.
//!
//! This crate provides:
//! - The [`Transaction`] record and its sync metadata
//! - The closed [`SyncStatus`] state enum
//! - Patch and constructor types for local mutations
//! - The [`ChangeFeed`] observer for committed mutations
//! - Domain errors and epoch-millisecond time helpers
//!
//! ## Key Invariants
//!
//! - `deleted_at` is write-once: once set it is never cleared
//! - `SyncStatus::Tombstoned` is terminal; no write path transitions out of it
//! - `server_version` only increases for any given row

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod change_feed;
mod error;
mod time;
mod transaction;

pub use change_feed::{ChangeEvent, ChangeFeed, ChangeKind};
pub use error::{CoreError, CoreResult};
pub use time::now_millis;
pub use transaction::{
    NewTransaction, SyncStatus, Transaction, TransactionKind, TransactionPatch,
};
