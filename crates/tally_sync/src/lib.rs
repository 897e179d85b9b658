//! # Tally Sync
//!
//! The synchronization engine: push, pull, and the orchestrator.
//!
//! This crate provides:
//! - [`PushEngine`]: flushes local dirty rows to the remote store in
//!   batched upserts and reconciles server-assigned metadata back
//! - [`PullEngine`]: incremental fetch past a persisted watermark with
//!   tombstone-priority conflict resolution
//! - [`SyncEngine`]: sequences push then pull with single-flight
//!   execution, soft throttling, and per-phase failure isolation
//!
//! ## Key Invariants
//!
//! - A local tombstone is never overwritten by any remote payload
//! - Within a cycle, every push remote call resolves before pull begins
//! - The pull watermark advances only past rows actually applied and is
//!   persisted only after a page completes
//! - Every row operation is idempotent on replay (at-least-once model)

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod orchestrator;
mod pull;
mod push;

pub use config::{CursorMode, SyncConfig};
pub use error::{SyncError, SyncResult};
pub use orchestrator::{SkipReason, SyncEngine, SyncOutcome, SyncReport, SyncStats};
pub use pull::{PullEngine, PullOutcome};
pub use push::{PushEngine, PushOutcome};
