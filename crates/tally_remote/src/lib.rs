//! # Tally Remote
//!
//! Resilient client for the remote relational store.
//!
//! This crate provides:
//! - [`RemoteClient`]: parameterized statement execution over HTTP
//! - Pre-flight connectivity cache and circuit breaker (fail fast)
//! - Bounded retry with exponential backoff and jitter
//! - Structured error classification at a single boundary
//! - A health snapshot for status surfaces
//!
//! The HTTP layer is abstracted behind [`StatementExecutor`] so the
//! client (and everything above it) can run against an in-process fake.
//!
//! ## Error model
//!
//! Every failure is classified exactly once, into [`RemoteError`]:
//! transient failures (timeouts, connection errors, 5xx) are retried and
//! open the circuit; auth rejections and permanent failures are returned
//! immediately and never retried; offline is detected pre-flight without
//! a network attempt.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod client;
mod config;
mod connectivity;
mod error;
mod executor;
mod wire;

pub use client::{QueryOptions, RemoteClient, RemoteHealth};
pub use config::{RemoteConfig, RetryConfig};
pub use connectivity::{AssumeOnline, ConnectivityProbe, ConnectivitySnapshot, MockProbe};
pub use error::{RemoteError, RemoteResult};
pub use executor::{HttpStatementExecutor, MockExecutor, StatementExecutor, TransportFailure};
pub use wire::{QueryResponse, Row, Statement, StatementBatch, StatementResult};
