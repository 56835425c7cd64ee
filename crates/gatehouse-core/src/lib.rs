//! Core domain types for the Gatehouse webhook gateway.
//!
//! This crate defines the request authentication vocabulary shared by the
//! authentication core and the HTTP surface: key directory records, cache
//! snapshots, inbound signed requests, and authorization decisions.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod models;

pub use models::{
    AuthDecision, KeyRecord, KeySetSnapshot, RejectReason, SignedRequest, VerifyStrategy,
};
