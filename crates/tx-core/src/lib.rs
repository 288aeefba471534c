//! The `tx` domain kernel: task DAG, leases, runs, outbox, and learning
//! retrieval over an embedded SQLite store (`tx_db`).
//!
//! This crate owns every business rule; `tx_db` is pure repository code
//! and `tx_cli` is a thin rendering/argument layer over the facade in
//! [`kernel`].

pub mod anchors;
pub mod capabilities;
pub mod claims;
pub mod dependencies;
pub mod errors;
pub mod ids;
pub mod kernel;
pub mod orchestrator;
pub mod outbox;
pub mod promotion;
pub mod retrieval;
pub mod runs;
pub mod tasks;
pub mod transcript;
pub mod workers;

pub use errors::{Error, Result};
