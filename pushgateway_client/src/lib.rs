//! Client-side plumbing for a Prometheus Pushgateway.
//!
//! The Pushgateway only knows two write operations: "replace everything held
//! under this grouping key" and "delete this grouping key". This crate wraps
//! both behind the [`Aggregator`](client::Aggregator) trait, adds a parser for
//! the gateway's text exposition (the only way to list what it holds), and
//! builds the [`reconcile`](reconcile::reconcile) cleanup on top.

pub mod client;
pub mod errors;
pub mod exposition;
pub mod grouping;
#[cfg(feature = "test-util")]
pub mod memory;
pub mod reconcile;

pub use client::{Aggregator, ClientTimeouts, PushgatewayClient};
pub use errors::GatewayError;
pub use grouping::GroupKey;
