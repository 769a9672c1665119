//! # Observability
//!
//! Prometheus metrics for the controller. Logging is plain `tracing`,
//! configured in [`crate::runtime::initialization`].

pub mod metrics;

pub use metrics::*;
