//! # Controller
//!
//! Core controller modules for the Templated Secret Controller.
//!
//! - `backoff`: Fibonacci backoff for retries
//! - `reconciler`: Reconciliation of TemplatedSecret resources
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod server;
