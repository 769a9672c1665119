//! Templated Secret Controller Library
//!
//! A Kubernetes controller that builds Secrets from templates whose values
//! reference keys of other Secrets, written `$(secret > key)` or
//! `$(namespace > secret > key)`.
//!
//! ## Quick Start
//!
//! ```rust
//! use templated_secret_controller::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod runtime;

pub use crd::*;
