//! # Custom Resource Definitions
//!
//! CRD types for the Templated Secret Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `TemplatedSecret` specification and the output template
//! - `status.rs` - Status types for reporting the outcome of the last pass

mod spec;
mod status;

pub use spec::{
    default_secret_type, PartialObjectMeta, SecretTemplateSpec, TemplatedSecret,
    TemplatedSecretSpec,
};
pub use status::{Condition, TemplatedSecretStatus};
