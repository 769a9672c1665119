//! # Prelude
//!
//! Re-exports commonly used types and traits.
//!
//! ```rust
//! use templated_secret_controller::prelude::*;
//! ```

pub use crate::crd::*;

pub use crate::controller::reconciler::{
    reconcile, reconcile_templated_secret, BackoffState, KubeSecretStore, PassOutcome,
    ReconcileStatus, Reconciler, ReconcilerError, SecretStore, StoreError,
};

pub use crate::config::{ControllerConfig, ServerConfig};
