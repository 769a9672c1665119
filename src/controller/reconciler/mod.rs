//! # Reconciler
//!
//! Reconciliation of `TemplatedSecret` resources.
//!
//! ## Module Structure
//!
//! - `references.rs` - Finding and parsing `$(secret > key)` references
//! - `resolver.rs` - Looking up referenced values
//! - `materialize.rs` - Rendering templates and writing the output Secret
//! - `status.rs` - Reporting the outcome on the TemplatedSecret
//! - `store.rs` - Cluster access used by a pass
//! - `dependents.rs` - Mapping Secret changes to TemplatedSecrets
//! - `reconcile.rs` - The pass itself and the controller entry point
//! - `types.rs` - Shared context and errors

pub mod dependents;
pub mod materialize;
pub mod reconcile;
pub mod references;
pub mod resolver;
pub mod status;
pub mod store;
mod types;

pub use dependents::{dependents_of, references_secret};
pub use materialize::{SecretRef, SecretWrite};
pub use reconcile::{reconcile, reconcile_templated_secret, PassOutcome};
pub use references::{collect_references, find_references, parse_reference, VariableReference};
pub use resolver::{resolve_references, ResolveError, ResolvedValues};
pub use status::ReconcileStatus;
pub use store::{KubeSecretStore, SecretStore, StoreError};
pub use types::{BackoffState, Reconciler, ReconcilerError};
