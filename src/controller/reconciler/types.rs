//! # Types
//!
//! Core types for the reconciler.

use super::store::{KubeSecretStore, StoreError};
use crate::config::ControllerConfig;
use crate::controller::backoff::FibonacciBackoff;
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a pass without a status update
///
/// Handled by the error policy with per-resource backoff.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("store operation failed: {0}")]
    Store(#[from] StoreError),
    #[error("TemplatedSecret is missing metadata.{0}")]
    MissingObjectKey(&'static str),
}

/// Backoff state for a specific resource
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    #[must_use]
    pub fn new(min: Duration, max: Duration) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min, max),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

/// Shared context handed to every reconciliation
#[derive(Clone)]
pub struct Reconciler {
    pub client: Client,
    pub config: Arc<ControllerConfig>,
    // Keyed by namespace/name
    pub backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    #[must_use]
    pub fn new(client: Client, config: Arc<ControllerConfig>) -> Self {
        Self {
            client,
            config,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Store used by reconciliation passes
    #[must_use]
    pub fn store(&self) -> KubeSecretStore {
        KubeSecretStore::new(self.client.clone())
    }

    /// Advance the backoff of `resource_key` and return the delay with the error count
    ///
    /// Falls back to the minimum delay if the state lock is poisoned.
    pub fn next_backoff(&self, resource_key: &str) -> (Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(resource_key.to_string()).or_insert_with(|| {
                    BackoffState::new(self.config.backoff_min(), self.config.backoff_max())
                });
                state.increment_error();
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                tracing::warn!("Failed to lock backoff_states: {}, using default backoff", e);
                (self.config.backoff_min(), 0)
            }
        }
    }

    /// Forget the backoff of `resource_key` after a successful pass
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }
}
