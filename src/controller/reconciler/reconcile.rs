//! # Reconcile
//!
//! One reconciliation pass for a TemplatedSecret, and the controller entry
//! point that turns its outcome into a retry decision.
//!
//! A pass:
//!
//! 1. Collects the distinct reference tokens of all template values
//! 2. Resolves them against the current Secrets (first failure wins)
//! 3. Re-checks that the TemplatedSecret still exists
//! 4. Creates or updates the owned output Secret
//! 5. Records the outcome in the TemplatedSecret status
//!
//! Steps 2 and 4 report their failures through the status. Only store
//! failures abort the pass with an error.

use super::materialize::{materialize, MaterializeError, SecretRef, SecretWrite};
use super::references::collect_references;
use super::resolver::{resolve_references, ResolveError};
use super::status::{update_status, ReconcileStatus};
use super::store::SecretStore;
use super::types::{Reconciler, ReconcilerError};
use crate::crd::TemplatedSecret;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Result of a single pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassOutcome {
    /// Status recorded on the TemplatedSecret, `None` when it was deleted mid-pass
    pub status: Option<ReconcileStatus>,
    /// What happened to the output Secret, if it was reached
    pub secret_write: Option<SecretWrite>,
}

impl PassOutcome {
    fn deleted() -> Self {
        Self {
            status: None,
            secret_write: None,
        }
    }

    /// Whether the pass asked to be retried
    #[must_use]
    pub fn requeue(&self) -> bool {
        self.status.as_ref().is_some_and(ReconcileStatus::requeue)
    }
}

/// Run one reconciliation pass for `templated` against `store`
///
/// # Errors
///
/// Returns [`ReconcilerError`] when the store fails or the TemplatedSecret
/// lacks the metadata needed to address its output. Everything else is
/// reported through the status and the returned [`PassOutcome`].
pub async fn reconcile_templated_secret<S>(
    templated: &TemplatedSecret,
    store: &S,
) -> Result<PassOutcome, ReconcilerError>
where
    S: SecretStore + ?Sized,
{
    let namespace = templated
        .namespace()
        .ok_or(ReconcilerError::MissingObjectKey("namespace"))?;
    let name = templated
        .metadata
        .name
        .clone()
        .ok_or(ReconcilerError::MissingObjectKey("name"))?;

    let tokens = collect_references(templated.spec.data.values());
    debug!(references = tokens.len(), "Collected variable references");

    let resolved = match resolve_references(store, &tokens, &namespace).await {
        Ok(resolved) => resolved,
        Err(ResolveError::Store(e)) => return Err(e.into()),
        Err(e) => {
            let status = ReconcileStatus::try_from(e)?;
            info!(reason = status.reason(), "{}", status);
            update_status(store, templated, &status).await?;
            return Ok(PassOutcome {
                status: Some(status),
                secret_write: None,
            });
        }
    };

    // It may have been deleted while the references were being resolved
    let Some(current) = store.get_templated_secret(&namespace, &name).await? else {
        info!("TemplatedSecret resource not found. Ignoring since object must be deleted.");
        return Ok(PassOutcome::deleted());
    };

    let (status, secret_write) = match materialize(store, &current, &resolved).await {
        Ok((secret, write)) => (ReconcileStatus::UpToDate { secret }, Some(write)),
        Err(MaterializeError::NotOwned {
            namespace: secret_namespace,
            name: secret_name,
        }) => (
            ReconcileStatus::NotOwned {
                secret: SecretRef {
                    namespace: secret_namespace,
                    name: secret_name,
                },
                owner: format!("{namespace}/{name}"),
            },
            None,
        ),
        Err(MaterializeError::MissingObjectKey(key)) => {
            return Err(ReconcilerError::MissingObjectKey(key))
        }
        Err(MaterializeError::Store(e)) => return Err(e.into()),
    };

    if let Some(write) = secret_write {
        debug!(operation = write.as_str(), "Output secret processed");
    }
    update_status(store, &current, &status).await?;

    Ok(PassOutcome {
        status: Some(status),
        secret_write,
    })
}

/// Controller entry point
///
/// Requested retries use the per-resource Fibonacci backoff; a successful
/// pass resets it and schedules the periodic resync.
///
/// # Errors
///
/// Propagates [`ReconcilerError`] to the error policy.
pub async fn reconcile(
    templated: Arc<TemplatedSecret>,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let namespace = templated.namespace().unwrap_or_default();
    let name = templated.name_any();
    let resource_key = format!("{namespace}/{name}");

    let span = tracing::info_span!(
        "controller.reconcile",
        resource.namespace = namespace.as_str(),
        resource.name = name.as_str(),
        resource.generation = templated.metadata.generation.unwrap_or(0),
    );

    decide(templated, ctx, resource_key).instrument(span).await
}

async fn decide(
    templated: Arc<TemplatedSecret>,
    ctx: Arc<Reconciler>,
    resource_key: String,
) -> Result<Action, ReconcilerError> {
    observability::metrics::increment_reconciliations();
    let start = Instant::now();
    let result = reconcile_templated_secret(&templated, &ctx.store()).await;
    observability::metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

    let outcome = result?;
    if let Some(write) = outcome.secret_write {
        if write != SecretWrite::Unchanged {
            observability::metrics::increment_secret_writes(write.as_str());
        }
    }

    let Some(status) = outcome.status else {
        ctx.reset_backoff(&resource_key);
        return Ok(Action::await_change());
    };
    observability::metrics::increment_outcome(status.reason());

    if status.requeue() {
        let (delay, error_count) = ctx.next_backoff(&resource_key);
        warn!(
            reason = status.reason(),
            error_count,
            "Retrying in {}s: {}",
            delay.as_secs(),
            status
        );
        observability::metrics::increment_requeues_total(status.reason());
        return Ok(Action::requeue(delay));
    }

    ctx.reset_backoff(&resource_key);
    match (&status, ctx.config.resync_interval()) {
        (ReconcileStatus::UpToDate { .. }, Some(interval)) => {
            debug!("Next resync in {}s", interval.as_secs());
            Ok(Action::requeue(interval))
        }
        _ => Ok(Action::await_change()),
    }
}
