//! # Error Policy
//!
//! Error handling and backoff for the controller watch loop: failed
//! reconciliations and watch stream errors.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::crd::TemplatedSecret;
use crate::observability;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle reconciliation errors with per-resource Fibonacci backoff
///
/// The backoff state is shared with requested retries and reset by the
/// next successful pass.
pub fn handle_reconciliation_error(
    templated: Arc<TemplatedSecret>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action {
    let name = templated.name_any();
    let namespace = templated.namespace().unwrap_or_default();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        resource.name = name.as_str(),
        resource.namespace = namespace.as_str(),
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {}", namespace, name, error);
    observability::metrics::increment_reconciliation_errors();

    let (delay, error_count) = ctx.next_backoff(&format!("{namespace}/{name}"));
    let next_trigger_time = chrono::Utc::now()
        + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());

    info!(
        "Retrying with Fibonacci backoff: {}s (error count: {}), next attempt at {}",
        delay.as_secs(),
        error_count,
        next_trigger_time.to_rfc3339()
    );

    observability::metrics::increment_requeues_total("error-backoff");
    Action::requeue(delay)
}

/// How a watch stream error should be treated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorKind {
    Unauthorized,
    Expired,
    Throttled,
    NotFound,
    Other,
}

impl WatchErrorKind {
    /// Classify a formatted watch error
    ///
    /// 404 is checked before 401 because not-found errors can carry
    /// `WatchFailed` text in their chain.
    #[must_use]
    pub fn classify(error: &str) -> Self {
        let is_not_found = error.contains("ObjectNotFound")
            || error.contains("404")
            || error.contains("not found");

        if (error.contains("401") || error.contains("Unauthorized") || error.contains("403"))
            && !is_not_found
        {
            Self::Unauthorized
        } else if error.contains("410")
            || error.contains("too old resource version")
            || error.contains("Expired")
            || error.contains("Gone")
        {
            Self::Expired
        } else if error.contains("429")
            || error.contains("storage is (re)initializing")
            || error.contains("TooManyRequests")
        {
            Self::Throttled
        } else if is_not_found {
            Self::NotFound
        } else {
            Self::Other
        }
    }
}

/// Handle a watch stream error
///
/// Returns `true` when the stream should keep going and `false` when the
/// event should be dropped so the watch can restart.
pub async fn handle_watch_stream_error(
    error: &str,
    backoff_ms: &AtomicU64,
    max_backoff_ms: u64,
    watch_restart_delay: Duration,
) -> bool {
    let error_span = tracing::span!(tracing::Level::WARN, "controller.watch.error", error = %error);
    let _error_guard = error_span.enter();

    match WatchErrorKind::classify(error) {
        WatchErrorKind::Unauthorized => {
            error!(
                "Watch authentication failed - RBAC may have been revoked or the token expired"
            );
            error!("Verify the controller can list and watch templatedsecrets and secrets:");
            error!(
                "  kubectl auth can-i watch templatedsecrets.k8s.basilfx.net --as=system:serviceaccount:<namespace>:templated-secret-controller --all-namespaces"
            );
            warn!(
                "Waiting {}s before retrying watch...",
                watch_restart_delay.as_secs()
            );
            tokio::time::sleep(watch_restart_delay).await;
            false
        }
        WatchErrorKind::Expired => {
            warn!("Watch resource version expired (410), watch will restart");
            false
        }
        WatchErrorKind::Throttled => {
            let current = backoff_ms.load(Ordering::Relaxed);
            warn!(
                "API server throttling (429), backing off for {}ms before restart...",
                current
            );
            tokio::time::sleep(Duration::from_millis(current)).await;
            backoff_ms.store(current.saturating_mul(2).min(max_backoff_ms), Ordering::Relaxed);
            false
        }
        WatchErrorKind::NotFound => {
            warn!(
                "Resource not found (404) - normal if it was deleted, otherwise check that the TemplatedSecret CRD is installed. Error: {}",
                error
            );
            true
        }
        WatchErrorKind::Other => {
            error!("Controller stream error: {}", error);
            tokio::time::sleep(watch_restart_delay).await;
            false
        }
    }
}
