//! # Watch Loop
//!
//! Controller watch loop for TemplatedSecret resources.
//!
//! Reconciliation is triggered by:
//! - changes to a TemplatedSecret
//! - changes to a Secret it owns
//! - changes to a Secret any of its templates references
//! - the periodic resync scheduled after a successful pass

use crate::controller::reconciler::{dependents_of, reconcile};
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use crate::observability;
use crate::runtime::initialization::InitializationResult;
use futures::StreamExt;
use kube_runtime::{controller, watcher, Controller};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use tracing::{debug, info, warn, Instrument};

/// Run the controller until a shutdown signal arrives
///
/// The watch is restarted whenever the controller stream ends for any
/// other reason.
///
/// # Errors
///
/// Currently never fails; the signature leaves room for fatal watch errors.
pub async fn run_watch_loop(init: InitializationResult) -> Result<(), anyhow::Error> {
    let InitializationResult {
        templated_secrets,
        secrets,
        reconciler,
        server_state,
        controller_config,
        ..
    } = init;

    let watch_backoff_ms = Arc::new(AtomicU64::new(controller_config.watch_backoff_start_ms));

    // Mark the server not ready as soon as a shutdown signal arrives
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!("Received shutdown signal, initiating graceful shutdown...");
        shutdown_state.set_ready(false);
    });

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let watch_span = tracing::info_span!("controller.watch", operation = "watch_loop");
        watch_span.in_scope(|| info!("Starting controller watch loop..."));

        let controller = Controller::new(
            templated_secrets.clone(),
            watcher::Config::default().any_semantic(),
        )
        .with_config(
            controller::Config::default()
                .concurrency(controller_config.max_concurrent_reconciliations),
        )
        .owns(secrets.clone(), watcher::Config::default());

        let templated_store = controller.store();
        let backoff = Arc::clone(&watch_backoff_ms);
        let config = Arc::clone(&controller_config);

        controller
            .watches(secrets.clone(), watcher::Config::default(), move |secret| {
                dependents_of(&secret, &templated_store.state())
            })
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, Arc::clone(&reconciler))
            .filter_map(move |result| {
                let backoff = Arc::clone(&backoff);
                let config = Arc::clone(&config);
                async move {
                    match result {
                        Ok((object, action)) => {
                            backoff.store(
                                config.watch_backoff_start_ms,
                                std::sync::atomic::Ordering::Relaxed,
                            );
                            debug!(resource = %object, ?action, "watch.event.reconciled");
                            Some(())
                        }
                        // Already logged and scheduled by the error policy
                        Err(controller::Error::ReconcilerFailed(error, object)) => {
                            debug!(resource = %object, %error, "watch.event.reconciliation_failed");
                            Some(())
                        }
                        Err(controller::Error::ObjectNotFound(object)) => {
                            debug!(resource = %object, "watch.event.object_gone");
                            Some(())
                        }
                        Err(e) => handle_watch_stream_error(
                            &format!("{e:?}"),
                            &backoff,
                            config.watch_backoff_max_ms,
                            config.watch_restart_delay(),
                        )
                        .await
                        .then_some(()),
                    }
                }
            })
            .for_each(|()| futures::future::ready(()))
            .instrument(watch_span)
            .await;

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        let delay = controller_config.watch_restart_delay_after_end();
        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            delay.as_secs()
        );
        observability::metrics::increment_watch_restarts();
        tokio::time::sleep(delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for SIGINT: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
