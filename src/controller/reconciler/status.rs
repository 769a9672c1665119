//! # Status Management
//!
//! Maps the outcome of a pass to the TemplatedSecret status and writes it
//! back, skipping writes that would not change anything.

use super::materialize::SecretRef;
use super::references::ReferenceError;
use super::resolver::ResolveError;
use super::store::{SecretStore, StoreError};
use crate::crd::{Condition, TemplatedSecret, TemplatedSecretStatus};
use kube::ResourceExt;
use std::fmt;
use tracing::debug;

/// Outcome of a reconciliation pass as reported to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileStatus {
    UpToDate {
        secret: SecretRef,
    },
    MissingSecret {
        token: String,
    },
    MissingKey {
        token: String,
        secret_name: String,
        key: String,
    },
    NotOwned {
        secret: SecretRef,
        owner: String,
    },
    InvalidReference {
        token: String,
    },
}

impl ReconcileStatus {
    /// Machine-readable reason, used for the Ready condition and metrics
    #[must_use]
    pub fn reason(&self) -> &'static str {
        match self {
            Self::UpToDate { .. } => "UpToDate",
            Self::MissingSecret { .. } => "MissingSecret",
            Self::MissingKey { .. } => "MissingKey",
            Self::NotOwned { .. } => "NotOwned",
            Self::InvalidReference { .. } => "InvalidReference",
        }
    }

    /// Whether another pass should be scheduled without waiting for a change
    ///
    /// A missing Secret or key can appear at any time. An ownership
    /// conflict needs someone to move the conflicting Secret first.
    #[must_use]
    pub fn requeue(&self) -> bool {
        matches!(
            self,
            Self::MissingSecret { .. } | Self::MissingKey { .. } | Self::InvalidReference { .. }
        )
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::UpToDate { .. })
    }
}

/// Reportable resolution failures become a status; store failures are handed back
impl TryFrom<ResolveError> for ReconcileStatus {
    type Error = StoreError;

    fn try_from(error: ResolveError) -> Result<Self, Self::Error> {
        match error {
            ResolveError::InvalidReference(ReferenceError::InvalidReferenceSyntax(token)) => {
                Ok(Self::InvalidReference { token })
            }
            ResolveError::MissingSecret { token, .. } => Ok(Self::MissingSecret { token }),
            ResolveError::MissingKey {
                token,
                secret_name,
                key,
                ..
            } => Ok(Self::MissingKey {
                token,
                secret_name,
                key,
            }),
            ResolveError::Store(e) => Err(e),
        }
    }
}

impl fmt::Display for ReconcileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UpToDate { secret } => write!(f, "Secret '{secret}' is up to date."),
            Self::MissingSecret { token } => write!(
                f,
                "Unable to resolve variable '{token}' because the secret does not exist."
            ),
            Self::MissingKey {
                token,
                secret_name,
                key,
            } => write!(
                f,
                "Unable to resolve variable '{token}' because the key '{key}' was not found in secret '{secret_name}'."
            ),
            Self::NotOwned { secret, owner } => write!(
                f,
                "Secret '{secret}' is not owned by TemplatedSecret '{owner}'. Not updating."
            ),
            Self::InvalidReference { token } => write!(f, "Unable to parse variable '{token}'."),
        }
    }
}

/// Build the status a TemplatedSecret should carry after a pass
///
/// The condition transition time is kept when readiness did not flip.
#[must_use]
pub fn desired_status(templated: &TemplatedSecret, outcome: &ReconcileStatus) -> TemplatedSecretStatus {
    let ready = if outcome.is_ready() { "True" } else { "False" };
    let previous = templated
        .status
        .as_ref()
        .and_then(|s| s.conditions.iter().find(|c| c.r#type == "Ready"));
    let last_transition_time = match previous {
        Some(condition) if condition.status == ready => condition.last_transition_time.clone(),
        _ => Some(chrono::Utc::now().to_rfc3339()),
    };
    let message = outcome.to_string();

    TemplatedSecretStatus {
        message: message.clone(),
        observed_generation: templated.metadata.generation,
        conditions: vec![Condition {
            r#type: "Ready".to_string(),
            status: ready.to_string(),
            last_transition_time,
            reason: Some(outcome.reason().to_string()),
            message: Some(message),
        }],
    }
}

/// Write the status for `outcome`
///
/// CRITICAL: status writes trigger watch events, so nothing is written when
/// the message and observed generation are already current.
///
/// # Errors
///
/// Propagates store failures.
pub async fn update_status<S>(
    store: &S,
    templated: &TemplatedSecret,
    outcome: &ReconcileStatus,
) -> Result<(), StoreError>
where
    S: SecretStore + ?Sized,
{
    let status = desired_status(templated, outcome);

    if let Some(current) = &templated.status {
        if current.message == status.message
            && current.observed_generation == status.observed_generation
        {
            debug!(
                "Skipping status update for {}/{} - message unchanged: {}",
                templated.namespace().unwrap_or_default(),
                templated.name_any(),
                status.message
            );
            return Ok(());
        }
    }

    store.write_status(templated, &status).await
}
