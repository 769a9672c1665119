//! # Reference Resolver
//!
//! Looks up the value behind every distinct reference token of one
//! TemplatedSecret.
//!
//! Each referenced Secret is fetched at most once per pass and nothing is
//! kept between passes, so a pass always sees the current content of the
//! Secrets it depends on. Tokens are visited in sorted order and the first
//! failure ends the pass; when several references are broken at once, later
//! passes surface the remaining ones after the first is fixed.

use super::references::{parse_reference, ReferenceError, VariableReference};
use super::store::{SecretStore, StoreError};
use k8s_openapi::api::core::v1::Secret;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;
use tracing::debug;

/// Resolved value for every token, keyed by the raw token text
pub type ResolvedValues = BTreeMap<String, Vec<u8>>;

/// Why a set of tokens could not be resolved
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error(transparent)]
    InvalidReference(#[from] ReferenceError),
    #[error("variable '{token}' references secret '{namespace}/{secret_name}' which does not exist")]
    MissingSecret {
        token: String,
        namespace: String,
        secret_name: String,
    },
    #[error("variable '{token}' references key '{key}' which is not present in secret '{namespace}/{secret_name}'")]
    MissingKey {
        token: String,
        namespace: String,
        secret_name: String,
        key: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Resolve every token against the store
///
/// Two-part tokens resolve in `default_namespace`.
///
/// # Errors
///
/// Returns the first [`ResolveError`] encountered.
pub async fn resolve_references<S>(
    store: &S,
    tokens: &BTreeSet<String>,
    default_namespace: &str,
) -> Result<ResolvedValues, ResolveError>
where
    S: SecretStore + ?Sized,
{
    let references = tokens
        .iter()
        .map(|token| parse_reference(token, default_namespace))
        .collect::<Result<Vec<_>, _>>()?;

    let mut fetched: HashMap<(String, String), Option<Secret>> = HashMap::new();
    let mut resolved = ResolvedValues::new();

    for reference in references {
        let secret_key = (reference.namespace.clone(), reference.secret_name.clone());
        if !fetched.contains_key(&secret_key) {
            debug!(
                namespace = reference.namespace.as_str(),
                secret = reference.secret_name.as_str(),
                "Fetching referenced secret"
            );
            let secret = store
                .get_secret(&reference.namespace, &reference.secret_name)
                .await?;
            fetched.insert(secret_key.clone(), secret);
        }

        let value = lookup(fetched.get(&secret_key).and_then(Option::as_ref), &reference)?;
        resolved.insert(reference.token, value);
    }

    Ok(resolved)
}

fn lookup(secret: Option<&Secret>, reference: &VariableReference) -> Result<Vec<u8>, ResolveError> {
    let Some(secret) = secret else {
        return Err(ResolveError::MissingSecret {
            token: reference.token.clone(),
            namespace: reference.namespace.clone(),
            secret_name: reference.secret_name.clone(),
        });
    };

    secret
        .data
        .as_ref()
        .and_then(|data| data.get(&reference.key))
        .map(|value| value.0.clone())
        .ok_or_else(|| ResolveError::MissingKey {
            token: reference.token.clone(),
            namespace: reference.namespace.clone(),
            secret_name: reference.secret_name.clone(),
            key: reference.key.clone(),
        })
}
