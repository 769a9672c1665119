//! # Variable References
//!
//! Finds `$( ... > ... )` references in template strings and turns each
//! matched token into the `(namespace, secret, key)` it points at.
//!
//! Grammar: `"$(" token (">" token)+ ")"` where `token = [A-Za-z0-9_.-]+`,
//! optionally surrounded by whitespace around each `>`. A bare `$(token)` is
//! not a reference and is left alone. There is no escaping.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use thiserror::Error;

static REFERENCE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\([-_.a-zA-Z0-9]+(?:\s*>\s*[-_.a-zA-Z0-9]+)+\)")
        .expect("Failed to compile reference pattern - this should never happen")
});

/// A token matched the grammar but does not name a `[namespace >] secret > key` triple
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("invalid reference syntax '{0}': expected $(secret > key) or $(namespace > secret > key)")]
    InvalidReferenceSyntax(String),
}

/// A parsed reference to one key of one Secret
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableReference {
    /// Exact matched text, used as the substitution key
    pub token: String,
    pub namespace: String,
    pub secret_name: String,
    pub key: String,
}

impl VariableReference {
    /// Whether this reference reads from the Secret `namespace/name`
    #[must_use]
    pub fn points_at(&self, namespace: &str, name: &str) -> bool {
        self.namespace == namespace && self.secret_name == name
    }
}

/// Precompiled reference pattern, shared with the materializer
pub(crate) fn reference_pattern() -> &'static Regex {
    &REFERENCE_PATTERN
}

/// All non-overlapping reference tokens in `template`, in order of appearance
#[must_use]
pub fn find_references(template: &str) -> Vec<&str> {
    REFERENCE_PATTERN
        .find_iter(template)
        .map(|m| m.as_str())
        .collect()
}

/// Distinct reference tokens across every template value
pub fn collect_references<'a, I>(templates: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a String>,
{
    templates
        .into_iter()
        .flat_map(|template| find_references(template))
        .map(str::to_string)
        .collect()
}

/// Parse a matched token into a reference
///
/// Two parts are `secret > key` in `default_namespace`; three parts are
/// `namespace > secret > key`. Anything else is rejected.
///
/// # Errors
///
/// Returns [`ReferenceError::InvalidReferenceSyntax`] when the token is not
/// wrapped in `$(` `)` or does not split into two or three non-empty parts.
pub fn parse_reference(
    token: &str,
    default_namespace: &str,
) -> Result<VariableReference, ReferenceError> {
    let invalid = || ReferenceError::InvalidReferenceSyntax(token.to_string());

    let inner = token
        .strip_prefix("$(")
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(invalid)?;

    let parts: Vec<&str> = inner.split('>').map(str::trim).collect();
    if parts.iter().any(|part| part.is_empty()) {
        return Err(invalid());
    }

    let (namespace, secret_name, key) = match parts.as_slice() {
        [secret_name, key] => (default_namespace, *secret_name, *key),
        [namespace, secret_name, key] => (*namespace, *secret_name, *key),
        _ => return Err(invalid()),
    };

    Ok(VariableReference {
        token: token.to_string(),
        namespace: namespace.to_string(),
        secret_name: secret_name.to_string(),
        key: key.to_string(),
    })
}
