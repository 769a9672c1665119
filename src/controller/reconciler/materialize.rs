//! # Secret Materializer
//!
//! Substitutes resolved values into the template fields and creates or
//! updates the output Secret, refusing to touch a Secret this
//! TemplatedSecret does not own.

use super::references::reference_pattern;
use super::resolver::ResolvedValues;
use super::store::{SecretStore, StoreError};
use crate::crd::{default_secret_type, TemplatedSecret};
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum MaterializeError {
    #[error("Secret '{namespace}/{name}' exists and is not owned by this TemplatedSecret")]
    NotOwned { namespace: String, name: String },
    #[error("TemplatedSecret is missing metadata.{0}")]
    MissingObjectKey(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Namespace and name of the output Secret
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRef {
    pub namespace: String,
    pub name: String,
}

impl fmt::Display for SecretRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// What the materializer did to the output Secret
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretWrite {
    Created,
    Updated,
    Unchanged,
}

impl SecretWrite {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            SecretWrite::Created => "create",
            SecretWrite::Updated => "update",
            SecretWrite::Unchanged => "unchanged",
        }
    }
}

/// Relation between an existing Secret and a TemplatedSecret
#[derive(Debug)]
pub enum Ownership {
    Absent,
    Owned(Secret),
    Foreign(Secret),
}

impl Ownership {
    /// Classify `existing` against the owner `uid`
    #[must_use]
    pub fn classify(existing: Option<Secret>, uid: &str) -> Self {
        match existing {
            None => Ownership::Absent,
            Some(secret) if secret.owner_references().iter().any(|r| r.uid == uid) => {
                Ownership::Owned(secret)
            }
            Some(secret) => Ownership::Foreign(secret),
        }
    }
}

/// Substitute every reference occurrence in `template`
///
/// Replacement values are copied as opaque bytes and never scanned again.
/// A token without a resolved value is copied through as written.
#[must_use]
pub fn render_value(template: &str, resolved: &ResolvedValues) -> Vec<u8> {
    let mut rendered = Vec::with_capacity(template.len());
    let mut last = 0;

    for m in reference_pattern().find_iter(template) {
        rendered.extend_from_slice(&template.as_bytes()[last..m.start()]);
        match resolved.get(m.as_str()) {
            Some(value) => rendered.extend_from_slice(value),
            None => rendered.extend_from_slice(m.as_str().as_bytes()),
        }
        last = m.end();
    }
    rendered.extend_from_slice(&template.as_bytes()[last..]);

    rendered
}

/// Render every template field, from scratch
#[must_use]
pub fn render_data(
    data: &BTreeMap<String, String>,
    resolved: &ResolvedValues,
) -> BTreeMap<String, ByteString> {
    data.iter()
        .map(|(field, template)| (field.clone(), ByteString(render_value(template, resolved))))
        .collect()
}

/// Where the output Secret lives
///
/// # Errors
///
/// Fails when the TemplatedSecret has no namespace or name.
pub fn target_ref(templated: &TemplatedSecret) -> Result<SecretRef, MaterializeError> {
    let namespace = templated
        .namespace()
        .ok_or(MaterializeError::MissingObjectKey("namespace"))?;
    let name = match &templated.spec.template.metadata.name {
        Some(name) if !name.is_empty() => name.clone(),
        _ => templated
            .meta()
            .name
            .clone()
            .ok_or(MaterializeError::MissingObjectKey("name"))?,
    };
    Ok(SecretRef { namespace, name })
}

/// Build a new Secret owned by `templated`
///
/// # Errors
///
/// Fails when the TemplatedSecret lacks the identity needed for an owner reference.
pub fn build_secret(
    templated: &TemplatedSecret,
    data: BTreeMap<String, ByteString>,
) -> Result<Secret, MaterializeError> {
    let target = target_ref(templated)?;
    let owner = templated
        .controller_owner_ref(&())
        .ok_or(MaterializeError::MissingObjectKey("uid"))?;
    let template = &templated.spec.template;

    Ok(Secret {
        metadata: ObjectMeta {
            name: Some(target.name),
            namespace: Some(target.namespace),
            labels: template.metadata.labels.clone(),
            annotations: template.metadata.annotations.clone(),
            owner_references: Some(vec![owner]),
            ..ObjectMeta::default()
        },
        type_: Some(
            template
                .type_
                .clone()
                .filter(|t| !t.is_empty())
                .unwrap_or_else(default_secret_type),
        ),
        data: Some(data),
        ..Secret::default()
    })
}

/// Overwrite an owned Secret with the desired content
///
/// Returns `None` when `existing` already matches. The type is left as is
/// because Kubernetes does not allow changing it.
#[must_use]
pub fn apply_desired(
    existing: &Secret,
    templated: &TemplatedSecret,
    data: BTreeMap<String, ByteString>,
) -> Option<Secret> {
    let labels = templated.spec.template.metadata.labels.clone();
    let annotations = templated.spec.template.metadata.annotations.clone();

    let unchanged = existing.data.as_ref() == Some(&data)
        && existing.string_data.is_none()
        && existing.metadata.labels == labels
        && existing.metadata.annotations == annotations;
    if unchanged {
        return None;
    }

    let mut updated = existing.clone();
    updated.data = Some(data);
    updated.string_data = None;
    updated.metadata.labels = labels;
    updated.metadata.annotations = annotations;
    Some(updated)
}

/// Write the output Secret for `templated` using `resolved` values
///
/// # Errors
///
/// [`MaterializeError::NotOwned`] when a Secret not owned by `templated`
/// already exists at the target; it is left untouched. Store failures
/// propagate as [`MaterializeError::Store`].
pub async fn materialize<S>(
    store: &S,
    templated: &TemplatedSecret,
    resolved: &ResolvedValues,
) -> Result<(SecretRef, SecretWrite), MaterializeError>
where
    S: SecretStore + ?Sized,
{
    let target = target_ref(templated)?;
    let uid = templated
        .uid()
        .ok_or(MaterializeError::MissingObjectKey("uid"))?;
    let data = render_data(&templated.spec.data, resolved);

    let existing = store.get_secret(&target.namespace, &target.name).await?;
    let write = match Ownership::classify(existing, &uid) {
        Ownership::Absent => {
            debug!(secret = %target, "Creating new secret");
            store.create_secret(&build_secret(templated, data)?).await?;
            SecretWrite::Created
        }
        Ownership::Owned(existing) => match apply_desired(&existing, templated, data) {
            Some(updated) => {
                debug!(secret = %target, "Updating existing secret");
                store.replace_secret(&updated).await?;
                SecretWrite::Updated
            }
            None => {
                debug!(secret = %target, "Secret already matches template, skipping update");
                SecretWrite::Unchanged
            }
        },
        Ownership::Foreign(_) => {
            info!(secret = %target, "Existing Secret not owned by TemplatedSecret");
            return Err(MaterializeError::NotOwned {
                namespace: target.namespace,
                name: target.name,
            });
        }
    };

    Ok((target, write))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::TemplatedSecretSpec;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;

    fn templated(data: &[(&str, &str)]) -> TemplatedSecret {
        let mut ts = TemplatedSecret::new(
            "app",
            TemplatedSecretSpec {
                data: data
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
                ..TemplatedSecretSpec::default()
            },
        );
        ts.metadata.namespace = Some("team-a".to_string());
        ts.metadata.uid = Some("uid-1".to_string());
        ts
    }

    fn resolved(pairs: &[(&str, &[u8])]) -> ResolvedValues {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.to_vec()))
            .collect()
    }

    #[test]
    fn test_render_literal_template_is_byte_identical() {
        let rendered = render_value("plain $(HOME) value\n", &ResolvedValues::new());
        assert_eq!(rendered, b"plain $(HOME) value\n");
    }

    #[test]
    fn test_render_replaces_every_occurrence() {
        let values = resolved(&[("$(db > host)", b"dbhost")]);
        let rendered = render_value("$(db > host),$(db > host),$(db > host)", &values);
        assert_eq!(rendered, b"dbhost,dbhost,dbhost");
    }

    #[test]
    fn test_render_does_not_rescan_replacements() {
        let values = resolved(&[("$(a > b)", b"$(c > d)"), ("$(c > d)", b"nested")]);
        assert_eq!(render_value("x$(a > b)y", &values), b"x$(c > d)y");
    }

    #[test]
    fn test_render_binary_values() {
        let values = resolved(&[("$(tls > key)", &[0x00, 0xff, 0x10])]);
        assert_eq!(render_value("[$(tls > key)]", &values), vec![b'[', 0x00, 0xff, 0x10, b']']);
    }

    #[test]
    fn test_target_defaults_to_templated_secret_identity() {
        let ts = templated(&[]);
        assert_eq!(
            target_ref(&ts).unwrap(),
            SecretRef {
                namespace: "team-a".to_string(),
                name: "app".to_string()
            }
        );

        let mut named = templated(&[]);
        named.spec.template.metadata.name = Some("app-out".to_string());
        assert_eq!(target_ref(&named).unwrap().name, "app-out");
    }

    #[test]
    fn test_build_secret_sets_owner_and_metadata() {
        let mut ts = templated(&[("k", "v")]);
        ts.spec.template.metadata.labels = Some(BTreeMap::from([(
            "app".to_string(),
            "web".to_string(),
        )]));
        ts.spec.template.type_ = Some("kubernetes.io/basic-auth".to_string());

        let data = render_data(&ts.spec.data, &ResolvedValues::new());
        let secret = build_secret(&ts, data).unwrap();

        let owners = secret.metadata.owner_references.unwrap();
        assert_eq!(owners.len(), 1);
        assert_eq!(owners[0].uid, "uid-1");
        assert_eq!(owners[0].kind, "TemplatedSecret");
        assert_eq!(owners[0].controller, Some(true));
        assert_eq!(secret.type_.as_deref(), Some("kubernetes.io/basic-auth"));
        assert_eq!(secret.metadata.labels.unwrap()["app"], "web");
        assert_eq!(secret.data.unwrap()["k"], ByteString(b"v".to_vec()));
    }

    #[test]
    fn test_build_secret_defaults_to_opaque() {
        let ts = templated(&[]);
        let secret = build_secret(&ts, BTreeMap::new()).unwrap();
        assert_eq!(secret.type_.as_deref(), Some("Opaque"));
    }

    #[test]
    fn test_build_secret_requires_uid() {
        let mut ts = templated(&[]);
        ts.metadata.uid = None;
        assert!(matches!(
            build_secret(&ts, BTreeMap::new()),
            Err(MaterializeError::MissingObjectKey("uid"))
        ));
    }

    #[test]
    fn test_ownership_classification() {
        let owned = Secret {
            metadata: ObjectMeta {
                owner_references: Some(vec![OwnerReference {
                    uid: "uid-1".to_string(),
                    ..OwnerReference::default()
                }]),
                ..ObjectMeta::default()
            },
            ..Secret::default()
        };
        let unowned = Secret::default();

        assert!(matches!(Ownership::classify(None, "uid-1"), Ownership::Absent));
        assert!(matches!(
            Ownership::classify(Some(owned.clone()), "uid-1"),
            Ownership::Owned(_)
        ));
        assert!(matches!(
            Ownership::classify(Some(owned), "uid-2"),
            Ownership::Foreign(_)
        ));
        assert!(matches!(
            Ownership::classify(Some(unowned), "uid-1"),
            Ownership::Foreign(_)
        ));
    }

    #[test]
    fn test_apply_desired_replaces_data_wholesale() {
        let ts = templated(&[("new", "value")]);
        let existing = Secret {
            data: Some(BTreeMap::from([
                ("old".to_string(), ByteString(b"stale".to_vec())),
                ("new".to_string(), ByteString(b"previous".to_vec())),
            ])),
            ..Secret::default()
        };

        let data = render_data(&ts.spec.data, &ResolvedValues::new());
        let updated = apply_desired(&existing, &ts, data).unwrap();
        let updated_data = updated.data.unwrap();
        assert_eq!(updated_data.len(), 1);
        assert_eq!(updated_data["new"], ByteString(b"value".to_vec()));
    }

    #[test]
    fn test_apply_desired_detects_no_change() {
        let ts = templated(&[("k", "v")]);
        let existing = Secret {
            data: Some(BTreeMap::from([("k".to_string(), ByteString(b"v".to_vec()))])),
            ..Secret::default()
        };
        let data = render_data(&ts.spec.data, &ResolvedValues::new());
        assert!(apply_desired(&existing, &ts, data).is_none());
    }
}
