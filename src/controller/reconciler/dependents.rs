//! # Dependents
//!
//! Maps a changed Secret to the TemplatedSecrets whose templates read from it,
//! so edits to a source Secret reach every output built from it.

use super::references::{collect_references, parse_reference};
use crate::crd::TemplatedSecret;
use k8s_openapi::api::core::v1::Secret;
use kube::ResourceExt;
use kube_runtime::reflector::ObjectRef;
use std::sync::Arc;

/// Whether `templated` holds a well-formed reference into `namespace/name`
#[must_use]
pub fn references_secret(templated: &TemplatedSecret, namespace: &str, name: &str) -> bool {
    let Some(default_namespace) = templated.namespace() else {
        return false;
    };
    collect_references(templated.spec.data.values())
        .iter()
        .filter_map(|token| parse_reference(token, &default_namespace).ok())
        .any(|reference| reference.points_at(namespace, name))
}

/// TemplatedSecrets that must be reconciled after `secret` changed
pub fn dependents_of<'a, I>(secret: &Secret, templated: I) -> Vec<ObjectRef<TemplatedSecret>>
where
    I: IntoIterator<Item = &'a Arc<TemplatedSecret>>,
{
    let (Some(namespace), Some(name)) = (secret.namespace(), secret.metadata.name.as_deref()) else {
        return Vec::new();
    };

    templated
        .into_iter()
        .filter(|ts| references_secret(ts, &namespace, name))
        .map(|ts| ObjectRef::from_obj(&**ts))
        .collect()
}
