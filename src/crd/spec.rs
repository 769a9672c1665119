//! # TemplatedSecret Spec
//!
//! The user-authored desired state: template fields whose values may embed
//! references to keys of other Secrets, plus the metadata of the Secret to
//! materialize.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::TemplatedSecretStatus;

/// TemplatedSecret Custom Resource Definition
///
/// Every value in `data` may contain references of the form
/// `$(secret > key)` or `$(namespace > secret > key)`. The controller
/// resolves them and writes a Secret holding the substituted values.
///
/// # Example
///
/// ```yaml
/// apiVersion: k8s.basilfx.net/v1alpha1
/// kind: TemplatedSecret
/// metadata:
///   name: app-database-url
///   namespace: team-a
/// spec:
///   template:
///     metadata:
///       name: app-database
///       labels:
///         app: my-app
///     type: Opaque
///   data:
///     url: "postgres://$(db > user):$(db > password)@$(infra > db > host):5432/app"
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "TemplatedSecret",
    group = "k8s.basilfx.net",
    version = "v1alpha1",
    namespaced,
    status = "TemplatedSecretStatus",
    shortname = "tsec",
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}, {"name":"Message", "type":"string", "jsonPath":".status.message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct TemplatedSecretSpec {
    /// Shape of the Secret to create
    #[serde(default)]
    pub template: SecretTemplateSpec,
    /// Field name to template string
    pub data: BTreeMap<String, String>,
}

/// Structure the materialized Secret should have
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretTemplateSpec {
    /// Output metadata. Name defaults to the TemplatedSecret's own name.
    #[serde(default)]
    pub metadata: PartialObjectMeta,
    /// Secret type, used to facilitate programmatic handling of secret data.
    /// Defaults to `Opaque`.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

/// Subset of `ObjectMeta` a template may set
///
/// The namespace is deliberately absent: the output always lives next to the
/// TemplatedSecret that owns it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PartialObjectMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<BTreeMap<String, String>>,
}

#[must_use]
pub fn default_secret_type() -> String {
    "Opaque".to_string()
}
