//! # Secret Store
//!
//! The capabilities a reconciliation pass needs from the cluster, behind a
//! trait so the pass can run against the real API server or an in-memory
//! double.

use crate::constants::FIELD_MANAGER;
use crate::crd::{TemplatedSecret, TemplatedSecretStatus};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Api, Patch, PatchParams, PostParams};
use kube::{Client, ResourceExt};
use thiserror::Error;
use tracing::debug;

/// Failure talking to the backing store
///
/// These are never reported through the TemplatedSecret status; they
/// propagate to the caller so the controller's generic retry applies.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
    #[error("{0}")]
    Backend(String),
}

/// Namespaced access to Secrets and TemplatedSecrets
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Fetch a Secret, `None` when it does not exist
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;

    /// Create a new Secret
    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Replace an existing Secret (optimistic on its resourceVersion)
    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError>;

    /// Fetch a TemplatedSecret, `None` when it does not exist
    async fn get_templated_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TemplatedSecret>, StoreError>;

    /// Write the status subresource of a TemplatedSecret
    ///
    /// A TemplatedSecret deleted in the meantime is not an error.
    async fn write_status(
        &self,
        templated: &TemplatedSecret,
        status: &TemplatedSecretStatus,
    ) -> Result<(), StoreError>;
}

/// [`SecretStore`] backed by the Kubernetes API server
#[derive(Clone)]
pub struct KubeSecretStore {
    client: Client,
}

impl std::fmt::Debug for KubeSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeSecretStore").finish_non_exhaustive()
    }
}

impl KubeSecretStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn secrets(&self, namespace: &str) -> Api<Secret> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn templated_secrets(&self, namespace: &str) -> Api<TemplatedSecret> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

/// Namespace of an object that is about to be written
fn namespace_of(secret: &Secret) -> Result<String, StoreError> {
    secret
        .namespace()
        .ok_or_else(|| StoreError::Backend(format!("Secret '{}' has no namespace", secret.name_any())))
}

#[async_trait]
impl SecretStore for KubeSecretStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        Ok(self.secrets(namespace).get_opt(name).await?)
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let namespace = namespace_of(secret)?;
        Ok(self
            .secrets(&namespace)
            .create(&PostParams::default(), secret)
            .await?)
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let namespace = namespace_of(secret)?;
        Ok(self
            .secrets(&namespace)
            .replace(&secret.name_any(), &PostParams::default(), secret)
            .await?)
    }

    async fn get_templated_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TemplatedSecret>, StoreError> {
        Ok(self.templated_secrets(namespace).get_opt(name).await?)
    }

    async fn write_status(
        &self,
        templated: &TemplatedSecret,
        status: &TemplatedSecretStatus,
    ) -> Result<(), StoreError> {
        let namespace = templated.namespace().unwrap_or_default();
        let name = templated.name_any();
        let patch = serde_json::json!({ "status": status });

        match self
            .templated_secrets(&namespace)
            .patch_status(&name, &PatchParams::apply(FIELD_MANAGER), &Patch::Merge(patch))
            .await
        {
            Ok(_) => Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                debug!(
                    "TemplatedSecret {}/{} was deleted during reconciliation, skipping status update",
                    namespace, name
                );
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
