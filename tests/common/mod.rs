//! Common test utilities
//!
//! An in-memory [`SecretStore`] plus builders for Secrets and
//! TemplatedSecrets, so reconciliation passes run without a cluster.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use k8s_openapi::ByteString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use templated_secret_controller::controller::reconciler::{SecretStore, StoreError};
use templated_secret_controller::{TemplatedSecret, TemplatedSecretSpec, TemplatedSecretStatus};

type Key = (String, String);

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

/// In-memory store that counts reads and writes
#[derive(Debug, Default)]
pub struct MemoryStore {
    secrets: Mutex<BTreeMap<Key, Secret>>,
    templated: Mutex<BTreeMap<Key, TemplatedSecret>>,
    statuses: Mutex<Vec<TemplatedSecretStatus>>,
    secret_reads: Mutex<HashMap<Key, usize>>,
    secret_writes: AtomicUsize,
    fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite a Secret with the given data
    pub fn put_secret(&self, namespace: &str, name: &str, data: &[(&str, &str)]) {
        self.insert_secret(secret(namespace, name, data));
    }

    pub fn insert_secret(&self, secret: Secret) {
        let k = key(&secret.namespace().unwrap_or_default(), &secret.name_any());
        self.secrets.lock().unwrap().insert(k, secret);
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<Secret> {
        self.secrets.lock().unwrap().get(&key(namespace, name)).cloned()
    }

    /// Value of `field` in a stored Secret
    pub fn secret_value(&self, namespace: &str, name: &str, field: &str) -> Option<Vec<u8>> {
        self.secret(namespace, name)?
            .data?
            .get(field)
            .map(|value| value.0.clone())
    }

    pub fn insert_templated(&self, templated: TemplatedSecret) {
        let k = key(&templated.namespace().unwrap_or_default(), &templated.name_any());
        self.templated.lock().unwrap().insert(k, templated);
    }

    pub fn remove_templated(&self, namespace: &str, name: &str) {
        self.templated.lock().unwrap().remove(&key(namespace, name));
    }

    /// Current stored copy, including any status written so far
    pub fn templated(&self, namespace: &str, name: &str) -> TemplatedSecret {
        self.templated
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned()
            .expect("TemplatedSecret should be stored")
    }

    pub fn last_status(&self) -> Option<TemplatedSecretStatus> {
        self.statuses.lock().unwrap().last().cloned()
    }

    pub fn status_writes(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }

    pub fn secret_writes(&self) -> usize {
        self.secret_writes.load(Ordering::SeqCst)
    }

    pub fn secret_reads(&self, namespace: &str, name: &str) -> usize {
        self.secret_reads
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .copied()
            .unwrap_or_default()
    }

    /// Make every read fail from now on
    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    fn check_reads(&self) -> Result<(), StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SecretStore for MemoryStore {
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        self.check_reads()?;
        *self
            .secret_reads
            .lock()
            .unwrap()
            .entry(key(namespace, name))
            .or_default() += 1;
        Ok(self.secret(namespace, name))
    }

    async fn create_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let k = key(&secret.namespace().unwrap_or_default(), &secret.name_any());
        let mut secrets = self.secrets.lock().unwrap();
        if secrets.contains_key(&k) {
            return Err(StoreError::Backend(format!(
                "secrets \"{}\" already exists",
                k.1
            )));
        }
        secrets.insert(k, secret.clone());
        self.secret_writes.fetch_add(1, Ordering::SeqCst);
        Ok(secret.clone())
    }

    async fn replace_secret(&self, secret: &Secret) -> Result<Secret, StoreError> {
        let k = key(&secret.namespace().unwrap_or_default(), &secret.name_any());
        let mut secrets = self.secrets.lock().unwrap();
        if !secrets.contains_key(&k) {
            return Err(StoreError::Backend(format!("secrets \"{}\" not found", k.1)));
        }
        secrets.insert(k, secret.clone());
        self.secret_writes.fetch_add(1, Ordering::SeqCst);
        Ok(secret.clone())
    }

    async fn get_templated_secret(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<TemplatedSecret>, StoreError> {
        self.check_reads()?;
        Ok(self
            .templated
            .lock()
            .unwrap()
            .get(&key(namespace, name))
            .cloned())
    }

    async fn write_status(
        &self,
        templated: &TemplatedSecret,
        status: &TemplatedSecretStatus,
    ) -> Result<(), StoreError> {
        let k = key(&templated.namespace().unwrap_or_default(), &templated.name_any());
        if let Some(stored) = self.templated.lock().unwrap().get_mut(&k) {
            stored.status = Some(status.clone());
        }
        self.statuses.lock().unwrap().push(status.clone());
        Ok(())
    }
}

/// Secret with string data
pub fn secret(namespace: &str, name: &str, data: &[(&str, &str)]) -> Secret {
    Secret {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            ..ObjectMeta::default()
        },
        data: Some(
            data.iter()
                .map(|(k, v)| ((*k).to_string(), ByteString(v.as_bytes().to_vec())))
                .collect(),
        ),
        ..Secret::default()
    }
}

/// Owner reference pointing at some other object
pub fn foreign_owner(uid: &str) -> OwnerReference {
    OwnerReference {
        api_version: "v1".to_string(),
        kind: "ConfigMap".to_string(),
        name: "someone-else".to_string(),
        uid: uid.to_string(),
        controller: Some(true),
        ..OwnerReference::default()
    }
}

/// TemplatedSecret with a uid and generation, ready to own an output Secret
pub fn templated_secret(namespace: &str, name: &str, data: &[(&str, &str)]) -> TemplatedSecret {
    let mut templated = TemplatedSecret::new(
        name,
        TemplatedSecretSpec {
            data: data
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            ..TemplatedSecretSpec::default()
        },
    );
    templated.metadata.namespace = Some(namespace.to_string());
    templated.metadata.uid = Some(format!("uid-{namespace}-{name}"));
    templated.metadata.generation = Some(1);
    templated
}
