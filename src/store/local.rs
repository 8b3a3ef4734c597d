//! In-memory store for development and testing. One async mutex per key
//! serialises transactions; plain reads and writes take the same mutex so a
//! transaction in flight excludes them too.

use super::{KvStore, TxnFn};
use crate::error::{HoustonError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

type Namespace = Arc<Mutex<HashMap<String, String>>>;

#[derive(Default)]
pub struct LocalStore {
    keys: RwLock<HashMap<String, Namespace>>,
}

impl LocalStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn namespace(&self, key: &str) -> Option<Namespace> {
        self.keys.read().await.get(key).cloned()
    }
}

#[async_trait]
impl KvStore for LocalStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn create_key(&self, key: &str) -> Result<()> {
        self.keys
            .write()
            .await
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HashMap::new())));
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        self.keys.write().await.remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        Ok(self.keys.read().await.keys().cloned().collect())
    }

    async fn set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let Some(ns) = self.namespace(key).await else {
            return Err(HoustonError::KeyNotFound);
        };
        ns.lock().await.insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str, field: &str) -> Option<String> {
        let ns = self.namespace(key).await?;
        let fields = ns.lock().await;
        fields.get(field).cloned()
    }

    async fn delete(&self, key: &str, field: &str) -> bool {
        let Some(ns) = self.namespace(key).await else {
            return false;
        };
        ns.lock().await.remove(field);
        true
    }

    async fn list(&self, key: &str, prefix: &str) -> Result<Vec<String>> {
        let Some(ns) = self.namespace(key).await else {
            return Err(HoustonError::KeyNotFound);
        };
        let fields = ns.lock().await;
        Ok(fields
            .keys()
            .filter(|f| f.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn do_transaction(&self, key: &str, field: &str, f: TxnFn<'_>) -> Result<()> {
        let Some(ns) = self.namespace(key).await else {
            return Err(HoustonError::KeyNotFound);
        };
        let mut fields = ns.lock().await;
        let Some(value) = fields.get(field).cloned() else {
            return Err(HoustonError::KeyNotFound);
        };
        let new_value = f(&value)?;
        fields.insert(field.to_string(), new_value);
        Ok(())
    }

    async fn health(&self) -> Result<()> {
        Ok(())
    }
}
