//! Redis-backed store for production. Fields live at `<key>|<field>`;
//! transactions use WATCH with a MULTI/EXEC commit so a concurrent write to
//! the same field aborts the commit (nil EXEC reply).

use super::{KvStore, TxnFn};
use crate::error::{HoustonError, Result};
use async_trait::async_trait;
use redis::AsyncCommands;

#[derive(Debug)]
pub struct RedisStore {
    client: redis::Client,
    memory_limit_mib: i64,
}

impl RedisStore {
    /// Build a client for the given address. Fails on a malformed address;
    /// reachability is only known once [`KvStore::ping`] runs.
    pub fn connect(addr: &str, password: &str, db: i64, memory_limit_mib: i64) -> Result<Self> {
        if addr.contains("://") {
            return Err(HoustonError::Configuration(
                "do not add a protocol to the redis address".to_string(),
            ));
        }
        let url = if password.is_empty() {
            format!("redis://{addr}/{db}")
        } else {
            format!("redis://:{password}@{addr}/{db}")
        };
        let client = redis::Client::open(url)
            .map_err(|e| HoustonError::Configuration(format!("invalid redis address: {e}")))?;
        Ok(Self {
            client,
            memory_limit_mib,
        })
    }

    async fn conn(&self) -> Result<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| HoustonError::Store(format!("redis connection failed: {e}")))
    }

    fn path(key: &str, field: &str) -> String {
        if field.is_empty() {
            key.to_string()
        } else {
            format!("{key}|{field}")
        }
    }
}

fn store_err(e: redis::RedisError) -> HoustonError {
    HoustonError::Store(format!("redis error: {e}"))
}

#[async_trait]
impl KvStore for RedisStore {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        redis::cmd("PING")
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_err)
    }

    /// Namespaces are implicit in redis; nothing to create.
    async fn create_key(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        let fields: Vec<String> = conn.keys(format!("{key}|*")).await.map_err(store_err)?;
        for field in fields {
            let _: () = conn.del(&field).await.map_err(store_err)?;
        }
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let mut keys: Vec<String> = conn.keys("*|u").await.map_err(store_err)?;
        for key in &mut keys {
            if let Some(pipe) = key.find('|') {
                key.truncate(pipe);
            }
        }
        Ok(keys)
    }

    async fn set(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.set(Self::path(key, field), value)
            .await
            .map_err(store_err)
    }

    async fn get(&self, key: &str, field: &str) -> Option<String> {
        let mut conn = self.conn().await.ok()?;
        conn.get::<_, Option<String>>(Self::path(key, field))
            .await
            .ok()
            .flatten()
    }

    async fn delete(&self, key: &str, field: &str) -> bool {
        let Ok(mut conn) = self.conn().await else {
            return false;
        };
        conn.del::<_, ()>(Self::path(key, field)).await.is_ok()
    }

    async fn list(&self, key: &str, prefix: &str) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        let full: Vec<String> = conn
            .keys(format!("{key}|{prefix}*"))
            .await
            .map_err(store_err)?;
        let strip = key.len() + 1;
        Ok(full.into_iter().map(|s| s[strip..].to_string()).collect())
    }

    async fn do_transaction(&self, key: &str, field: &str, f: TxnFn<'_>) -> Result<()> {
        // A dedicated connection per transaction: WATCH state is
        // connection-scoped and must not leak between concurrent callers.
        let mut conn = self.conn().await?;
        let path = Self::path(key, field);

        redis::cmd("WATCH")
            .arg(&path)
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(store_err)?;

        let value: Option<String> = conn.get(&path).await.map_err(store_err)?;
        let Some(value) = value else {
            let _: std::result::Result<(), _> =
                redis::cmd("UNWATCH").query_async(&mut conn).await;
            return Err(HoustonError::KeyNotFound);
        };

        let new_value = match f(&value) {
            Ok(v) => v,
            Err(e) => {
                let _: std::result::Result<(), _> =
                    redis::cmd("UNWATCH").query_async(&mut conn).await;
                return Err(e);
            }
        };

        let mut pipe = redis::pipe();
        pipe.atomic().set(&path, new_value);
        let committed: Option<(String,)> = pipe.query_async(&mut conn).await.map_err(store_err)?;
        match committed {
            Some(_) => Ok(()),
            // nil EXEC reply: the watched field changed under us
            None => Err(HoustonError::TransactionFailed),
        }
    }

    async fn health(&self) -> Result<()> {
        if self.memory_limit_mib <= 0 {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let info: String = redis::cmd("INFO")
            .arg("memory")
            .query_async(&mut conn)
            .await
            .map_err(store_err)?;

        let used = info
            .lines()
            .find_map(|line| line.strip_prefix("used_memory:"))
            .and_then(|v| v.trim().parse::<i64>().ok())
            .unwrap_or(0);

        if used > self.memory_limit_mib * 1024 * 1024 {
            return Err(HoustonError::MemoryUsage);
        }
        Ok(())
    }
}
