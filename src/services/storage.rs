use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use crate::{db::DbPool, error::AppError};

/// Key-value persistence. Each call is atomic for its key; there are no
/// multi-key transactions.
#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), AppError>;
    async fn delete(&self, key: &str) -> Result<(), AppError>;
}

impl dyn KvStore {
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, AppError> {
        match self.get(key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn set_json<T: Serialize + Sync>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), AppError> {
        self.set(key, serde_json::to_value(value)?).await
    }
}

/// Stores values as JSON text in the `kv_store` table.
#[derive(Clone)]
pub struct SqliteKvStore {
    pool: DbPool,
}

impl SqliteKvStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        let raw: Option<String> = sqlx::query_scalar("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), AppError> {
        let raw = serde_json::to_string(&value)?;
        sqlx::query(
            "INSERT INTO kv_store (key, value) VALUES (?, ?) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(raw)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::services::testing::sqlite_kv;

    #[tokio::test]
    async fn set_overwrites_and_delete_removes() {
        let (_root, store) = sqlite_kv().await;
        let kv: Arc<dyn KvStore> = store;
        assert_eq!(kv.get("user_trips:u1").await.unwrap(), None);

        kv.set("user_trips:u1", json!(["a"])).await.unwrap();
        kv.set("user_trips:u1", json!(["a", "b"])).await.unwrap();
        assert_eq!(
            kv.get_json::<Vec<String>>("user_trips:u1").await.unwrap(),
            Some(vec!["a".to_string(), "b".to_string()])
        );

        kv.delete("user_trips:u1").await.unwrap();
        assert_eq!(kv.get("user_trips:u1").await.unwrap(), None);
        kv.delete("user_trips:u1").await.unwrap();
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let (_root, store) = sqlite_kv().await;
        let kv: Arc<dyn KvStore> = store;
        kv.set_json("trip:1", &json!({"id": "1"})).await.unwrap();
        kv.set_json("trip:2", &json!({"id": "2"})).await.unwrap();
        kv.delete("trip:1").await.unwrap();
        assert_eq!(kv.get("trip:2").await.unwrap(), Some(json!({"id": "2"})));
    }
}
