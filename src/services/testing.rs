use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use serde_json::Value;
use tempfile::TempDir;

use crate::{
    db::{init_pool, run_migrations},
    error::AppError,
    services::storage::{KvStore, SqliteKvStore},
};

pub async fn sqlite_kv() -> (TempDir, Arc<SqliteKvStore>) {
    let root = TempDir::new().expect("temp dir");
    let url = format!(
        "sqlite://{}",
        root.path().join("store.sqlite").to_string_lossy()
    );
    let pool = init_pool(&url).await.expect("pool");
    run_migrations(&pool).await.expect("migrations");
    (root, Arc::new(SqliteKvStore::new(pool)))
}

/// Wraps a store and fails writes to keys with a given prefix while armed.
/// Keys of successful `set` calls are recorded.
pub struct FlakyKv {
    inner: Arc<dyn KvStore>,
    failing_prefix: String,
    armed: AtomicBool,
    written: Mutex<Vec<String>>,
}

impl FlakyKv {
    pub fn new(inner: Arc<dyn KvStore>, failing_prefix: &str) -> Self {
        Self {
            inner,
            failing_prefix: failing_prefix.to_string(),
            armed: AtomicBool::new(false),
            written: Mutex::new(Vec::new()),
        }
    }

    pub fn written_keys(&self) -> Vec<String> {
        self.written.lock().expect("written keys").clone()
    }

    pub fn arm(&self, armed: bool) {
        self.armed.store(armed, Ordering::SeqCst);
    }

    fn check(&self, key: &str) -> Result<(), AppError> {
        if self.armed.load(Ordering::SeqCst) && key.starts_with(&self.failing_prefix) {
            return Err(AppError::Io(std::io::Error::other("store unavailable")));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FlakyKv {
    async fn get(&self, key: &str) -> Result<Option<Value>, AppError> {
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), AppError> {
        self.check(key)?;
        self.inner.set(key, value).await?;
        self.written.lock().expect("written keys").push(key.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.check(key)?;
        self.inner.delete(key).await
    }
}
