// SQLite Host Adapter
// One `{prefix}options` table per storage namespace; values stored as JSON text

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

use plugin_check_core::port::storage::validate_prefix;
use plugin_check_core::port::{
    HostConnector, HostError, HostSession, OptionStore, OverrideId, OverrideLayer, PluginLoader,
    StorageNamespace,
};

use crate::map_sqlx_error;

fn options_table(prefix: &str) -> String {
    format!("{}options", prefix)
}

async fn namespace_exists(pool: &SqlitePool, prefix: &str) -> Result<bool, HostError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name = ?",
    )
    .bind(options_table(prefix))
    .fetch_one(pool)
    .await
    .map_err(map_sqlx_error)?;
    Ok(count > 0)
}

fn decode_value(raw: String) -> Value {
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

/// Host connector over a migrated SQLite database
pub struct SqliteHost {
    pool: SqlitePool,
    base_prefix: String,
    loader: Arc<dyn PluginLoader>,
}

impl SqliteHost {
    /// Create a host whose real namespace is `base_prefix` (see `run_migrations`)
    pub fn new(pool: SqlitePool, base_prefix: impl Into<String>, loader: Arc<dyn PluginLoader>) -> Self {
        Self {
            pool,
            base_prefix: base_prefix.into(),
            loader,
        }
    }

    /// Persist an option in a namespace (seeding and fixtures)
    pub async fn update_option(&self, prefix: &str, key: &str, value: &Value) -> Result<(), HostError> {
        validate_prefix(prefix)?;
        let sql = format!(
            "INSERT INTO {} (option_name, option_value) VALUES (?, ?) \
             ON CONFLICT(option_name) DO UPDATE SET option_value = excluded.option_value",
            options_table(prefix)
        );
        sqlx::query(&sql)
            .bind(key)
            .bind(value.to_string())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Persisted option value, ignoring any session overrides
    pub async fn stored_option(&self, prefix: &str, key: &str) -> Result<Option<Value>, HostError> {
        validate_prefix(prefix)?;
        read_option(&self.pool, prefix, key).await
    }

    /// Temporary namespaces that currently exist (left behind if a run is not active)
    pub async fn namespaces(&self) -> Result<Vec<String>, HostError> {
        sqlx::query_scalar("SELECT prefix FROM plugin_check_namespaces ORDER BY prefix")
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx_error)
    }
}

async fn read_option(pool: &SqlitePool, prefix: &str, key: &str) -> Result<Option<Value>, HostError> {
    let sql = format!(
        "SELECT option_value FROM {} WHERE option_name = ?",
        options_table(prefix)
    );
    let raw: Option<String> = sqlx::query_scalar(&sql)
        .bind(key)
        .fetch_optional(pool)
        .await
        .map_err(map_sqlx_error)?;
    Ok(raw.map(decode_value))
}

#[async_trait]
impl HostConnector for SqliteHost {
    async fn connect(&self) -> Result<HostSession, HostError> {
        if !namespace_exists(&self.pool, &self.base_prefix).await? {
            return Err(HostError::Connection(format!(
                "base namespace {} is missing, run migrations first",
                self.base_prefix
            )));
        }
        debug!(base_prefix = %self.base_prefix, "Host session opened");

        let session = Arc::new(SqliteSession {
            pool: self.pool.clone(),
            base_prefix: self.base_prefix.clone(),
            current: Mutex::new(self.base_prefix.clone()),
            overrides: OverrideLayer::new(),
        });
        Ok(HostSession {
            options: session.clone(),
            storage: session,
            loader: Arc::clone(&self.loader),
        })
    }
}

/// Per-run view: current namespace plus in-memory overrides
pub struct SqliteSession {
    pool: SqlitePool,
    base_prefix: String,
    current: Mutex<String>,
    overrides: OverrideLayer,
}

impl SqliteSession {
    fn current(&self) -> MutexGuard<'_, String> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl OptionStore for SqliteSession {
    async fn get_option(&self, key: &str) -> Result<Option<Value>, HostError> {
        if let Some(value) = self.overrides.get(key) {
            return Ok(Some(value));
        }
        let prefix = self.current().clone();
        read_option(&self.pool, &prefix, key).await
    }

    fn add_override(&self, key: &str, value: Value) -> OverrideId {
        self.overrides.add(key, value)
    }

    fn remove_override(&self, id: OverrideId) -> bool {
        self.overrides.remove(id)
    }

    fn active_overrides(&self) -> BTreeMap<String, Value> {
        self.overrides.snapshot()
    }
}

#[async_trait]
impl StorageNamespace for SqliteSession {
    async fn current_prefix(&self) -> Result<String, HostError> {
        Ok(self.current().clone())
    }

    async fn create_namespace(&self, prefix: &str) -> Result<(), HostError> {
        validate_prefix(prefix)?;
        if namespace_exists(&self.pool, prefix).await? {
            return Err(HostError::Namespace(format!("namespace {} already exists", prefix)));
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        let create = format!(
            "CREATE TABLE {} (option_name TEXT PRIMARY KEY, option_value TEXT NOT NULL)",
            options_table(prefix)
        );
        sqlx::query(&create)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("INSERT INTO plugin_check_namespaces (prefix, created_at) VALUES (?, ?)")
            .bind(prefix)
            .bind(chrono::Utc::now().timestamp_millis())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        info!(prefix = %prefix, "Storage namespace created");
        Ok(())
    }

    async fn switch_to(&self, prefix: &str) -> Result<(), HostError> {
        validate_prefix(prefix)?;
        if !namespace_exists(&self.pool, prefix).await? {
            return Err(HostError::Namespace(format!("unknown namespace {}", prefix)));
        }
        *self.current() = prefix.to_string();
        debug!(prefix = %prefix, "Switched storage namespace");
        Ok(())
    }

    async fn drop_namespace(&self, prefix: &str) -> Result<(), HostError> {
        validate_prefix(prefix)?;
        if prefix == self.base_prefix {
            return Err(HostError::Namespace(format!(
                "refusing to drop base namespace {}",
                prefix
            )));
        }
        if *self.current() == prefix {
            return Err(HostError::Namespace(format!(
                "namespace {} is still active",
                prefix
            )));
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", options_table(prefix)))
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        sqlx::query("DELETE FROM plugin_check_namespaces WHERE prefix = ?")
            .bind(prefix)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        tx.commit().await.map_err(map_sqlx_error)?;

        info!(prefix = %prefix, "Storage namespace dropped");
        Ok(())
    }
}
