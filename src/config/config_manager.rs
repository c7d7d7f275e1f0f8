// ==========================================
// 采购订单全流程系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::lifecycle_config_trait::LifecycleConfigReader;
use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::warn;

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> RepositoryResult<Self> {
        {
            let conn_guard = conn
                .lock()
                .map_err(|e| RepositoryError::LockError(e.to_string()))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    fn lock_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.lock_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = ?1 AND key = ?2",
                params![ConfigScope::Global.scope_id(), key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.lock_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES (?1, ?2, ?3, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![ConfigScope::Global.scope_id(), key, value],
        )?;
        Ok(())
    }

    /// 获取所有 global 配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.lock_conn()?;
        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = ?1 ORDER BY key")?;

        let mut config_map: BTreeMap<String, String> = BTreeMap::new();
        let rows = stmt.query_map(params![ConfigScope::Global.scope_id()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map))
            .map_err(|e| RepositoryError::InternalError(e.to_string()))
    }

    /// 读取并解析配置值，缺失或格式错误时回退默认值
    fn get_parsed_or_default<T: std::str::FromStr>(&self, key: &str, default: T) -> RepositoryResult<T> {
        match self.get_global_config_value(key)? {
            None => Ok(default),
            Some(raw) => match raw.trim().parse::<T>() {
                Ok(v) => Ok(v),
                Err(_) => {
                    warn!(key, value = %raw, "配置值格式错误，使用默认值");
                    Ok(default)
                }
            },
        }
    }
}

impl LifecycleConfigReader for ConfigManager {
    fn get_import_preview_limit(&self) -> RepositoryResult<usize> {
        self.get_parsed_or_default(config_keys::IMPORT_PREVIEW_LIMIT, 20)
    }

    fn get_min_reason_length(&self) -> RepositoryResult<usize> {
        self.get_parsed_or_default(config_keys::CONFLICT_MIN_REASON_LENGTH, 10)
    }

    fn get_enforce_billed_received_qty(&self) -> RepositoryResult<bool> {
        let raw = self.get_global_config_value(config_keys::BILLING_ENFORCE_BILLED_RECEIVED_QTY)?;
        Ok(match raw.as_deref().map(|v| v.trim().to_uppercase()) {
            Some(v) => matches!(v.as_str(), "1" | "TRUE" | "Y" | "YES" | "ON"),
            None => false,
        })
    }

    fn get_lock_wait_timeout_ms(&self) -> RepositoryResult<u64> {
        self.get_parsed_or_default(config_keys::LOCK_WAIT_TIMEOUT_MS, 5_000)
    }
}

// ==========================================
// ConfigScope - 配置作用域
// ==========================================
#[derive(Debug, Clone)]
pub enum ConfigScope {
    Global,                    // 全局
    Supplier { supplier: String }, // 供应商级覆写（预留作用域键）
}

impl ConfigScope {
    pub fn scope_id(&self) -> String {
        match self {
            ConfigScope::Global => "global".to_string(),
            ConfigScope::Supplier { supplier } => format!("supplier/{}", supplier),
        }
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导入
    pub const IMPORT_PREVIEW_LIMIT: &str = "import.preview_limit";

    // 冲突裁决
    pub const CONFLICT_MIN_REASON_LENGTH: &str = "conflict.min_reason_length";

    // 对账
    pub const BILLING_ENFORCE_BILLED_RECEIVED_QTY: &str = "billing.enforce_billed_received_qty";

    // 实体锁
    pub const LOCK_WAIT_TIMEOUT_MS: &str = "lock.wait_timeout_ms";
}
