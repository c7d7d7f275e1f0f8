// ==========================================
// 采购订单全流程系统 - API 连接与事务辅助
// ==========================================
// 职责: 每次调用打开连接 → 开启写事务 → 执行 → 提交
// 红线: 任一步失败，事务随 Drop 整体回滚
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::db::{begin_write, open_sqlite_connection};
use rusqlite::{Connection, Transaction};

/// 打开连接（统一 PRAGMA）
pub fn open_connection(db_path: &str) -> ApiResult<Connection> {
    open_sqlite_connection(db_path).map_err(|e| ApiError::DatabaseConnectionError(e.to_string()))
}

/// 在单个写事务内执行操作
pub fn with_write_tx<T, F>(db_path: &str, op: F) -> ApiResult<T>
where
    F: FnOnce(&Transaction<'_>) -> ApiResult<T>,
{
    let mut conn = open_connection(db_path)?;
    let tx = begin_write(&mut conn).map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;
    let value = op(&tx)?;
    tx.commit()
        .map_err(|e| ApiError::DatabaseTransactionError(e.to_string()))?;
    Ok(value)
}

/// 只读操作
pub fn with_read_conn<T, F>(db_path: &str, op: F) -> ApiResult<T>
where
    F: FnOnce(&Connection) -> ApiResult<T>,
{
    let conn = open_connection(db_path)?;
    op(&conn)
}
