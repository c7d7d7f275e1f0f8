// ==========================================
// 采购订单全流程系统 - SQLite 连接与建库
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键 / busy_timeout）
// - 统一建库脚本，审计表只追加由触发器保证
// - 写事务统一使用 IMMEDIATE，避免读后写升级时的 busy 死锁
// ==========================================

use rusqlite::{Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 开启写事务（IMMEDIATE：开始即持有写锁，其它写者在 busy_timeout 内排队）
pub fn begin_write(conn: &mut Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 建库（幂等）
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// 打开连接并确保 schema 存在
pub fn open_and_init(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = open_sqlite_connection(db_path)?;
    init_schema(&conn)?;

    match read_schema_version(&conn)? {
        Some(v) if v > CURRENT_SCHEMA_VERSION => {
            tracing::warn!(
                db_version = v,
                expected = CURRENT_SCHEMA_VERSION,
                "数据库 schema 版本高于当前程序版本"
            );
        }
        _ => {}
    }

    Ok(conn)
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS config_kv (
    scope_id TEXT NOT NULL,
    key TEXT NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (scope_id, key)
);

-- 产品主数据（仅作为目录解析的查找源）
CREATE TABLE IF NOT EXISTS product (
    product_id TEXT PRIMARY KEY,
    legacy_id TEXT UNIQUE,
    name TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_product_name ON product(name COLLATE NOCASE);

CREATE TABLE IF NOT EXISTS import_batch (
    batch_id TEXT PRIMARY KEY,
    source_name TEXT,
    total_rows INTEGER NOT NULL,
    accepted_rows INTEGER NOT NULL,
    duplicate_rows INTEGER NOT NULL,
    rejected_rows INTEGER NOT NULL,
    imported_by TEXT NOT NULL,
    imported_at TEXT NOT NULL,
    elapsed_ms INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ledger_entry (
    entry_id TEXT PRIMARY KEY,
    product_id TEXT NOT NULL,
    product_name TEXT NOT NULL,
    name_override TEXT,
    quantity REAL NOT NULL,
    ordered_qty REAL NOT NULL DEFAULT 0,
    stock_qty REAL NOT NULL DEFAULT 0,
    offer_qty REAL NOT NULL DEFAULT 0,
    requested_supplier TEXT,
    decided_supplier TEXT,
    notes TEXT,
    line_summary TEXT NOT NULL,
    locked INTEGER NOT NULL DEFAULT 0,
    allocation_status TEXT NOT NULL,
    stage TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_ledger_product ON ledger_entry(product_id);
CREATE INDEX IF NOT EXISTS idx_ledger_stage ON ledger_entry(stage, locked);

CREATE TABLE IF NOT EXISTS input_line (
    line_id TEXT PRIMARY KEY,
    batch_id TEXT NOT NULL,
    order_reference TEXT NOT NULL,
    product_reference TEXT NOT NULL,
    customer TEXT NOT NULL,
    product_id TEXT NOT NULL,
    product_name TEXT NOT NULL,
    quantity REAL NOT NULL,
    supplier_hint TEXT,
    stage TEXT NOT NULL,
    ledger_entry_id TEXT REFERENCES ledger_entry(entry_id) ON DELETE SET NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (order_reference, product_reference)
);
CREATE INDEX IF NOT EXISTS idx_input_line_stage ON input_line(stage, product_id);
CREATE INDEX IF NOT EXISTS idx_input_line_entry ON input_line(ledger_entry_id);

CREATE TABLE IF NOT EXISTS allocation_record (
    allocation_id TEXT PRIMARY KEY,
    ledger_entry_id TEXT NOT NULL UNIQUE REFERENCES ledger_entry(entry_id),
    product_id TEXT NOT NULL,
    supplier TEXT NOT NULL,
    quantity REAL NOT NULL,
    rate REAL NOT NULL,
    status TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_allocation_product ON allocation_record(product_id);

CREATE TABLE IF NOT EXISTS fulfillment_document (
    document_id TEXT PRIMARY KEY,
    slip_no TEXT NOT NULL UNIQUE,
    supplier TEXT NOT NULL,
    slip_date TEXT NOT NULL,
    created_by TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_document_supplier ON fulfillment_document(supplier);

CREATE TABLE IF NOT EXISTS document_line (
    line_id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES fulfillment_document(document_id),
    ledger_entry_id TEXT NOT NULL UNIQUE REFERENCES ledger_entry(entry_id),
    allocation_id TEXT,
    product_id TEXT NOT NULL,
    item_name TEXT NOT NULL,
    quantity REAL NOT NULL,
    received_qty REAL,
    billed_qty REAL,
    invoice_id TEXT,
    remarks TEXT,
    status TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_document_line_doc ON document_line(document_id);

CREATE TABLE IF NOT EXISTS duty_session (
    session_id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    active INTEGER NOT NULL DEFAULT 1
);
CREATE UNIQUE INDEX IF NOT EXISTS ux_duty_session_active
    ON duty_session(user_id) WHERE active = 1;

CREATE TABLE IF NOT EXISTS status_event (
    event_id TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    old_status TEXT NOT NULL,
    new_status TEXT NOT NULL,
    actor TEXT NOT NULL,
    note TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_status_event_entity ON status_event(entity_type, entity_id);

CREATE TABLE IF NOT EXISTS audit_event (
    event_id TEXT PRIMARY KEY,
    action TEXT NOT NULL,
    actor TEXT NOT NULL,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    before_json TEXT,
    after_json TEXT,
    detail TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_audit_event_entity ON audit_event(entity_type, entity_id);
CREATE INDEX IF NOT EXISTS idx_audit_event_action ON audit_event(action);

CREATE TABLE IF NOT EXISTS conflict_record (
    conflict_id TEXT PRIMARY KEY,
    entity_type TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    local_version TEXT NOT NULL,
    server_version TEXT NOT NULL,
    resolution TEXT NOT NULL,
    reason TEXT NOT NULL,
    resolved_by TEXT NOT NULL,
    resolved_at TEXT NOT NULL
);

CREATE TRIGGER IF NOT EXISTS trg_audit_event_no_update
    BEFORE UPDATE ON audit_event
    BEGIN SELECT RAISE(ABORT, 'audit_event is append-only'); END;
CREATE TRIGGER IF NOT EXISTS trg_audit_event_no_delete
    BEFORE DELETE ON audit_event
    BEGIN SELECT RAISE(ABORT, 'audit_event is append-only'); END;
CREATE TRIGGER IF NOT EXISTS trg_status_event_no_update
    BEFORE UPDATE ON status_event
    BEGIN SELECT RAISE(ABORT, 'status_event is append-only'); END;
CREATE TRIGGER IF NOT EXISTS trg_status_event_no_delete
    BEFORE DELETE ON status_event
    BEGIN SELECT RAISE(ABORT, 'status_event is append-only'); END;
CREATE TRIGGER IF NOT EXISTS trg_conflict_record_no_update
    BEFORE UPDATE ON conflict_record
    BEGIN SELECT RAISE(ABORT, 'conflict_record is write-once'); END;
CREATE TRIGGER IF NOT EXISTS trg_conflict_record_no_delete
    BEFORE DELETE ON conflict_record
    BEGIN SELECT RAISE(ABORT, 'conflict_record is write-once'); END;
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_audit_event_is_append_only() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO audit_event (event_id, action, actor, entity_type, entity_id, created_at)
             VALUES ('e1', 'INGEST', 'alice', 'input_line', 'l1', '2026-01-01')",
            [],
        )
        .unwrap();

        let update = conn.execute("UPDATE audit_event SET actor = 'bob'", []);
        assert!(update.is_err());
        let delete = conn.execute("DELETE FROM audit_event", []);
        assert!(delete.is_err());
    }

    #[test]
    fn test_single_active_duty_session_index() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        conn.execute(
            "INSERT INTO duty_session (session_id, user_id, started_at, active) VALUES ('s1', 'u1', 'now', 1)",
            [],
        )
        .unwrap();
        let second = conn.execute(
            "INSERT INTO duty_session (session_id, user_id, started_at, active) VALUES ('s2', 'u1', 'now', 1)",
            [],
        );
        assert!(second.is_err());
    }
}
