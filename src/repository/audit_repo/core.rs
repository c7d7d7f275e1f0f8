use crate::domain::audit::{AuditEvent, StatusEvent};
use crate::repository::codec::{decode_json, encode_json};
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, Row};

// ==========================================
// AuditRepository - 通用审计事件仓储
// ==========================================
// 红线: Repository 不做业务逻辑,只做数据映射
// 所有方法接收显式连接/事务上下文
pub struct AuditRepository;

impl AuditRepository {
    /// 插入审计事件
    ///
    /// # 返回
    /// - `Ok(event_id)`: 成功插入
    pub fn insert(conn: &Connection, event: &AuditEvent) -> RepositoryResult<String> {
        conn.execute(
            r#"
            INSERT INTO audit_event (
                event_id, action, actor, entity_type, entity_id,
                before_json, after_json, detail, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                event.event_id,
                event.action,
                event.actor,
                event.entity_type,
                event.entity_id,
                encode_json(&event.before_json),
                encode_json(&event.after_json),
                event.detail,
                event.created_at,
            ],
        )?;

        Ok(event.event_id.clone())
    }

    /// 批量插入审计事件（调用方负责事务边界）
    pub fn batch_insert(conn: &Connection, events: &[AuditEvent]) -> RepositoryResult<usize> {
        let mut count = 0;
        for event in events {
            Self::insert(conn, event)?;
            count += 1;
        }
        Ok(count)
    }

    pub(super) fn map_row(row: &Row) -> rusqlite::Result<AuditEvent> {
        Ok(AuditEvent {
            event_id: row.get(0)?,
            action: row.get(1)?,
            actor: row.get(2)?,
            entity_type: row.get(3)?,
            entity_id: row.get(4)?,
            before_json: decode_json(row.get(5)?),
            after_json: decode_json(row.get(6)?),
            detail: row.get(7)?,
            created_at: row.get(8)?,
        })
    }
}

// ==========================================
// StatusEventRepository - 状态流转仓储
// ==========================================
pub struct StatusEventRepository;

impl StatusEventRepository {
    pub fn insert(conn: &Connection, event: &StatusEvent) -> RepositoryResult<String> {
        conn.execute(
            r#"
            INSERT INTO status_event (
                event_id, entity_type, entity_id, old_status, new_status,
                actor, note, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                event.event_id,
                event.entity_type,
                event.entity_id,
                event.old_status,
                event.new_status,
                event.actor,
                event.note,
                event.created_at,
            ],
        )?;

        Ok(event.event_id.clone())
    }

    pub(super) fn map_row(row: &Row) -> rusqlite::Result<StatusEvent> {
        Ok(StatusEvent {
            event_id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            old_status: row.get(3)?,
            new_status: row.get(4)?,
            actor: row.get(5)?,
            note: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}
