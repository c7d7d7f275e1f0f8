use super::core::{AuditRepository, StatusEventRepository};
use crate::domain::audit::{ActionType, AuditEvent, StatusEvent};
use crate::domain::types::EntityKind;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, Result as SqliteResult};

impl AuditRepository {
    // ==========================================
    // 查询操作
    // ==========================================

    /// 查询指定实体的审计事件（按时间升序）
    pub fn find_by_entity(
        conn: &Connection,
        entity: EntityKind,
        entity_id: &str,
    ) -> RepositoryResult<Vec<AuditEvent>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT event_id, action, actor, entity_type, entity_id,
                   before_json, after_json, detail, created_at
            FROM audit_event
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;

        let events = stmt
            .query_map(params![entity.as_str(), entity_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(events)
    }

    /// 按操作类型查询
    pub fn find_by_action(conn: &Connection, action: ActionType) -> RepositoryResult<Vec<AuditEvent>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT event_id, action, actor, entity_type, entity_id,
                   before_json, after_json, detail, created_at
            FROM audit_event
            WHERE action = ?1
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;

        let events = stmt
            .query_map(params![action.as_str()], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(events)
    }

    /// 统计指定操作类型的事件数
    pub fn count_by_action(conn: &Connection, action: ActionType) -> RepositoryResult<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM audit_event WHERE action = ?1",
            params![action.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// 最近的审计事件
    pub fn list_recent(conn: &Connection, limit: i64) -> RepositoryResult<Vec<AuditEvent>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT event_id, action, actor, entity_type, entity_id,
                   before_json, after_json, detail, created_at
            FROM audit_event
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?1
            "#,
        )?;

        let events = stmt
            .query_map(params![limit], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(events)
    }
}

impl StatusEventRepository {
    /// 查询实体的状态流转历史（按时间升序）
    pub fn find_by_entity(
        conn: &Connection,
        entity: EntityKind,
        entity_id: &str,
    ) -> RepositoryResult<Vec<StatusEvent>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT event_id, entity_type, entity_id, old_status, new_status,
                   actor, note, created_at
            FROM status_event
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY created_at ASC, rowid ASC
            "#,
        )?;

        let events = stmt
            .query_map(params![entity.as_str(), entity_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(events)
    }
}
