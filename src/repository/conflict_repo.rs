// ==========================================
// 采购订单全流程系统 - 冲突记录仓储
// ==========================================
// 红线: conflict_record 只写一次（触发器拒绝 UPDATE/DELETE）
// ==========================================

use crate::domain::conflict::{ConflictRecord, ConflictResolution};
use crate::domain::types::EntityKind;
use crate::repository::codec::decode_enum;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use serde_json::Value as JsonValue;

pub struct ConflictRepository;

impl ConflictRepository {
    pub fn insert(conn: &Connection, record: &ConflictRecord) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO conflict_record (
                conflict_id, entity_type, entity_id, local_version, server_version,
                resolution, reason, resolved_by, resolved_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                record.conflict_id,
                record.entity_type,
                record.entity_id,
                record.local_version.to_string(),
                record.server_version.to_string(),
                record.resolution.as_str(),
                record.reason,
                record.resolved_by,
                record.resolved_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_entity(
        conn: &Connection,
        entity: EntityKind,
        entity_id: &str,
    ) -> RepositoryResult<Vec<ConflictRecord>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT conflict_id, entity_type, entity_id, local_version, server_version,
                   resolution, reason, resolved_by, resolved_at
            FROM conflict_record
            WHERE entity_type = ?1 AND entity_id = ?2
            ORDER BY resolved_at
            "#,
        )?;
        let records = stmt
            .query_map(params![entity.as_str(), entity_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(records)
    }

    fn map_row(row: &Row) -> rusqlite::Result<ConflictRecord> {
        Ok(ConflictRecord {
            conflict_id: row.get(0)?,
            entity_type: row.get(1)?,
            entity_id: row.get(2)?,
            local_version: parse_version(row.get(3)?),
            server_version: parse_version(row.get(4)?),
            resolution: decode_enum(5, row.get(5)?, ConflictResolution::from_db_str)?,
            reason: row.get(6)?,
            resolved_by: row.get(7)?,
            resolved_at: row.get(8)?,
        })
    }
}

// 非 JSON 文本按字符串保留
fn parse_version(raw: String) -> JsonValue {
    serde_json::from_str(&raw).unwrap_or(JsonValue::String(raw))
}
