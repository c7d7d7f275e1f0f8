// ==========================================
// 采购订单全流程系统 - 离线冲突裁决
// ==========================================
// 检测: 客户端记录的版本戳 vs 服务端 updated_at
// 裁决: 仅主管角色；理由长度有下限；写入一条冲突记录 + 一条审计事件
// 红线: 本模块从不修改目标实体，应用裁决由实体自身的更新操作完成
// ==========================================

use crate::domain::audit::{ActionType, AuditEvent};
use crate::domain::conflict::{ConflictRecord, ConflictResolutionRequest, VersionCheck};
use crate::domain::types::{Actor, EntityKind};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{
    AllocationRepository, AuditRepository, ConflictRepository, LedgerRepository, SlipRepository,
};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 默认最短裁决理由（字符数）
pub const DEFAULT_MIN_REASON_LENGTH: usize = 10;

pub struct ConflictResolver {
    min_reason_length: usize,
}

impl ConflictResolver {
    pub fn new(min_reason_length: usize) -> Self {
        Self { min_reason_length }
    }

    /// 服务端当前版本戳
    pub fn server_version(
        &self,
        conn: &Connection,
        entity: EntityKind,
        entity_id: &str,
    ) -> EngineResult<String> {
        let version = match entity {
            EntityKind::LedgerEntry => LedgerRepository::get(conn, entity_id)?.updated_at,
            EntityKind::AllocationRecord => AllocationRepository::get(conn, entity_id)?.updated_at,
            EntityKind::DocumentLine => SlipRepository::get_line(conn, entity_id)?.updated_at,
            other => {
                return Err(EngineError::Validation(format!(
                    "实体类型 {} 不支持版本检测",
                    other
                )))
            }
        };
        Ok(version)
    }

    /// 比对客户端版本与服务端版本
    pub fn detect_conflict(
        &self,
        conn: &Connection,
        entity: EntityKind,
        entity_id: &str,
        client_version: &str,
    ) -> EngineResult<VersionCheck> {
        let server = self.server_version(conn, entity, entity_id)?;
        let check = VersionCheck::compare(client_version, &server);
        if check.is_conflict() {
            warn!(entity = %entity, entity_id, client_version, server_version = %server, "检测到版本冲突");
        }
        Ok(check)
    }

    /// 理由长度校验（去除首尾空白后按字符计）
    pub fn check_reason(&self, reason: &str) -> EngineResult<()> {
        let actual = reason.trim().chars().count();
        if actual < self.min_reason_length {
            return Err(EngineError::ReasonTooShort {
                min: self.min_reason_length,
                actual,
            });
        }
        Ok(())
    }

    /// 记录冲突裁决
    #[instrument(skip(self, conn, request), fields(actor = %actor.user_id, entity_id = %request.entity_id))]
    pub fn resolve(
        &self,
        conn: &Connection,
        request: &ConflictResolutionRequest,
        actor: &Actor,
    ) -> EngineResult<ConflictRecord> {
        if !actor.role.is_supervisory() {
            return Err(EngineError::permission_denied(actor.role, "冲突裁决"));
        }
        self.check_reason(&request.reason)?;

        let record = ConflictRecord {
            conflict_id: Uuid::new_v4().to_string(),
            entity_type: request.entity_type.as_str().to_string(),
            entity_id: request.entity_id.clone(),
            local_version: request.local_version.clone(),
            server_version: request.server_version.clone(),
            resolution: request.resolution,
            reason: request.reason.trim().to_string(),
            resolved_by: actor.user_id.clone(),
            resolved_at: Utc::now(),
        };
        ConflictRepository::insert(conn, &record)?;

        AuditRepository::insert(
            conn,
            &AuditEvent::new(
                ActionType::ConflictResolve,
                &actor.user_id,
                request.entity_type,
                &request.entity_id,
            )
            .with_before(&request.server_version)
            .with_after(&request.local_version)
            .with_detail(format!("{}: {}", record.resolution, record.reason)),
        )?;

        info!(
            conflict_id = %record.conflict_id,
            resolution = %record.resolution,
            "冲突裁决已记录"
        );
        Ok(record)
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_REASON_LENGTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_gate_counts_characters() {
        let resolver = ConflictResolver::default();
        assert!(matches!(
            resolver.check_reason("bad"),
            Err(EngineError::ReasonTooShort { min: 10, actual: 3 })
        ));
        assert!(resolver.check_reason("   short   ").is_err());
        // 中文按字符计数
        assert!(resolver.check_reason("本地修改经主管复核确认").is_ok());
        assert!(resolver
            .check_reason("Local edit confirmed correct by supervisor review")
            .is_ok());
    }
}
