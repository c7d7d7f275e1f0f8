// ==========================================
// 采购订单全流程系统 - 审计查询 API
// ==========================================

use crate::api::connection::with_read_conn;
use crate::api::error::ApiResult;
use crate::domain::audit::{ActionType, AuditEvent, StatusEvent};
use crate::domain::types::EntityKind;
use crate::repository::{AuditRepository, StatusEventRepository};

pub struct AuditApi {
    db_path: String,
}

impl AuditApi {
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    pub fn audit_trail(&self, entity: EntityKind, entity_id: &str) -> ApiResult<Vec<AuditEvent>> {
        with_read_conn(&self.db_path, |conn| {
            Ok(AuditRepository::find_by_entity(conn, entity, entity_id)?)
        })
    }

    /// 实体状态流转历史
    pub fn status_history(&self, entity: EntityKind, entity_id: &str) -> ApiResult<Vec<StatusEvent>> {
        with_read_conn(&self.db_path, |conn| {
            Ok(StatusEventRepository::find_by_entity(conn, entity, entity_id)?)
        })
    }

    pub fn count_by_action(&self, action: ActionType) -> ApiResult<i64> {
        with_read_conn(&self.db_path, |conn| {
            Ok(AuditRepository::count_by_action(conn, action)?)
        })
    }

    pub fn recent(&self, limit: i64) -> ApiResult<Vec<AuditEvent>> {
        with_read_conn(&self.db_path, |conn| Ok(AuditRepository::list_recent(conn, limit)?))
    }
}
