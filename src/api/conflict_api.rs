// ==========================================
// 采购订单全流程系统 - 离线冲突 API
// ==========================================
// 说明: 只记录裁决，不修改目标实体；应用裁决由调用方调用实体自身的更新操作
// ==========================================

use crate::api::connection::{with_read_conn, with_write_tx};
use crate::api::error::ApiResult;
use crate::config::LifecycleConfigReader;
use crate::domain::conflict::{ConflictRecord, ConflictResolutionRequest, VersionCheck};
use crate::domain::types::{Actor, EntityKind};
use crate::engine::ConflictResolver;
use crate::repository::ConflictRepository;
use std::sync::Arc;

pub struct ConflictApi {
    db_path: String,
    config: Arc<dyn LifecycleConfigReader>,
}

impl ConflictApi {
    pub fn new(db_path: String, config: Arc<dyn LifecycleConfigReader>) -> Self {
        Self { db_path, config }
    }

    fn resolver(&self) -> ApiResult<ConflictResolver> {
        Ok(ConflictResolver::new(self.config.get_min_reason_length()?))
    }

    /// 比对客户端记录的版本与服务端当前版本
    pub fn detect_conflict(
        &self,
        entity: EntityKind,
        entity_id: &str,
        client_version: &str,
    ) -> ApiResult<VersionCheck> {
        let resolver = self.resolver()?;
        with_read_conn(&self.db_path, |conn| {
            Ok(resolver.detect_conflict(conn, entity, entity_id, client_version)?)
        })
    }

    /// 记录冲突裁决
    pub fn resolve_conflict(
        &self,
        request: &ConflictResolutionRequest,
        actor: &Actor,
    ) -> ApiResult<ConflictRecord> {
        let resolver = self.resolver()?;
        with_write_tx(&self.db_path, |tx| Ok(resolver.resolve(tx, request, actor)?))
    }

    pub fn list_conflicts(&self, entity: EntityKind, entity_id: &str) -> ApiResult<Vec<ConflictRecord>> {
        with_read_conn(&self.db_path, |conn| {
            Ok(ConflictRepository::find_by_entity(conn, entity, entity_id)?)
        })
    }
}
