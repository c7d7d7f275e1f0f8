// ==========================================
// 采购订单全流程系统 - 代表单分组 API
// ==========================================

use crate::api::connection::{with_read_conn, with_write_tx};
use crate::api::error::ApiResult;
use crate::domain::allocation::{
    AllocationFilter, AllocationRecord, ProductAllocationGroup, RepItemEdit,
};
use crate::domain::order::LedgerEntry;
use crate::domain::types::Actor;
use crate::engine::RepGroupingEngine;

pub struct RepApi {
    db_path: String,
    engine: RepGroupingEngine,
}

impl RepApi {
    pub fn new(db_path: String) -> Self {
        Self {
            db_path,
            engine: RepGroupingEngine::new(),
        }
    }

    /// 按产品分组的代表单列表（已分配数量实时汇总）
    pub fn list_allocations(&self, filter: &AllocationFilter) -> ApiResult<Vec<ProductAllocationGroup>> {
        with_read_conn(&self.db_path, |conn| {
            Ok(self.engine.list_allocations(conn, filter)?)
        })
    }

    pub fn update_rep_item(
        &self,
        allocation_id: &str,
        edit: &RepItemEdit,
        actor: &Actor,
    ) -> ApiResult<AllocationRecord> {
        with_write_tx(&self.db_path, |tx| {
            Ok(self.engine.update_rep_item(tx, allocation_id, edit, actor)?)
        })
    }

    pub fn return_to_pending(&self, allocation_id: &str, actor: &Actor) -> ApiResult<LedgerEntry> {
        with_write_tx(&self.db_path, |tx| {
            Ok(self.engine.return_to_pending(tx, allocation_id, actor)?)
        })
    }
}
