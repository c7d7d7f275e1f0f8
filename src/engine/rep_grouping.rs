// ==========================================
// 采购订单全流程系统 - 代表分组引擎
// ==========================================
// 读侧: 代表单 + 台账 + 来源订单行，按产品分组，已分配量实时汇总
// 写侧: 代表单编辑（出单前）/ 退回待分配
// ==========================================

use crate::domain::allocation::{
    AllocationFilter, AllocationRecord, AllocationView, ProductAllocationGroup, RepItemEdit,
};
use crate::domain::audit::{ActionType, AuditEvent, StatusEvent};
use crate::domain::order::LedgerEntry;
use crate::domain::types::{version_stamp, Actor, EntityKind};
use crate::engine::allocation::AllocationEngine;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{
    AllocationRepository, AuditRepository, InputLineRepository, LedgerRepository,
    StatusEventRepository,
};
use rusqlite::Connection;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

pub struct RepGroupingEngine {
    allocation: AllocationEngine,
}

impl RepGroupingEngine {
    pub fn new() -> Self {
        Self {
            allocation: AllocationEngine::new(),
        }
    }

    /// 按产品分组列出代表单
    ///
    /// allocated_qty 每次读取时重新汇总（不受过滤条件影响）
    #[instrument(skip(self, conn))]
    pub fn list_allocations(
        &self,
        conn: &Connection,
        filter: &AllocationFilter,
    ) -> EngineResult<Vec<ProductAllocationGroup>> {
        let rows = AllocationRepository::query_filtered(conn, filter)?;

        let mut groups: BTreeMap<String, ProductAllocationGroup> = BTreeMap::new();
        for row in rows {
            let lines = InputLineRepository::find_by_entry(conn, &row.allocation.ledger_entry_id)?;
            let mut order_references: Vec<String> =
                lines.iter().map(|l| l.order_reference.clone()).collect();
            order_references.dedup();
            let mut customers: Vec<String> = lines.iter().map(|l| l.customer.clone()).collect();
            customers.sort();
            customers.dedup();

            let product_id = row.allocation.product_id.clone();
            if !groups.contains_key(&product_id) {
                let allocated_qty = AllocationRepository::sum_quantity_by_product(conn, &product_id)?;
                groups.insert(
                    product_id.clone(),
                    ProductAllocationGroup {
                        product_id: product_id.clone(),
                        product_name: row.product_name.clone(),
                        allocated_qty,
                        allocations: Vec::new(),
                    },
                );
            }
            if let Some(group) = groups.get_mut(&product_id) {
                group.allocations.push(AllocationView {
                    allocation: row.allocation,
                    entry_stage: row.entry_stage,
                    requested_qty: row.entry_quantity,
                    order_references,
                    customers,
                });
            }
        }

        debug!(groups = groups.len(), "代表分组查询完成");
        Ok(groups.into_values().collect())
    }

    /// 编辑代表单
    ///
    /// 数量同步回台账 ordered_qty，备注同步回台账 notes
    #[instrument(skip(self, conn, edit), fields(actor = %actor.user_id))]
    pub fn update_rep_item(
        &self,
        conn: &Connection,
        allocation_id: &str,
        edit: &RepItemEdit,
        actor: &Actor,
    ) -> EngineResult<AllocationRecord> {
        if edit.status.is_none() && edit.quantity.is_none() && edit.notes.is_none() {
            return Err(EngineError::Validation("没有需要更新的字段".to_string()));
        }
        if let Some(q) = edit.quantity {
            if !q.is_finite() || q <= 0.0 {
                return Err(EngineError::Validation(format!("代表单数量必须为正数: {}", q)));
            }
        }

        let before = AllocationRepository::get(conn, allocation_id)?;
        let entry_before = LedgerRepository::get(conn, &before.ledger_entry_id)?;
        if entry_before.stage.is_consumed() {
            return Err(EngineError::AlreadyConsumed(entry_before.entry_id));
        }

        let stamp = version_stamp();
        let mut record = before.clone();
        if let Some(status) = edit.status {
            record.status = status;
        }
        if let Some(q) = edit.quantity {
            record.quantity = q;
        }
        record.updated_at = stamp.clone();
        AllocationRepository::update(conn, &record)?;

        let mut entry: LedgerEntry = entry_before.clone();
        if edit.quantity.is_some() || edit.notes.is_some() {
            if let Some(q) = edit.quantity {
                entry.ordered_qty = q;
            }
            if let Some(notes) = &edit.notes {
                let trimmed = notes.trim();
                entry.notes = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
            entry.updated_at = stamp;
            LedgerRepository::update_allocation_fields(conn, &entry)?;
        }

        if record.status != before.status {
            StatusEventRepository::insert(
                conn,
                &StatusEvent::new(
                    EntityKind::AllocationRecord,
                    allocation_id,
                    before.status.as_str(),
                    record.status.as_str(),
                    &actor.user_id,
                )
                .with_note(edit.notes.clone()),
            )?;
        }
        AuditRepository::insert(
            conn,
            &AuditEvent::new(
                ActionType::RepItemUpdate,
                &actor.user_id,
                EntityKind::AllocationRecord,
                allocation_id,
            )
            .with_before(&before)
            .with_after(&record),
        )?;

        info!(allocation_id, status = %record.status, quantity = record.quantity, "代表单已更新");
        Ok(record)
    }

    /// 退回待分配（与回滚相同）
    pub fn return_to_pending(
        &self,
        conn: &Connection,
        allocation_id: &str,
        actor: &Actor,
    ) -> EngineResult<LedgerEntry> {
        self.allocation.rollback(conn, allocation_id, actor)
    }
}

impl Default for RepGroupingEngine {
    fn default() -> Self {
        Self::new()
    }
}
