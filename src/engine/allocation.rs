// ==========================================
// 采购订单全流程系统 - 分配与锁定引擎
// ==========================================
// 职责: 台账分配编辑 / 锁定并提交代表 / 回滚
// 红线: locked=true 的台账只允许回滚修改
// 红线: commit_to_supplier 必须在 EntityTransaction 内调用（实体锁 + 写事务）
// ==========================================

use crate::domain::allocation::{AllocationRecord, CommitOutcome};
use crate::domain::audit::{ActionType, AuditEvent, StatusEvent};
use crate::domain::order::{AllocationEdit, LedgerEntry};
use crate::domain::types::{
    version_stamp, Actor, AllocationRecordStatus, AllocationStatus, EntityKind, OrderStage,
};
use crate::engine::aggregation::AggregationEngine;
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{
    AllocationRepository, AuditRepository, InputLineRepository, LedgerRepository,
    StatusEventRepository,
};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// 代表单在台账上的状态名（状态事件用）
const REP_ACTIVE: &str = "REP_ACTIVE";

pub struct AllocationEngine;

impl AllocationEngine {
    pub fn new() -> Self {
        Self
    }

    /// 编辑台账分配字段（不改变阶段）
    #[instrument(skip(self, conn, edit), fields(actor = %actor.user_id))]
    pub fn update_allocation(
        &self,
        conn: &Connection,
        entry_id: &str,
        edit: &AllocationEdit,
        actor: &Actor,
    ) -> EngineResult<LedgerEntry> {
        if edit.is_empty() {
            return Err(EngineError::Validation("没有需要更新的字段".to_string()));
        }
        for (field, value) in [
            ("ordered_qty", edit.ordered_qty),
            ("stock_qty", edit.stock_qty),
            ("offer_qty", edit.offer_qty),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(EngineError::Validation(format!("{} 不能为负数: {}", field, v)));
                }
            }
        }

        let before = LedgerRepository::get(conn, entry_id)?;
        if before.locked {
            warn!(entry_id, "台账已锁定，拒绝分配编辑");
            return Err(EngineError::lock_conflict(EntityKind::LedgerEntry.as_str(), entry_id));
        }

        let mut entry = before.clone();
        if let Some(v) = edit.ordered_qty {
            entry.ordered_qty = v;
        }
        if let Some(v) = edit.stock_qty {
            entry.stock_qty = v;
        }
        if let Some(v) = edit.offer_qty {
            entry.offer_qty = v;
        }
        if let Some(v) = &edit.decided_supplier {
            entry.decided_supplier = non_blank(v);
        }
        if let Some(v) = &edit.name_override {
            entry.name_override = non_blank(v);
        }
        if let Some(v) = &edit.notes {
            entry.notes = non_blank(v);
        }
        entry.updated_at = version_stamp();

        LedgerRepository::update_allocation_fields(conn, &entry)?;
        AuditRepository::insert(
            conn,
            &AuditEvent::new(
                ActionType::AllocationUpdate,
                &actor.user_id,
                EntityKind::LedgerEntry,
                entry_id,
            )
            .with_before(&before)
            .with_after(&entry),
        )?;

        info!(entry_id, "台账分配已更新");
        Ok(entry)
    }

    /// 锁定台账并提交给代表
    ///
    /// 调用方须已持有该台账的实体锁；此处在锁内重新校验 locked
    #[instrument(skip(self, conn), fields(actor = %actor.user_id))]
    pub fn commit_to_supplier(
        &self,
        conn: &Connection,
        entry_id: &str,
        supplier: &str,
        rate: f64,
        actor: &Actor,
    ) -> EngineResult<CommitOutcome> {
        let supplier = supplier.trim();
        if supplier.is_empty() {
            return Err(EngineError::Validation("供应商不能为空".to_string()));
        }
        if !rate.is_finite() || rate < 0.0 {
            return Err(EngineError::Validation(format!("单价不能为负数: {}", rate)));
        }

        let before = LedgerRepository::get(conn, entry_id)?;
        if before.locked {
            warn!(entry_id, "台账已锁定，提交被拒绝");
            return Err(EngineError::lock_conflict(EntityKind::LedgerEntry.as_str(), entry_id));
        }
        if before.stage.is_consumed() {
            return Err(EngineError::AlreadyConsumed(entry_id.to_string()));
        }

        let quantity = if before.ordered_qty > 0.0 {
            before.ordered_qty
        } else {
            before.quantity
        };
        if quantity <= 0.0 {
            return Err(EngineError::Validation(format!("台账 {} 没有可提交的数量", entry_id)));
        }

        let stamp = version_stamp();
        let mut entry = before.clone();
        entry.decided_supplier = Some(supplier.to_string());
        entry.updated_at = stamp.clone();
        LedgerRepository::update_allocation_fields(conn, &entry)?;
        LedgerRepository::update_lock_state(
            conn,
            entry_id,
            true,
            AllocationStatus::MovedToRep,
            OrderStage::RepAllocation,
            &stamp,
        )?;
        entry.locked = true;
        entry.allocation_status = AllocationStatus::MovedToRep;
        entry.stage = OrderStage::RepAllocation;

        let record = AllocationRecord {
            allocation_id: Uuid::new_v4().to_string(),
            ledger_entry_id: entry_id.to_string(),
            product_id: entry.product_id.clone(),
            supplier: supplier.to_string(),
            quantity,
            rate,
            status: AllocationRecordStatus::Pending,
            created_by: actor.user_id.clone(),
            created_at: Utc::now(),
            updated_at: stamp,
        };
        AllocationRepository::insert(conn, &record)?;
        InputLineRepository::set_stage_by_entry(conn, entry_id, OrderStage::RepAllocation)?;

        StatusEventRepository::insert(
            conn,
            &StatusEvent::new(
                EntityKind::LedgerEntry,
                entry_id,
                before.allocation_status.as_str(),
                REP_ACTIVE,
                &actor.user_id,
            ),
        )?;
        AuditRepository::insert(
            conn,
            &AuditEvent::new(
                ActionType::CommitToSupplier,
                &actor.user_id,
                EntityKind::LedgerEntry,
                entry_id,
            )
            .with_before(&before)
            .with_after(&record),
        )?;

        info!(
            entry_id,
            allocation_id = %record.allocation_id,
            supplier,
            quantity,
            "台账已锁定并提交代表"
        );

        Ok(CommitOutcome {
            allocation_id: record.allocation_id,
            ledger_entry_id: entry_id.to_string(),
            quantity,
        })
    }

    /// 回滚代表单: 补偿删除 + 解锁源台账
    ///
    /// 源台账随即按产品重新聚合，返回折叠后的台账。
    /// 台账进入发货单后不可回滚
    #[instrument(skip(self, conn), fields(actor = %actor.user_id))]
    pub fn rollback(
        &self,
        conn: &Connection,
        allocation_id: &str,
        actor: &Actor,
    ) -> EngineResult<LedgerEntry> {
        let record = AllocationRepository::get(conn, allocation_id)?;
        let mut entry = LedgerRepository::get(conn, &record.ledger_entry_id)?;
        if entry.stage.is_consumed() {
            warn!(allocation_id, entry_id = %entry.entry_id, stage = %entry.stage, "需求已出单，拒绝回滚");
            return Err(EngineError::AlreadyConsumed(entry.entry_id));
        }

        let stamp = version_stamp();
        AllocationRepository::delete(conn, allocation_id)?;
        LedgerRepository::update_lock_state(
            conn,
            &entry.entry_id,
            false,
            AllocationStatus::Pending,
            OrderStage::Pending,
            &stamp,
        )?;
        InputLineRepository::set_stage_by_entry(conn, &entry.entry_id, OrderStage::Pending)?;

        StatusEventRepository::insert(
            conn,
            &StatusEvent::new(
                EntityKind::LedgerEntry,
                &entry.entry_id,
                REP_ACTIVE,
                AllocationStatus::Pending.as_str(),
                &actor.user_id,
            ),
        )?;

        // 源台账解锁后与同产品其它未锁定台账折叠为一条
        let released_id = entry.entry_id.clone();
        let folded = AggregationEngine::new()
            .recompute_product(conn, &entry.product_id, &actor.user_id)?
            .entries
            .into_iter()
            .next();
        entry = match folded {
            Some(folded) => folded,
            None => {
                entry.locked = false;
                entry.allocation_status = AllocationStatus::Pending;
                entry.stage = OrderStage::Pending;
                entry.updated_at = stamp;
                entry
            }
        };

        AuditRepository::insert(
            conn,
            &AuditEvent::new(
                ActionType::Rollback,
                &actor.user_id,
                EntityKind::AllocationRecord,
                allocation_id,
            )
            .with_before(&record)
            .with_after(&entry),
        )?;

        info!(
            allocation_id,
            released_entry = %released_id,
            entry_id = %entry.entry_id,
            "代表单已回滚"
        );
        Ok(entry)
    }
}

impl Default for AllocationEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
