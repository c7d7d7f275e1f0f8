// ==========================================
// 采购订单全流程系统 - 需求聚合引擎
// ==========================================
// 职责: 重建未锁定台账（删除 → 按产品汇总 Pending 订单行 → 写入新台账）
// 红线: 必须在导入事务内执行；任何失败中止整个事务
// 红线: 已锁定台账不受影响
// ==========================================

use crate::domain::audit::StatusEvent;
use crate::domain::order::LedgerEntry;
use crate::domain::types::{version_stamp, AllocationStatus, EntityKind, OrderStage};
use crate::engine::error::EngineResult;
use crate::repository::{InputLineRepository, LedgerRepository, PendingDemandRow, StatusEventRepository};
use chrono::Utc;
use rusqlite::Connection;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// 聚合结果
#[derive(Debug, Clone)]
pub struct AggregationOutcome {
    pub removed: usize,   // 删除的未锁定台账数
    pub processed: usize, // 折算的 Pending 订单行数
    pub entries: Vec<LedgerEntry>,
}

pub struct AggregationEngine;

impl AggregationEngine {
    pub fn new() -> Self {
        Self
    }

    /// 重建 Pending 需求台账
    #[instrument(skip(self, conn))]
    pub fn recompute(&self, conn: &Connection, actor: &str) -> EngineResult<AggregationOutcome> {
        let removed = LedgerRepository::delete_unlocked(conn)?;
        let demand = InputLineRepository::list_pending_demand(conn)?;
        let outcome = self.rebuild(conn, removed, demand, actor)?;

        info!(
            removed = outcome.removed,
            processed = outcome.processed,
            entries = outcome.entries.len(),
            "需求聚合完成"
        );
        Ok(outcome)
    }

    /// 仅重建单个产品的未锁定台账（回滚后折叠回一条台账）
    #[instrument(skip(self, conn))]
    pub fn recompute_product(
        &self,
        conn: &Connection,
        product_id: &str,
        actor: &str,
    ) -> EngineResult<AggregationOutcome> {
        let removed = LedgerRepository::delete_unlocked_by_product(conn, product_id)?;
        let demand = InputLineRepository::list_pending_demand_for_product(conn, product_id)?;
        let outcome = self.rebuild(conn, removed, demand, actor)?;

        debug!(
            product_id,
            removed = outcome.removed,
            processed = outcome.processed,
            "产品台账已折叠"
        );
        Ok(outcome)
    }

    fn rebuild(
        &self,
        conn: &Connection,
        removed: usize,
        demand: Vec<PendingDemandRow>,
        actor: &str,
    ) -> EngineResult<AggregationOutcome> {
        let processed = demand.len();

        let mut entries = Vec::new();
        for group in group_by_product(demand) {
            let entry = build_entry(&group);
            LedgerRepository::insert(conn, &entry)?;

            let line_ids: Vec<String> = group.iter().map(|d| d.line_id.clone()).collect();
            InputLineRepository::assign_entry(conn, &line_ids, &entry.entry_id)?;

            StatusEventRepository::insert(
                conn,
                &StatusEvent::new(
                    EntityKind::LedgerEntry,
                    &entry.entry_id,
                    OrderStage::RawIngested.as_str(),
                    OrderStage::Pending.as_str(),
                    actor,
                ),
            )?;

            debug!(
                entry_id = %entry.entry_id,
                product_id = %entry.product_id,
                quantity = entry.quantity,
                lines = line_ids.len(),
                "台账已重建"
            );
            entries.push(entry);
        }

        Ok(AggregationOutcome {
            removed,
            processed,
            entries,
        })
    }
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// 按产品分组（输入已按 product_id, order_reference 排序）
fn group_by_product(demand: Vec<PendingDemandRow>) -> Vec<Vec<PendingDemandRow>> {
    let mut groups: Vec<Vec<PendingDemandRow>> = Vec::new();
    for row in demand {
        match groups.last_mut() {
            Some(group) if group[0].product_id == row.product_id => group.push(row),
            _ => groups.push(vec![row]),
        }
    }
    groups
}

fn build_entry(group: &[PendingDemandRow]) -> LedgerEntry {
    let first = &group[0];
    let quantity: f64 = group.iter().map(|d| d.quantity).sum();

    // 首个非空供应商提示（按订单号顺序）
    let requested_supplier = group
        .iter()
        .filter_map(|d| d.supplier_hint.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string);

    let mut refs: Vec<&PendingDemandRow> = group.iter().collect();
    refs.sort_by(|a, b| a.order_reference.cmp(&b.order_reference));
    let line_summary = refs
        .iter()
        .map(|d| format!("{}:{}", d.order_reference, d.quantity))
        .collect::<Vec<_>>()
        .join("; ");

    LedgerEntry {
        entry_id: Uuid::new_v4().to_string(),
        product_id: first.product_id.clone(),
        product_name: first.product_name.clone(),
        name_override: None,
        quantity,
        ordered_qty: 0.0,
        stock_qty: 0.0,
        offer_qty: 0.0,
        requested_supplier,
        decided_supplier: None,
        notes: None,
        line_summary,
        locked: false,
        allocation_status: AllocationStatus::Pending,
        stage: OrderStage::Pending,
        created_at: Utc::now(),
        updated_at: version_stamp(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn demand(line: &str, order: &str, product: &str, qty: f64, hint: Option<&str>) -> PendingDemandRow {
        PendingDemandRow {
            line_id: line.to_string(),
            order_reference: order.to_string(),
            product_id: product.to_string(),
            product_name: format!("Product {}", product),
            quantity: qty,
            supplier_hint: hint.map(str::to_string),
        }
    }

    #[test]
    fn test_group_and_build_entry() {
        let rows = vec![
            demand("a", "101", "P55", 3.0, None),
            demand("b", "102", "P55", 7.0, Some("Acme")),
            demand("c", "100", "P77", 1.5, Some("  ")),
        ];
        let groups = group_by_product(rows);
        assert_eq!(groups.len(), 2);

        let entry = build_entry(&groups[0]);
        assert_eq!(entry.quantity, 10.0);
        assert_eq!(entry.requested_supplier.as_deref(), Some("Acme"));
        assert_eq!(entry.line_summary, "101:3; 102:7");
        assert!(!entry.locked);

        let entry = build_entry(&groups[1]);
        assert_eq!(entry.requested_supplier, None);
        assert_eq!(entry.line_summary, "100:1.5");
    }
}
