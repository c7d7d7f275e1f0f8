// ==========================================
// 采购订单全流程系统 - 发货单生成引擎
// ==========================================
// 职责: 候选台账按供应商分组 → 每个供应商一张发货单
// 红线: 全有或全无（调用方在单个写事务内执行，任何失败整体回滚）
// 红线: 幂等（阶段推进到 SLIP_GENERATED 后不再进入候选）
// ==========================================

use crate::domain::audit::{ActionType, AuditEvent, StatusEvent};
use crate::domain::slip::{
    DocumentLine, FulfillmentDocument, GenerationOutcome, SlipCandidate, SupplierSlipSummary,
};
use crate::domain::types::{
    version_stamp, AllocationRecordStatus, EntityKind, OrderStage, SlipLineStatus,
};
use crate::engine::error::EngineResult;
use crate::repository::{
    AllocationRepository, AuditRepository, InputLineRepository, LedgerRepository, SlipRepository,
    StatusEventRepository,
};
use chrono::{NaiveDate, Utc};
use rusqlite::Connection;
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};
use uuid::Uuid;

pub struct SlipGenerator;

impl SlipGenerator {
    pub fn new() -> Self {
        Self
    }

    /// 当前候选项（只读）
    pub fn candidates(&self, conn: &Connection) -> EngineResult<Vec<SlipCandidate>> {
        Ok(LedgerRepository::find_slip_candidates(conn)?)
    }

    /// 生成发货单
    #[instrument(skip(self, conn))]
    pub fn generate(
        &self,
        conn: &Connection,
        actor: &str,
        slip_date: NaiveDate,
    ) -> EngineResult<GenerationOutcome> {
        let candidates = LedgerRepository::find_slip_candidates(conn)?;
        if candidates.is_empty() {
            info!("没有可生成发货单的候选项");
            return Ok(GenerationOutcome::nothing_to_generate());
        }

        let mut by_supplier: BTreeMap<String, Vec<SlipCandidate>> = BTreeMap::new();
        for candidate in candidates {
            by_supplier
                .entry(candidate.supplier.clone())
                .or_default()
                .push(candidate);
        }

        let mut suppliers = Vec::with_capacity(by_supplier.len());
        for (supplier, group) in by_supplier {
            suppliers.push(self.write_document(conn, &supplier, &group, actor, slip_date)?);
        }

        let generated = suppliers.len();
        info!(generated, "发货单生成完成");

        Ok(GenerationOutcome {
            generated,
            suppliers,
            message: None,
        })
    }

    fn write_document(
        &self,
        conn: &Connection,
        supplier: &str,
        group: &[SlipCandidate],
        actor: &str,
        slip_date: NaiveDate,
    ) -> EngineResult<SupplierSlipSummary> {
        let document = FulfillmentDocument {
            document_id: Uuid::new_v4().to_string(),
            slip_no: SlipRepository::next_slip_no(conn, slip_date)?,
            supplier: supplier.to_string(),
            slip_date,
            created_by: actor.to_string(),
            created_at: Utc::now(),
        };
        SlipRepository::insert_document(conn, &document)?;

        let mut lines = Vec::with_capacity(group.len());
        for candidate in group {
            let stamp = version_stamp();
            let line = DocumentLine {
                line_id: Uuid::new_v4().to_string(),
                document_id: document.document_id.clone(),
                ledger_entry_id: candidate.ledger_entry_id.clone(),
                allocation_id: candidate.allocation_id.clone(),
                product_id: candidate.product_id.clone(),
                item_name: candidate.item_name.clone(),
                quantity: candidate.committed_qty,
                received_qty: None,
                billed_qty: None,
                invoice_id: None,
                remarks: None,
                status: SlipLineStatus::Pending,
                updated_at: stamp.clone(),
            };
            SlipRepository::insert_line(conn, &line)?;

            // 台账永久锁定并推进阶段
            let entry = LedgerRepository::get(conn, &candidate.ledger_entry_id)?;
            LedgerRepository::update_lock_state(
                conn,
                &entry.entry_id,
                true,
                entry.allocation_status,
                OrderStage::SlipGenerated,
                &stamp,
            )?;
            InputLineRepository::set_stage_by_entry(conn, &entry.entry_id, OrderStage::SlipGenerated)?;

            if let Some(allocation_id) = &candidate.allocation_id {
                let mut record = AllocationRepository::get(conn, allocation_id)?;
                let old_status = record.status;
                record.status = AllocationRecordStatus::Ordered;
                record.updated_at = stamp.clone();
                AllocationRepository::update(conn, &record)?;
                StatusEventRepository::insert(
                    conn,
                    &StatusEvent::new(
                        EntityKind::AllocationRecord,
                        allocation_id,
                        old_status.as_str(),
                        record.status.as_str(),
                        actor,
                    ),
                )?;
            }

            StatusEventRepository::insert(
                conn,
                &StatusEvent::new(
                    EntityKind::LedgerEntry,
                    &entry.entry_id,
                    entry.stage.as_str(),
                    OrderStage::SlipGenerated.as_str(),
                    actor,
                )
                .with_note(Some(document.slip_no.clone())),
            )?;

            debug!(
                slip_no = %document.slip_no,
                entry_id = %entry.entry_id,
                quantity = line.quantity,
                "发货单行已写入"
            );
            lines.push(line);
        }

        let total_qty: f64 = lines.iter().map(|l| l.quantity).sum();
        AuditRepository::insert(
            conn,
            &AuditEvent::new(
                ActionType::SlipGenerate,
                actor,
                EntityKind::FulfillmentDocument,
                &document.document_id,
            )
            .with_after(&serde_json::json!({
                "slip_no": document.slip_no,
                "supplier": document.supplier,
                "lines": lines,
            })),
        )?;

        info!(
            slip_no = %document.slip_no,
            supplier,
            line_count = lines.len(),
            total_qty,
            "发货单已生成"
        );

        Ok(SupplierSlipSummary {
            document_id: document.document_id,
            slip_no: document.slip_no,
            supplier: supplier.to_string(),
            line_count: lines.len(),
            total_qty,
        })
    }
}

impl Default for SlipGenerator {
    fn default() -> Self {
        Self::new()
    }
}
