// ==========================================
// 采购订单全流程系统 - 对账引擎
// ==========================================
// 状态机: PENDING -> {BILLED, NOT_BILLED, PARTIALLY_BILLED, PRODUCT_CHANGED,
//                     SUPPLIER_ITEM_DAMAGED, SUPPLIER_ITEM_MISSING}
// 终态允许再次修正，不允许退回 PENDING
// 前置: 受限角色必须有 active 值班会话；主管角色可跳过
// ==========================================

use crate::domain::audit::{ActionType, AuditEvent, StatusEvent};
use crate::domain::slip::{BillingUpdate, DocumentLine};
use crate::domain::types::{version_stamp, Actor, EntityKind, OrderStage, SlipLineStatus};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::{
    AuditRepository, DutySessionRepository, InputLineRepository, LedgerRepository, SlipRepository,
    StatusEventRepository,
};
use rusqlite::Connection;
use tracing::{info, instrument, warn};

/// 对账校验策略
#[derive(Debug, Clone, Copy, Default)]
pub struct BillingPolicy {
    /// BILLED 是否要求实收数量 > 0（默认关闭）
    pub enforce_billed_received_qty: bool,
}

pub struct BillingEngine {
    policy: BillingPolicy,
}

impl BillingEngine {
    pub fn new(policy: BillingPolicy) -> Self {
        Self { policy }
    }

    /// 操作人校验: 角色 + 值班会话
    pub fn authorize(&self, conn: &Connection, actor: &Actor) -> EngineResult<()> {
        if !actor.role.can_bill() {
            return Err(EngineError::permission_denied(actor.role, "对账更新"));
        }
        if actor.role.is_supervisory() {
            return Ok(());
        }
        // 与值班开始时的用户标识口径一致
        let user_id = actor.user_id.trim();
        if DutySessionRepository::find_active(conn, user_id)?.is_none() {
            warn!(user_id, "无有效值班会话，拒绝对账更新");
            return Err(EngineError::DutySessionRequired {
                user_id: user_id.to_string(),
            });
        }
        Ok(())
    }

    /// BILLED 实收数量校验点
    ///
    /// 由 billing.enforce_billed_received_qty 控制是否生效
    pub fn check_billed_quantity(&self, line: &DocumentLine) -> EngineResult<()> {
        if !self.policy.enforce_billed_received_qty || line.status != SlipLineStatus::Billed {
            return Ok(());
        }
        match line.received_qty {
            Some(q) if q > 0.0 => Ok(()),
            other => Err(EngineError::Validation(format!(
                "BILLED 需要实收数量大于 0，当前: {:?}",
                other
            ))),
        }
    }

    /// 更新发货单行对账状态
    #[instrument(skip(self, conn, update), fields(actor = %actor.user_id, status = %update.status))]
    pub fn update_billing_status(
        &self,
        conn: &Connection,
        line_id: &str,
        update: &BillingUpdate,
        actor: &Actor,
    ) -> EngineResult<DocumentLine> {
        self.authorize(conn, actor)?;

        for (field, value) in [
            ("received_qty", update.received_qty),
            ("billed_qty", update.billed_qty),
        ] {
            if let Some(v) = value {
                if !v.is_finite() || v < 0.0 {
                    return Err(EngineError::Validation(format!("{} 不能为负数: {}", field, v)));
                }
            }
        }

        let before = SlipRepository::get_line(conn, line_id)?;
        if update.status == SlipLineStatus::Pending {
            return Err(EngineError::InvalidStateTransition {
                from: before.status.as_str().to_string(),
                to: update.status.as_str().to_string(),
            });
        }

        let mut line = before.clone();
        line.status = update.status;
        if update.received_qty.is_some() {
            line.received_qty = update.received_qty;
        }
        if update.billed_qty.is_some() {
            line.billed_qty = update.billed_qty;
        }
        if let Some(invoice) = &update.invoice_id {
            line.invoice_id = Some(invoice.trim().to_string()).filter(|s| !s.is_empty());
        }
        if let Some(notes) = &update.notes {
            line.remarks = Some(notes.trim().to_string()).filter(|s| !s.is_empty());
        }
        self.check_billed_quantity(&line)?;

        let stamp = version_stamp();
        line.updated_at = stamp.clone();
        SlipRepository::update_line_billing(conn, &line)?;

        StatusEventRepository::insert(
            conn,
            &StatusEvent::new(
                EntityKind::DocumentLine,
                line_id,
                before.status.as_str(),
                line.status.as_str(),
                &actor.user_id,
            )
            .with_note(update.notes.clone()),
        )?;
        AuditRepository::insert(
            conn,
            &AuditEvent::new(
                ActionType::BillingUpdate,
                &actor.user_id,
                EntityKind::DocumentLine,
                line_id,
            )
            .with_before(&before)
            .with_after(&line),
        )?;

        // 来源需求推进到终态
        let entry = LedgerRepository::get(conn, &line.ledger_entry_id)?;
        if entry.stage != OrderStage::Executed {
            LedgerRepository::update_stage(conn, &entry.entry_id, OrderStage::Executed, &stamp)?;
            InputLineRepository::set_stage_by_entry(conn, &entry.entry_id, OrderStage::Executed)?;
            StatusEventRepository::insert(
                conn,
                &StatusEvent::new(
                    EntityKind::LedgerEntry,
                    &entry.entry_id,
                    entry.stage.as_str(),
                    OrderStage::Executed.as_str(),
                    &actor.user_id,
                ),
            )?;
        }

        info!(
            line_id,
            from = %before.status,
            to = %line.status,
            entry_id = %entry.entry_id,
            "对账状态已更新"
        );
        Ok(line)
    }
}

impl Default for BillingEngine {
    fn default() -> Self {
        Self::new(BillingPolicy::default())
    }
}
