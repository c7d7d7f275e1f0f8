// ==========================================
// 采购订单全流程系统 - 对账与值班 API
// ==========================================
// 职责: 值班会话上岗/离岗、发货单行对账状态更新
// ==========================================

use crate::api::connection::{with_read_conn, with_write_tx};
use crate::api::error::ApiResult;
use crate::config::LifecycleConfigReader;
use crate::domain::duty::DutySession;
use crate::domain::slip::{BillingUpdate, DocumentLine};
use crate::domain::types::Actor;
use crate::engine::{BillingEngine, BillingPolicy, DutyEngine};
use std::sync::Arc;

pub struct BillingApi {
    db_path: String,
    config: Arc<dyn LifecycleConfigReader>,
    duty: DutyEngine,
}

impl BillingApi {
    pub fn new(db_path: String, config: Arc<dyn LifecycleConfigReader>) -> Self {
        Self {
            db_path,
            config,
            duty: DutyEngine::new(),
        }
    }

    /// 上岗（自动结束该用户之前的有效会话）
    pub fn start_duty(&self, user_id: &str) -> ApiResult<DutySession> {
        with_write_tx(&self.db_path, |tx| Ok(self.duty.start_duty(tx, user_id)?))
    }

    /// 离岗（无有效会话时返回 None）
    pub fn end_duty(&self, user_id: &str) -> ApiResult<Option<DutySession>> {
        with_write_tx(&self.db_path, |tx| Ok(self.duty.end_duty(tx, user_id)?))
    }

    pub fn active_session(&self, user_id: &str) -> ApiResult<Option<DutySession>> {
        with_read_conn(&self.db_path, |conn| Ok(self.duty.active_session(conn, user_id)?))
    }

    /// 更新发货单行对账状态
    ///
    /// # 返回
    /// - Err(PermissionDenied): 角色无对账权限
    /// - Err(DutySessionRequired): 受限角色无有效值班会话
    pub fn update_billing_status(
        &self,
        line_id: &str,
        update: &BillingUpdate,
        actor: &Actor,
    ) -> ApiResult<DocumentLine> {
        let engine = BillingEngine::new(BillingPolicy {
            enforce_billed_received_qty: self.config.get_enforce_billed_received_qty()?,
        });
        with_write_tx(&self.db_path, |tx| {
            Ok(engine.update_billing_status(tx, line_id, update, actor)?)
        })
    }
}
