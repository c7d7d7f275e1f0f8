// ==========================================
// 采购订单全流程系统 - 审计领域模型
// ==========================================
// 红线: 所有写入必须记录，记录只追加不修改
// 对齐: audit_event / status_event 表
// ==========================================

use crate::domain::types::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// AuditEvent - 通用审计事件
// ==========================================
// 用途: 动作 + 操作人 + 实体引用 + 前后快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_id: String,
    pub action: String,         // 操作类型 (存储为字符串)
    pub actor: String,
    pub entity_type: String,
    pub entity_id: String,
    pub before_json: Option<JsonValue>,
    pub after_json: Option<JsonValue>,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// ActionType - 操作类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionType {
    Ingest,           // 导入订单行
    AllocationUpdate, // 编辑分配数量
    CommitToSupplier, // 锁定并提交代表
    Rollback,         // 退回待分配
    RepItemUpdate,    // 代表单编辑
    SlipGenerate,     // 生成发货单
    BillingUpdate,    // 对账状态更新
    DutyStart,        // 上岗
    DutyEnd,          // 离岗
    ConflictResolve,  // 离线冲突裁决
}

impl ActionType {
    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Ingest => "INGEST",
            ActionType::AllocationUpdate => "ALLOCATION_UPDATE",
            ActionType::CommitToSupplier => "COMMIT_TO_SUPPLIER",
            ActionType::Rollback => "ROLLBACK",
            ActionType::RepItemUpdate => "REP_ITEM_UPDATE",
            ActionType::SlipGenerate => "SLIP_GENERATE",
            ActionType::BillingUpdate => "BILLING_UPDATE",
            ActionType::DutyStart => "DUTY_START",
            ActionType::DutyEnd => "DUTY_END",
            ActionType::ConflictResolve => "CONFLICT_RESOLVE",
        }
    }

    /// 从字符串解析
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "INGEST" => Some(ActionType::Ingest),
            "ALLOCATION_UPDATE" => Some(ActionType::AllocationUpdate),
            "COMMIT_TO_SUPPLIER" => Some(ActionType::CommitToSupplier),
            "ROLLBACK" => Some(ActionType::Rollback),
            "REP_ITEM_UPDATE" => Some(ActionType::RepItemUpdate),
            "SLIP_GENERATE" => Some(ActionType::SlipGenerate),
            "BILLING_UPDATE" => Some(ActionType::BillingUpdate),
            "DUTY_START" => Some(ActionType::DutyStart),
            "DUTY_END" => Some(ActionType::DutyEnd),
            "CONFLICT_RESOLVE" => Some(ActionType::ConflictResolve),
            _ => None,
        }
    }
}

impl AuditEvent {
    /// 创建新的审计事件
    pub fn new(action: ActionType, actor: &str, entity: EntityKind, entity_id: &str) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            action: action.as_str().to_string(),
            actor: actor.to_string(),
            entity_type: entity.as_str().to_string(),
            entity_id: entity_id.to_string(),
            before_json: None,
            after_json: None,
            detail: None,
            created_at: Utc::now(),
        }
    }

    /// 设置变更前快照 (转换为JSON)
    pub fn with_before<T: Serialize>(mut self, before: &T) -> Self {
        self.before_json = serde_json::to_value(before).ok();
        self
    }

    /// 设置变更后快照 (转换为JSON)
    pub fn with_after<T: Serialize>(mut self, after: &T) -> Self {
        self.after_json = serde_json::to_value(after).ok();
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn action_type(&self) -> Option<ActionType> {
        ActionType::from_db_str(&self.action)
    }
}

// ==========================================
// StatusEvent - 状态流转事件
// ==========================================
// 任意实体的 old → new 记录，永不修改/删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusEvent {
    pub event_id: String,
    pub entity_type: String,
    pub entity_id: String,
    pub old_status: String,
    pub new_status: String,
    pub actor: String,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl StatusEvent {
    pub fn new(
        entity: EntityKind,
        entity_id: &str,
        old_status: &str,
        new_status: &str,
        actor: &str,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            entity_type: entity.as_str().to_string(),
            entity_id: entity_id.to_string(),
            old_status: old_status.to_string(),
            new_status: new_status.to_string(),
            actor: actor.to_string(),
            note: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_note(mut self, note: Option<String>) -> Self {
        self.note = note;
        self
    }
}
