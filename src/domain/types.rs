// ==========================================
// 采购订单全流程系统 - 领域类型定义
// ==========================================
// 生命周期: RawIngested → Pending → RepAllocation → SlipGenerated → Executed
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 订单阶段 (Order Stage)
// ==========================================
// 红线: 每次变更只能向前推进一次（回滚除外）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStage {
    RawIngested,   // 原始导入
    Pending,       // 待分配
    RepAllocation, // 已提交代表
    SlipGenerated, // 已生成发货单
    Executed,      // 已执行(对账完成)
}

impl OrderStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStage::RawIngested => "RAW_INGESTED",
            OrderStage::Pending => "PENDING",
            OrderStage::RepAllocation => "REP_ALLOCATION",
            OrderStage::SlipGenerated => "SLIP_GENERATED",
            OrderStage::Executed => "EXECUTED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "RAW_INGESTED" => Some(OrderStage::RawIngested),
            "PENDING" => Some(OrderStage::Pending),
            "REP_ALLOCATION" => Some(OrderStage::RepAllocation),
            "SLIP_GENERATED" => Some(OrderStage::SlipGenerated),
            "EXECUTED" => Some(OrderStage::Executed),
            _ => None,
        }
    }

    /// 需求是否已被发货单消费
    pub fn is_consumed(&self) -> bool {
        *self >= OrderStage::SlipGenerated
    }
}

impl fmt::Display for OrderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 台账分配状态 (Ledger Allocation Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStatus {
    Pending,    // 未提交
    MovedToRep, // 已转交代表
}

impl AllocationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationStatus::Pending => "PENDING",
            AllocationStatus::MovedToRep => "MOVED_TO_REP",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(AllocationStatus::Pending),
            "MOVED_TO_REP" => Some(AllocationStatus::MovedToRep),
            _ => None,
        }
    }
}

impl fmt::Display for AllocationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 代表单状态 (Allocation Record Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationRecordStatus {
    Pending,   // 待下单
    Ordered,   // 已下单
    Cancelled, // 已取消
    Short,     // 缺货
}

impl AllocationRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AllocationRecordStatus::Pending => "PENDING",
            AllocationRecordStatus::Ordered => "ORDERED",
            AllocationRecordStatus::Cancelled => "CANCELLED",
            AllocationRecordStatus::Short => "SHORT",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(AllocationRecordStatus::Pending),
            "ORDERED" => Some(AllocationRecordStatus::Ordered),
            "CANCELLED" => Some(AllocationRecordStatus::Cancelled),
            "SHORT" => Some(AllocationRecordStatus::Short),
            _ => None,
        }
    }
}

impl fmt::Display for AllocationRecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 发货单行状态 (Slip Line Status)
// ==========================================
// Pending → 任一终态；终态之间允许更正
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlipLineStatus {
    Pending,
    Billed,
    NotBilled,
    PartiallyBilled,
    ProductChanged,
    SupplierItemDamaged,
    SupplierItemMissing,
}

impl SlipLineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlipLineStatus::Pending => "PENDING",
            SlipLineStatus::Billed => "BILLED",
            SlipLineStatus::NotBilled => "NOT_BILLED",
            SlipLineStatus::PartiallyBilled => "PARTIALLY_BILLED",
            SlipLineStatus::ProductChanged => "PRODUCT_CHANGED",
            SlipLineStatus::SupplierItemDamaged => "SUPPLIER_ITEM_DAMAGED",
            SlipLineStatus::SupplierItemMissing => "SUPPLIER_ITEM_MISSING",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(SlipLineStatus::Pending),
            "BILLED" => Some(SlipLineStatus::Billed),
            "NOT_BILLED" => Some(SlipLineStatus::NotBilled),
            "PARTIALLY_BILLED" => Some(SlipLineStatus::PartiallyBilled),
            "PRODUCT_CHANGED" => Some(SlipLineStatus::ProductChanged),
            "SUPPLIER_ITEM_DAMAGED" => Some(SlipLineStatus::SupplierItemDamaged),
            "SUPPLIER_ITEM_MISSING" => Some(SlipLineStatus::SupplierItemMissing),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SlipLineStatus::Pending)
    }
}

impl fmt::Display for SlipLineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 角色 (Role)
// ==========================================
// Staff 为受限角色: 对账写入需要有效值班会话
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Manager,
    Supervisor,
    Staff,
    Viewer,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Manager => "MANAGER",
            Role::Supervisor => "SUPERVISOR",
            Role::Staff => "STAFF",
            Role::Viewer => "VIEWER",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "ADMIN" => Some(Role::Admin),
            "MANAGER" => Some(Role::Manager),
            "SUPERVISOR" => Some(Role::Supervisor),
            "STAFF" => Some(Role::Staff),
            "VIEWER" => Some(Role::Viewer),
            _ => None,
        }
    }

    /// 主管角色集合
    pub fn is_supervisory(&self) -> bool {
        matches!(self, Role::Admin | Role::Manager | Role::Supervisor)
    }

    /// 是否允许写入对账状态
    pub fn can_bill(&self) -> bool {
        !matches!(self, Role::Viewer)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ==========================================
// 操作人 (Actor)
// ==========================================
// 由外部身份服务提供，本系统信任调用方已完成认证
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}

// ==========================================
// 实体类型 (Entity Kind)
// ==========================================
// 审计/状态事件/冲突记录中的实体引用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    InputLine,
    LedgerEntry,
    AllocationRecord,
    FulfillmentDocument,
    DocumentLine,
    DutySession,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::InputLine => "input_line",
            EntityKind::LedgerEntry => "ledger_entry",
            EntityKind::AllocationRecord => "allocation_record",
            EntityKind::FulfillmentDocument => "fulfillment_document",
            EntityKind::DocumentLine => "document_line",
            EntityKind::DutySession => "duty_session",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "input_line" => Some(EntityKind::InputLine),
            "ledger_entry" => Some(EntityKind::LedgerEntry),
            "allocation_record" => Some(EntityKind::AllocationRecord),
            "fulfillment_document" => Some(EntityKind::FulfillmentDocument),
            "document_line" => Some(EntityKind::DocumentLine),
            "duty_session" => Some(EntityKind::DutySession),
            _ => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 当前时间的版本戳 (RFC 3339, 微秒精度)
///
/// 同时作为 updated_at 与离线冲突检测的版本号使用
pub fn version_stamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_ordering() {
        assert!(OrderStage::Pending < OrderStage::RepAllocation);
        assert!(OrderStage::SlipGenerated.is_consumed());
        assert!(OrderStage::Executed.is_consumed());
        assert!(!OrderStage::RepAllocation.is_consumed());
    }

    #[test]
    fn test_stage_db_string() {
        for stage in [
            OrderStage::RawIngested,
            OrderStage::Pending,
            OrderStage::RepAllocation,
            OrderStage::SlipGenerated,
            OrderStage::Executed,
        ] {
            assert_eq!(OrderStage::from_db_str(stage.as_str()), Some(stage));
        }
        assert_eq!(OrderStage::from_db_str("pending"), None);
    }

    #[test]
    fn test_role_sets() {
        assert!(Role::Supervisor.is_supervisory());
        assert!(Role::Admin.is_supervisory());
        assert!(!Role::Staff.is_supervisory());
        assert!(Role::Staff.can_bill());
        assert!(!Role::Viewer.can_bill());
        assert_eq!(Role::from_db_str(" manager "), Some(Role::Manager));
    }

    #[test]
    fn test_slip_line_terminal() {
        assert!(!SlipLineStatus::Pending.is_terminal());
        assert!(SlipLineStatus::SupplierItemMissing.is_terminal());
    }
}
