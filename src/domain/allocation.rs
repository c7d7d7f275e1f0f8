// ==========================================
// 采购订单全流程系统 - 代表单领域模型
// ==========================================
// 对齐: allocation_record 表
// 一个已锁定台账对应一条代表单（不支持多代表拆分）
// ==========================================

use crate::domain::types::{AllocationRecordStatus, OrderStage};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// AllocationRecord - 代表单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationRecord {
    pub allocation_id: String,
    pub ledger_entry_id: String,
    pub product_id: String,
    pub supplier: String,
    pub quantity: f64,
    pub rate: f64,
    pub status: AllocationRecordStatus,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: String,
}

/// 代表单编辑 (状态 / 数量 / 备注)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepItemEdit {
    pub status: Option<AllocationRecordStatus>,
    pub quantity: Option<f64>,
    pub notes: Option<String>,
}

/// 代表分组查询过滤条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationFilter {
    pub product_name: Option<String>,    // 模糊匹配，大小写不敏感
    pub order_reference: Option<String>, // 来源订单号精确匹配
    pub rep: Option<String>,             // 代表(供应商)精确匹配
    pub status: Option<AllocationRecordStatus>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// 单条代表单视图 (含来源订单行)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocationView {
    pub allocation: AllocationRecord,
    pub entry_stage: OrderStage,
    pub requested_qty: f64,
    pub order_references: Vec<String>,
    pub customers: Vec<String>,
}

/// 按产品分组的代表单
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductAllocationGroup {
    pub product_id: String,
    pub product_name: String,
    pub allocated_qty: f64, // 实时汇总，不缓存
    pub allocations: Vec<AllocationView>,
}

/// 提交代表结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitOutcome {
    pub allocation_id: String,
    pub ledger_entry_id: String,
    pub quantity: f64,
}
