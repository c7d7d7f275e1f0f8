// ==========================================
// 采购订单全流程系统 - 发货单领域模型
// ==========================================
// 对齐: fulfillment_document / document_line 表
// 发货单按供应商分组，一次生成一批，永不删除
// ==========================================

use crate::domain::types::SlipLineStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// FulfillmentDocument - 发货单
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FulfillmentDocument {
    pub document_id: String,
    pub slip_no: String,
    pub supplier: String,
    pub slip_date: NaiveDate,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// DocumentLine - 发货单行
// ==========================================
// 只允许对账流程修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentLine {
    pub line_id: String,
    pub document_id: String,
    pub ledger_entry_id: String,
    pub allocation_id: Option<String>,
    pub product_id: String,
    pub item_name: String,
    pub quantity: f64,
    pub received_qty: Option<f64>,
    pub billed_qty: Option<f64>,
    pub invoice_id: Option<String>,
    pub remarks: Option<String>,
    pub status: SlipLineStatus,
    pub updated_at: String,
}

/// 发货单 + 明细
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentWithLines {
    pub document: FulfillmentDocument,
    pub lines: Vec<DocumentLine>,
}

/// 发货单生成候选项
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlipCandidate {
    pub ledger_entry_id: String,
    pub allocation_id: Option<String>,
    pub product_id: String,
    pub item_name: String,
    pub committed_qty: f64,
    pub supplier: String,
    pub stage: crate::domain::types::OrderStage,
}

/// 单个供应商的生成摘要
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierSlipSummary {
    pub document_id: String,
    pub slip_no: String,
    pub supplier: String,
    pub line_count: usize,
    pub total_qty: f64,
}

/// 生成结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutcome {
    pub generated: usize,
    pub suppliers: Vec<SupplierSlipSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GenerationOutcome {
    pub fn nothing_to_generate() -> Self {
        Self {
            generated: 0,
            suppliers: Vec::new(),
            message: Some("没有可生成发货单的已分配需求".to_string()),
        }
    }
}

// ==========================================
// BillingUpdate - 对账更新
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingUpdate {
    pub status: SlipLineStatus,
    pub received_qty: Option<f64>,
    pub billed_qty: Option<f64>,
    pub invoice_id: Option<String>,
    pub notes: Option<String>,
}

impl BillingUpdate {
    pub fn status(status: SlipLineStatus) -> Self {
        Self {
            status,
            received_qty: None,
            billed_qty: None,
            invoice_id: None,
            notes: None,
        }
    }
}
