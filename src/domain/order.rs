// ==========================================
// 采购订单全流程系统 - 订单与需求台账领域模型
// ==========================================
// 对齐: input_line / ledger_entry / import_batch 表
// ==========================================

use crate::domain::types::{AllocationStatus, OrderStage};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// RawOrderRow - 规范化后的原始订单行
// ==========================================
// 字段映射的输出: 强类型，缺失字段保留为 None 交给校验
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawOrderRow {
    pub order_reference: Option<String>,
    pub product_reference: Option<String>, // 规范ID / 旧编码 / 名称
    pub legacy_product_id: Option<String>,
    pub product_name: Option<String>,
    pub customer: Option<String>,
    pub quantity: Option<f64>,
    pub supplier_hint: Option<String>,
    pub row_number: usize, // 源数据行号 (从1开始)
}

impl RawOrderRow {
    /// 去重键 (orderReference, productReference)
    pub fn dedup_key(&self) -> Option<(String, String)> {
        match (&self.order_reference, &self.product_reference) {
            (Some(o), Some(p)) => Some((o.clone(), p.clone())),
            _ => None,
        }
    }
}

// ==========================================
// ProductIdentity - 规范产品身份
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductIdentity {
    pub product_id: String,
    pub legacy_id: Option<String>,
    pub name: String,
}

// ==========================================
// InputLine - 已接收的订单行
// ==========================================
// 插入后只允许推进 stage，永不删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputLine {
    pub line_id: String,
    pub batch_id: String,
    pub order_reference: String,
    pub product_reference: String,
    pub customer: String,
    pub product_id: String,
    pub product_name: String, // 解析时的目录名称
    pub quantity: f64,
    pub supplier_hint: Option<String>,
    pub stage: OrderStage,
    pub ledger_entry_id: Option<String>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

// ==========================================
// LedgerEntry - 单产品待处理需求台账
// ==========================================
// 红线: locked=true 时除回滚外任何字段不可修改
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: String,
    pub product_id: String,
    pub product_name: String,
    pub name_override: Option<String>,
    pub quantity: f64,        // 聚合需求量
    pub ordered_qty: f64,     // 分配员决定的采购量
    pub stock_qty: f64,       // 库存满足量
    pub offer_qty: f64,       // 报价量
    pub requested_supplier: Option<String>,
    pub decided_supplier: Option<String>,
    pub notes: Option<String>,
    pub line_summary: String, // 按订单号排序的来源行摘要
    pub locked: bool,
    pub allocation_status: AllocationStatus,
    pub stage: OrderStage,
    pub created_at: DateTime<Utc>,
    pub updated_at: String,   // 版本戳
}

impl LedgerEntry {
    /// 解析后的供应商: 决定供应商优先于原始请求供应商
    pub fn resolved_supplier(&self) -> Option<&str> {
        self.decided_supplier
            .as_deref()
            .or(self.requested_supplier.as_deref())
            .filter(|s| !s.trim().is_empty())
    }

    /// 发货单行展示名称
    pub fn display_name(&self) -> &str {
        self.name_override
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(&self.product_name)
    }
}

// ==========================================
// AllocationEdit - 台账分配编辑
// ==========================================
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AllocationEdit {
    pub ordered_qty: Option<f64>,
    pub stock_qty: Option<f64>,
    pub offer_qty: Option<f64>,
    pub decided_supplier: Option<String>,
    pub name_override: Option<String>,
    pub notes: Option<String>,
}

impl AllocationEdit {
    pub fn is_empty(&self) -> bool {
        self.ordered_qty.is_none()
            && self.stock_qty.is_none()
            && self.offer_qty.is_none()
            && self.decided_supplier.is_none()
            && self.name_override.is_none()
            && self.notes.is_none()
    }
}

// ==========================================
// 导入结果
// ==========================================

/// 行级拒绝原因分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowErrorKind {
    Validation,        // 必填字段缺失 / 数量非正
    ProductResolution, // 产品无法解析
    Storage,           // 单行写入失败
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowError {
    pub row_number: usize,
    pub kind: RowErrorKind,
    pub reason: String,
}

/// 重复行明细
///
/// first_row 为同批次内首次出现的行号；命中历史批次时为 None
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateRow {
    pub row_number: usize,
    pub order_reference: String,
    pub product_reference: String,
    pub first_row: Option<usize>,
}

/// 预览行 (数量受配置限制)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewLine {
    pub row_number: usize,
    pub order_reference: String,
    pub product_id: String,
    pub customer: String,
    pub quantity: f64,
}

/// 导入汇总
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestSummary {
    pub batch_id: String,
    pub total: usize,
    pub accepted: usize,
    pub duplicates: usize,
    pub rejected: usize,
    pub processed: usize, // 本次聚合折算的 Pending 订单行数
    pub ledger_entries: usize,
    pub errors: Vec<RowError>,
    pub duplicate_rows: Vec<DuplicateRow>,
    pub preview: Vec<PreviewLine>,
    pub elapsed_ms: i64,
}

/// 导入批次记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,
    pub source_name: Option<String>,
    pub total_rows: i64,
    pub accepted_rows: i64,
    pub duplicate_rows: i64,
    pub rejected_rows: i64,
    pub imported_by: String,
    pub imported_at: DateTime<Utc>,
    pub elapsed_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> LedgerEntry {
        LedgerEntry {
            entry_id: "L1".to_string(),
            product_id: "P55".to_string(),
            product_name: "Nitrile Gloves".to_string(),
            name_override: None,
            quantity: 10.0,
            ordered_qty: 0.0,
            stock_qty: 0.0,
            offer_qty: 0.0,
            requested_supplier: Some("Acme".to_string()),
            decided_supplier: None,
            notes: None,
            line_summary: String::new(),
            locked: false,
            allocation_status: AllocationStatus::Pending,
            stage: OrderStage::Pending,
            created_at: Utc::now(),
            updated_at: String::new(),
        }
    }

    #[test]
    fn test_resolved_supplier_prefers_decided() {
        let mut e = entry();
        assert_eq!(e.resolved_supplier(), Some("Acme"));
        e.decided_supplier = Some("Beta".to_string());
        assert_eq!(e.resolved_supplier(), Some("Beta"));
        e.decided_supplier = None;
        e.requested_supplier = Some("  ".to_string());
        assert_eq!(e.resolved_supplier(), None);
    }

    #[test]
    fn test_display_name_override() {
        let mut e = entry();
        assert_eq!(e.display_name(), "Nitrile Gloves");
        e.name_override = Some("Gloves (L)".to_string());
        assert_eq!(e.display_name(), "Gloves (L)");
    }

    #[test]
    fn test_dedup_key_requires_both_parts() {
        let mut row = RawOrderRow {
            order_reference: Some("100".to_string()),
            ..Default::default()
        };
        assert!(row.dedup_key().is_none());
        row.product_reference = Some("55".to_string());
        assert_eq!(row.dedup_key(), Some(("100".to_string(), "55".to_string())));
    }
}
