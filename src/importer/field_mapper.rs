// ==========================================
// 采购订单全流程系统 - 字段映射器实现
// ==========================================
// 职责: 源列名 → 标准字段映射 + 类型转换
// 规则: 列名比较前统一小写，去除空白/下划线/连字符
// ==========================================

use crate::domain::order::RawOrderRow;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::order_importer_trait::FieldMapper as FieldMapperTrait;
use std::collections::HashMap;

pub struct FieldMapper;

impl FieldMapperTrait for FieldMapper {
    fn map_to_order_row(
        &self,
        row: &HashMap<String, String>,
        row_number: usize,
    ) -> ImportResult<RawOrderRow> {
        let normalized: HashMap<String, &str> = row
            .iter()
            .map(|(k, v)| (normalize_header(k), v.as_str()))
            .collect();

        Ok(RawOrderRow {
            order_reference: self.get_string(&normalized, "order_reference"),
            product_reference: self.get_string(&normalized, "product_reference"),
            legacy_product_id: self.get_string(&normalized, "legacy_product_id"),
            product_name: self.get_string(&normalized, "product_name"),
            customer: self.get_string(&normalized, "customer"),
            quantity: self.parse_quantity(&normalized, row_number)?,
            supplier_hint: self.get_string(&normalized, "supplier_hint"),
            row_number,
        })
    }
}

impl FieldMapper {
    /// 提取字符串字段，支持多个可能的列名（别名）
    fn get_string(&self, row: &HashMap<String, &str>, key: &str) -> Option<String> {
        let aliases: &[&str] = match key {
            "order_reference" => &["orderreference", "order", "orderno", "orderid", "ordernumber", "ponumber", "订单号"],
            "product_reference" => &["productreference", "product", "productid", "productcode", "itemcode", "sku", "产品编码"],
            "legacy_product_id" => &["legacyproductid", "legacyid", "oldcode", "旧编码"],
            "product_name" => &["productname", "itemname", "description", "产品名称"],
            "customer" => &["customer", "customername", "client", "customerid", "客户"],
            "quantity" => &["quantity", "qty", "requestedqty", "requestedquantity", "数量"],
            "supplier_hint" => &["supplierhint", "supplier", "vendor", "rep", "供应商"],
            _ => &[],
        };

        aliases.iter().find_map(|alias| {
            row.get(*alias)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        })
    }

    /// 解析数量（允许千分位逗号）
    fn parse_quantity(&self, row: &HashMap<String, &str>, row_number: usize) -> ImportResult<Option<f64>> {
        match self.get_string(row, "quantity") {
            None => Ok(None),
            Some(value) => value
                .replace(',', "")
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| ImportError::TypeConversionError {
                    row: row_number,
                    field: "quantity".to_string(),
                    message: format!("无法解析为数量: {}", value),
                }),
        }
    }
}

/// 列名标准化: 小写 + 去除空白/下划线/连字符
fn normalize_header(header: &str) -> String {
    header
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn test_header_aliases_and_case() {
        let row = raw(&[
            ("Order_No", " 100 "),
            ("Product ID", "55"),
            ("CUSTOMER", "Clinic A"),
            ("qty", "1,200"),
            ("Supplier", "Acme"),
        ]);
        let mapped = FieldMapper.map_to_order_row(&row, 3).unwrap();
        assert_eq!(mapped.order_reference.as_deref(), Some("100"));
        assert_eq!(mapped.product_reference.as_deref(), Some("55"));
        assert_eq!(mapped.customer.as_deref(), Some("Clinic A"));
        assert_eq!(mapped.quantity, Some(1200.0));
        assert_eq!(mapped.supplier_hint.as_deref(), Some("Acme"));
        assert_eq!(mapped.row_number, 3);
    }

    #[test]
    fn test_blank_values_become_none() {
        let row = raw(&[("order", "100"), ("product", "   "), ("quantity", "")]);
        let mapped = FieldMapper.map_to_order_row(&row, 1).unwrap();
        assert!(mapped.product_reference.is_none());
        assert!(mapped.quantity.is_none());
    }

    #[test]
    fn test_bad_quantity_is_type_error() {
        let row = raw(&[("order", "100"), ("product", "55"), ("quantity", "five")]);
        let err = FieldMapper.map_to_order_row(&row, 7).unwrap_err();
        assert!(matches!(err, ImportError::TypeConversionError { row: 7, .. }));
    }
}
