// ==========================================
// 采购订单全流程系统 - 数据清洗器实现
// ==========================================
// 职责: TRIM / NULL 标准化 / 必填校验
// ==========================================

use crate::domain::order::RawOrderRow;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::order_importer_trait::DataCleaner as DataCleanerTrait;

pub struct DataCleaner;

impl DataCleanerTrait for DataCleaner {
    fn clean_text(&self, value: &str, uppercase: bool) -> String {
        let trimmed = value.trim();
        if uppercase {
            trimmed.to_uppercase()
        } else {
            trimmed.to_string()
        }
    }

    fn normalize_null(&self, value: Option<String>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
    }

    fn validate_required(&self, row: &RawOrderRow) -> ImportResult<()> {
        let missing = |field: &str| ImportError::MissingField {
            row: row.row_number,
            field: field.to_string(),
        };

        if row.customer.is_none() {
            return Err(missing("customer"));
        }
        if row.order_reference.is_none() {
            return Err(missing("order_reference"));
        }
        if row.product_reference.is_none() {
            return Err(missing("product_reference"));
        }
        match row.quantity {
            None => Err(missing("quantity")),
            Some(q) if q <= 0.0 => Err(ImportError::NonPositiveQuantity {
                row: row.row_number,
                value: q,
            }),
            Some(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_row() -> RawOrderRow {
        RawOrderRow {
            order_reference: Some("100".to_string()),
            product_reference: Some("55".to_string()),
            customer: Some("Clinic A".to_string()),
            quantity: Some(5.0),
            row_number: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_null() {
        let cleaner = DataCleaner;
        assert_eq!(cleaner.normalize_null(Some("  ".to_string())), None);
        assert_eq!(cleaner.normalize_null(Some("NULL".to_string())), None);
        assert_eq!(cleaner.normalize_null(Some(" x ".to_string())), Some("x".to_string()));
        assert_eq!(cleaner.clean_text(" acme ", true), "ACME");
    }

    #[test]
    fn test_validate_required() {
        let cleaner = DataCleaner;
        assert!(cleaner.validate_required(&valid_row()).is_ok());

        let mut row = valid_row();
        row.customer = None;
        assert!(matches!(
            cleaner.validate_required(&row),
            Err(ImportError::MissingField { ref field, .. }) if field == "customer"
        ));

        let mut row = valid_row();
        row.quantity = Some(0.0);
        assert!(matches!(
            cleaner.validate_required(&row),
            Err(ImportError::NonPositiveQuantity { .. })
        ));
    }
}
