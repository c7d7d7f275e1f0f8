// ==========================================
// 采购订单全流程系统 - 去重冲突处理器实现
// ==========================================
// 职责: 检测同批次内/跨批次重复去重键 (orderReference, productReference)
// 策略: 重复行跳过并计数，不视为错误
// ==========================================

use crate::domain::order::{DuplicateRow, RawOrderRow};
use crate::importer::order_importer_trait::ConflictHandler as ConflictHandlerTrait;
use std::collections::{HashMap, HashSet};

pub struct ConflictHandler;

impl ConflictHandlerTrait for ConflictHandler {
    /// 检测同批次内重复
    ///
    /// # 返回
    /// - 重复记录列表（不包括第一次出现）
    fn detect_duplicates(&self, rows: &[RawOrderRow]) -> Vec<DuplicateRow> {
        let mut first_occurrence: HashMap<(String, String), usize> = HashMap::new();
        let mut duplicates = Vec::new();

        for row in rows {
            if let Some(key) = row.dedup_key() {
                if let Some(first_row) = first_occurrence.get(&key) {
                    duplicates.push(DuplicateRow {
                        row_number: row.row_number,
                        order_reference: key.0,
                        product_reference: key.1,
                        first_row: Some(*first_row),
                    });
                } else {
                    first_occurrence.insert(key, row.row_number);
                }
            }
        }

        duplicates
    }

    /// 检测跨批次重复
    fn detect_cross_batch_duplicates(
        &self,
        rows: &[RawOrderRow],
        existing_keys: &HashSet<(String, String)>,
    ) -> Vec<DuplicateRow> {
        rows.iter()
            .filter_map(|row| {
                let key = row.dedup_key()?;
                existing_keys.contains(&key).then(|| DuplicateRow {
                    row_number: row.row_number,
                    order_reference: key.0,
                    product_reference: key.1,
                    first_row: None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(order: &str, product: &str, row_number: usize) -> RawOrderRow {
        RawOrderRow {
            order_reference: Some(order.to_string()),
            product_reference: Some(product.to_string()),
            row_number,
            ..Default::default()
        }
    }

    #[test]
    fn test_detect_duplicates_in_batch() {
        let rows = vec![row("100", "55", 1), row("101", "55", 2), row("100", "55", 3)];
        let dups = ConflictHandler.detect_duplicates(&rows);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].row_number, 3);
        assert_eq!(dups[0].first_row, Some(1));
    }

    #[test]
    fn test_detect_cross_batch() {
        let rows = vec![row("100", "55", 1), row("101", "55", 2)];
        let existing: HashSet<_> = [("101".to_string(), "55".to_string())].into_iter().collect();
        let dups = ConflictHandler.detect_cross_batch_duplicates(&rows, &existing);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].row_number, 2);
        assert!(dups[0].first_row.is_none());
    }
}
