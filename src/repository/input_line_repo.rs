// ==========================================
// 采购订单全流程系统 - 订单行 / 导入批次仓储
// ==========================================
// 对齐: input_line / import_batch 表
// 红线: 订单行插入后只推进 stage，不删除
// ==========================================

use crate::domain::order::{ImportBatch, InputLine};
use crate::domain::types::OrderStage;
use crate::repository::codec::decode_enum;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

/// 按产品聚合的 Pending 需求
#[derive(Debug, Clone)]
pub struct PendingDemandRow {
    pub line_id: String,
    pub order_reference: String,
    pub product_id: String,
    pub product_name: String,
    pub quantity: f64,
    pub supplier_hint: Option<String>,
}

pub struct InputLineRepository;

impl InputLineRepository {
    /// 去重键是否已存在
    pub fn exists_by_key(
        conn: &Connection,
        order_reference: &str,
        product_reference: &str,
    ) -> RepositoryResult<bool> {
        let exists = conn
            .query_row(
                "SELECT 1 FROM input_line WHERE order_reference = ?1 AND product_reference = ?2",
                params![order_reference, product_reference],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);
        Ok(exists)
    }

    pub fn insert(conn: &Connection, line: &InputLine) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO input_line (
                line_id, batch_id, order_reference, product_reference, customer,
                product_id, product_name, quantity, supplier_hint, stage,
                ledger_entry_id, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                line.line_id,
                line.batch_id,
                line.order_reference,
                line.product_reference,
                line.customer,
                line.product_id,
                line.product_name,
                line.quantity,
                line.supplier_hint,
                line.stage.as_str(),
                line.ledger_entry_id,
                line.created_by,
                line.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_key(
        conn: &Connection,
        order_reference: &str,
        product_reference: &str,
    ) -> RepositoryResult<Option<InputLine>> {
        let found = conn
            .query_row(
                &format!(
                    "SELECT {} FROM input_line WHERE order_reference = ?1 AND product_reference = ?2",
                    SELECT_COLUMNS
                ),
                params![order_reference, product_reference],
                Self::map_row,
            )
            .optional()?;
        Ok(found)
    }

    /// 台账的来源订单行（按订单号排序）
    pub fn find_by_entry(conn: &Connection, entry_id: &str) -> RepositoryResult<Vec<InputLine>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM input_line WHERE ledger_entry_id = ?1 ORDER BY order_reference, line_id",
            SELECT_COLUMNS
        ))?;
        let lines = stmt
            .query_map(params![entry_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    /// 所有 Pending 阶段订单行（聚合输入，按产品 + 订单号排序）
    pub fn list_pending_demand(conn: &Connection) -> RepositoryResult<Vec<PendingDemandRow>> {
        Self::query_pending_demand(conn, None)
    }

    /// 某产品的 Pending 阶段订单行
    pub fn list_pending_demand_for_product(
        conn: &Connection,
        product_id: &str,
    ) -> RepositoryResult<Vec<PendingDemandRow>> {
        Self::query_pending_demand(conn, Some(product_id))
    }

    fn query_pending_demand(
        conn: &Connection,
        product_id: Option<&str>,
    ) -> RepositoryResult<Vec<PendingDemandRow>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT line_id, order_reference, product_id, product_name, quantity, supplier_hint
            FROM input_line
            WHERE stage = ?1 AND (?2 IS NULL OR product_id = ?2)
            ORDER BY product_id, order_reference, line_id
            "#,
        )?;
        let rows = stmt
            .query_map(params![OrderStage::Pending.as_str(), product_id], |row| {
                Ok(PendingDemandRow {
                    line_id: row.get(0)?,
                    order_reference: row.get(1)?,
                    product_id: row.get(2)?,
                    product_name: row.get(3)?,
                    quantity: row.get(4)?,
                    supplier_hint: row.get(5)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// 将订单行关联到台账
    pub fn assign_entry(conn: &Connection, line_ids: &[String], entry_id: &str) -> RepositoryResult<usize> {
        let mut stmt = conn.prepare("UPDATE input_line SET ledger_entry_id = ?1 WHERE line_id = ?2")?;
        let mut count = 0;
        for line_id in line_ids {
            count += stmt.execute(params![entry_id, line_id])?;
        }
        Ok(count)
    }

    /// 推进台账下所有订单行的 stage
    pub fn set_stage_by_entry(
        conn: &Connection,
        entry_id: &str,
        stage: OrderStage,
    ) -> RepositoryResult<usize> {
        let rows = conn.execute(
            "UPDATE input_line SET stage = ?1 WHERE ledger_entry_id = ?2",
            params![stage.as_str(), entry_id],
        )?;
        Ok(rows)
    }

    pub fn count_by_stage(conn: &Connection, stage: OrderStage) -> RepositoryResult<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM input_line WHERE stage = ?1",
            params![stage.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Pending 阶段某产品的需求合计
    pub fn sum_pending_quantity(conn: &Connection, product_id: &str) -> RepositoryResult<f64> {
        let sum = conn.query_row(
            "SELECT COALESCE(SUM(quantity), 0) FROM input_line WHERE stage = ?1 AND product_id = ?2",
            params![OrderStage::Pending.as_str(), product_id],
            |row| row.get(0),
        )?;
        Ok(sum)
    }

    fn map_row(row: &Row) -> rusqlite::Result<InputLine> {
        Ok(InputLine {
            line_id: row.get(0)?,
            batch_id: row.get(1)?,
            order_reference: row.get(2)?,
            product_reference: row.get(3)?,
            customer: row.get(4)?,
            product_id: row.get(5)?,
            product_name: row.get(6)?,
            quantity: row.get(7)?,
            supplier_hint: row.get(8)?,
            stage: decode_enum(9, row.get(9)?, OrderStage::from_db_str)?,
            ledger_entry_id: row.get(10)?,
            created_by: row.get(11)?,
            created_at: row.get(12)?,
        })
    }
}

const SELECT_COLUMNS: &str = "line_id, batch_id, order_reference, product_reference, customer, \
     product_id, product_name, quantity, supplier_hint, stage, ledger_entry_id, created_by, created_at";

// ==========================================
// ImportBatchRepository - 导入批次
// ==========================================
pub struct ImportBatchRepository;

impl ImportBatchRepository {
    pub fn insert(conn: &Connection, batch: &ImportBatch) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO import_batch (
                batch_id, source_name, total_rows, accepted_rows, duplicate_rows,
                rejected_rows, imported_by, imported_at, elapsed_ms
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                batch.batch_id,
                batch.source_name,
                batch.total_rows,
                batch.accepted_rows,
                batch.duplicate_rows,
                batch.rejected_rows,
                batch.imported_by,
                batch.imported_at,
                batch.elapsed_ms,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, batch_id: &str) -> RepositoryResult<Option<ImportBatch>> {
        let found = conn
            .query_row(
                r#"
                SELECT batch_id, source_name, total_rows, accepted_rows, duplicate_rows,
                       rejected_rows, imported_by, imported_at, elapsed_ms
                FROM import_batch WHERE batch_id = ?1
                "#,
                params![batch_id],
                |row| {
                    Ok(ImportBatch {
                        batch_id: row.get(0)?,
                        source_name: row.get(1)?,
                        total_rows: row.get(2)?,
                        accepted_rows: row.get(3)?,
                        duplicate_rows: row.get(4)?,
                        rejected_rows: row.get(5)?,
                        imported_by: row.get(6)?,
                        imported_at: row.get(7)?,
                        elapsed_ms: row.get(8)?,
                    })
                },
            )
            .optional()?;
        Ok(found)
    }
}
