// ==========================================
// 采购订单全流程系统 - 代表单仓储
// ==========================================
// 对齐: allocation_record 表
// ==========================================

use crate::domain::allocation::{AllocationFilter, AllocationRecord};
use crate::domain::types::{AllocationRecordStatus, OrderStage};
use crate::repository::codec::decode_enum;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqliteResult, Row};

/// 代表分组查询的扁平行
#[derive(Debug, Clone)]
pub struct AllocationJoinRow {
    pub allocation: AllocationRecord,
    pub product_name: String,
    pub entry_quantity: f64,
    pub entry_stage: OrderStage,
}

pub struct AllocationRepository;

const SELECT_COLUMNS: &str = "ar.allocation_id, ar.ledger_entry_id, ar.product_id, ar.supplier, \
     ar.quantity, ar.rate, ar.status, ar.created_by, ar.created_at, ar.updated_at";

impl AllocationRepository {
    pub fn insert(conn: &Connection, record: &AllocationRecord) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO allocation_record (
                allocation_id, ledger_entry_id, product_id, supplier, quantity,
                rate, status, created_by, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
            params![
                record.allocation_id,
                record.ledger_entry_id,
                record.product_id,
                record.supplier,
                record.quantity,
                record.rate,
                record.status.as_str(),
                record.created_by,
                record.created_at,
                record.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(
        conn: &Connection,
        allocation_id: &str,
    ) -> RepositoryResult<Option<AllocationRecord>> {
        let found = conn
            .query_row(
                &format!(
                    "SELECT {} FROM allocation_record ar WHERE ar.allocation_id = ?1",
                    SELECT_COLUMNS
                ),
                params![allocation_id],
                Self::map_row,
            )
            .optional()?;
        Ok(found)
    }

    pub fn get(conn: &Connection, allocation_id: &str) -> RepositoryResult<AllocationRecord> {
        Self::find_by_id(conn, allocation_id)?
            .ok_or_else(|| RepositoryError::not_found("AllocationRecord", allocation_id))
    }

    pub fn find_by_entry(
        conn: &Connection,
        entry_id: &str,
    ) -> RepositoryResult<Option<AllocationRecord>> {
        let found = conn
            .query_row(
                &format!(
                    "SELECT {} FROM allocation_record ar WHERE ar.ledger_entry_id = ?1",
                    SELECT_COLUMNS
                ),
                params![entry_id],
                Self::map_row,
            )
            .optional()?;
        Ok(found)
    }

    /// 补偿删除（仅回滚使用）
    pub fn delete(conn: &Connection, allocation_id: &str) -> RepositoryResult<()> {
        let rows = conn.execute(
            "DELETE FROM allocation_record WHERE allocation_id = ?1",
            params![allocation_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AllocationRecord", allocation_id));
        }
        Ok(())
    }

    /// 写回状态与数量
    pub fn update(conn: &Connection, record: &AllocationRecord) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE allocation_record SET
                status = ?1, quantity = ?2, updated_at = ?3
            WHERE allocation_id = ?4
            "#,
            params![
                record.status.as_str(),
                record.quantity,
                record.updated_at,
                record.allocation_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("AllocationRecord", &record.allocation_id));
        }
        Ok(())
    }

    /// 某产品已分配数量（实时汇总，排除已取消）
    pub fn sum_quantity_by_product(conn: &Connection, product_id: &str) -> RepositoryResult<f64> {
        let sum = conn.query_row(
            r#"
            SELECT COALESCE(SUM(quantity), 0) FROM allocation_record
            WHERE product_id = ?1 AND status <> ?2
            "#,
            params![product_id, AllocationRecordStatus::Cancelled.as_str()],
            |row| row.get(0),
        )?;
        Ok(sum)
    }

    /// 按过滤条件查询代表单（关联台账）
    pub fn query_filtered(
        conn: &Connection,
        filter: &AllocationFilter,
    ) -> RepositoryResult<Vec<AllocationJoinRow>> {
        let mut sql = format!(
            r#"
            SELECT {}, le.product_name, le.quantity, le.stage
            FROM allocation_record ar
            JOIN ledger_entry le ON le.entry_id = ar.ledger_entry_id
            WHERE 1 = 1
            "#,
            SELECT_COLUMNS
        );
        let mut args: Vec<Value> = Vec::new();

        if let Some(name) = filter.product_name.as_ref().filter(|s| !s.trim().is_empty()) {
            sql.push_str(" AND le.product_name LIKE ? COLLATE NOCASE");
            args.push(Value::Text(format!("%{}%", name.trim())));
        }
        if let Some(order_ref) = filter.order_reference.as_ref().filter(|s| !s.trim().is_empty()) {
            sql.push_str(
                " AND EXISTS (SELECT 1 FROM input_line il WHERE il.ledger_entry_id = le.entry_id AND il.order_reference = ?)",
            );
            args.push(Value::Text(order_ref.trim().to_string()));
        }
        if let Some(rep) = filter.rep.as_ref().filter(|s| !s.trim().is_empty()) {
            sql.push_str(" AND ar.supplier = ? COLLATE NOCASE");
            args.push(Value::Text(rep.trim().to_string()));
        }
        if let Some(status) = filter.status {
            sql.push_str(" AND ar.status = ?");
            args.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(from) = filter.date_from {
            sql.push_str(" AND date(ar.created_at) >= ?");
            args.push(Value::Text(from.format("%Y-%m-%d").to_string()));
        }
        if let Some(to) = filter.date_to {
            sql.push_str(" AND date(ar.created_at) <= ?");
            args.push(Value::Text(to.format("%Y-%m-%d").to_string()));
        }
        sql.push_str(" ORDER BY ar.product_id, ar.created_at, ar.allocation_id");

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(args.iter()), |row| {
                Ok(AllocationJoinRow {
                    allocation: Self::map_row(row)?,
                    product_name: row.get(10)?,
                    entry_quantity: row.get(11)?,
                    entry_stage: decode_enum(12, row.get(12)?, OrderStage::from_db_str)?,
                })
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(rows)
    }

    fn map_row(row: &Row) -> rusqlite::Result<AllocationRecord> {
        Ok(AllocationRecord {
            allocation_id: row.get(0)?,
            ledger_entry_id: row.get(1)?,
            product_id: row.get(2)?,
            supplier: row.get(3)?,
            quantity: row.get(4)?,
            rate: row.get(5)?,
            status: decode_enum(6, row.get(6)?, AllocationRecordStatus::from_db_str)?,
            created_by: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }
}
