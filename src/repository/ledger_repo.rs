// ==========================================
// 采购订单全流程系统 - 需求台账仓储
// ==========================================
// 对齐: ledger_entry 表
// 红线: Repository 不含业务逻辑（锁定校验由引擎层完成）
// ==========================================

use crate::domain::order::LedgerEntry;
use crate::domain::slip::SlipCandidate;
use crate::domain::types::{AllocationRecordStatus, AllocationStatus, OrderStage};
use crate::repository::codec::decode_enum;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

pub struct LedgerRepository;

const SELECT_COLUMNS: &str = "entry_id, product_id, product_name, name_override, quantity, \
     ordered_qty, stock_qty, offer_qty, requested_supplier, decided_supplier, notes, \
     line_summary, locked, allocation_status, stage, created_at, updated_at";

impl LedgerRepository {
    /// 删除所有未锁定台账
    ///
    /// 订单行上的 ledger_entry_id 由外键 ON DELETE SET NULL 自动解除
    pub fn delete_unlocked(conn: &Connection) -> RepositoryResult<usize> {
        let rows = conn.execute("DELETE FROM ledger_entry WHERE locked = 0", [])?;
        Ok(rows)
    }

    /// 删除某产品的未锁定台账
    pub fn delete_unlocked_by_product(conn: &Connection, product_id: &str) -> RepositoryResult<usize> {
        let rows = conn.execute(
            "DELETE FROM ledger_entry WHERE locked = 0 AND product_id = ?1",
            params![product_id],
        )?;
        Ok(rows)
    }

    pub fn insert(conn: &Connection, entry: &LedgerEntry) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO ledger_entry (
                entry_id, product_id, product_name, name_override, quantity,
                ordered_qty, stock_qty, offer_qty, requested_supplier, decided_supplier,
                notes, line_summary, locked, allocation_status, stage, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)
            "#,
            params![
                entry.entry_id,
                entry.product_id,
                entry.product_name,
                entry.name_override,
                entry.quantity,
                entry.ordered_qty,
                entry.stock_qty,
                entry.offer_qty,
                entry.requested_supplier,
                entry.decided_supplier,
                entry.notes,
                entry.line_summary,
                entry.locked as i32,
                entry.allocation_status.as_str(),
                entry.stage.as_str(),
                entry.created_at,
                entry.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, entry_id: &str) -> RepositoryResult<Option<LedgerEntry>> {
        let found = conn
            .query_row(
                &format!("SELECT {} FROM ledger_entry WHERE entry_id = ?1", SELECT_COLUMNS),
                params![entry_id],
                Self::map_row,
            )
            .optional()?;
        Ok(found)
    }

    /// 按 ID 读取，不存在时返回 NotFound
    pub fn get(conn: &Connection, entry_id: &str) -> RepositoryResult<LedgerEntry> {
        Self::find_by_id(conn, entry_id)?
            .ok_or_else(|| RepositoryError::not_found("LedgerEntry", entry_id))
    }

    pub fn find_by_product(conn: &Connection, product_id: &str) -> RepositoryResult<Vec<LedgerEntry>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ledger_entry WHERE product_id = ?1 ORDER BY created_at, entry_id",
            SELECT_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![product_id], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    pub fn list_all(conn: &Connection) -> RepositoryResult<Vec<LedgerEntry>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM ledger_entry ORDER BY product_id, created_at, entry_id",
            SELECT_COLUMNS
        ))?;
        let entries = stmt
            .query_map([], Self::map_row)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(entries)
    }

    /// 写回分配员可编辑字段
    pub fn update_allocation_fields(conn: &Connection, entry: &LedgerEntry) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE ledger_entry SET
                ordered_qty = ?1,
                stock_qty = ?2,
                offer_qty = ?3,
                decided_supplier = ?4,
                name_override = ?5,
                notes = ?6,
                updated_at = ?7
            WHERE entry_id = ?8
            "#,
            params![
                entry.ordered_qty,
                entry.stock_qty,
                entry.offer_qty,
                entry.decided_supplier,
                entry.name_override,
                entry.notes,
                entry.updated_at,
                entry.entry_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("LedgerEntry", &entry.entry_id));
        }
        Ok(())
    }

    /// 写回锁定状态 / 分配状态 / 阶段
    pub fn update_lock_state(
        conn: &Connection,
        entry_id: &str,
        locked: bool,
        allocation_status: AllocationStatus,
        stage: OrderStage,
        updated_at: &str,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE ledger_entry SET
                locked = ?1, allocation_status = ?2, stage = ?3, updated_at = ?4
            WHERE entry_id = ?5
            "#,
            params![locked as i32, allocation_status.as_str(), stage.as_str(), updated_at, entry_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("LedgerEntry", entry_id));
        }
        Ok(())
    }

    /// 推进阶段（不改动锁定标记）
    pub fn update_stage(
        conn: &Connection,
        entry_id: &str,
        stage: OrderStage,
        updated_at: &str,
    ) -> RepositoryResult<()> {
        let rows = conn.execute(
            "UPDATE ledger_entry SET stage = ?1, updated_at = ?2 WHERE entry_id = ?3",
            params![stage.as_str(), updated_at, entry_id],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("LedgerEntry", entry_id));
        }
        Ok(())
    }

    /// 发货单生成候选项
    ///
    /// 条件:
    /// - stage ∈ {PENDING, REP_ALLOCATION}
    /// - 代表单已取消的条目不出单
    /// - 承诺数量 > 0（有效代表单数量优先，否则取 ordered_qty）
    /// - 供应商可解析（代表单 > 决定供应商 > 请求供应商）
    pub fn find_slip_candidates(conn: &Connection) -> RepositoryResult<Vec<SlipCandidate>> {
        let mut stmt = conn.prepare(
            r#"
            SELECT le.entry_id,
                   ar.allocation_id,
                   le.product_id,
                   COALESCE(NULLIF(TRIM(le.name_override), ''), le.product_name) AS item_name,
                   COALESCE(ar.quantity, le.ordered_qty) AS committed_qty,
                   COALESCE(
                       NULLIF(TRIM(ar.supplier), ''),
                       NULLIF(TRIM(le.decided_supplier), ''),
                       NULLIF(TRIM(le.requested_supplier), '')
                   ) AS supplier,
                   le.stage
            FROM ledger_entry le
            LEFT JOIN allocation_record ar
                   ON ar.ledger_entry_id = le.entry_id AND ar.status <> ?3
            WHERE le.stage IN (?1, ?2)
              AND NOT EXISTS (
                      SELECT 1 FROM allocation_record c
                      WHERE c.ledger_entry_id = le.entry_id AND c.status = ?3
                  )
              AND COALESCE(ar.quantity, le.ordered_qty) > 0
              AND COALESCE(
                      NULLIF(TRIM(ar.supplier), ''),
                      NULLIF(TRIM(le.decided_supplier), ''),
                      NULLIF(TRIM(le.requested_supplier), '')
                  ) IS NOT NULL
            ORDER BY supplier, le.product_id, le.entry_id
            "#,
        )?;

        let candidates = stmt
            .query_map(
                params![
                    OrderStage::Pending.as_str(),
                    OrderStage::RepAllocation.as_str(),
                    AllocationRecordStatus::Cancelled.as_str(),
                ],
                |row| {
                    Ok(SlipCandidate {
                        ledger_entry_id: row.get(0)?,
                        allocation_id: row.get(1)?,
                        product_id: row.get(2)?,
                        item_name: row.get(3)?,
                        committed_qty: row.get(4)?,
                        supplier: row.get(5)?,
                        stage: decode_enum(6, row.get(6)?, OrderStage::from_db_str)?,
                    })
                },
            )?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok(candidates)
    }

    fn map_row(row: &Row) -> rusqlite::Result<LedgerEntry> {
        Ok(LedgerEntry {
            entry_id: row.get(0)?,
            product_id: row.get(1)?,
            product_name: row.get(2)?,
            name_override: row.get(3)?,
            quantity: row.get(4)?,
            ordered_qty: row.get(5)?,
            stock_qty: row.get(6)?,
            offer_qty: row.get(7)?,
            requested_supplier: row.get(8)?,
            decided_supplier: row.get(9)?,
            notes: row.get(10)?,
            line_summary: row.get(11)?,
            locked: row.get::<_, i32>(12)? != 0,
            allocation_status: decode_enum(13, row.get(13)?, AllocationStatus::from_db_str)?,
            stage: decode_enum(14, row.get(14)?, OrderStage::from_db_str)?,
            created_at: row.get(15)?,
            updated_at: row.get(16)?,
        })
    }
}
