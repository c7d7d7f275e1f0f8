// ==========================================
// 采购订单全流程系统 - 发货单仓储
// ==========================================
// 对齐: fulfillment_document / document_line 表
// 红线: 发货单只增不删；document_line.ledger_entry_id 唯一保证同一台账只出单一次
// ==========================================

use crate::domain::slip::{DocumentLine, DocumentWithLines, FulfillmentDocument};
use crate::domain::types::SlipLineStatus;
use crate::repository::codec::decode_enum;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};

pub struct SlipRepository;

const LINE_COLUMNS: &str = "line_id, document_id, ledger_entry_id, allocation_id, product_id, \
     item_name, quantity, received_qty, billed_qty, invoice_id, remarks, status, updated_at";

const DOCUMENT_COLUMNS: &str = "document_id, slip_no, supplier, slip_date, created_by, created_at";

impl SlipRepository {
    /// 生成发货单号: SLP-YYYYMMDD-NNNN（按出单日期顺序编号）
    pub fn next_slip_no(conn: &Connection, slip_date: NaiveDate) -> RepositoryResult<String> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM fulfillment_document WHERE slip_date = ?1",
            params![slip_date],
            |row| row.get(0),
        )?;
        Ok(format!("SLP-{}-{:04}", slip_date.format("%Y%m%d"), count + 1))
    }

    pub fn insert_document(conn: &Connection, doc: &FulfillmentDocument) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO fulfillment_document (
                document_id, slip_no, supplier, slip_date, created_by, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                doc.document_id,
                doc.slip_no,
                doc.supplier,
                doc.slip_date,
                doc.created_by,
                doc.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn insert_line(conn: &Connection, line: &DocumentLine) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO document_line (
                line_id, document_id, ledger_entry_id, allocation_id, product_id,
                item_name, quantity, received_qty, billed_qty, invoice_id,
                remarks, status, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
            params![
                line.line_id,
                line.document_id,
                line.ledger_entry_id,
                line.allocation_id,
                line.product_id,
                line.item_name,
                line.quantity,
                line.received_qty,
                line.billed_qty,
                line.invoice_id,
                line.remarks,
                line.status.as_str(),
                line.updated_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_line(conn: &Connection, line_id: &str) -> RepositoryResult<Option<DocumentLine>> {
        let found = conn
            .query_row(
                &format!("SELECT {} FROM document_line WHERE line_id = ?1", LINE_COLUMNS),
                params![line_id],
                Self::map_line,
            )
            .optional()?;
        Ok(found)
    }

    pub fn get_line(conn: &Connection, line_id: &str) -> RepositoryResult<DocumentLine> {
        Self::find_line(conn, line_id)?
            .ok_or_else(|| RepositoryError::not_found("DocumentLine", line_id))
    }

    pub fn find_line_by_entry(
        conn: &Connection,
        entry_id: &str,
    ) -> RepositoryResult<Option<DocumentLine>> {
        let found = conn
            .query_row(
                &format!("SELECT {} FROM document_line WHERE ledger_entry_id = ?1", LINE_COLUMNS),
                params![entry_id],
                Self::map_line,
            )
            .optional()?;
        Ok(found)
    }

    /// 写回对账字段
    pub fn update_line_billing(conn: &Connection, line: &DocumentLine) -> RepositoryResult<()> {
        let rows = conn.execute(
            r#"
            UPDATE document_line SET
                status = ?1,
                received_qty = ?2,
                billed_qty = ?3,
                invoice_id = ?4,
                remarks = ?5,
                updated_at = ?6
            WHERE line_id = ?7
            "#,
            params![
                line.status.as_str(),
                line.received_qty,
                line.billed_qty,
                line.invoice_id,
                line.remarks,
                line.updated_at,
                line.line_id,
            ],
        )?;
        if rows == 0 {
            return Err(RepositoryError::not_found("DocumentLine", &line.line_id));
        }
        Ok(())
    }

    pub fn find_document(
        conn: &Connection,
        document_id: &str,
    ) -> RepositoryResult<Option<FulfillmentDocument>> {
        let found = conn
            .query_row(
                &format!(
                    "SELECT {} FROM fulfillment_document WHERE document_id = ?1",
                    DOCUMENT_COLUMNS
                ),
                params![document_id],
                Self::map_document,
            )
            .optional()?;
        Ok(found)
    }

    pub fn find_document_with_lines(
        conn: &Connection,
        document_id: &str,
    ) -> RepositoryResult<Option<DocumentWithLines>> {
        let Some(document) = Self::find_document(conn, document_id)? else {
            return Ok(None);
        };
        let lines = Self::find_lines_by_document(conn, document_id)?;
        Ok(Some(DocumentWithLines { document, lines }))
    }

    pub fn find_lines_by_document(
        conn: &Connection,
        document_id: &str,
    ) -> RepositoryResult<Vec<DocumentLine>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM document_line WHERE document_id = ?1 ORDER BY item_name, line_id",
            LINE_COLUMNS
        ))?;
        let lines = stmt
            .query_map(params![document_id], Self::map_line)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(lines)
    }

    /// 按供应商列出发货单（供应商为空时列出全部）
    pub fn list_documents(
        conn: &Connection,
        supplier: Option<&str>,
    ) -> RepositoryResult<Vec<FulfillmentDocument>> {
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM fulfillment_document
            WHERE (?1 IS NULL OR supplier = ?1 COLLATE NOCASE)
            ORDER BY slip_date DESC, slip_no DESC
            "#,
            DOCUMENT_COLUMNS
        ))?;
        let docs = stmt
            .query_map(params![supplier], Self::map_document)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(docs)
    }

    pub fn count_documents(conn: &Connection) -> RepositoryResult<i64> {
        let count = conn.query_row("SELECT COUNT(*) FROM fulfillment_document", [], |row| row.get(0))?;
        Ok(count)
    }

    fn map_document(row: &Row) -> rusqlite::Result<FulfillmentDocument> {
        Ok(FulfillmentDocument {
            document_id: row.get(0)?,
            slip_no: row.get(1)?,
            supplier: row.get(2)?,
            slip_date: row.get(3)?,
            created_by: row.get(4)?,
            created_at: row.get(5)?,
        })
    }

    fn map_line(row: &Row) -> rusqlite::Result<DocumentLine> {
        Ok(DocumentLine {
            line_id: row.get(0)?,
            document_id: row.get(1)?,
            ledger_entry_id: row.get(2)?,
            allocation_id: row.get(3)?,
            product_id: row.get(4)?,
            item_name: row.get(5)?,
            quantity: row.get(6)?,
            received_qty: row.get(7)?,
            billed_qty: row.get(8)?,
            invoice_id: row.get(9)?,
            remarks: row.get(10)?,
            status: decode_enum(11, row.get(11)?, SlipLineStatus::from_db_str)?,
            updated_at: row.get(12)?,
        })
    }
}
