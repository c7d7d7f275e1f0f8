// ==========================================
// 采购订单全流程系统 - 产品主数据仓储
// ==========================================
// 职责: 目录解析的查找源（主数据 CRUD 不在本系统范围内）
// ==========================================

use crate::domain::order::ProductIdentity;
use crate::repository::error::RepositoryResult;
use rusqlite::{params, Connection, OptionalExtension, Row};

pub struct ProductRepository;

impl ProductRepository {
    /// 写入/覆盖产品（供种子数据与测试使用）
    pub fn upsert(conn: &Connection, product: &ProductIdentity) -> RepositoryResult<()> {
        conn.execute(
            r#"
            INSERT INTO product (product_id, legacy_id, name)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(product_id) DO UPDATE SET
                legacy_id = excluded.legacy_id,
                name = excluded.name
            "#,
            params![product.product_id, product.legacy_id, product.name],
        )?;
        Ok(())
    }

    pub fn find_by_id(conn: &Connection, product_id: &str) -> RepositoryResult<Option<ProductIdentity>> {
        let found = conn
            .query_row(
                "SELECT product_id, legacy_id, name FROM product WHERE product_id = ?1",
                params![product_id],
                Self::map_row,
            )
            .optional()?;
        Ok(found)
    }

    pub fn find_by_legacy_id(
        conn: &Connection,
        legacy_id: &str,
    ) -> RepositoryResult<Option<ProductIdentity>> {
        let found = conn
            .query_row(
                "SELECT product_id, legacy_id, name FROM product WHERE legacy_id = ?1",
                params![legacy_id],
                Self::map_row,
            )
            .optional()?;
        Ok(found)
    }

    /// 名称大小写不敏感匹配（多条命中时取 product_id 最小者）
    pub fn find_by_name_nocase(
        conn: &Connection,
        name: &str,
    ) -> RepositoryResult<Option<ProductIdentity>> {
        let found = conn
            .query_row(
                r#"
                SELECT product_id, legacy_id, name FROM product
                WHERE name = ?1 COLLATE NOCASE
                ORDER BY product_id
                LIMIT 1
                "#,
                params![name.trim()],
                Self::map_row,
            )
            .optional()?;
        Ok(found)
    }

    fn map_row(row: &Row) -> rusqlite::Result<ProductIdentity> {
        Ok(ProductIdentity {
            product_id: row.get(0)?,
            legacy_id: row.get(1)?,
            name: row.get(2)?,
        })
    }
}
