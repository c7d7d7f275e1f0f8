// ==========================================
// 采购订单全流程系统 - 产品目录解析
// ==========================================
// 顺序: 规范ID → 旧编码 → 名称（大小写不敏感）
// ==========================================

use crate::domain::order::ProductIdentity;
use crate::importer::order_importer_trait::{CatalogQuery, CatalogResolver};
use crate::repository::error::RepositoryResult;
use crate::repository::ProductRepository;
use rusqlite::Connection;
use std::collections::HashMap;

// ==========================================
// SqliteCatalogResolver - 基于 product 主数据表
// ==========================================
pub struct SqliteCatalogResolver;

impl CatalogResolver for SqliteCatalogResolver {
    fn resolve(
        &self,
        conn: &Connection,
        query: &CatalogQuery,
    ) -> RepositoryResult<Option<ProductIdentity>> {
        if let Some(found) = ProductRepository::find_by_id(conn, &query.reference)? {
            return Ok(Some(found));
        }
        if let Some(found) = ProductRepository::find_by_legacy_id(conn, query.legacy_candidate())? {
            return Ok(Some(found));
        }
        ProductRepository::find_by_name_nocase(conn, query.name_candidate())
    }
}

// ==========================================
// InMemoryCatalog - 内存目录（外部目录快照/测试）
// ==========================================
#[derive(Debug, Default, Clone)]
pub struct InMemoryCatalog {
    by_id: HashMap<String, ProductIdentity>,
    by_legacy: HashMap<String, String>,
    by_name: HashMap<String, String>, // 小写名称 → product_id
}

impl InMemoryCatalog {
    pub fn new(products: impl IntoIterator<Item = ProductIdentity>) -> Self {
        let mut catalog = Self::default();
        for product in products {
            catalog.insert(product);
        }
        catalog
    }

    pub fn insert(&mut self, product: ProductIdentity) {
        if let Some(legacy) = &product.legacy_id {
            self.by_legacy.insert(legacy.clone(), product.product_id.clone());
        }
        // 同名时保留 product_id 最小者，与 SQL 解析保持一致
        let name_key = product.name.trim().to_lowercase();
        match self.by_name.get(&name_key) {
            Some(existing) if existing <= &product.product_id => {}
            _ => {
                self.by_name.insert(name_key, product.product_id.clone());
            }
        }
        self.by_id.insert(product.product_id.clone(), product);
    }

    fn lookup(&self, query: &CatalogQuery) -> Option<ProductIdentity> {
        self.by_id
            .get(&query.reference)
            .or_else(|| {
                self.by_legacy
                    .get(query.legacy_candidate())
                    .and_then(|id| self.by_id.get(id))
            })
            .or_else(|| {
                self.by_name
                    .get(&query.name_candidate().trim().to_lowercase())
                    .and_then(|id| self.by_id.get(id))
            })
            .cloned()
    }
}

impl CatalogResolver for InMemoryCatalog {
    fn resolve(
        &self,
        _conn: &Connection,
        query: &CatalogQuery,
    ) -> RepositoryResult<Option<ProductIdentity>> {
        Ok(self.lookup(query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, legacy: Option<&str>, name: &str) -> ProductIdentity {
        ProductIdentity {
            product_id: id.to_string(),
            legacy_id: legacy.map(str::to_string),
            name: name.to_string(),
        }
    }

    fn query(reference: &str) -> CatalogQuery {
        CatalogQuery {
            reference: reference.to_string(),
            ..Default::default()
        }
    }

    fn seeded_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        ProductRepository::upsert(&conn, &product("P55", Some("55"), "Nitrile Gloves")).unwrap();
        conn
    }

    #[test]
    fn test_in_memory_resolution_order() {
        let catalog = InMemoryCatalog::new(vec![
            product("P55", Some("55"), "Nitrile Gloves"),
            product("P56", None, "Face Masks"),
        ]);
        let conn = Connection::open_in_memory().unwrap();

        let by_id = catalog.resolve(&conn, &query("P56")).unwrap().unwrap();
        assert_eq!(by_id.product_id, "P56");
        let by_legacy = catalog.resolve(&conn, &query("55")).unwrap().unwrap();
        assert_eq!(by_legacy.product_id, "P55");
        let by_name = catalog.resolve(&conn, &query("face MASKS")).unwrap().unwrap();
        assert_eq!(by_name.product_id, "P56");
        assert!(catalog.resolve(&conn, &query("unknown")).unwrap().is_none());
    }

    #[test]
    fn test_sqlite_resolution() {
        let conn = seeded_connection();
        let resolver = SqliteCatalogResolver;

        assert_eq!(
            resolver.resolve(&conn, &query("55")).unwrap().map(|p| p.product_id),
            Some("P55".to_string())
        );
        assert_eq!(
            resolver.resolve(&conn, &query("nitrile gloves")).unwrap().map(|p| p.product_id),
            Some("P55".to_string())
        );
        assert!(resolver.resolve(&conn, &query("99")).unwrap().is_none());
    }
}
