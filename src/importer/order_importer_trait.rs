// ==========================================
// 采购订单全流程系统 - 订单导入 Trait
// ==========================================
// 职责: 定义订单导入各阶段接口（不包含实现）
// 管道: 解析 → 字段映射 → 清洗 → 必填校验 → 去重 → 目录解析 → 落库 → 聚合
// ==========================================

use crate::domain::order::{DuplicateRow, IngestSummary, ProductIdentity, RawOrderRow};
use crate::importer::error::ImportResult;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use rusqlite::Connection;
use std::collections::{HashMap, HashSet};
use std::path::Path;

// ==========================================
// OrderLineImporter Trait
// ==========================================
// 用途: 订单导入主接口
// 实现者: OrderImporterImpl
#[async_trait]
pub trait OrderLineImporter: Send + Sync {
    /// 导入已解码的原始行
    ///
    /// # 参数
    /// - rows: 原始行记录（HashMap<列名, 值>）
    /// - source_name: 来源标识（文件名等，可空）
    /// - actor: 操作人
    ///
    /// # 返回
    /// - Ok(IngestSummary): 行级失败已计入汇总
    /// - Err: 聚合失败或数据库错误（整批回滚）
    async fn import_rows(
        &self,
        rows: Vec<HashMap<String, String>>,
        source_name: Option<String>,
        actor: &str,
    ) -> ImportResult<IngestSummary>;

    /// 从 CSV 文件导入
    async fn import_from_csv<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        actor: &str,
    ) -> ImportResult<IngestSummary>;

    /// 批量导入多个文件（并发执行）
    ///
    /// # 说明
    /// - 每个文件独立事务，某个文件失败不影响其他文件
    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
        actor: &str,
    ) -> Vec<Result<IngestSummary, String>>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 用途: 行来源适配（阶段 0）
// 实现者: CsvParser
pub trait FileParser: Send + Sync {
    /// 解析文件为原始行记录（HashMap<列名, 值>）
    fn parse_to_raw_records(&self, file_path: &Path) -> ImportResult<Vec<HashMap<String, String>>>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 用途: 字段映射（阶段 1）: 松散行 → 强类型 RawOrderRow
// 实现者: FieldMapperImpl
pub trait FieldMapper: Send + Sync {
    /// # 参数
    /// - row: 原始行记录
    /// - row_number: 行号（从 1 开始）
    ///
    /// # 返回
    /// - Err: 数量无法解析等类型错误（该行拒绝）
    fn map_to_order_row(
        &self,
        row: &HashMap<String, String>,
        row_number: usize,
    ) -> ImportResult<RawOrderRow>;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// 用途: 数据清洗（阶段 2）
// 实现者: DataCleanerImpl
pub trait DataCleaner: Send + Sync {
    /// 清洗文本字段（TRIM，可选 UPPER）
    fn clean_text(&self, value: &str, uppercase: bool) -> String;

    /// 标准化 NULL 值（空字符串/空白/"null" → None）
    fn normalize_null(&self, value: Option<String>) -> Option<String>;

    /// 必填字段校验（customer / order / product / 正数量）
    fn validate_required(&self, row: &RawOrderRow) -> ImportResult<()>;
}

// ==========================================
// ConflictHandler Trait
// ==========================================
// 用途: 去重键 (orderReference, productReference) 冲突检测
// 实现者: ConflictHandlerImpl
pub trait ConflictHandler: Send + Sync {
    /// 检测同批次内重复（不含首次出现，first_row 指向首次出现行）
    fn detect_duplicates(&self, rows: &[RawOrderRow]) -> Vec<DuplicateRow>;

    /// 检测与历史批次重复（first_row 为 None）
    fn detect_cross_batch_duplicates(
        &self,
        rows: &[RawOrderRow],
        existing_keys: &HashSet<(String, String)>,
    ) -> Vec<DuplicateRow>;
}

// ==========================================
// CatalogResolver Trait
// ==========================================
// 用途: 产品身份解析（规范ID → 旧编码 → 名称大小写不敏感）
// 实现者: InMemoryCatalog, SqliteCatalogResolver
pub trait CatalogResolver: Send + Sync {
    /// # 返回
    /// - Ok(None): 无法解析（该行拒绝）
    fn resolve(&self, conn: &Connection, query: &CatalogQuery)
        -> RepositoryResult<Option<ProductIdentity>>;
}

/// 目录查询条件
#[derive(Debug, Clone, Default)]
pub struct CatalogQuery {
    pub reference: String,
    pub legacy_id: Option<String>,
    pub name: Option<String>,
}

impl CatalogQuery {
    pub fn from_row(row: &RawOrderRow) -> Option<Self> {
        let reference = row.product_reference.clone()?;
        Some(Self {
            reference,
            legacy_id: row.legacy_product_id.clone(),
            name: row.product_name.clone(),
        })
    }

    /// 旧编码候选: 显式旧编码优先，否则用产品引用本身
    pub fn legacy_candidate(&self) -> &str {
        self.legacy_id.as_deref().unwrap_or(&self.reference)
    }

    /// 名称候选: 显式名称优先，否则用产品引用本身
    pub fn name_candidate(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.reference)
    }
}
