// ==========================================
// 采购订单全流程系统 - 订单导入器实现
// ==========================================
// 职责: 整合导入管道，生成 IngestSummary
// 红线: 行级失败局部收集（部分容忍）；聚合失败整批回滚（严格）
// ==========================================

use crate::config::LifecycleConfigReader;
use crate::db::{begin_write, open_sqlite_connection};
use crate::domain::audit::{ActionType, AuditEvent};
use crate::domain::order::{
    DuplicateRow, ImportBatch, IngestSummary, InputLine, PreviewLine, ProductIdentity,
    RawOrderRow, RowError, RowErrorKind,
};
use crate::domain::types::{EntityKind, OrderStage};
use crate::engine::AggregationEngine;
use crate::importer::catalog::SqliteCatalogResolver;
use crate::importer::conflict_handler::ConflictHandler as ConflictHandlerImpl;
use crate::importer::data_cleaner::DataCleaner as DataCleanerImpl;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper as FieldMapperImpl;
use crate::importer::file_parser::CsvParser;
use crate::importer::order_importer_trait::{
    CatalogQuery, CatalogResolver, ConflictHandler, DataCleaner, FieldMapper, FileParser,
    OrderLineImporter,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::{AuditRepository, ImportBatchRepository, InputLineRepository};
use chrono::Utc;
use rusqlite::{Connection, Transaction};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

// ==========================================
// OrderImporterImpl - 订单导入器
// ==========================================
pub struct OrderImporterImpl<C>
where
    C: LifecycleConfigReader,
{
    db_path: String,
    config: C,

    // 管道组件
    file_parser: Box<dyn FileParser>,
    field_mapper: Box<dyn FieldMapper>,
    data_cleaner: Box<dyn DataCleaner>,
    conflict_handler: Box<dyn ConflictHandler>,
    catalog: Box<dyn CatalogResolver>,

    aggregation: AggregationEngine,
}

/// 阶段间流转的行集合
struct StagedRows {
    accepted: Vec<RawOrderRow>,
    errors: Vec<RowError>,
    duplicates: Vec<DuplicateRow>,
}

impl<C> OrderImporterImpl<C>
where
    C: LifecycleConfigReader,
{
    /// 创建新的 OrderImporter 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径（异步入口按需打开连接）
    /// - config: 配置读取器
    /// - 其余: 各阶段组件
    pub fn new(
        db_path: impl Into<String>,
        config: C,
        file_parser: Box<dyn FileParser>,
        field_mapper: Box<dyn FieldMapper>,
        data_cleaner: Box<dyn DataCleaner>,
        conflict_handler: Box<dyn ConflictHandler>,
        catalog: Box<dyn CatalogResolver>,
    ) -> Self {
        Self {
            db_path: db_path.into(),
            config,
            file_parser,
            field_mapper,
            data_cleaner,
            conflict_handler,
            catalog,
            aggregation: AggregationEngine::new(),
        }
    }

    /// 默认组件: CSV + 标准字段映射 + product 表目录解析
    pub fn with_defaults(db_path: impl Into<String>, config: C) -> Self {
        Self::new(
            db_path,
            config,
            Box::new(CsvParser),
            Box::new(FieldMapperImpl),
            Box::new(DataCleanerImpl),
            Box::new(ConflictHandlerImpl),
            Box::new(SqliteCatalogResolver),
        )
    }

    /// 替换目录解析器
    pub fn with_catalog(mut self, catalog: Box<dyn CatalogResolver>) -> Self {
        self.catalog = catalog;
        self
    }

    /// 导入原始行（在调用方连接上开启写事务）
    pub fn ingest_raw(
        &self,
        conn: &mut Connection,
        raw_rows: Vec<HashMap<String, String>>,
        source_name: Option<&str>,
        actor: &str,
    ) -> ImportResult<IngestSummary> {
        let total = raw_rows.len();

        // === 步骤 1: 字段映射 ===
        debug!("步骤 1: 字段映射");
        let mut rows = Vec::with_capacity(total);
        let mut errors = Vec::new();
        for (idx, raw) in raw_rows.iter().enumerate() {
            match self.field_mapper.map_to_order_row(raw, idx + 1) {
                Ok(row) => rows.push(row),
                Err(e) => {
                    warn!(row_number = idx + 1, error = %e, "字段映射失败");
                    errors.push(RowError {
                        row_number: idx + 1,
                        kind: RowErrorKind::Validation,
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.run_pipeline(conn, rows, errors, total, source_name, actor)
    }

    /// 导入已映射的强类型行
    pub fn ingest(
        &self,
        conn: &mut Connection,
        rows: Vec<RawOrderRow>,
        source_name: Option<&str>,
        actor: &str,
    ) -> ImportResult<IngestSummary> {
        let total = rows.len();
        self.run_pipeline(conn, rows, Vec::new(), total, source_name, actor)
    }

    #[instrument(skip(self, conn, rows, errors), fields(batch_id))]
    fn run_pipeline(
        &self,
        conn: &mut Connection,
        rows: Vec<RawOrderRow>,
        errors: Vec<RowError>,
        total: usize,
        source_name: Option<&str>,
        actor: &str,
    ) -> ImportResult<IngestSummary> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        tracing::Span::current().record("batch_id", batch_id.as_str());
        info!(batch_id = %batch_id, total, actor, "开始导入订单行");

        let preview_limit = self.config.get_import_preview_limit()?;

        // === 步骤 2: 数据清洗 + 必填校验 ===
        debug!("步骤 2: 数据清洗 + 必填校验");
        let staged = self.clean_and_validate(rows, errors);

        let mut tx = begin_write(conn)
            .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;

        // === 步骤 3: 目录解析（先于去重，解析失败的行不参与去重判定）===
        debug!("步骤 3: 目录解析");
        let (staged, products) = self.resolve_catalog(&tx, staged);

        // === 步骤 4: 去重检测 ===
        debug!("步骤 4: 去重检测");
        let mut staged = self.detect_and_skip_duplicates(&tx, staged)?;
        info!(
            candidates = staged.accepted.len(),
            duplicates = staged.duplicates.len(),
            rejected = staged.errors.len(),
            "去重检测完成"
        );

        // === 步骤 5: 逐行落库 ===
        debug!("步骤 5: 逐行落库");
        let mut accepted = 0usize;
        let mut preview = Vec::new();
        for row in std::mem::take(&mut staged.accepted) {
            let Some(product) = products.get(&row.row_number) else {
                continue;
            };

            let line = match build_input_line(&row, product, &batch_id, actor) {
                Some(line) => line,
                None => {
                    staged.errors.push(RowError {
                        row_number: row.row_number,
                        kind: RowErrorKind::Validation,
                        reason: "必填字段缺失".to_string(),
                    });
                    continue;
                }
            };

            match insert_line(&mut tx, &line, actor) {
                Ok(()) => {
                    accepted += 1;
                    if preview.len() < preview_limit {
                        preview.push(PreviewLine {
                            row_number: row.row_number,
                            order_reference: line.order_reference.clone(),
                            product_id: line.product_id.clone(),
                            customer: line.customer.clone(),
                            quantity: line.quantity,
                        });
                    }
                }
                // 并发导入同一去重键: 唯一约束兜底，按重复处理
                Err(RepositoryError::UniqueConstraintViolation(_)) => {
                    debug!(row_number = row.row_number, "唯一约束命中，按重复计数");
                    staged.duplicates.push(DuplicateRow {
                        row_number: row.row_number,
                        order_reference: line.order_reference,
                        product_reference: line.product_reference,
                        first_row: None,
                    });
                }
                Err(e) => {
                    warn!(row_number = row.row_number, error = %e, "订单行写入失败");
                    staged.errors.push(RowError {
                        row_number: row.row_number,
                        kind: RowErrorKind::Storage,
                        reason: e.to_string(),
                    });
                }
            }
        }
        info!(accepted, "订单行落库完成");

        // === 步骤 6: 需求聚合（同一事务，失败整批回滚）===
        debug!("步骤 6: 需求聚合");
        let outcome = self.aggregation.recompute(&tx, actor)?;

        // === 步骤 7: 记录批次信息 ===
        staged.errors.sort_by_key(|e| e.row_number);
        staged.duplicates.sort_by_key(|d| d.row_number);
        let elapsed_ms = start_time.elapsed().as_millis() as i64;
        let batch = ImportBatch {
            batch_id: batch_id.clone(),
            source_name: source_name.map(str::to_string),
            total_rows: total as i64,
            accepted_rows: accepted as i64,
            duplicate_rows: staged.duplicates.len() as i64,
            rejected_rows: staged.errors.len() as i64,
            imported_by: actor.to_string(),
            imported_at: Utc::now(),
            elapsed_ms,
        };
        ImportBatchRepository::insert(&tx, &batch)?;

        tx.commit()
            .map_err(|e| ImportError::DatabaseTransactionError(e.to_string()))?;

        info!(
            batch_id = %batch_id,
            total,
            accepted,
            duplicates = staged.duplicates.len(),
            rejected = staged.errors.len(),
            processed = outcome.processed,
            ledger_entries = outcome.entries.len(),
            elapsed_ms,
            "订单导入完成"
        );

        Ok(IngestSummary {
            batch_id,
            total,
            accepted,
            duplicates: staged.duplicates.len(),
            rejected: staged.errors.len(),
            processed: outcome.processed,
            ledger_entries: outcome.entries.len(),
            errors: staged.errors,
            duplicate_rows: staged.duplicates,
            preview,
            elapsed_ms,
        })
    }

    /// 清洗 + 必填校验，不合格行计入 errors
    fn clean_and_validate(&self, rows: Vec<RawOrderRow>, mut errors: Vec<RowError>) -> StagedRows {
        let mut accepted = Vec::with_capacity(rows.len());
        for mut row in rows {
            self.clean_record(&mut row);
            match self.data_cleaner.validate_required(&row) {
                Ok(()) => accepted.push(row),
                Err(e) => {
                    warn!(row_number = row.row_number, error = %e, "必填校验失败");
                    errors.push(RowError {
                        row_number: row.row_number,
                        kind: RowErrorKind::Validation,
                        reason: e.to_string(),
                    });
                }
            }
        }
        StagedRows {
            accepted,
            errors,
            duplicates: Vec::new(),
        }
    }

    /// 清洗单条记录（所有文本字段 NULL 标准化）
    fn clean_record(&self, row: &mut RawOrderRow) {
        let cleaner = &self.data_cleaner;
        row.order_reference = cleaner.normalize_null(row.order_reference.take());
        row.product_reference = cleaner.normalize_null(row.product_reference.take());
        row.legacy_product_id = cleaner.normalize_null(row.legacy_product_id.take());
        row.product_name = cleaner.normalize_null(row.product_name.take());
        row.customer = cleaner.normalize_null(row.customer.take());
        row.supplier_hint = cleaner.normalize_null(row.supplier_hint.take());
    }

    /// 逐行解析产品，解析失败的行计入 errors
    fn resolve_catalog(
        &self,
        conn: &Connection,
        mut staged: StagedRows,
    ) -> (StagedRows, HashMap<usize, ProductIdentity>) {
        let mut products = HashMap::with_capacity(staged.accepted.len());
        let mut resolved = Vec::with_capacity(staged.accepted.len());
        for row in std::mem::take(&mut staged.accepted) {
            match self.resolve_product(conn, &row) {
                Ok(product) => {
                    products.insert(row.row_number, product);
                    resolved.push(row);
                }
                Err(row_error) => {
                    warn!(row_number = row.row_number, reason = %row_error.reason, "订单行拒绝");
                    staged.errors.push(row_error);
                }
            }
        }
        staged.accepted = resolved;
        (staged, products)
    }

    /// 同批次 + 跨批次去重，重复行移出候选
    fn detect_and_skip_duplicates(
        &self,
        conn: &Connection,
        mut staged: StagedRows,
    ) -> ImportResult<StagedRows> {
        // 步骤 1: 检测同批次内重复
        let mut duplicates = self.conflict_handler.detect_duplicates(&staged.accepted);

        // 步骤 2: 检测跨批次重复
        let mut existing_keys = HashSet::new();
        for row in &staged.accepted {
            if let Some((order_ref, product_ref)) = row.dedup_key() {
                if InputLineRepository::exists_by_key(conn, &order_ref, &product_ref)? {
                    existing_keys.insert((order_ref, product_ref));
                }
            }
        }
        let cross_batch = self
            .conflict_handler
            .detect_cross_batch_duplicates(&staged.accepted, &existing_keys);

        // 步骤 3: 合并（同一行以跨批次命中为准）
        let cross_rows: HashSet<usize> = cross_batch.iter().map(|d| d.row_number).collect();
        duplicates.retain(|d| !cross_rows.contains(&d.row_number));
        duplicates.extend(cross_batch);

        // 步骤 4: 过滤出有效记录
        let skip: HashSet<usize> = duplicates.iter().map(|d| d.row_number).collect();
        staged.accepted.retain(|row| !skip.contains(&row.row_number));
        staged.duplicates = duplicates;
        Ok(staged)
    }

    fn resolve_product(&self, conn: &Connection, row: &RawOrderRow) -> Result<ProductIdentity, RowError> {
        let query = CatalogQuery::from_row(row).ok_or_else(|| RowError {
            row_number: row.row_number,
            kind: RowErrorKind::Validation,
            reason: "产品引用缺失".to_string(),
        })?;

        match self.catalog.resolve(conn, &query) {
            Ok(Some(product)) => Ok(product),
            Ok(None) => Err(RowError {
                row_number: row.row_number,
                kind: RowErrorKind::ProductResolution,
                reason: format!("无法解析产品: {}", query.reference),
            }),
            Err(e) => Err(RowError {
                row_number: row.row_number,
                kind: RowErrorKind::Storage,
                reason: e.to_string(),
            }),
        }
    }

    /// 打开连接（异步入口使用）
    fn open_connection(&self) -> ImportResult<Connection> {
        open_sqlite_connection(&self.db_path)
            .map_err(|e| ImportError::DatabaseConnectionError(e.to_string()))
    }
}

#[async_trait::async_trait]
impl<C> OrderLineImporter for OrderImporterImpl<C>
where
    C: LifecycleConfigReader + Send + Sync,
{
    async fn import_rows(
        &self,
        rows: Vec<HashMap<String, String>>,
        source_name: Option<String>,
        actor: &str,
    ) -> ImportResult<IngestSummary> {
        let mut conn = self.open_connection()?;
        self.ingest_raw(&mut conn, rows, source_name.as_deref(), actor)
    }

    async fn import_from_csv<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
        actor: &str,
    ) -> ImportResult<IngestSummary> {
        let path = file_path.as_ref();
        let source_name = path.display().to_string();

        // === 步骤 0: 解析文件 ===
        debug!(file = %source_name, "步骤 0: 解析文件");
        let rows = self.file_parser.parse_to_raw_records(path)?;
        info!(file = %source_name, rows = rows.len(), "文件解析完成");

        self.import_rows(rows, Some(source_name), actor).await
    }

    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
        actor: &str,
    ) -> Vec<Result<IngestSummary, String>> {
        use futures::future::join_all;

        info!(count = file_paths.len(), "开始批量导入文件");

        let import_tasks = file_paths.into_iter().map(|path| {
            let path_str = path.as_ref().display().to_string();
            async move {
                match self.import_from_csv(path, actor).await {
                    Ok(summary) => {
                        info!(file = %path_str, accepted = summary.accepted, "文件导入成功");
                        Ok(summary)
                    }
                    Err(e) => {
                        error!(file = %path_str, error = %e, "文件导入失败");
                        Err(format!("文件 {} 导入失败: {}", path_str, e))
                    }
                }
            }
        });

        let results = join_all(import_tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );

        results
    }
}

fn build_input_line(
    row: &RawOrderRow,
    product: &ProductIdentity,
    batch_id: &str,
    actor: &str,
) -> Option<InputLine> {
    Some(InputLine {
        line_id: Uuid::new_v4().to_string(),
        batch_id: batch_id.to_string(),
        order_reference: row.order_reference.clone()?,
        product_reference: row.product_reference.clone()?,
        customer: row.customer.clone()?,
        product_id: product.product_id.clone(),
        product_name: product.name.clone(),
        quantity: row.quantity?,
        supplier_hint: row.supplier_hint.clone(),
        stage: OrderStage::Pending,
        ledger_entry_id: None,
        created_by: actor.to_string(),
        created_at: Utc::now(),
    })
}

/// 单行写入: 订单行 + INGEST 审计，在保存点内原子执行
fn insert_line(tx: &mut Transaction<'_>, line: &InputLine, actor: &str) -> RepositoryResult<()> {
    let sp = tx.savepoint()?;
    InputLineRepository::insert(&sp, line)?;
    AuditRepository::insert(
        &sp,
        &AuditEvent::new(ActionType::Ingest, actor, EntityKind::InputLine, &line.line_id)
            .with_after(line),
    )?;
    sp.commit()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LifecycleConfig;
    use crate::importer::catalog::InMemoryCatalog;
    use crate::repository::LedgerRepository;

    fn importer() -> OrderImporterImpl<LifecycleConfig> {
        OrderImporterImpl::with_defaults(":memory:", LifecycleConfig::default()).with_catalog(
            Box::new(InMemoryCatalog::new(vec![ProductIdentity {
                product_id: "P55".to_string(),
                legacy_id: Some("55".to_string()),
                name: "Nitrile Gloves".to_string(),
            }])),
        )
    }

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn
    }

    fn row(order: &str, product: &str, qty: f64, row_number: usize) -> RawOrderRow {
        RawOrderRow {
            order_reference: Some(order.to_string()),
            product_reference: Some(product.to_string()),
            customer: Some("Clinic A".to_string()),
            quantity: Some(qty),
            row_number,
            ..Default::default()
        }
    }

    #[test]
    fn test_ingest_classifies_rows() {
        let mut conn = conn();
        let rows = vec![
            row("101", "55", 3.0, 1),
            row("102", "55", 7.0, 2),
            row("101", "55", 3.0, 3),  // 同批次重复
            row("103", "99", 1.0, 4),  // 无法解析
            row("104", "55", 0.0, 5),  // 数量非正
        ];
        let summary = importer().ingest(&mut conn, rows, None, "alice").unwrap();

        assert_eq!(summary.total, 5);
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.duplicates, 1);
        assert_eq!(summary.duplicate_rows[0].first_row, Some(1));
        assert_eq!(summary.rejected, 2);
        assert_eq!(summary.errors[0].kind, RowErrorKind::ProductResolution);
        assert_eq!(summary.errors[1].kind, RowErrorKind::Validation);
        assert_eq!(summary.processed, 2);

        let entries = LedgerRepository::find_by_product(&conn, "P55").unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].quantity, 10.0);
    }

    #[test]
    fn test_unresolved_first_row_does_not_shadow_later_row() {
        let mut conn = conn();
        let mut named = row("101", "GLV", 4.0, 2);
        named.product_name = Some("nitrile gloves".to_string());
        let rows = vec![row("101", "GLV", 4.0, 1), named];

        let summary = importer().ingest(&mut conn, rows, None, "alice").unwrap();
        assert_eq!(summary.accepted, 1);
        assert_eq!(summary.duplicates, 0);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.errors[0].row_number, 1);
        assert_eq!(summary.errors[0].kind, RowErrorKind::ProductResolution);

        let entries = LedgerRepository::find_by_product(&conn, "P55").unwrap();
        assert_eq!(entries[0].quantity, 4.0);
    }

    #[test]
    fn test_preview_is_bounded() {
        let mut conn = conn();
        let importer = OrderImporterImpl::with_defaults(
            ":memory:",
            LifecycleConfig {
                import_preview_limit: 1,
                ..Default::default()
            },
        )
        .with_catalog(Box::new(InMemoryCatalog::new(vec![ProductIdentity {
            product_id: "P55".to_string(),
            legacy_id: None,
            name: "Nitrile Gloves".to_string(),
        }])));

        let rows = vec![row("1", "P55", 1.0, 1), row("2", "P55", 1.0, 2)];
        let summary = importer.ingest(&mut conn, rows, Some("test"), "alice").unwrap();
        assert_eq!(summary.accepted, 2);
        assert_eq!(summary.preview.len(), 1);
    }

    #[test]
    fn test_ingest_raw_reports_mapping_failures() {
        let mut conn = conn();
        let raw: Vec<HashMap<String, String>> = vec![
            [("order", "100"), ("product", "55"), ("customer", "X"), ("qty", "five")]
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ];
        let summary = importer().ingest_raw(&mut conn, raw, None, "alice").unwrap();
        assert_eq!(summary.total, 1);
        assert_eq!(summary.rejected, 1);
        assert_eq!(summary.errors[0].kind, RowErrorKind::Validation);
    }
}
