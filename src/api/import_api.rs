// ==========================================
// 采购订单全流程系统 - 订单导入 API
// ==========================================
// 职责: 封装订单导入（原始行 / CSV 文件 / 批量文件）
// ==========================================

use crate::api::connection::{open_connection, with_read_conn};
use crate::api::error::{ApiError, ApiResult};
use crate::config::{LifecycleConfig, LifecycleConfigReader};
use crate::domain::order::{ImportBatch, IngestSummary, RawOrderRow};
use crate::importer::{InMemoryCatalog, OrderImporterImpl, OrderLineImporter};
use crate::repository::ImportBatchRepository;
use std::collections::HashMap;
use std::sync::Arc;

/// 导入API
pub struct ImportApi {
    db_path: String,
    config: Arc<dyn LifecycleConfigReader>,
    catalog: Option<InMemoryCatalog>, // None 时使用 product 表解析
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(db_path: String, config: Arc<dyn LifecycleConfigReader>) -> Self {
        Self {
            db_path,
            config,
            catalog: None,
        }
    }

    /// 使用外部目录快照解析产品
    pub fn with_catalog(mut self, catalog: InMemoryCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    fn create_importer(&self) -> ApiResult<OrderImporterImpl<LifecycleConfig>> {
        let config = LifecycleConfig::load(self.config.as_ref())?;
        let importer = OrderImporterImpl::with_defaults(self.db_path.clone(), config);
        Ok(match &self.catalog {
            Some(catalog) => importer.with_catalog(Box::new(catalog.clone())),
            None => importer,
        })
    }

    /// 导入已映射的强类型行
    pub fn ingest(&self, rows: Vec<RawOrderRow>, actor: &str) -> ApiResult<IngestSummary> {
        let importer = self.create_importer()?;
        let mut conn = open_connection(&self.db_path)?;
        Ok(importer.ingest(&mut conn, rows, None, actor)?)
    }

    /// 导入原始行（HashMap<列名, 值>）
    pub async fn import_rows(
        &self,
        rows: Vec<HashMap<String, String>>,
        source_name: Option<String>,
        actor: &str,
    ) -> ApiResult<IngestSummary> {
        let importer = self.create_importer()?;
        Ok(importer.import_rows(rows, source_name, actor).await?)
    }

    /// 导入 CSV 文件
    pub async fn import_file(&self, file_path: &str, actor: &str) -> ApiResult<IngestSummary> {
        if !file_path.to_lowercase().ends_with(".csv") {
            return Err(ApiError::ImportError(
                "当前仅支持 .csv 格式文件导入".to_string(),
            ));
        }
        let importer = self.create_importer()?;
        Ok(importer.import_from_csv(file_path, actor).await?)
    }

    /// 批量导入多个 CSV 文件（各自独立事务）
    pub async fn import_files(
        &self,
        file_paths: Vec<String>,
        actor: &str,
    ) -> ApiResult<Vec<Result<IngestSummary, String>>> {
        let importer = self.create_importer()?;
        Ok(importer.batch_import(file_paths, actor).await)
    }

    /// 查询导入批次
    pub fn get_batch(&self, batch_id: &str) -> ApiResult<Option<ImportBatch>> {
        with_read_conn(&self.db_path, |conn| {
            Ok(ImportBatchRepository::find_by_id(conn, batch_id)?)
        })
    }
}
