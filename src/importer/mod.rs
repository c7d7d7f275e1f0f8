// ==========================================
// 采购订单全流程系统 - 导入层
// ==========================================
// 职责: 行来源适配、字段规范化、目录解析、导入管道
// 支持: CSV 文件 / 已解码的原始行
// ==========================================

// 模块声明
pub mod catalog;
pub mod conflict_handler;
pub mod data_cleaner;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod order_importer_impl;
pub mod order_importer_trait;

// 重导出核心类型
pub use catalog::{InMemoryCatalog, SqliteCatalogResolver};
pub use conflict_handler::ConflictHandler as ConflictHandlerImpl;
pub use data_cleaner::DataCleaner as DataCleanerImpl;
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper as FieldMapperImpl;
pub use file_parser::CsvParser;
pub use order_importer_impl::OrderImporterImpl;

// 重导出 Trait 接口
pub use order_importer_trait::{
    CatalogQuery, CatalogResolver, ConflictHandler, DataCleaner, FieldMapper, FileParser,
    OrderLineImporter,
};
