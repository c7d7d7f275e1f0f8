// ==========================================
// 采购订单全流程系统 - 核心库
// ==========================================
// 技术栈: Rust + SQLite
// 流程: 导入聚合 → 分配锁定 → 代表分组 → 发货单生成 → 对账核销
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// 应用层 - API 装配
pub mod app;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    Actor, AllocationRecordStatus, AllocationStatus, EntityKind, OrderStage, Role, SlipLineStatus,
};

// 领域实体
pub use domain::{
    AllocationRecord, AuditEvent, ConflictRecord, DocumentLine, DutySession, FulfillmentDocument,
    IngestSummary, InputLine, LedgerEntry, StatusEvent,
};

// 引擎
pub use engine::{
    AggregationEngine, AllocationEngine, BillingEngine, ConflictResolver, DutyEngine,
    EntityLockManager, RepGroupingEngine, SlipGenerator,
};

// API
pub use api::{AllocationApi, ApiError, ApiResult, BillingApi, ConflictApi, ImportApi, RepApi, SlipApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "采购订单全流程系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
