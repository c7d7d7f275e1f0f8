// ==========================================
// 采购订单全流程系统 - API 层
// ==========================================
// 职责: 面向调用方的业务操作（打开连接 → 事务 → 引擎 → 提交）
// ==========================================

pub mod allocation_api;
pub mod audit_api;
pub mod billing_api;
pub mod conflict_api;
pub mod connection;
pub mod error;
pub mod import_api;
pub mod rep_api;
pub mod slip_api;

// 重导出核心类型
pub use allocation_api::AllocationApi;
pub use audit_api::AuditApi;
pub use billing_api::BillingApi;
pub use conflict_api::ConflictApi;
pub use error::{ApiError, ApiResult};
pub use import_api::ImportApi;
pub use rep_api::RepApi;
pub use slip_api::SlipApi;
