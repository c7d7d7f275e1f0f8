// ==========================================
// 采购订单全流程系统 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// ==========================================
// 职责: 提供数据访问接口,屏蔽数据库细节
// 约束: 所有查询使用参数化,防止 SQL 注入
// 约束: 所有方法接收显式 &Connection（事务通过 Deref 传入），
//       事务边界由调用方决定
// ==========================================

pub(crate) mod codec;

pub mod allocation_repo;
pub mod audit_repo;
pub mod conflict_repo;
pub mod duty_session_repo;
pub mod error;
pub mod input_line_repo;
pub mod ledger_repo;
pub mod product_repo;
pub mod slip_repo;

// 重导出核心仓储
pub use allocation_repo::{AllocationJoinRow, AllocationRepository};
pub use audit_repo::{AuditRepository, StatusEventRepository};
pub use conflict_repo::ConflictRepository;
pub use duty_session_repo::DutySessionRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use input_line_repo::{ImportBatchRepository, InputLineRepository, PendingDemandRow};
pub use ledger_repo::LedgerRepository;
pub use product_repo::ProductRepository;
pub use slip_repo::SlipRepository;
