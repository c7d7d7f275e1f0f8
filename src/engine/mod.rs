// ==========================================
// 采购订单全流程系统 - 引擎层
// ==========================================
// 职责: 订单生命周期规则（聚合 / 锁定 / 分组 / 出单 / 对账 / 冲突）
// 约束: 所有操作接收显式事务上下文 (&Connection)，事务边界由 API 层决定
// 红线: 每次写操作推进阶段恰好一次，并写入审计记录
// ==========================================

pub mod aggregation;
pub mod allocation;
pub mod billing;
pub mod conflict;
pub mod duty;
pub mod entity_lock;
pub mod error;
pub mod rep_grouping;
pub mod slip_generator;

// 重导出核心引擎
pub use aggregation::{AggregationEngine, AggregationOutcome};
pub use allocation::AllocationEngine;
pub use billing::{BillingEngine, BillingPolicy};
pub use conflict::{ConflictResolver, DEFAULT_MIN_REASON_LENGTH};
pub use duty::DutyEngine;
pub use entity_lock::{EntityLockGuard, EntityLockKey, EntityLockManager, EntityTransaction};
pub use error::{EngineError, EngineResult};
pub use rep_grouping::RepGroupingEngine;
pub use slip_generator::SlipGenerator;
