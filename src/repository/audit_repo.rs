// ==========================================
// 采购订单全流程系统 - 审计事件数据仓储
// ==========================================
// 对齐: audit_event / status_event 表
// 红线: 所有写入必须记录，只追加
// ==========================================

mod core;
mod queries;


pub use self::core::{AuditRepository, StatusEventRepository};
