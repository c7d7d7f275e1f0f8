// ==========================================
// 采购订单全流程系统 - 应用层
// ==========================================
// 职责: 由数据库路径装配全部 API
// ==========================================

pub mod state;

// 重导出
pub use state::{get_default_db_path, AppState};
