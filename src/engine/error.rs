// ==========================================
// 采购订单全流程系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 约束: 除导入行级错误外，所有引擎错误都会中止所在事务
// ==========================================

use crate::domain::types::Role;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎层错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 输入错误 =====
    #[error("校验失败: {0}")]
    Validation(String),

    #[error("产品无法解析: {0}")]
    ProductResolution(String),

    // ===== 生命周期错误 =====
    #[error("实体已锁定: {entity}(id={id})")]
    LockConflict { entity: String, id: String },

    #[error("非法状态流转: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("需求已进入发货单，不可再修改: ledger_entry={0}")]
    AlreadyConsumed(String),

    // ===== 权限错误 =====
    #[error("权限不足: 角色 {role} 不允许执行 {action}")]
    PermissionDenied { role: Role, action: String },

    #[error("用户 {user_id} 没有有效的值班会话")]
    DutySessionRequired { user_id: String },

    #[error("裁决理由过短: 至少 {min} 个字符，实际 {actual} 个")]
    ReasonTooShort { min: usize, actual: usize },

    // ===== 数据访问错误 =====
    #[error("记录未找到: {entity}(id={id})")]
    NotFound { entity: String, id: String },

    #[error(transparent)]
    Repository(RepositoryError),
}

impl EngineError {
    pub fn lock_conflict(entity: &str, id: &str) -> Self {
        EngineError::LockConflict {
            entity: entity.to_string(),
            id: id.to_string(),
        }
    }

    pub fn permission_denied(role: Role, action: &str) -> Self {
        EngineError::PermissionDenied {
            role,
            action: action.to_string(),
        }
    }
}

// NotFound 提升为引擎层错误，其余保持仓储错误
impl From<RepositoryError> for EngineError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => EngineError::NotFound { entity, id },
            other => EngineError::Repository(other),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::from(RepositoryError::from(err))
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
