// ==========================================
// 采购订单全流程系统 - API层错误类型
// ==========================================
// 职责: 将仓储/引擎/导入错误转换为调用方可识别的结构化错误
// 说明: 每个失败操作对外只暴露一个错误
// ==========================================

use crate::engine::error::EngineError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("产品无法解析: {0}")]
    ProductResolution(String),

    #[error("需求已进入发货单，不可修改: {0}")]
    AlreadyConsumed(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    /// 实体已锁定，或在等待时限内未取得实体锁
    #[error("锁冲突: {entity}(id={id})")]
    LockConflict { entity: String, id: String },

    // ==========================================
    // 权限 / 会话错误
    // ==========================================
    #[error("权限不足: {0}")]
    PermissionDenied(String),

    #[error("用户 {user_id} 没有有效的值班会话")]
    DutySessionRequired { user_id: String },

    #[error("裁决理由过短: 至少 {min} 个字符，实际 {actual} 个")]
    ReasonTooShort { min: usize, actual: usize },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 导入错误
    // ==========================================
    #[error("文件导入失败: {0}")]
    ImportError(String),

    #[error("数据验证失败: {0}")]
    ValidationError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("外键约束违反: {}", msg))
            }
            RepositoryError::AppendOnlyViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("只追加记录不可修改: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::InvalidInput(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 EngineError 转换
// ==========================================
impl From<EngineError> for ApiError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => ApiError::ValidationError(msg),
            EngineError::ProductResolution(msg) => ApiError::ProductResolution(msg),
            EngineError::LockConflict { entity, id } => ApiError::LockConflict { entity, id },
            EngineError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }
            EngineError::AlreadyConsumed(msg) => ApiError::AlreadyConsumed(msg),
            e @ EngineError::PermissionDenied { .. } => ApiError::PermissionDenied(e.to_string()),
            EngineError::DutySessionRequired { user_id } => {
                ApiError::DutySessionRequired { user_id }
            }
            EngineError::ReasonTooShort { min, actual } => ApiError::ReasonTooShort { min, actual },
            EngineError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            EngineError::Repository(err) => ApiError::from(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Repository(err) => ApiError::from(err),
            ImportError::Aggregation(err) => ApiError::from(err),
            ImportError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            ImportError::DatabaseTransactionError(msg) => ApiError::DatabaseTransactionError(msg),
            other => ApiError::ImportError(other.to_string()),
        }
    }
}

impl From<rusqlite::Error> for ApiError {
    fn from(err: rusqlite::Error) -> Self {
        ApiError::from(RepositoryError::from(err))
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Role;

    #[test]
    fn test_engine_errors_keep_structure() {
        let err = ApiError::from(EngineError::lock_conflict("ledger_entry", "L1"));
        assert!(matches!(err, ApiError::LockConflict { ref id, .. } if id == "L1"));

        let err = ApiError::from(EngineError::permission_denied(Role::Viewer, "对账更新"));
        assert!(matches!(err, ApiError::PermissionDenied(_)));

        let err = ApiError::from(EngineError::Repository(RepositoryError::not_found("X", "1")));
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_import_errors_unwrap_engine() {
        let err = ApiError::from(ImportError::Aggregation(EngineError::Validation("x".into())));
        assert!(matches!(err, ApiError::ValidationError(_)));

        let err = ApiError::from(ImportError::FileNotFound("a.csv".into()));
        assert!(matches!(err, ApiError::ImportError(_)));
    }
}
