// ==========================================
// 采购订单全流程系统 - 生命周期配置读取 Trait
// ==========================================
// 职责: 定义引擎/导入所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::repository::error::RepositoryResult;

// ==========================================
// LifecycleConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）、LifecycleConfig（内存快照）
pub trait LifecycleConfigReader: Send + Sync {
    /// 导入结果预览行数上限
    ///
    /// # 默认值
    /// - 20
    fn get_import_preview_limit(&self) -> RepositoryResult<usize>;

    /// 冲突裁决理由最短字符数
    ///
    /// # 默认值
    /// - 10
    fn get_min_reason_length(&self) -> RepositoryResult<usize>;

    /// BILLED 是否要求实收数量 > 0
    ///
    /// # 默认值
    /// - false（校验点存在但默认不生效）
    fn get_enforce_billed_received_qty(&self) -> RepositoryResult<bool>;

    /// 实体锁最长等待时间（毫秒）
    ///
    /// # 默认值
    /// - 5000
    fn get_lock_wait_timeout_ms(&self) -> RepositoryResult<u64>;
}

// ==========================================
// LifecycleConfig - 配置快照
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    pub import_preview_limit: usize,
    pub min_reason_length: usize,
    pub enforce_billed_received_qty: bool,
    pub lock_wait_timeout_ms: u64,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            import_preview_limit: 20,
            min_reason_length: 10,
            enforce_billed_received_qty: false,
            lock_wait_timeout_ms: 5_000,
        }
    }
}

impl LifecycleConfig {
    /// 从任意读取器生成快照
    pub fn load<R: LifecycleConfigReader + ?Sized>(reader: &R) -> RepositoryResult<Self> {
        Ok(Self {
            import_preview_limit: reader.get_import_preview_limit()?,
            min_reason_length: reader.get_min_reason_length()?,
            enforce_billed_received_qty: reader.get_enforce_billed_received_qty()?,
            lock_wait_timeout_ms: reader.get_lock_wait_timeout_ms()?,
        })
    }
}

impl LifecycleConfigReader for LifecycleConfig {
    fn get_import_preview_limit(&self) -> RepositoryResult<usize> {
        Ok(self.import_preview_limit)
    }

    fn get_min_reason_length(&self) -> RepositoryResult<usize> {
        Ok(self.min_reason_length)
    }

    fn get_enforce_billed_received_qty(&self) -> RepositoryResult<bool> {
        Ok(self.enforce_billed_received_qty)
    }

    fn get_lock_wait_timeout_ms(&self) -> RepositoryResult<u64> {
        Ok(self.lock_wait_timeout_ms)
    }
}
