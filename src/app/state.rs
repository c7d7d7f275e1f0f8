// ==========================================
// 采购订单全流程系统 - 应用状态
// ==========================================
// 职责: 管理应用级别的共享状态和API实例
// ==========================================

use std::sync::Arc;

use crate::api::{AllocationApi, AuditApi, BillingApi, ConflictApi, ImportApi, RepApi, SlipApi};
use crate::config::{ConfigManager, LifecycleConfigReader};
use crate::engine::EntityLockManager;

/// 应用状态
///
/// 包含所有API实例和共享资源（实体锁管理器在所有 API 间共享）
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 订单导入API
    pub import_api: Arc<ImportApi>,

    /// 台账分配API
    pub allocation_api: Arc<AllocationApi>,

    /// 代表单分组API
    pub rep_api: Arc<RepApi>,

    /// 发货单API
    pub slip_api: Arc<SlipApi>,

    /// 对账与值班API
    pub billing_api: Arc<BillingApi>,

    /// 离线冲突API
    pub conflict_api: Arc<ConflictApi>,

    /// 审计查询API
    pub audit_api: Arc<AuditApi>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 实体锁管理器
    pub entity_locks: Arc<EntityLockManager>,
}

impl AppState {
    /// 创建新的AppState实例
    ///
    /// # 说明
    /// 该方法会：
    /// 1. 打开数据库并确保 schema 存在
    /// 2. 初始化配置管理器与实体锁管理器
    /// 3. 创建所有API实例
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!("初始化AppState，数据库路径: {}", db_path);

        // 建库（幂等）
        crate::db::open_and_init(&db_path).map_err(|e| format!("无法初始化数据库: {}", e))?;

        let config_manager = Arc::new(
            ConfigManager::new(&db_path).map_err(|e| format!("无法创建ConfigManager: {}", e))?,
        );
        let config: Arc<dyn LifecycleConfigReader> = config_manager.clone();
        let entity_locks = Arc::new(EntityLockManager::new());

        // ==========================================
        // 创建API层
        // ==========================================
        let import_api = Arc::new(ImportApi::new(db_path.clone(), config.clone()));
        let allocation_api = Arc::new(AllocationApi::new(
            db_path.clone(),
            config.clone(),
            entity_locks.clone(),
        ));
        let rep_api = Arc::new(RepApi::new(db_path.clone()));
        let slip_api = Arc::new(SlipApi::new(db_path.clone()));
        let billing_api = Arc::new(BillingApi::new(db_path.clone(), config.clone()));
        let conflict_api = Arc::new(ConflictApi::new(db_path.clone(), config));
        let audit_api = Arc::new(AuditApi::new(db_path.clone()));

        tracing::info!("AppState初始化完成");

        Ok(Self {
            db_path,
            import_api,
            allocation_api,
            rep_api,
            slip_api,
            billing_api,
            conflict_api,
            audit_api,
            config_manager,
            entity_locks,
        })
    }
}

/// 获取默认数据库路径
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    // 允许通过环境变量显式指定 DB 路径（便于调试/测试/CI）
    if let Ok(path) = std::env::var("PROCUREMENT_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./procurement_lifecycle.db");

    if let Some(data_dir) = dirs::data_dir() {
        // 开发环境使用独立目录，避免污染生产数据
        #[cfg(debug_assertions)]
        {
            path = data_dir.join("procurement-lifecycle-dev");
        }

        #[cfg(not(debug_assertions))]
        {
            path = data_dir.join("procurement-lifecycle");
        }

        // 目录创建失败时 open 会给出明确错误
        std::fs::create_dir_all(&path).ok();
        path = path.join("procurement_lifecycle.db");
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_app_state_new() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("state.db").to_string_lossy().to_string();
        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);
        assert!(state.allocation_api.list_ledger().unwrap().is_empty());
    }
}
