// ==========================================
// 采购订单全流程系统 - 台账分配 API
// ==========================================
// 职责: 台账编辑 / 提交代表（锁定）/ 回滚
// 红线: 提交代表必须在实体锁 + 单一写事务内完成
// ==========================================

use crate::api::connection::{open_connection, with_read_conn, with_write_tx};
use crate::api::error::ApiResult;
use crate::config::LifecycleConfigReader;
use crate::domain::allocation::CommitOutcome;
use crate::domain::order::{AllocationEdit, InputLine, LedgerEntry};
use crate::domain::types::Actor;
use crate::engine::{AllocationEngine, EntityLockKey, EntityLockManager, EntityTransaction};
use crate::repository::{InputLineRepository, LedgerRepository};
use std::sync::Arc;
use std::time::Duration;

pub struct AllocationApi {
    db_path: String,
    config: Arc<dyn LifecycleConfigReader>,
    locks: Arc<EntityLockManager>,
    engine: AllocationEngine,
}

impl AllocationApi {
    pub fn new(
        db_path: String,
        config: Arc<dyn LifecycleConfigReader>,
        locks: Arc<EntityLockManager>,
    ) -> Self {
        Self {
            db_path,
            config,
            locks,
            engine: AllocationEngine::new(),
        }
    }

    fn lock_timeout(&self) -> ApiResult<Duration> {
        Ok(Duration::from_millis(self.config.get_lock_wait_timeout_ms()?))
    }

    /// 编辑台账分配字段
    ///
    /// # 返回
    /// - Err(LockConflict): 台账已锁定
    pub fn update_allocation(
        &self,
        entry_id: &str,
        edit: &AllocationEdit,
        actor: &Actor,
    ) -> ApiResult<LedgerEntry> {
        let mut conn = open_connection(&self.db_path)?;
        let tx = EntityTransaction::begin(
            &mut conn,
            &self.locks,
            &EntityLockKey::ledger_entry(entry_id),
            self.lock_timeout()?,
        )?;
        let entry = self.engine.update_allocation(&tx, entry_id, edit, actor)?;
        tx.commit()?;
        Ok(entry)
    }

    /// 提交代表（锁定台账并生成代表单）
    ///
    /// 同一台账的并发调用在实体锁上串行，恰好一个成功，其余返回 LockConflict
    pub fn commit_to_supplier(
        &self,
        entry_id: &str,
        supplier: &str,
        rate: f64,
        actor: &Actor,
    ) -> ApiResult<CommitOutcome> {
        let mut conn = open_connection(&self.db_path)?;
        let tx = EntityTransaction::begin(
            &mut conn,
            &self.locks,
            &EntityLockKey::ledger_entry(entry_id),
            self.lock_timeout()?,
        )?;
        let outcome = self
            .engine
            .commit_to_supplier(&tx, entry_id, supplier, rate, actor)?;
        tx.commit()?;
        Ok(outcome)
    }

    /// 回滚代表单（删除代表单并解锁台账）
    pub fn rollback(&self, allocation_id: &str, actor: &Actor) -> ApiResult<LedgerEntry> {
        with_write_tx(&self.db_path, |tx| {
            Ok(self.engine.rollback(tx, allocation_id, actor)?)
        })
    }

    pub fn get_entry(&self, entry_id: &str) -> ApiResult<LedgerEntry> {
        with_read_conn(&self.db_path, |conn| Ok(LedgerRepository::get(conn, entry_id)?))
    }

    pub fn list_ledger(&self) -> ApiResult<Vec<LedgerEntry>> {
        with_read_conn(&self.db_path, |conn| Ok(LedgerRepository::list_all(conn)?))
    }

    /// 台账来源订单行
    pub fn entry_lines(&self, entry_id: &str) -> ApiResult<Vec<InputLine>> {
        with_read_conn(&self.db_path, |conn| {
            Ok(InputLineRepository::find_by_entry(conn, entry_id)?)
        })
    }
}
