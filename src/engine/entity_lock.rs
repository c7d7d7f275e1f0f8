// ==========================================
// 采购订单全流程系统 - 实体锁
// ==========================================
// 职责: 按实体身份派生确定性锁键，提供事务级独占锁
// 红线: 锁的生命周期不超过一个事务（EntityTransaction 先结束事务，再释放锁）
// ==========================================

use crate::domain::types::EntityKind;
use crate::engine::error::{EngineError, EngineResult};
use rusqlite::{Connection, Transaction};
use std::collections::HashSet;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 确定性锁键: 同一实体的所有调用方得到相同的键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityLockKey {
    pub kind: EntityKind,
    pub id: String,
}

impl EntityLockKey {
    pub fn new(kind: EntityKind, id: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
        }
    }

    pub fn ledger_entry(entry_id: &str) -> Self {
        Self::new(EntityKind::LedgerEntry, entry_id)
    }
}

impl fmt::Display for EntityLockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind.as_str(), self.id)
    }
}

// ==========================================
// EntityLockManager - 命名互斥锁注册表
// ==========================================
// 不同实体互不阻塞；同一实体的调用方排队等待，超时视为锁冲突
#[derive(Default)]
pub struct EntityLockManager {
    held: Mutex<HashSet<String>>,
    released: Condvar,
}

impl EntityLockManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取实体锁
    ///
    /// # 返回
    /// - Ok(EntityLockGuard): Drop 时释放
    /// - Err(LockConflict): 在 timeout 内未能获取
    pub fn acquire(
        self: &Arc<Self>,
        key: &EntityLockKey,
        timeout: Duration,
    ) -> EngineResult<EntityLockGuard> {
        let name = key.to_string();
        let deadline = Instant::now() + timeout;
        let mut held = self.lock_held();

        while held.contains(&name) {
            let now = Instant::now();
            if now >= deadline {
                warn!(lock_key = %name, timeout_ms = timeout.as_millis() as u64, "实体锁等待超时");
                return Err(EngineError::lock_conflict(key.kind.as_str(), &key.id));
            }
            let (guard, _) = self
                .released
                .wait_timeout(held, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            held = guard;
        }

        held.insert(name.clone());
        debug!(lock_key = %name, "实体锁已获取");

        Ok(EntityLockGuard {
            manager: Arc::clone(self),
            name,
        })
    }

    pub fn is_held(&self, key: &EntityLockKey) -> bool {
        self.lock_held().contains(&key.to_string())
    }

    fn lock_held(&self) -> MutexGuard<'_, HashSet<String>> {
        // 持有期间不会 panic，中毒时沿用内部状态
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn release(&self, name: &str) {
        let mut held = self.lock_held();
        held.remove(name);
        drop(held);
        self.released.notify_all();
        debug!(lock_key = %name, "实体锁已释放");
    }
}

/// 实体锁守卫
pub struct EntityLockGuard {
    manager: Arc<EntityLockManager>,
    name: String,
}

impl EntityLockGuard {
    pub fn key(&self) -> &str {
        &self.name
    }
}

impl Drop for EntityLockGuard {
    fn drop(&mut self) {
        self.manager.release(&self.name);
    }
}

// ==========================================
// EntityTransaction - 持有实体锁的写事务
// ==========================================
// 字段按声明顺序析构: 事务先回滚/结束，锁后释放
pub struct EntityTransaction<'c> {
    tx: Transaction<'c>,
    _guard: EntityLockGuard,
}

impl<'c> EntityTransaction<'c> {
    /// 先取实体锁，再开启 IMMEDIATE 写事务
    pub fn begin(
        conn: &'c mut Connection,
        locks: &Arc<EntityLockManager>,
        key: &EntityLockKey,
        timeout: Duration,
    ) -> EngineResult<Self> {
        let guard = locks.acquire(key, timeout)?;
        let tx = crate::db::begin_write(conn)?;
        Ok(Self { tx, _guard: guard })
    }

    /// 提交事务后释放锁
    pub fn commit(self) -> EngineResult<()> {
        let Self { tx, _guard } = self;
        tx.commit()?;
        Ok(())
    }
}

impl Deref for EntityTransaction<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.tx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_lock_key_is_deterministic() {
        let a = EntityLockKey::ledger_entry("L1");
        let b = EntityLockKey::ledger_entry("L1");
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "ledger_entry:L1");
    }

    #[test]
    fn test_guard_release_on_drop() {
        let locks = Arc::new(EntityLockManager::new());
        let key = EntityLockKey::ledger_entry("L1");

        let guard = locks.acquire(&key, Duration::from_millis(10)).unwrap();
        assert!(locks.is_held(&key));
        assert_eq!(guard.key(), "ledger_entry:L1");

        // 同一实体超时
        let err = locks.acquire(&key, Duration::from_millis(20));
        assert!(matches!(err, Err(EngineError::LockConflict { .. })));

        // 不同实体不受影响
        let other = locks.acquire(&EntityLockKey::ledger_entry("L2"), Duration::from_millis(10));
        assert!(other.is_ok());

        drop(guard);
        assert!(!locks.is_held(&key));
        assert!(locks.acquire(&key, Duration::from_millis(10)).is_ok());
    }

    #[test]
    fn test_waiter_acquires_after_release() {
        let locks = Arc::new(EntityLockManager::new());
        let key = EntityLockKey::ledger_entry("L1");
        let guard = locks.acquire(&key, Duration::from_millis(10)).unwrap();

        let waiter = {
            let locks = Arc::clone(&locks);
            let key = key.clone();
            thread::spawn(move || locks.acquire(&key, Duration::from_secs(5)).is_ok())
        };

        thread::sleep(Duration::from_millis(50));
        drop(guard);
        assert!(waiter.join().unwrap());
    }

    #[test]
    fn test_entity_transaction_releases_lock_after_commit() {
        let mut conn = Connection::open_in_memory().unwrap();
        let locks = Arc::new(EntityLockManager::new());
        let key = EntityLockKey::ledger_entry("L1");

        let tx = EntityTransaction::begin(&mut conn, &locks, &key, Duration::from_millis(10)).unwrap();
        tx.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();
        assert!(locks.is_held(&key));
        tx.commit().unwrap();

        assert!(!locks.is_held(&key));
    }
}
