// ==========================================
// 纵剪分条隔套配刀系统 - 共享库存台账
// ==========================================
// 职责: 进程内唯一的库存台账句柄
// 并发约定:
//   - 搜索在锁外的快照上进行
//   - 预留在锁内重新校验块数, 被其他作业抢先消耗时干净地失败
// ==========================================

use crate::domain::combo::Combo;
use crate::domain::inventory::{InventoryLedger, InventorySnapshot, ReserveError};
use crate::engine::error::{AllocationError, AllocationResult};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone, Default)]
pub struct SharedLedger {
    inner: Arc<Mutex<InventoryLedger>>,
}

impl SharedLedger {
    pub fn new(ledger: InventoryLedger) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ledger)),
        }
    }

    fn lock(&self) -> AllocationResult<MutexGuard<'_, InventoryLedger>> {
        self.inner
            .lock()
            .map_err(|e| AllocationError::LedgerUnavailable(e.to_string()))
    }

    pub fn snapshot(&self) -> AllocationResult<InventorySnapshot> {
        Ok(self.lock()?.snapshot())
    }

    /// 锁内原子预留; 外层错误为锁失败, 内层错误为块数不足
    pub fn try_reserve(&self, combo: &Combo) -> AllocationResult<Result<(), ReserveError>> {
        Ok(self.lock()?.reserve(combo))
    }

    pub fn release(&self, combo: &Combo) -> AllocationResult<()> {
        self.lock()?.release(combo);
        Ok(())
    }

    /// 在锁内对台账执行任意操作（库存编辑、恢复快照等）
    pub fn with_ledger<R>(&self, f: impl FnOnce(&mut InventoryLedger) -> R) -> AllocationResult<R> {
        let mut guard = self.lock()?;
        Ok(f(&mut guard))
    }

    /// 当前台账的副本
    pub fn to_ledger(&self) -> AllocationResult<InventoryLedger> {
        Ok(self.lock()?.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::denomination::Denomination;
    use crate::domain::types::SpacerMaterial;
    use std::thread;

    #[test]
    fn test_concurrent_reserve_never_oversubscribes() {
        let d = Denomination::from_inches(0.5).unwrap();
        let mut ledger = InventoryLedger::new();
        ledger.set_count(SpacerMaterial::Metal, d, 10);
        let shared = SharedLedger::new(ledger);
        let combo = Combo::of_material(SpacerMaterial::Metal, &[d]);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let shared = shared.clone();
                let combo = combo.clone();
                thread::spawn(move || {
                    (0..4)
                        .filter(|_| matches!(shared.try_reserve(&combo), Ok(Ok(()))))
                        .count()
                })
            })
            .collect();

        let reserved: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(reserved, 10);
        assert_eq!(
            shared.to_ledger().unwrap().available(SpacerMaterial::Metal, d),
            0
        );
    }

    #[test]
    fn test_with_ledger_mutates_in_place() {
        let shared = SharedLedger::new(InventoryLedger::shop_default());
        let d = Denomination::from_inches(0.125).unwrap();
        shared
            .with_ledger(|l| l.set_count(SpacerMaterial::Metal, d, 3))
            .unwrap();
        assert_eq!(shared.snapshot().unwrap().available(SpacerMaterial::Metal, d), 3);
    }
}
