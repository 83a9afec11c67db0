// ==========================================
// 纵剪分条隔套配刀系统 - 隔套库存台账
// ==========================================
// 职责: 金属/塑料两个库存池的计数、原子预留/归还、快照
// 红线: 计数永不为负; 预留失败时台账保持原样 (含 revision)
// 持久化: 由 repository::InventoryRepository 负责, 本模块只管内存状态
// ==========================================

use crate::domain::combo::Combo;
use crate::domain::denomination::Denomination;
use crate::domain::types::SpacerMaterial;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// 库存池: 规格 → 块数
pub type SpacerPool = BTreeMap<Denomination, u32>;

// 车间出厂库存（单位: 万分之一英寸, 块数）
const METAL_DEFAULT: [(i64, u32); 14] = [
    (30000, 7),
    (20000, 11),
    (10000, 20),
    (7500, 18),
    (5000, 29),
    (3750, 27),
    (2500, 29),
    (1290, 21),
    (1250, 62),
    (650, 16),
    (630, 16),
    (620, 29),
    (315, 26),
    (250, 20),
];

const PLASTIC_DEFAULT: [(i64, u32); 10] = [
    (300, 50),
    (200, 50),
    (150, 50),
    (130, 50),
    (100, 50),
    (75, 50),
    (50, 50),
    (40, 50),
    (30, 50),
    (20, 50),
];

fn pool_from_units(entries: &[(i64, u32)]) -> SpacerPool {
    entries
        .iter()
        .filter_map(|&(units, count)| Denomination::from_units(units).map(|d| (d, count)))
        .collect()
}

// ==========================================
// ReserveError - 预留失败
// ==========================================
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReserveError {
    #[error("库存不足: {material} {denomination}\" 需要 {requested} 块, 剩余 {available} 块")]
    InsufficientCount {
        material: SpacerMaterial,
        denomination: Denomination,
        requested: u32,
        available: u32,
    },
}

// ==========================================
// InventorySnapshot - 库存快照（只读视图）
// ==========================================
// 序列化格式: { "metal": {"0.1250": 62}, "plastic": {...} }
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct InventorySnapshot {
    #[serde(default)]
    pub metal: SpacerPool,
    #[serde(default)]
    pub plastic: SpacerPool,
    /// 快照时台账的 revision（不参与序列化）
    #[serde(skip)]
    pub revision: u64,
}

impl InventorySnapshot {
    pub fn pool(&self, material: SpacerMaterial) -> &SpacerPool {
        match material {
            SpacerMaterial::Metal => &self.metal,
            SpacerMaterial::Plastic => &self.plastic,
        }
    }

    pub fn available(&self, material: SpacerMaterial, denomination: Denomination) -> u32 {
        self.pool(material).get(&denomination).copied().unwrap_or(0)
    }

    /// 两个池合计
    pub fn available_pooled(&self, denomination: Denomination) -> u32 {
        self.available(SpacerMaterial::Metal, denomination)
            .saturating_add(self.available(SpacerMaterial::Plastic, denomination))
    }

    pub fn total_units(&self) -> u64 {
        self.metal.values().chain(self.plastic.values()).map(|&c| c as u64).sum()
    }
}

// ==========================================
// InventoryLedger - 库存台账
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct InventoryLedger {
    metal: SpacerPool,
    plastic: SpacerPool,
    revision: u64,
}

impl InventoryLedger {
    /// 空台账
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pools(metal: SpacerPool, plastic: SpacerPool) -> Self {
        Self { metal, plastic, revision: 0 }
    }

    pub fn from_snapshot(snapshot: &InventorySnapshot) -> Self {
        Self {
            metal: snapshot.metal.clone(),
            plastic: snapshot.plastic.clone(),
            revision: snapshot.revision,
        }
    }

    /// 车间出厂库存（14 种金属隔套 + 10 种塑料垫片）
    pub fn shop_default() -> Self {
        Self::from_pools(pool_from_units(&METAL_DEFAULT), pool_from_units(&PLASTIC_DEFAULT))
    }

    fn pool_mut(&mut self, material: SpacerMaterial) -> &mut SpacerPool {
        match material {
            SpacerMaterial::Metal => &mut self.metal,
            SpacerMaterial::Plastic => &mut self.plastic,
        }
    }

    pub fn pool(&self, material: SpacerMaterial) -> &SpacerPool {
        match material {
            SpacerMaterial::Metal => &self.metal,
            SpacerMaterial::Plastic => &self.plastic,
        }
    }

    // ==========================================
    // 查询
    // ==========================================

    pub fn available(&self, material: SpacerMaterial, denomination: Denomination) -> u32 {
        self.pool(material).get(&denomination).copied().unwrap_or(0)
    }

    pub fn available_pooled(&self, denomination: Denomination) -> u32 {
        self.available(SpacerMaterial::Metal, denomination)
            .saturating_add(self.available(SpacerMaterial::Plastic, denomination))
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn total_units(&self) -> u64 {
        self.metal.values().chain(self.plastic.values()).map(|&c| c as u64).sum()
    }

    // ==========================================
    // 变更
    // ==========================================

    /// 原子预留一个组合
    ///
    /// 先整体校验每个 (材质, 规格) 的需求块数, 全部满足才统一扣减;
    /// 任一不足则返回错误且台账不变
    pub fn reserve(&mut self, combo: &Combo) -> Result<(), ReserveError> {
        let needs = combo.multiplicities();

        for (&(material, denomination), &requested) in &needs {
            let available = self.available(material, denomination);
            if requested > available {
                return Err(ReserveError::InsufficientCount {
                    material,
                    denomination,
                    requested,
                    available,
                });
            }
        }

        for ((material, denomination), requested) in needs {
            if let Some(count) = self.pool_mut(material).get_mut(&denomination) {
                *count -= requested;
            }
        }
        self.revision += 1;
        Ok(())
    }

    /// 归还一个已预留的组合（用于整单回滚）
    pub fn release(&mut self, combo: &Combo) {
        for ((material, denomination), count) in combo.multiplicities() {
            let held = self.pool_mut(material).entry(denomination).or_insert(0);
            *held = held.saturating_add(count);
        }
        self.revision += 1;
    }

    /// 库存编辑: 直接设置某规格块数
    pub fn set_count(&mut self, material: SpacerMaterial, denomination: Denomination, count: u32) {
        self.pool_mut(material).insert(denomination, count);
        self.revision += 1;
    }

    /// 获取只读快照
    pub fn snapshot(&self) -> InventorySnapshot {
        InventorySnapshot {
            metal: self.metal.clone(),
            plastic: self.plastic.clone(),
            revision: self.revision,
        }
    }

    /// 从快照恢复计数（本身也是一次变更, revision 单调递增）
    pub fn restore(&mut self, snapshot: &InventorySnapshot) {
        self.metal = snapshot.metal.clone();
        self.plastic = snapshot.plastic.clone();
        self.revision = self.revision.max(snapshot.revision) + 1;
    }
}
