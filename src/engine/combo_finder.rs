// ==========================================
// 纵剪分条隔套配刀系统 - 隔套组合搜索引擎
// ==========================================
// 职责: 给定目标厚度与公差带, 在库存快照上找出块数最少的可行组合
// 输入: 目标值 + 公差带 + 只读库存快照 + 材质偏好
// 输出: FindOutcome (不修改库存, 预留由调用方负责)
// ==========================================
// 搜索顺序:
//   1. 偏好材质池, 规格降序, 层数 r = 1..=max_stack 逐层加深
//   2. 每层按"可重复组合"的字典序枚举, 第一个落入公差带且不超库存的即返回
//   3. 偏好池无解时, 在两池合并后的规格上重复同样的搜索 (结果可能混用材质)
// 剪枝只裁掉不可能含解的子树, 返回结果与穷举的第一个解完全一致
// ==========================================

use crate::domain::combo::{Combo, ComboPiece, DEFAULT_MAX_STACK_DEPTH};
use crate::domain::denomination::{Denomination, ToleranceBand};
use crate::domain::inventory::InventorySnapshot;
use crate::domain::types::SpacerMaterial;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

/// 单次搜索默认访问节点上限
pub const DEFAULT_CANDIDATE_BUDGET: u64 = 2_000_000;

// ==========================================
// FindOutcome - 搜索结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FindOutcome {
    Found(Combo),
    NotFound,
    /// 访问节点数超过预算, 搜索提前终止
    BudgetExhausted { visited: u64 },
}

impl FindOutcome {
    pub fn combo(self) -> Option<Combo> {
        match self {
            FindOutcome::Found(combo) => Some(combo),
            _ => None,
        }
    }
}

// 单个搜索池中的一项: 规格 + 可用块数 (按规格降序排列)
#[derive(Debug, Clone, Copy)]
struct PoolEntry {
    denomination: Denomination,
    available: u32,
}

enum Step {
    Found,
    Continue,
    Exhausted,
}

// 深度优先搜索的可变上下文
struct SearchContext<'a> {
    entries: &'a [PoolEntry],
    lo: i64,
    hi: i64,
    smallest: i64,
    chosen: Vec<usize>,
    visited: u64,
    budget: u64,
}

impl SearchContext<'_> {
    fn descend(&mut self, start: usize, remaining: usize, partial: i64) -> Step {
        if remaining == 0 {
            return if self.lo <= partial && partial <= self.hi {
                Step::Found
            } else {
                Step::Continue
            };
        }

        let rest = remaining as i64 - 1;
        for j in start..self.entries.len() {
            let entry = self.entries[j];
            let units = entry.denomination.units();

            // 后续只能选 <= units 的规格, 全选 units 也够不到下界, 更小的规格更不可能
            if partial.saturating_add(units.saturating_mul(rest + 1)) < self.lo {
                break;
            }
            // 余下全部取最小规格仍超上界
            if partial
                .saturating_add(units)
                .saturating_add(self.smallest.saturating_mul(rest))
                > self.hi
            {
                continue;
            }
            // 同一规格在组合中连续出现, 连续段长度即使用块数
            let run = self.chosen.iter().rev().take_while(|&&i| i == j).count() as u32 + 1;
            if run > entry.available {
                continue;
            }

            self.visited += 1;
            if self.visited > self.budget {
                return Step::Exhausted;
            }

            self.chosen.push(j);
            match self.descend(j, remaining - 1, partial + units) {
                Step::Continue => {
                    self.chosen.pop();
                }
                other => return other,
            }
        }
        Step::Continue
    }
}

enum PassOutcome {
    Found(Vec<usize>),
    NotFound,
    Exhausted,
}

// ==========================================
// ComboFinder - 组合搜索引擎
// ==========================================
// 红线: 纯计算, 不修改库存
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboFinder {
    max_stack: usize,
    candidate_budget: u64,
}

impl ComboFinder {
    pub fn new(max_stack: usize, candidate_budget: u64) -> Self {
        Self {
            max_stack,
            candidate_budget,
        }
    }

    pub fn max_stack(&self) -> usize {
        self.max_stack
    }

    pub fn candidate_budget(&self) -> u64 {
        self.candidate_budget
    }

    /// 搜索一个落入公差带的组合
    ///
    /// # 参数
    /// - target: 目标厚度（英寸）
    /// - band: 公差带
    /// - view: 库存快照（只读）
    /// - prefer: 偏好材质; None 表示直接在合并池中搜索 (同规格先取金属)
    ///
    /// # 返回
    /// - Found: 组合中的块按规格降序, 同规格时偏好材质在前
    /// - NotFound: 两轮搜索均无解
    /// - BudgetExhausted: 两轮合计访问节点数超过预算
    #[instrument(skip(self, view), level = "debug", fields(max_stack = self.max_stack))]
    pub fn find(
        &self,
        target: f64,
        band: ToleranceBand,
        view: &InventorySnapshot,
        prefer: Option<SpacerMaterial>,
    ) -> FindOutcome {
        let (lo, hi) = band.window_units(target);
        let mut visited = 0u64;

        // === 第一轮: 偏好材质纯组合 ===
        if let Some(material) = prefer {
            let entries = pure_entries(view, material);
            match self.search(&entries, lo, hi, &mut visited) {
                PassOutcome::Found(indices) => {
                    debug!(visited, pass = "pure", "找到组合");
                    let denominations: Vec<Denomination> =
                        indices.iter().map(|&i| entries[i].denomination).collect();
                    return FindOutcome::Found(Combo::of_material(material, &denominations));
                }
                PassOutcome::Exhausted => return FindOutcome::BudgetExhausted { visited },
                PassOutcome::NotFound => {}
            }
        }

        // === 第二轮: 两池合并 ===
        let primary = prefer.unwrap_or(SpacerMaterial::Metal);
        let entries = pooled_entries(view);
        match self.search(&entries, lo, hi, &mut visited) {
            PassOutcome::Found(indices) => {
                debug!(visited, pass = "pooled", "找到组合");
                FindOutcome::Found(resolve_materials(&entries, &indices, view, primary))
            }
            PassOutcome::Exhausted => FindOutcome::BudgetExhausted { visited },
            PassOutcome::NotFound => {
                debug!(visited, lo, hi, "无可行组合");
                FindOutcome::NotFound
            }
        }
    }

    // 在单个池上逐层加深搜索
    fn search(&self, entries: &[PoolEntry], lo: i64, hi: i64, visited: &mut u64) -> PassOutcome {
        let smallest = match entries.last() {
            Some(entry) => entry.denomination.units(),
            None => return PassOutcome::NotFound,
        };
        if lo > hi {
            return PassOutcome::NotFound;
        }

        let mut ctx = SearchContext {
            entries,
            lo,
            hi,
            smallest,
            chosen: Vec::new(),
            visited: *visited,
            budget: self.candidate_budget,
        };

        for depth in 1..=self.max_stack {
            ctx.chosen.clear();
            match ctx.descend(0, depth, 0) {
                Step::Found => {
                    *visited = ctx.visited;
                    return PassOutcome::Found(ctx.chosen);
                }
                Step::Exhausted => {
                    *visited = ctx.visited;
                    return PassOutcome::Exhausted;
                }
                Step::Continue => {}
            }
        }

        *visited = ctx.visited;
        PassOutcome::NotFound
    }
}

impl Default for ComboFinder {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_STACK_DEPTH, DEFAULT_CANDIDATE_BUDGET)
    }
}

// 单一材质池: 仅取可用块数 > 0 的规格, 降序
fn pure_entries(view: &InventorySnapshot, material: SpacerMaterial) -> Vec<PoolEntry> {
    view.pool(material)
        .iter()
        .rev()
        .filter(|(_, &count)| count > 0)
        .map(|(&denomination, &available)| PoolEntry {
            denomination,
            available,
        })
        .collect()
}

// 合并池: 同一数值规格的块数相加
fn pooled_entries(view: &InventorySnapshot) -> Vec<PoolEntry> {
    let mut merged: BTreeMap<Denomination, u32> = BTreeMap::new();
    for material in SpacerMaterial::ALL {
        for (&denomination, &count) in view.pool(material) {
            let merged_count = merged.entry(denomination).or_insert(0);
            *merged_count = merged_count.saturating_add(count);
        }
    }
    merged
        .into_iter()
        .rev()
        .filter(|&(_, count)| count > 0)
        .map(|(denomination, available)| PoolEntry {
            denomination,
            available,
        })
        .collect()
}

// 合并池结果分配材质: 每个规格先用 primary 池, 不足部分取另一池
fn resolve_materials(
    entries: &[PoolEntry],
    indices: &[usize],
    view: &InventorySnapshot,
    primary: SpacerMaterial,
) -> Combo {
    let mut used: BTreeMap<Denomination, u32> = BTreeMap::new();
    let pieces = indices
        .iter()
        .map(|&i| {
            let denomination = entries[i].denomination;
            let taken = used.entry(denomination).or_insert(0);
            let material = if *taken < view.available(primary, denomination) {
                primary
            } else {
                primary.other()
            };
            *taken += 1;
            ComboPiece {
                denomination,
                material,
            }
        })
        .collect();
    Combo::new(pieces)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::inventory::{InventoryLedger, SpacerPool};

    fn d(v: f64) -> Denomination {
        Denomination::from_inches(v).unwrap()
    }

    fn pool(entries: &[(f64, u32)]) -> SpacerPool {
        entries.iter().map(|&(v, c)| (d(v), c)).collect()
    }

    fn snapshot(metal: &[(f64, u32)], plastic: &[(f64, u32)]) -> InventorySnapshot {
        InventoryLedger::from_pools(pool(metal), pool(plastic)).snapshot()
    }

    // 不剪枝的穷举: 逐层按字典序枚举全部可重复组合, 返回第一个可行解
    fn brute_force(
        entries: &[PoolEntry],
        lo: i64,
        hi: i64,
        max_stack: usize,
    ) -> Option<Vec<usize>> {
        fn enumerate(
            entries: &[PoolEntry],
            start: usize,
            remaining: usize,
            chosen: &mut Vec<usize>,
            out: &mut Vec<Vec<usize>>,
        ) {
            if remaining == 0 {
                out.push(chosen.clone());
                return;
            }
            for j in start..entries.len() {
                chosen.push(j);
                enumerate(entries, j, remaining - 1, chosen, out);
                chosen.pop();
            }
        }

        for depth in 1..=max_stack {
            let mut all = Vec::new();
            enumerate(entries, 0, depth, &mut Vec::new(), &mut all);
            for combo in all {
                let sum: i64 = combo.iter().map(|&i| entries[i].denomination.units()).sum();
                let fits = combo.iter().all(|&i| {
                    combo.iter().filter(|&&k| k == i).count() as u32 <= entries[i].available
                });
                if fits && lo <= sum && sum <= hi {
                    return Some(combo);
                }
            }
        }
        None
    }

    #[test]
    fn test_basic_combo() {
        // {0.500: 2, 0.250: 1}, 目标 0.750 ± 0.001
        let view = snapshot(&[(0.5, 2), (0.25, 1)], &[]);
        let finder = ComboFinder::default();

        let combo = finder
            .find(0.750, ToleranceBand::symmetric(0.001), &view, Some(SpacerMaterial::Metal))
            .combo()
            .unwrap();

        assert_eq!(combo, Combo::of_material(SpacerMaterial::Metal, &[d(0.5), d(0.25)]));
    }

    #[test]
    fn test_minimal_cardinality() {
        let view = snapshot(&[(0.5, 2), (0.25, 4)], &[]);
        let combo = ComboFinder::default()
            .find(1.0, ToleranceBand::symmetric(0.0), &view, Some(SpacerMaterial::Metal))
            .combo()
            .unwrap();
        assert_eq!(combo.len(), 2);
        assert_eq!(combo.sum_units(), 10000);
    }

    #[test]
    fn test_multiplicity_respected() {
        // 0.5 只有 1 块, 不能用 [0.5, 0.5]
        let view = snapshot(&[(0.5, 1), (0.25, 2)], &[]);
        let combo = ComboFinder::default()
            .find(1.0, ToleranceBand::symmetric(0.0), &view, Some(SpacerMaterial::Metal))
            .combo()
            .unwrap();
        assert_eq!(
            combo,
            Combo::of_material(SpacerMaterial::Metal, &[d(0.5), d(0.25), d(0.25)])
        );
    }

    #[test]
    fn test_lexicographic_tie_break() {
        // 0.3 = 0.2 + 0.1 = 0.15 + 0.15, 字典序第一个为 [0.2, 0.1]
        let view = snapshot(&[(0.2, 5), (0.15, 5), (0.1, 5)], &[]);
        let combo = ComboFinder::default()
            .find(0.3, ToleranceBand::symmetric(0.0), &view, Some(SpacerMaterial::Metal))
            .combo()
            .unwrap();
        assert_eq!(combo, Combo::of_material(SpacerMaterial::Metal, &[d(0.2), d(0.1)]));
    }

    #[test]
    fn test_preferred_pool_wins_over_shorter_mixed() {
        let view = snapshot(&[(0.25, 4)], &[(0.5, 2)]);
        let finder = ComboFinder::default();
        let band = ToleranceBand::symmetric(0.0);

        let metal = finder.find(1.0, band, &view, Some(SpacerMaterial::Metal)).combo().unwrap();
        assert_eq!(metal.len(), 4);
        assert!(metal.is_pure());

        // 无偏好时直接在合并池中找最少块数
        let pooled = finder.find(1.0, band, &view, None).combo().unwrap();
        assert_eq!(
            pooled,
            Combo::of_material(SpacerMaterial::Plastic, &[d(0.5), d(0.5)])
        );
    }

    #[test]
    fn test_pooled_same_denomination_prefers_primary_first() {
        // 金属 0.125 只有 1 块, 塑料 0.125 有 5 块, 需要 2 块
        let view = snapshot(&[(0.125, 1)], &[(0.125, 5)]);
        let combo = ComboFinder::default()
            .find(0.25, ToleranceBand::symmetric(0.0), &view, Some(SpacerMaterial::Metal))
            .combo()
            .unwrap();
        assert_eq!(combo.pieces()[0].material, SpacerMaterial::Metal);
        assert_eq!(combo.pieces()[1].material, SpacerMaterial::Plastic);
        assert!(!combo.is_pure());
    }

    #[test]
    fn test_not_found() {
        let view = snapshot(&[(0.5, 2)], &[(0.01, 3)]);
        let outcome = ComboFinder::default().find(
            0.333,
            ToleranceBand::symmetric(0.001),
            &view,
            Some(SpacerMaterial::Metal),
        );
        assert_eq!(outcome, FindOutcome::NotFound);

        let empty = InventorySnapshot::default();
        assert_eq!(
            ComboFinder::default().find(0.5, ToleranceBand::symmetric(0.001), &empty, None),
            FindOutcome::NotFound
        );
    }

    #[test]
    fn test_extreme_targets_and_counts_do_not_overflow() {
        let view = snapshot(&[(100.0, 5), (0.5, u32::MAX)], &[(0.5, u32::MAX)]);
        let finder = ComboFinder::new(64, 10_000);

        for target in [1e9, 1e15] {
            let outcome = finder.find(target, ToleranceBand::symmetric(0.001), &view, None);
            assert!(outcome.combo().is_none());
        }

        let entries = pooled_entries(&view);
        assert_eq!(entries[1].denomination, d(0.5));
        assert_eq!(entries[1].available, u32::MAX);

        let combo = finder
            .find(200.5, ToleranceBand::symmetric(0.0), &view, Some(SpacerMaterial::Metal))
            .combo()
            .unwrap();
        assert_eq!(combo.sum_units(), 2_005_000);
    }

    #[test]
    fn test_budget_exhausted() {
        let view = InventoryLedger::shop_default().snapshot();
        let finder = ComboFinder::new(DEFAULT_MAX_STACK_DEPTH, 3);
        let outcome = finder.find(
            0.9999,
            ToleranceBand::symmetric(0.0),
            &view,
            Some(SpacerMaterial::Metal),
        );
        assert!(matches!(outcome, FindOutcome::BudgetExhausted { visited } if visited > 3));
    }

    #[test]
    fn test_pruning_matches_brute_force() {
        let view = InventoryLedger::shop_default().snapshot();
        let entries = pure_entries(&view, SpacerMaterial::Metal);
        let finder = ComboFinder::new(3, u64::MAX);
        let band = ToleranceBand::symmetric(0.001);

        let mut target = 0.02;
        while target < 4.0 {
            let (lo, hi) = band.window_units(target);
            let expected = brute_force(&entries, lo, hi, 3).map(|indices| {
                let ds: Vec<Denomination> =
                    indices.iter().map(|&i| entries[i].denomination).collect();
                Combo::of_material(SpacerMaterial::Metal, &ds)
            });

            let mut visited = 0;
            let actual = match finder.search(&entries, lo, hi, &mut visited) {
                PassOutcome::Found(indices) => {
                    let ds: Vec<Denomination> =
                        indices.iter().map(|&i| entries[i].denomination).collect();
                    Some(Combo::of_material(SpacerMaterial::Metal, &ds))
                }
                _ => None,
            };
            assert_eq!(actual, expected, "target={}", target);
            target += 0.0173;
        }
    }
}
