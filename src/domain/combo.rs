// ==========================================
// 纵剪分条隔套配刀系统 - 隔套组合
// ==========================================
// 职责: 一次搜索选中的隔套叠放序列 (规格 + 材质)
// 红线: 组合一经返回即为只读, 预留/归还均以整个组合为单位
// ==========================================

use crate::domain::denomination::{from_units, Denomination};
use crate::domain::types::SpacerMaterial;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 默认最大叠放层数
pub const DEFAULT_MAX_STACK_DEPTH: usize = 8;

// ==========================================
// ComboPiece - 单块隔套
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComboPiece {
    pub denomination: Denomination,
    pub material: SpacerMaterial,
}

impl fmt::Display for ComboPiece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}\" {}", self.denomination.inches(), self.material.short_code())
    }
}

// ==========================================
// ComboPurity - 组合纯度
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComboPurity {
    Pure(SpacerMaterial), // 单一材质
    Mixed,                // 金属 + 塑料混用
}

// ==========================================
// Combo - 隔套组合
// ==========================================
// 顺序即搜索返回顺序（规格降序）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Combo {
    pieces: Vec<ComboPiece>,
}

impl Combo {
    pub fn new(pieces: Vec<ComboPiece>) -> Self {
        Self { pieces }
    }

    /// 全部使用同一材质的组合（测试与库存编辑常用）
    pub fn of_material(material: SpacerMaterial, denominations: &[Denomination]) -> Self {
        Self {
            pieces: denominations
                .iter()
                .map(|&denomination| ComboPiece { denomination, material })
                .collect(),
        }
    }

    pub fn pieces(&self) -> &[ComboPiece] {
        &self.pieces
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// 组合总厚度（整数单位, 精确）
    pub fn sum_units(&self) -> i64 {
        self.pieces.iter().map(|p| p.denomination.units()).sum()
    }

    /// 组合总厚度（英寸, 4 位小数精度）
    pub fn sum_inches(&self) -> f64 {
        from_units(self.sum_units())
    }

    pub fn purity(&self) -> ComboPurity {
        match self.pieces.first() {
            Some(first) if self.pieces.iter().all(|p| p.material == first.material) => {
                ComboPurity::Pure(first.material)
            }
            Some(_) => ComboPurity::Mixed,
            // 空组合视为金属纯组合（不会出现在搜索结果中）
            None => ComboPurity::Pure(SpacerMaterial::Metal),
        }
    }

    pub fn is_pure(&self) -> bool {
        matches!(self.purity(), ComboPurity::Pure(_))
    }

    /// 按 (材质, 规格) 统计使用块数
    pub fn multiplicities(&self) -> BTreeMap<(SpacerMaterial, Denomination), u32> {
        let mut counts = BTreeMap::new();
        for piece in &self.pieces {
            *counts.entry((piece.material, piece.denomination)).or_insert(0) += 1;
        }
        counts
    }
}

impl fmt::Display for Combo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.pieces.iter().map(|p| p.denomination.to_string()).collect();
        write!(f, "{}", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(v: f64) -> Denomination {
        Denomination::from_inches(v).unwrap()
    }

    #[test]
    fn test_sum_and_multiplicity() {
        let combo = Combo::of_material(SpacerMaterial::Metal, &[d(0.5), d(0.5), d(0.25)]);
        assert_eq!(combo.sum_units(), 12500);
        assert_eq!(combo.sum_inches(), 1.25);
        assert_eq!(combo.multiplicities().get(&(SpacerMaterial::Metal, d(0.5))), Some(&2));
        assert_eq!(combo.to_string(), "0.5000, 0.5000, 0.2500");
    }

    #[test]
    fn test_purity() {
        let pure = Combo::of_material(SpacerMaterial::Plastic, &[d(0.01)]);
        assert_eq!(pure.purity(), ComboPurity::Pure(SpacerMaterial::Plastic));

        let mixed = Combo::new(vec![
            ComboPiece { denomination: d(0.5), material: SpacerMaterial::Metal },
            ComboPiece { denomination: d(0.01), material: SpacerMaterial::Plastic },
        ]);
        assert_eq!(mixed.purity(), ComboPurity::Mixed);
        assert!(!mixed.is_pure());
    }
}
