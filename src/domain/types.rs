// ==========================================
// 纵剪分条隔套配刀系统 - 领域类型定义
// ==========================================
// 职责: 隔套材质、卷料材质、隔套角色、刀轴位置等枚举
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 隔套材质 (Spacer Material)
// ==========================================
// 两个库存池相互独立: 同一厚度可同时存在于金属池和塑料池
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpacerMaterial {
    Metal,   // 金属隔套
    Plastic, // 塑料垫片
}

impl SpacerMaterial {
    /// 全部材质（金属在前，与默认优先级一致）
    pub const ALL: [SpacerMaterial; 2] = [SpacerMaterial::Metal, SpacerMaterial::Plastic];

    /// 另一种材质
    pub fn other(self) -> SpacerMaterial {
        match self {
            SpacerMaterial::Metal => SpacerMaterial::Plastic,
            SpacerMaterial::Plastic => SpacerMaterial::Metal,
        }
    }

    /// 转换为字符串 (用于数据库存储)
    pub fn as_str(self) -> &'static str {
        match self {
            SpacerMaterial::Metal => "metal",
            SpacerMaterial::Plastic => "plastic",
        }
    }

    /// 从字符串解析
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "metal" => Some(SpacerMaterial::Metal),
            "plastic" => Some(SpacerMaterial::Plastic),
            _ => None,
        }
    }

    /// 清单中的简写（M / P）
    pub fn short_code(self) -> &'static str {
        match self {
            SpacerMaterial::Metal => "M",
            SpacerMaterial::Plastic => "P",
        }
    }
}

impl fmt::Display for SpacerMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpacerMaterial::Metal => write!(f, "Metal"),
            SpacerMaterial::Plastic => write!(f, "Plastic"),
        }
    }
}

// ==========================================
// 卷料材质 (Coil Material)
// ==========================================
// 决定刀具挠曲补偿量; 未识别的材质标签反序列化为 Other
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CoilMaterial {
    Aluminum,
    Galvanized,
    Stainless,
    #[serde(other)]
    Other,
}

impl Default for CoilMaterial {
    fn default() -> Self {
        CoilMaterial::Aluminum
    }
}

impl fmt::Display for CoilMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoilMaterial::Aluminum => write!(f, "Aluminum"),
            CoilMaterial::Galvanized => write!(f, "Galvanized"),
            CoilMaterial::Stainless => write!(f, "Stainless"),
            CoilMaterial::Other => write!(f, "Other"),
        }
    }
}

// ==========================================
// 分配阶段 (Allocation Stage)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationStage {
    Shoulder, // 肩部隔套（每个作业一次）
    Female,   // 母刀隔套
    Male,     // 公刀隔套（目标由母刀实际值推导）
}

impl fmt::Display for AllocationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AllocationStage::Shoulder => write!(f, "SHOULDER"),
            AllocationStage::Female => write!(f, "FEMALE"),
            AllocationStage::Male => write!(f, "MALE"),
        }
    }
}

// ==========================================
// 刀轴位置 (Knife Line)
// ==========================================
// 奇数刀位: 母刀在上轴, 公刀在下轴; 偶数刀位相反
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum KnifeLine {
    Top,
    Bottom,
}

impl KnifeLine {
    /// 按 1 基刀位奇偶确定母刀隔套所在刀轴
    pub fn female_line_for(position: usize) -> KnifeLine {
        if position % 2 == 1 {
            KnifeLine::Top
        } else {
            KnifeLine::Bottom
        }
    }

    pub fn opposite(self) -> KnifeLine {
        match self {
            KnifeLine::Top => KnifeLine::Bottom,
            KnifeLine::Bottom => KnifeLine::Top,
        }
    }
}

impl fmt::Display for KnifeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnifeLine::Top => write!(f, "TOP"),
            KnifeLine::Bottom => write!(f, "BOTTOM"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parity_rule() {
        assert_eq!(KnifeLine::female_line_for(1), KnifeLine::Top);
        assert_eq!(KnifeLine::female_line_for(2), KnifeLine::Bottom);
        assert_eq!(KnifeLine::female_line_for(7), KnifeLine::Top);
        assert_eq!(KnifeLine::female_line_for(2).opposite(), KnifeLine::Top);
    }

    #[test]
    fn test_coil_material_unknown_tag() {
        let m: CoilMaterial = serde_json::from_str("\"Copper\"").unwrap();
        assert_eq!(m, CoilMaterial::Other);
        let m: CoilMaterial = serde_json::from_str("\"Stainless\"").unwrap();
        assert_eq!(m, CoilMaterial::Stainless);
    }

    #[test]
    fn test_spacer_material_serde() {
        assert_eq!(serde_json::to_string(&SpacerMaterial::Metal).unwrap(), "\"metal\"");
        assert_eq!(SpacerMaterial::Plastic.other(), SpacerMaterial::Metal);
    }
}
