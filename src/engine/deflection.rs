// ==========================================
// 纵剪分条隔套配刀系统 - 刀具挠曲补偿
// ==========================================
// 职责: 按卷料材质与料厚给出母刀隔套的附加补偿量
// 红线: 纯函数, 关闭补偿时恒为 0
// ==========================================

use crate::domain::types::CoilMaterial;

// 补偿量（英寸）
const ALUMINUM_OFFSET: f64 = 0.0005;
const HARD_THICK_OFFSET: f64 = 0.0015;
const HARD_THIN_OFFSET: f64 = 0.0010;

/// 镀锌/不锈钢的厚料分界（英寸, 严格大于）
const HARD_THICKNESS_THRESHOLD: f64 = 0.030;

// ==========================================
// DeflectionModel - 挠曲补偿模型
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct DeflectionModel {}

impl DeflectionModel {
    pub fn new() -> Self {
        Self {}
    }

    /// 计算补偿量
    ///
    /// # 参数
    /// - material: 卷料材质
    /// - thickness: 料厚（英寸）
    /// - enabled: 作业是否启用自动补偿
    pub fn offset(&self, material: CoilMaterial, thickness: f64, enabled: bool) -> f64 {
        if !enabled {
            return 0.0;
        }
        match material {
            CoilMaterial::Aluminum => ALUMINUM_OFFSET,
            CoilMaterial::Galvanized | CoilMaterial::Stainless => {
                if thickness > HARD_THICKNESS_THRESHOLD {
                    HARD_THICK_OFFSET
                } else {
                    HARD_THIN_OFFSET
                }
            }
            CoilMaterial::Other => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets_by_material() {
        let model = DeflectionModel::new();
        assert_eq!(model.offset(CoilMaterial::Aluminum, 0.020, true), 0.0005);
        assert_eq!(model.offset(CoilMaterial::Galvanized, 0.040, true), 0.0015);
        assert_eq!(model.offset(CoilMaterial::Stainless, 0.040, true), 0.0015);
        assert_eq!(model.offset(CoilMaterial::Galvanized, 0.020, true), 0.0010);
        assert_eq!(model.offset(CoilMaterial::Other, 0.040, true), 0.0);
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let model = DeflectionModel::new();
        assert_eq!(model.offset(CoilMaterial::Stainless, 0.030, true), 0.0010);
    }

    #[test]
    fn test_disabled() {
        let model = DeflectionModel::new();
        assert_eq!(model.offset(CoilMaterial::Stainless, 0.040, false), 0.0);
        assert_eq!(model.offset(CoilMaterial::Aluminum, 0.040, false), 0.0);
    }
}
