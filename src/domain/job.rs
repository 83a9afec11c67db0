// ==========================================
// 纵剪分条隔套配刀系统 - 分条作业
// ==========================================
// 职责: 作业参数、分条清单解析、刀位展开
// 输入格式: "宽度x数量" 逗号分隔, 例如 "1.125x3, 0.745x2, 2"
// ==========================================

use crate::domain::denomination::ToleranceBand;
use crate::domain::types::{CoilMaterial, KnifeLine};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 表单未填写时的默认宽度公差（英寸）
pub const DEFAULT_WIDTH_TOLERANCE: f64 = 0.005;

/// 单个作业允许的最大刀位数（Σ数量）
pub const MAX_TOTAL_CUTS: usize = 1_000;

// 宽度与数量之间允许的分隔符
const COUNT_SEPARATORS: [char; 4] = ['x', 'X', '×', '*'];

// ==========================================
// 错误类型
// ==========================================

/// 分条清单格式错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CutSpecError {
    #[error("分条清单为空")]
    Empty,

    #[error("第 {position} 项为空")]
    EmptyToken { position: usize },

    #[error("第 {position} 项宽度无效: {token}")]
    InvalidWidth { position: usize, token: String },

    #[error("第 {position} 项数量无效: {token}")]
    InvalidCount { position: usize, token: String },
}

/// 作业 JSON 解析错误
#[derive(Error, Debug)]
pub enum JobInputError {
    #[error("作业 JSON 格式错误: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Cuts(#[from] CutSpecError),
}

/// 作业参数校验错误
#[derive(Error, Debug, Clone, PartialEq)]
#[error("作业参数无效 (field={field}): {message}")]
pub struct JobParameterError {
    pub field: String,
    pub message: String,
}

impl JobParameterError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

// ==========================================
// CutRequest - 分条需求（宽度 × 数量）
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutRequest {
    pub width: f64,
    #[serde(default = "default_count")]
    pub count: u32,
}

fn default_count() -> u32 {
    1
}

/// 解析分条清单
///
/// 规则:
/// - 逗号分隔, 每项 "宽度x数量"; 只写宽度时数量为 1
/// - 分隔符接受 x / X / × / *
/// - 空项、非正宽度、非正整数数量均视为格式错误
pub fn parse_cut_list(input: &str) -> Result<Vec<CutRequest>, CutSpecError> {
    if input.trim().is_empty() {
        return Err(CutSpecError::Empty);
    }

    let mut cuts = Vec::new();
    for (idx, raw) in input.split(',').enumerate() {
        let position = idx + 1;
        let token = raw.trim();
        if token.is_empty() {
            return Err(CutSpecError::EmptyToken { position });
        }

        let (width_part, count_part) = match token.find(|c| COUNT_SEPARATORS.contains(&c)) {
            Some(pos) => {
                let sep_len = token[pos..].chars().next().map(|c| c.len_utf8()).unwrap_or(1);
                (&token[..pos], Some(&token[pos + sep_len..]))
            }
            None => (token, None),
        };

        let width: f64 = width_part
            .trim()
            .parse()
            .ok()
            .filter(|w: &f64| w.is_finite() && *w > 0.0)
            .ok_or_else(|| CutSpecError::InvalidWidth {
                position,
                token: token.to_string(),
            })?;

        let count = match count_part {
            Some(c) => c
                .trim()
                .parse::<u32>()
                .ok()
                .filter(|&n| n > 0)
                .ok_or_else(|| CutSpecError::InvalidCount {
                    position,
                    token: token.to_string(),
                })?,
            None => 1,
        };

        cuts.push(CutRequest { width, count });
    }

    Ok(cuts)
}

// ==========================================
// CutSpec - 展开后的单个刀位
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutSpec {
    /// 1 基刀位序号
    pub position: usize,
    pub width: f64,
}

impl CutSpec {
    pub fn female_line(&self) -> KnifeLine {
        KnifeLine::female_line_for(self.position)
    }

    pub fn male_line(&self) -> KnifeLine {
        self.female_line().opposite()
    }
}

// ==========================================
// JobRun - 一次计算的作业参数
// ==========================================
// JSON 字段为 camelCase, 与作业文件一致
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRun {
    #[serde(default)]
    pub customer: Option<String>,

    pub cuts: Vec<CutRequest>,

    // ===== 卷料与刀具 =====
    pub thickness_in: f64,  // 料厚 (英寸)
    pub clearance_pct: f64, // 刀具间隙 (% 料厚)
    pub female_knife: f64,  // 母刀厚度
    pub male_knife: f64,    // 公刀厚度

    #[serde(default)]
    pub coil_width: Option<f64>,
    #[serde(default)]
    pub coil_weight: Option<f64>,

    // ===== 宽度公差 =====
    #[serde(default = "default_tolerance")]
    pub tol_plus: f64,
    #[serde(default = "default_tolerance")]
    pub tol_minus: f64,

    #[serde(default)]
    pub material: CoilMaterial,
    #[serde(default = "default_true")]
    pub auto_deflect: bool,

    /// 仅当无纯金属组合时才使用塑料垫片
    #[serde(default = "default_true")]
    pub minimize_shims: bool,
}

fn default_tolerance() -> f64 {
    DEFAULT_WIDTH_TOLERANCE
}

fn default_true() -> bool {
    true
}

/// 建议间隙 = 料厚 × 间隙百分比 / 100
pub fn suggested_clearance(thickness_in: f64, clearance_pct: f64) -> f64 {
    thickness_in * (clearance_pct / 100.0)
}

impl JobRun {
    /// 以分条清单文本构造作业（其余参数取常用默认值, 由调用方覆盖）
    pub fn from_cut_text(cut_text: &str) -> Result<Self, CutSpecError> {
        Ok(Self {
            customer: None,
            cuts: parse_cut_list(cut_text)?,
            thickness_in: 0.0,
            clearance_pct: 0.0,
            female_knife: 0.0,
            male_knife: 0.0,
            coil_width: None,
            coil_weight: None,
            tol_plus: DEFAULT_WIDTH_TOLERANCE,
            tol_minus: DEFAULT_WIDTH_TOLERANCE,
            material: CoilMaterial::Aluminum,
            auto_deflect: true,
            minimize_shims: true,
        })
    }

    /// 解析作业 JSON
    ///
    /// `cuts` 既可以是 `[{"width":..,"count":..}]` 数组,
    /// 也可以是操作员录入的清单文本 `"1.125x3, 0.745x2"`
    pub fn from_json_str(raw: &str) -> Result<Self, JobInputError> {
        let mut value: serde_json::Value = serde_json::from_str(raw)?;
        if let Some(text) = value.get("cuts").and_then(|v| v.as_str()) {
            let cuts = parse_cut_list(text)?;
            value["cuts"] = serde_json::to_value(cuts)?;
        }
        Ok(serde_json::from_value(value)?)
    }

    /// 刀具间隙（英寸）
    pub fn clearance(&self) -> f64 {
        suggested_clearance(self.thickness_in, self.clearance_pct)
    }

    pub fn width_band(&self) -> ToleranceBand {
        ToleranceBand::new(self.tol_plus, self.tol_minus)
    }

    /// 按数量逐个展开为刀位序列（惰性, 不预先分配）
    pub fn expand_cuts(&self) -> impl Iterator<Item = CutSpec> + '_ {
        self.cuts
            .iter()
            .flat_map(|c| std::iter::repeat(c.width).take(c.count as usize))
            .enumerate()
            .map(|(idx, width)| CutSpec { position: idx + 1, width })
    }

    pub fn total_cut_count(&self) -> usize {
        self.cuts
            .iter()
            .fold(0usize, |acc, c| acc.saturating_add(c.count as usize))
    }

    /// Σ(宽度 × 数量)
    pub fn total_cut_width(&self) -> f64 {
        self.cuts.iter().map(|c| c.width * c.count as f64).sum()
    }

    /// 有效卷宽（未填写或 0 视为未提供）
    pub fn effective_coil_width(&self) -> Option<f64> {
        self.coil_width.filter(|w| w.is_finite() && *w > 0.0)
    }

    pub fn effective_coil_weight(&self) -> Option<f64> {
        self.coil_weight.filter(|w| w.is_finite() && *w > 0.0)
    }

    /// 参数校验
    pub fn validate(&self) -> Result<(), JobParameterError> {
        if self.cuts.is_empty() {
            return Err(JobParameterError::new("cuts", "至少需要一个分条"));
        }
        for (idx, cut) in self.cuts.iter().enumerate() {
            if !cut.width.is_finite() || cut.width <= 0.0 {
                return Err(JobParameterError::new(
                    "cuts",
                    format!("第 {} 项宽度必须为正数: {}", idx + 1, cut.width),
                ));
            }
            if cut.count == 0 {
                return Err(JobParameterError::new(
                    "cuts",
                    format!("第 {} 项数量必须大于 0", idx + 1),
                ));
            }
        }
        let total = self.total_cut_count();
        if total > MAX_TOTAL_CUTS {
            return Err(JobParameterError::new(
                "cuts",
                format!("刀位总数 {} 超过上限 {}", total, MAX_TOTAL_CUTS),
            ));
        }

        let positive = [
            ("thicknessIn", self.thickness_in),
            ("femaleKnife", self.female_knife),
            ("maleKnife", self.male_knife),
        ];
        for (field, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(JobParameterError::new(field, format!("必须为正数: {}", value)));
            }
        }

        let non_negative = [
            ("clearancePct", self.clearance_pct),
            ("tolPlus", self.tol_plus),
            ("tolMinus", self.tol_minus),
        ];
        for (field, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(JobParameterError::new(field, format!("不能为负数: {}", value)));
            }
        }

        Ok(())
    }
}
