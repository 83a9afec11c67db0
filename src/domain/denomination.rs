// ==========================================
// 纵剪分条隔套配刀系统 - 隔套规格与公差带
// ==========================================
// 职责: 隔套厚度规格的规范化表示 (4 位小数, 精确比较)
// 红线: 所有厚度求和都在整数单位 (万分之一英寸) 上进行
// ==========================================

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// 规范化精度: 小数位数
pub const DECIMAL_PLACES: usize = 4;

/// 每英寸的整数单位数 (10^DECIMAL_PLACES)
pub const UNITS_PER_INCH: i64 = 10_000;

/// 单个规格允许的最大整数单位（100 英寸）, 保证组合求和不会溢出
pub const MAX_UNITS: i64 = 1_000_000;

/// 公差窗口换算到整数单位时的浮点容差（单位: 万分之一英寸）
const WINDOW_EPSILON_UNITS: f64 = 1e-6;

/// 英寸值换算为整数单位
///
/// 舍入规则固定为"四舍五入, 恰好一半时远离零" (f64::round)
pub fn to_units(inches: f64) -> i64 {
    (inches * UNITS_PER_INCH as f64).round() as i64
}

/// 整数单位换算为英寸值
pub fn from_units(units: i64) -> f64 {
    units as f64 / UNITS_PER_INCH as f64
}

/// 按规范化精度舍入到 4 位小数
pub fn round4(inches: f64) -> f64 {
    from_units(to_units(inches))
}

// ==========================================
// Denomination - 隔套规格
// ==========================================
// 用途: 库存键、组合元素; 内部以万分之一英寸整数存储
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Denomination(i64);

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DenominationError {
    #[error("隔套规格格式错误: {0}")]
    Malformed(String),

    #[error("隔套规格必须为正数: {0}")]
    NotPositive(String),

    #[error("隔套规格超出范围 (最大 {}\"): {value}", from_units(MAX_UNITS))]
    OutOfRange { value: String },
}

impl Denomination {
    /// 由英寸值构造（非正数/非有限值/舍入后为 0/超过上限时返回 None）
    pub fn from_inches(inches: f64) -> Option<Self> {
        if !inches.is_finite() || inches > from_units(MAX_UNITS) {
            return None;
        }
        Self::from_units(to_units(inches))
    }

    /// 由整数单位构造, 有效范围 1..=MAX_UNITS
    pub fn from_units(units: i64) -> Option<Self> {
        if units > 0 && units <= MAX_UNITS {
            Some(Denomination(units))
        } else {
            None
        }
    }

    // raw 仅用于错误信息
    fn parse_inches(inches: f64, raw: &str) -> Result<Self, DenominationError> {
        if !inches.is_finite() {
            return Err(DenominationError::Malformed(raw.to_string()));
        }
        if inches > from_units(MAX_UNITS) {
            return Err(DenominationError::OutOfRange { value: raw.to_string() });
        }
        Self::from_units(to_units(inches))
            .ok_or_else(|| DenominationError::NotPositive(raw.to_string()))
    }

    pub fn units(&self) -> i64 {
        self.0
    }

    pub fn inches(&self) -> f64 {
        from_units(self.0)
    }
}

impl fmt::Display for Denomination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.*}", DECIMAL_PLACES, self.inches())
    }
}

impl FromStr for Denomination {
    type Err = DenominationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let value: f64 = trimmed
            .parse()
            .map_err(|_| DenominationError::Malformed(trimmed.to_string()))?;
        Denomination::parse_inches(value, trimmed)
    }
}

// 库存 JSON 中规格以十进制字符串作为键 ("0.1250")
impl Serialize for Denomination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Denomination {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct DenominationVisitor;

        impl<'de> Visitor<'de> for DenominationVisitor {
            type Value = Denomination;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "a positive decimal thickness")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Denomination, E> {
                v.parse().map_err(E::custom)
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Denomination, E> {
                Denomination::parse_inches(v, &v.to_string()).map_err(E::custom)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Denomination, E> {
                self.visit_f64(v as f64)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Denomination, E> {
                self.visit_f64(v as f64)
            }
        }

        deserializer.deserialize_any(DenominationVisitor)
    }
}

// ==========================================
// ToleranceBand - 公差带
// ==========================================
// 接受条件: target - minus <= round4(sum) <= target + plus
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceBand {
    pub plus: f64,
    pub minus: f64,
}

impl ToleranceBand {
    pub const fn new(plus: f64, minus: f64) -> Self {
        Self { plus, minus }
    }

    pub const fn symmetric(value: f64) -> Self {
        Self { plus: value, minus: value }
    }

    /// 公差窗口换算为闭区间 [lo, hi]（整数单位）
    ///
    /// 组合和为精确的万分之一英寸整数, 因此浮点比较等价于整数区间比较;
    /// 边界换算时加入 1e-6 单位的容差, 吸收 0.749 * 10000 = 7489.9999.. 这类表示误差
    pub fn window_units(&self, target: f64) -> (i64, i64) {
        let lo = ((target - self.minus) * UNITS_PER_INCH as f64 - WINDOW_EPSILON_UNITS).ceil();
        let hi = ((target + self.plus) * UNITS_PER_INCH as f64 + WINDOW_EPSILON_UNITS).floor();
        (lo as i64, hi as i64)
    }

    /// 判断整数单位的和是否落在公差带内
    pub fn contains(&self, target: f64, sum_units: i64) -> bool {
        let (lo, hi) = self.window_units(target);
        lo <= sum_units && sum_units <= hi
    }

    pub fn is_valid(&self) -> bool {
        self.plus.is_finite() && self.minus.is_finite() && self.plus >= 0.0 && self.minus >= 0.0
    }
}

impl fmt::Display for ToleranceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "+{:.4}/-{:.4}", self.plus, self.minus)
    }
}
