// ==========================================
// 纵剪分条隔套配刀系统 - 分配结果
// ==========================================
// 职责: 隔套叠放分配、用量汇总、计算报告
// 用途: 交给排版预览/打印等外部协作方
// ==========================================

use crate::domain::combo::Combo;
use crate::domain::denomination::Denomination;
use crate::domain::types::{AllocationStage, KnifeLine, SpacerMaterial};
use crate::i18n::{t, t_with_args};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ==========================================
// StackAssignment - 单个隔套叠放
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackAssignment {
    pub stage: AllocationStage,
    /// 刀位序号（肩部隔套为 None）
    pub cut_position: Option<usize>,
    pub line: KnifeLine,
    /// 搜索目标值
    pub target: f64,
    /// 组合实际厚度
    pub achieved: f64,
    /// 挠曲补偿（仅母刀隔套非 0）
    pub deflection_offset: f64,
    pub combo: Combo,
}

impl StackAssignment {
    /// 计入挠曲补偿后的有效厚度
    pub fn effective_sum(&self) -> f64 {
        self.achieved + self.deflection_offset
    }

    /// 本地化角色标签, 如 "Shoulder" / "Cut 3 Female"
    pub fn role_label(&self) -> String {
        let index = self.cut_position.unwrap_or(0).to_string();
        match self.stage {
            AllocationStage::Shoulder => t("stack.shoulder"),
            AllocationStage::Female => t_with_args("stack.female", &[("index", &index)]),
            AllocationStage::Male => t_with_args("stack.male", &[("index", &index)]),
        }
    }

    pub fn descriptor(&self) -> StackDescriptor {
        StackDescriptor {
            role: self.role_label(),
            stage: self.stage,
            cut_position: self.cut_position,
            line: self.line,
            target: self.target,
            achieved: self.achieved,
            pieces: self
                .combo
                .pieces()
                .iter()
                .map(|p| (p.denomination, p.material))
                .collect(),
        }
    }
}

impl fmt::Display for StackAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // 母刀显示计入补偿后的厚度, 公刀/肩部显示目标值
        let shown = match self.stage {
            AllocationStage::Female => self.effective_sum(),
            _ => self.target,
        };
        write!(f, "{} ({:.3}): {}", self.role_label(), shown, self.combo)
    }
}

// ==========================================
// StackDescriptor - 输出给渲染/导出的描述
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StackDescriptor {
    pub role: String,
    pub stage: AllocationStage,
    pub cut_position: Option<usize>,
    pub line: KnifeLine,
    pub target: f64,
    pub achieved: f64,
    pub pieces: Vec<(Denomination, SpacerMaterial)>,
}

// ==========================================
// UsageTally - 用量汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UsageTally {
    counts: BTreeMap<(Denomination, SpacerMaterial), u32>,
}

/// 用量汇总的一行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEntry {
    pub denomination: Denomination,
    pub material: SpacerMaterial,
    pub count: u32,
}

impl UsageTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, combo: &Combo) {
        for piece in combo.pieces() {
            *self.counts.entry((piece.denomination, piece.material)).or_insert(0) += 1;
        }
    }

    pub fn count(&self, material: SpacerMaterial, denomination: Denomination) -> u32 {
        self.counts.get(&(denomination, material)).copied().unwrap_or(0)
    }

    pub fn total_units(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// 按规格升序输出
    pub fn entries(&self) -> Vec<UsageEntry> {
        self.counts
            .iter()
            .map(|(&(denomination, material), &count)| UsageEntry {
                denomination,
                material,
                count,
            })
            .collect()
    }
}

impl fmt::Display for UsageTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in self.entries() {
            writeln!(f, "{}\" ({}): {}", entry.denomination, entry.material, entry.count)?;
        }
        Ok(())
    }
}

impl Serialize for UsageTally {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.entries().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for UsageTally {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let entries = Vec::<UsageEntry>::deserialize(deserializer)?;
        let mut tally = UsageTally::new();
        for e in entries {
            *tally.counts.entry((e.denomination, e.material)).or_insert(0) += e.count;
        }
        Ok(tally)
    }
}

// ==========================================
// StripWeight - 分条重量估算
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StripWeight {
    pub width: f64,
    pub count: u32,
    /// 单条重量 = 卷重 × 宽度 / 卷宽
    pub weight_each: f64,
}

// ==========================================
// AllocationReport - 一次计算的完整输出
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationReport {
    pub run_id: String,
    pub calculated_at: NaiveDateTime,
    /// 肩部 + 逐刀 (母, 公) 的有序叠放
    pub assignments: Vec<StackAssignment>,
    pub usage: UsageTally,
    pub clearance: f64,
    pub deflection_offset: f64,
    pub scrap: f64,
    #[serde(default)]
    pub strip_weights: Vec<StripWeight>,
    #[serde(default)]
    pub scrap_weight: Option<f64>,
}

impl AllocationReport {
    pub fn shoulder(&self) -> Option<&StackAssignment> {
        self.assignments.iter().find(|a| a.stage == AllocationStage::Shoulder)
    }

    /// 某刀位的 (母刀, 公刀) 叠放
    pub fn cut(&self, position: usize) -> Option<(&StackAssignment, &StackAssignment)> {
        let female = self.assignments.iter().find(|a| {
            a.stage == AllocationStage::Female && a.cut_position == Some(position)
        })?;
        let male = self.assignments.iter().find(|a| {
            a.stage == AllocationStage::Male && a.cut_position == Some(position)
        })?;
        Some((female, male))
    }

    /// 某一刀轴上的叠放（保持分配顺序）
    pub fn line(&self, line: KnifeLine) -> Vec<&StackAssignment> {
        self.assignments.iter().filter(|a| a.line == line).collect()
    }

    pub fn descriptors(&self) -> Vec<StackDescriptor> {
        self.assignments.iter().map(|a| a.descriptor()).collect()
    }
}

impl fmt::Display for AllocationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in [KnifeLine::Top, KnifeLine::Bottom] {
            let key = match line {
                KnifeLine::Top => "line.top",
                KnifeLine::Bottom => "line.bottom",
            };
            writeln!(f, "[{}]", t(key))?;
            for assignment in self.line(line) {
                writeln!(f, "  {}", assignment)?;
            }
        }
        writeln!(f, "{}:", t("report.usage_title"))?;
        write!(f, "{}", self.usage)?;
        writeln!(f, "{}: {:.3}", t("report.scrap"), self.scrap)
    }
}
