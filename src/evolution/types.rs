//! 演化数据模型：淘汰 / 创建记录、世代统计与命名词表

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 淘汰记录（append-only 历史）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EliminationRecord {
    pub round: u32,
    pub agent_name: String,
    pub generation: u32,
    pub parent: Option<String>,
    pub rounds_survived: u32,
    pub votes_received: u32,
    pub answers_given: u32,
    pub reason: String,
    /// 截断后的人格描述预览
    pub persona_preview: String,
    pub timestamp: DateTime<Utc>,
}

/// 创建记录（append-only 历史）。
/// traits_applied 在变异发生时显式记录抽中的特质，不靠事后文本扫描回推。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreationRecord {
    pub round: u32,
    pub agent_name: String,
    pub generation: u32,
    pub parent: String,
    pub persona_preview: String,
    pub traits_applied: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// 名册条目：谱系查询所需的最小身份信息，按名索引（非拥有引用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterEntry {
    pub name: String,
    pub generation: u32,
    pub parent_name: Option<String>,
    pub birth_round: u32,
}

/// 存活种群的世代统计
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GenerationStats {
    pub average_generation: f64,
    pub max_generation: u32,
    pub min_generation: u32,
    /// 不同世代数
    pub generation_diversity: usize,
}

/// 子代名后缀词表（以多数概率拼接 "{父名} {后缀}"）
pub const EVOLUTION_SUFFIXES: &[&str] = &[
    "Evolved", "2.0", "Redux", "Reborn", "Neo", "Next", "Prime", "Enhanced", "Advanced", "Plus",
];

/// 全新名字的形容词词表（"The {形容词} {名词}"）
pub const NAME_ADJECTIVES: &[&str] = &[
    "Adaptive", "Strategic", "Resilient", "Dynamic", "Innovative", "Insightful", "Cunning",
    "Wise", "Bold", "Swift",
];

/// 全新名字的名词词表
pub const NAME_NOUNS: &[&str] = &[
    "Thinker", "Scholar", "Mind", "Sage", "Oracle", "Strategist", "Visionary", "Pioneer",
    "Master", "Expert",
];
