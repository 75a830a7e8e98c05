//! 投票数据模型：方法、答案集、有序计票表、选票与结果

use serde::{Deserialize, Serialize};

use crate::core::SimError;

/// 计票方法；未知方法在解析时立即失败（配置错误，不重试）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteMethod {
    Plurality,
    Ranked,
}

impl std::str::FromStr for VoteMethod {
    type Err = SimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "plurality" => Ok(VoteMethod::Plurality),
            "ranked" => Ok(VoteMethod::Ranked),
            other => Err(SimError::UnknownVotingMethod(other.to_string())),
        }
    }
}

impl std::fmt::Display for VoteMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VoteMethod::Plurality => write!(f, "plurality"),
            VoteMethod::Ranked => write!(f, "ranked"),
        }
    }
}

/// 一条回答
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerEntry {
    pub agent: String,
    pub text: String,
}

/// 本回合的答案集：保序（按种群顺序插入），该顺序同时决定计票表顺序与平局裁决
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnswerSet {
    entries: Vec<AnswerEntry>,
}

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, agent: String, text: String) {
        self.entries.push(AnswerEntry { agent, text });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AnswerEntry> {
        self.entries.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.agent.as_str())
    }

    pub fn contains(&self, agent: &str) -> bool {
        self.entries.iter().any(|e| e.agent == agent)
    }

    /// 候选视图：排除 exclude 指定的名字（用于禁止自投）
    pub fn excluding(&self, exclude: Option<&str>) -> Vec<&AnswerEntry> {
        self.entries
            .iter()
            .filter(|e| Some(e.agent.as_str()) != exclude)
            .collect()
    }
}

/// 单个计票条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TallyEntry<T> {
    pub name: String,
    pub score: T,
}

/// 有序计票表：按候选插入顺序持有每名候选恰好一个条目（零票也保留）。
/// winner / loser 取首个极值，平局按插入顺序裁决——固定且可复现。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tally<T> {
    entries: Vec<TallyEntry<T>>,
}

impl<T: Copy + Default + PartialOrd + std::ops::AddAssign> Tally<T> {
    /// 以候选名序列初始化，每名候选一个零分条目
    pub fn seeded<'a>(candidates: impl Iterator<Item = &'a str>) -> Self {
        Self {
            entries: candidates
                .map(|name| TallyEntry {
                    name: name.to_string(),
                    score: T::default(),
                })
                .collect(),
        }
    }

    pub fn add(&mut self, name: &str, amount: T) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            entry.score += amount;
        }
    }

    pub fn get(&self, name: &str) -> Option<T> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.score)
    }

    pub fn entries(&self) -> &[TallyEntry<T>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 最低分候选（首个极小值）
    pub fn loser(&self) -> Option<&str> {
        self.extremum(|a, b| a < b)
    }

    /// 最高分候选（首个极大值）
    pub fn winner(&self) -> Option<&str> {
        self.extremum(|a, b| a > b)
    }

    fn extremum(&self, better: impl Fn(T, T) -> bool) -> Option<&str> {
        let mut best: Option<&TallyEntry<T>> = None;
        for entry in &self.entries {
            match best {
                Some(b) if !better(entry.score, b.score) => {}
                _ => best = Some(entry),
            }
        }
        best.map(|e| e.name.as_str())
    }
}

/// 多数票选票：投票人、得票者、理由
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluralityBallot {
    pub voter: String,
    pub voted_for: String,
    pub justification: String,
}

/// 排序票选票：投票人、完整排序、理由
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedBallot {
    pub voter: String,
    pub rankings: Vec<String>,
    pub justification: String,
}

/// 一轮投票结果，按方法打标签
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum VoteResult {
    Plurality {
        round: u32,
        question: String,
        votes: Tally<u32>,
        ballots: Vec<PluralityBallot>,
        total_votes: usize,
    },
    Ranked {
        round: u32,
        question: String,
        points: Tally<f64>,
        ballots: Vec<RankedBallot>,
        total_votes: usize,
    },
}

impl VoteResult {
    pub fn method(&self) -> VoteMethod {
        match self {
            VoteResult::Plurality { .. } => VoteMethod::Plurality,
            VoteResult::Ranked { .. } => VoteMethod::Ranked,
        }
    }

    /// 得分最低的候选（淘汰对象）
    pub fn loser(&self) -> Option<&str> {
        match self {
            VoteResult::Plurality { votes, .. } => votes.loser(),
            VoteResult::Ranked { points, .. } => points.loser(),
        }
    }

    /// 得分最高的候选
    pub fn winner(&self) -> Option<&str> {
        match self {
            VoteResult::Plurality { votes, .. } => votes.winner(),
            VoteResult::Ranked { points, .. } => points.winner(),
        }
    }

    /// 计票表中的候选名（插入顺序）
    pub fn candidate_names(&self) -> Vec<&str> {
        match self {
            VoteResult::Plurality { votes, .. } => {
                votes.entries().iter().map(|e| e.name.as_str()).collect()
            }
            VoteResult::Ranked { points, .. } => {
                points.entries().iter().map(|e| e.name.as_str()).collect()
            }
        }
    }

    /// 人类可读的结果摘要（verbose 输出用）
    pub fn summary(&self) -> String {
        let mut out = String::new();
        match self {
            VoteResult::Plurality { round, votes, .. } => {
                out.push_str(&format!("Voting results - round {} (plurality)\n", round));
                let mut sorted: Vec<_> = votes.entries().to_vec();
                sorted.sort_by(|a, b| b.score.cmp(&a.score));
                for entry in &sorted {
                    out.push_str(&format!("  {:<24} {} vote(s)\n", entry.name, entry.score));
                }
            }
            VoteResult::Ranked { round, points, .. } => {
                out.push_str(&format!("Voting results - round {} (ranked)\n", round));
                let mut sorted: Vec<_> = points.entries().to_vec();
                sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                for entry in &sorted {
                    out.push_str(&format!("  {:<24} {:.1} points\n", entry.name, entry.score));
                }
            }
        }
        if let (Some(winner), Some(loser)) = (self.winner(), self.loser()) {
            out.push_str(&format!("  most: {} | least: {}\n", winner, loser));
        }
        out
    }
}
