//! Agent：身份、人格描述、有界记忆与统计
//!
//! answer 组装「人格 + 最近记忆 + 题目」prompt 并委托生成后端；
//! vote 在候选集里选一名并解析两行应答，解析失败降级为均匀随机合法选择；
//! mutate 以给定概率为人格描述追加特质注记（纯函数，不修改自身）。

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::MemorySection;
use crate::llm::ResponseGenerator;
use crate::voting::AnswerSet;

/// 仅剩自己可投时返回的固定理由（此时不发起任何生成调用）
pub const NO_OTHER_OPTIONS: &str = "No other options available.";
/// 投票应答解析失败、改为随机合法选择时的固定理由
pub const VOTE_PARSE_FAILED: &str = "Vote parsing failed, random selection made.";

/// 按字符截断（UTF-8 安全），超出部分丢弃
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    s.chars().take(max_chars).collect()
}

/// 记忆条目类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Answer,
    Vote,
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryKind::Answer => write!(f, "answer"),
            MemoryKind::Vote => write!(f, "vote"),
        }
    }
}

/// 单条记忆（类型、内容、回合、时间）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryEntry {
    pub kind: MemoryKind,
    pub content: String,
    pub round: u32,
    pub timestamp: DateTime<Utc>,
}

/// 有界记忆：超出上限按 FIFO 淘汰最旧条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryBuffer {
    entries: std::collections::VecDeque<MemoryEntry>,
    max_entries: usize,
    context_entries: usize,
    preview_chars: usize,
}

impl MemoryBuffer {
    pub fn from_config(cfg: &MemorySection) -> Self {
        Self {
            entries: std::collections::VecDeque::new(),
            max_entries: cfg.max_entries,
            context_entries: cfg.context_entries,
            preview_chars: cfg.preview_chars,
        }
    }

    pub fn with_cap(max_entries: usize) -> Self {
        Self::from_config(&MemorySection {
            max_entries,
            ..MemorySection::default()
        })
    }

    pub fn push(&mut self, kind: MemoryKind, content: String, round: u32) {
        self.entries.push_back(MemoryEntry {
            kind,
            content,
            round,
            timestamp: Utc::now(),
        });
        while self.entries.len() > self.max_entries {
            self.entries.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &MemoryEntry> {
        self.entries.iter()
    }

    /// 最近 n 条记忆（时间正序）
    pub fn recent(&self, n: usize) -> Vec<&MemoryEntry> {
        let skip = self.entries.len().saturating_sub(n);
        self.entries.iter().skip(skip).collect()
    }

    /// 渲染最近记忆为 prompt 上下文，每条截断为预览长度
    pub fn render_context(&self) -> String {
        if self.entries.is_empty() {
            return "No previous memories.".to_string();
        }
        let mut out = String::from("Recent memories:\n");
        for mem in self.recent(self.context_entries) {
            out.push_str(&format!(
                "- Round {} ({}): {}...\n",
                mem.round,
                mem.kind,
                truncate_chars(&mem.content, self.preview_chars)
            ));
        }
        out
    }
}

/// 竞技场中的一名 Agent
#[derive(Debug, Clone)]
pub struct Agent {
    pub name: String,
    /// 人格描述，决定该 Agent 所有 prompt 的行为倾向
    pub persona: String,
    pub model: String,
    /// 世代（创始为 0，子代 = 父代 + 1）
    pub generation: u32,
    /// 父代名（非拥有引用：父代可能已被淘汰，仅存在于历史名册）
    pub parent_name: Option<String>,
    pub birth_round: u32,
    pub votes_received: u32,
    pub votes_cast: u32,
    pub rounds_survived: u32,
    pub answers_given: u32,
    memory: MemoryBuffer,
}

impl Agent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        persona: impl Into<String>,
        model: impl Into<String>,
        generation: u32,
        parent_name: Option<String>,
        birth_round: u32,
        memory_cfg: &MemorySection,
    ) -> Self {
        Self {
            name: name.into(),
            persona: persona.into(),
            model: model.into(),
            generation,
            parent_name,
            birth_round,
            votes_received: 0,
            votes_cast: 0,
            rounds_survived: 0,
            answers_given: 0,
            memory: MemoryBuffer::from_config(memory_cfg),
        }
    }

    /// 创始 Agent：第 0 代，无父代
    pub fn founder(
        name: impl Into<String>,
        persona: impl Into<String>,
        model: impl Into<String>,
        memory_cfg: &MemorySection,
    ) -> Self {
        Self::new(name, persona, model, 0, None, 0, memory_cfg)
    }

    pub fn memory(&self) -> &MemoryBuffer {
        &self.memory
    }

    /// 回答题目：组装 prompt、调用生成后端、记入记忆。
    /// 生成失败降级为哨兵错误文本，原样返回并记录，不向上层抛错。
    pub async fn answer(
        &mut self,
        question: &str,
        round: u32,
        generator: &dyn ResponseGenerator,
    ) -> String {
        let prompt = format!(
            "You are {}, an AI agent with the following personality:\n{}\n\n{}\n\nQuestion: {}\n\nProvide a thoughtful answer that reflects your unique personality and perspective. Be concise but insightful (2-4 sentences).",
            self.name,
            self.persona,
            self.memory.render_context(),
            question
        );

        let answer = match generator.generate(&prompt, &self.model).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => format!("[error: {}]", e),
        };

        self.memory.push(
            MemoryKind::Answer,
            format!("Q: {} | A: {}", question, answer),
            round,
        );
        self.answers_given += 1;
        answer
    }

    /// 在候选回答中投一票，返回 (得票者名, 理由)。
    /// 候选集排除自己（除非允许自投）；候选为空时直接返回自身与固定理由，
    /// 不发起生成调用。解析出的名字不在候选集内时替换为均匀随机合法选择。
    pub async fn vote(
        &mut self,
        question: &str,
        answers: &AnswerSet,
        round: u32,
        generator: &dyn ResponseGenerator,
        allow_self_voting: bool,
        rng: &mut impl Rng,
    ) -> (String, String) {
        let exclude = if allow_self_voting { None } else { Some(self.name.as_str()) };
        let candidates = answers.excluding(exclude);

        if candidates.is_empty() {
            return (self.name.clone(), NO_OTHER_OPTIONS.to_string());
        }

        let answers_text = candidates
            .iter()
            .map(|e| format!("Agent {}:\n{}", e.agent, e.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "You are {}, an AI agent with this personality:\n{}\n\nQuestion that was asked: {}\n\nHere are the answers from different agents:\n\n{}\n\nBased on your personality and values, which agent gave the BEST answer?\nRespond with ONLY the agent's name on the first line, followed by a 1-2 sentence justification on the next line.\n\nFormat:\nAgent Name\nJustification here.",
            self.name, self.persona, question, answers_text
        );

        let response = match generator.generate(&prompt, &self.model).await {
            Ok(text) => text,
            Err(e) => format!("[error: {}]", e),
        };

        let mut lines = response.trim().splitn(2, '\n');
        let mut voted_for = lines.next().unwrap_or("").trim().to_string();
        let mut justification = lines
            .next()
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| "No justification provided.".to_string());

        // 不接受候选集外的票：替换为均匀随机合法选择
        if !candidates.iter().any(|e| e.agent == voted_for) {
            let pick = candidates
                .choose(rng)
                .map(|e| e.agent.clone())
                .unwrap_or_else(|| self.name.clone());
            voted_for = pick;
            justification = VOTE_PARSE_FAILED.to_string();
        }

        self.memory.push(
            MemoryKind::Vote,
            format!("Voted for {}: {}", voted_for, justification),
            round,
        );
        self.votes_cast += 1;

        (voted_for, justification)
    }

    /// 变异出新的人格描述：以 rate 概率从词表不放回抽取 1-2 个特质追加注记；
    /// 未命中则原样返回。不修改 Agent 自身，由调用方决定如何使用结果。
    pub fn mutate(&self, trait_pool: &[String], rate: f64, rng: &mut impl Rng) -> String {
        if trait_pool.is_empty() || !rng.gen_bool(rate.clamp(0.0, 1.0)) {
            return self.persona.clone();
        }
        let count = rng.gen_range(1..=2usize).min(trait_pool.len());
        let picked: Vec<&str> = trait_pool
            .choose_multiple(rng, count)
            .map(|s| s.as_str())
            .collect();
        format!(
            "{}\n\nEvolved traits: You are now {} compared to your predecessor.",
            self.persona,
            picked.join(", ")
        )
    }

    /// 可序列化快照（名册与报告用）
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            name: self.name.clone(),
            persona: self.persona.clone(),
            model: self.model.clone(),
            generation: self.generation,
            parent_name: self.parent_name.clone(),
            birth_round: self.birth_round,
            votes_received: self.votes_received,
            votes_cast: self.votes_cast,
            rounds_survived: self.rounds_survived,
            answers_given: self.answers_given,
            memory_count: self.memory.len(),
            recent_memories: self.memory.recent(3).into_iter().cloned().collect(),
        }
    }
}

impl std::fmt::Display for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.parent_name {
            Some(parent) => write!(f, "{} (Gen {}, parent: {})", self.name, self.generation, parent),
            None => write!(f, "{} (Gen {})", self.name, self.generation),
        }
    }
}

/// Agent 的可序列化快照
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub name: String,
    pub persona: String,
    pub model: String,
    pub generation: u32,
    pub parent_name: Option<String>,
    pub birth_round: u32,
    pub votes_received: u32,
    pub votes_cast: u32,
    pub rounds_survived: u32,
    pub answers_given: u32,
    pub memory_count: usize,
    pub recent_memories: Vec<MemoryEntry>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockGenerator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn test_agent(name: &str) -> Agent {
        Agent::founder(name, "You are terse.", "test-model", &MemorySection::default())
    }

    fn answer_set(pairs: &[(&str, &str)]) -> AnswerSet {
        let mut set = AnswerSet::new();
        for (agent, text) in pairs {
            set.push(agent.to_string(), text.to_string());
        }
        set
    }

    #[test]
    fn test_memory_cap_keeps_most_recent_in_order() {
        let mut buf = MemoryBuffer::with_cap(10);
        for i in 0..15u32 {
            buf.push(MemoryKind::Answer, format!("entry {}", i), i);
        }
        assert_eq!(buf.len(), 10);
        let contents: Vec<_> = buf.entries().map(|e| e.content.clone()).collect();
        let expected: Vec<_> = (5..15).map(|i| format!("entry {}", i)).collect();
        assert_eq!(contents, expected);
    }

    #[test]
    fn test_render_context_truncates_previews() {
        let mut buf = MemoryBuffer::with_cap(10);
        buf.push(MemoryKind::Vote, "x".repeat(500), 1);
        let ctx = buf.render_context();
        assert!(ctx.starts_with("Recent memories:"));
        assert!(ctx.contains(&"x".repeat(100)));
        assert!(!ctx.contains(&"x".repeat(101)));
    }

    #[test]
    fn test_mutate_rate_one_always_appends_traits() {
        let agent = test_agent("A");
        let pool = vec!["more terse".to_string(), "more verbose".to_string()];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let mutated = agent.mutate(&pool, 1.0, &mut rng);
            assert_ne!(mutated, agent.persona);
            assert!(mutated.contains("Evolved traits:"));
        }
    }

    #[test]
    fn test_mutate_rate_zero_returns_persona_unchanged() {
        let agent = test_agent("A");
        let pool = vec!["more terse".to_string()];
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            assert_eq!(agent.mutate(&pool, 0.0, &mut rng), agent.persona);
        }
    }

    #[tokio::test]
    async fn test_vote_self_only_returns_sentinel_without_generation() {
        let mut agent = test_agent("Solo");
        let generator = MockGenerator::new();
        let answers = answer_set(&[("Solo", "my own answer")]);
        let mut rng = StdRng::seed_from_u64(1);

        let (name, justification) = agent
            .vote("q?", &answers, 1, &generator, false, &mut rng)
            .await;

        assert_eq!(name, "Solo");
        assert_eq!(justification, NO_OTHER_OPTIONS);
        assert_eq!(generator.call_count(), 0);
    }

    #[tokio::test]
    async fn test_vote_out_of_set_name_falls_back_to_random_candidate() {
        let mut agent = test_agent("A");
        let generator = MockGenerator::with_responses(["Nobody\nBecause."]);
        let answers = answer_set(&[("A", "a"), ("B", "b"), ("C", "c")]);
        let mut rng = StdRng::seed_from_u64(1);

        let (name, justification) = agent
            .vote("q?", &answers, 1, &generator, false, &mut rng)
            .await;

        assert!(name == "B" || name == "C");
        assert_eq!(justification, VOTE_PARSE_FAILED);
        assert_eq!(agent.votes_cast, 1);
    }

    #[tokio::test]
    async fn test_vote_accepts_valid_candidate() {
        let mut agent = test_agent("A");
        let generator = MockGenerator::with_responses(["B\nSharp reasoning."]);
        let answers = answer_set(&[("A", "a"), ("B", "b")]);
        let mut rng = StdRng::seed_from_u64(1);

        let (name, justification) = agent
            .vote("q?", &answers, 1, &generator, false, &mut rng)
            .await;

        assert_eq!(name, "B");
        assert_eq!(justification, "Sharp reasoning.");
    }

    #[tokio::test]
    async fn test_answer_records_memory_and_counters() {
        let mut agent = test_agent("A");
        let generator = MockGenerator::with_responses(["  an answer  "]);
        let answer = agent.answer("q?", 3, &generator).await;

        assert_eq!(answer, "an answer");
        assert_eq!(agent.answers_given, 1);
        assert_eq!(agent.memory().len(), 1);
    }

    #[test]
    fn test_founder_has_generation_zero_and_no_parent() {
        let agent = test_agent("A");
        assert_eq!(agent.generation, 0);
        assert!(agent.parent_name.is_none());
    }
}
