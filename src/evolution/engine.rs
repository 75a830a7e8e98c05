//! 演化引擎：淘汰、按适应度加权的亲代选择与子代生成
//!
//! 亲代权重 = 终身得票 + 1（零票也有被选概率）；全员权重相同时改按
//! 存活回合 + 1 加权，避免无视资历的退化均匀抽样。子代人格 = 亲代人格 +
//! 变异注记（未变异时追加固定的 refined 注记，保证与亲代文本不同）。

use std::collections::HashSet;

use chrono::Utc;
use rand::distributions::WeightedIndex;
use rand::prelude::Distribution;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::agent::{truncate_chars, Agent};
use crate::config::MemorySection;
use crate::core::SimError;
use crate::evolution::types::{
    CreationRecord, EliminationRecord, GenerationStats, RosterEntry, EVOLUTION_SUFFIXES,
    NAME_ADJECTIVES, NAME_NOUNS,
};

/// 淘汰记录中人格预览的截断长度
const PERSONA_PREVIEW_CHARS: usize = 200;

/// 演化引擎：变异参数与 append-only 淘汰 / 创建历史
pub struct EvolutionEngine {
    mutation_rate: f64,
    trait_pool: Vec<String>,
    eliminations: Vec<EliminationRecord>,
    creations: Vec<CreationRecord>,
}

impl EvolutionEngine {
    pub fn new(mutation_rate: f64, trait_pool: Vec<String>) -> Self {
        Self {
            mutation_rate: mutation_rate.clamp(0.0, 1.0),
            trait_pool,
            eliminations: Vec::new(),
            creations: Vec::new(),
        }
    }

    pub fn eliminations(&self) -> &[EliminationRecord] {
        &self.eliminations
    }

    pub fn creations(&self) -> &[CreationRecord] {
        &self.creations
    }

    /// 从种群移除首个名字匹配的 Agent 并记录淘汰；名字不存在时返回 None
    /// （可恢复条件：调用方用计票键推导名字，正常情况下必然在场）。
    pub fn eliminate(
        &mut self,
        population: &mut Vec<Agent>,
        loser_name: &str,
        round: u32,
        reason: &str,
    ) -> Option<Agent> {
        let idx = population.iter().position(|a| a.name == loser_name)?;
        let eliminated = population.remove(idx);

        self.eliminations.push(EliminationRecord {
            round,
            agent_name: eliminated.name.clone(),
            generation: eliminated.generation,
            parent: eliminated.parent_name.clone(),
            rounds_survived: eliminated.rounds_survived,
            votes_received: eliminated.votes_received,
            answers_given: eliminated.answers_given,
            reason: reason.to_string(),
            persona_preview: truncate_chars(&eliminated.persona, PERSONA_PREVIEW_CHARS),
            timestamp: Utc::now(),
        });

        tracing::info!(
            "Eliminated {} (gen {}, survived {} rounds): {}",
            eliminated.name,
            eliminated.generation,
            eliminated.rounds_survived,
            reason
        );
        Some(eliminated)
    }

    /// 加权随机选择亲代；调用方保证种群非空
    pub fn select_parent<'a>(&self, population: &'a [Agent], rng: &mut impl Rng) -> &'a Agent {
        let mut weights: Vec<u32> = population.iter().map(|a| a.votes_received + 1).collect();
        if weights.windows(2).all(|w| w[0] == w[1]) {
            weights = population.iter().map(|a| a.rounds_survived + 1).collect();
        }
        let idx = WeightedIndex::new(&weights)
            .map(|dist| dist.sample(rng))
            .unwrap_or(0);
        &population[idx]
    }

    /// 生成子代：选亲代、演化人格、合成唯一名字，并记录创建历史。
    /// taken_names 为全部历史名字（名册按名索引，名字必须全局唯一）。
    pub fn spawn(
        &mut self,
        population: &[Agent],
        round: u32,
        model: &str,
        memory_cfg: &MemorySection,
        taken_names: &HashSet<String>,
        rng: &mut impl Rng,
    ) -> Result<Agent, SimError> {
        if population.is_empty() {
            return Err(SimError::EmptyPopulation);
        }

        let parent = self.select_parent(population, rng);
        let (persona, traits_applied) = self.evolve_persona(parent, rng);
        let name = self.synth_name(parent, taken_names, rng);

        let child = Agent::new(
            name,
            persona,
            model,
            parent.generation + 1,
            Some(parent.name.clone()),
            round,
            memory_cfg,
        );

        self.creations.push(CreationRecord {
            round,
            agent_name: child.name.clone(),
            generation: child.generation,
            parent: parent.name.clone(),
            persona_preview: truncate_chars(&child.persona, PERSONA_PREVIEW_CHARS),
            traits_applied,
            timestamp: Utc::now(),
        });

        tracing::info!(
            "New agent evolved: {} (gen {}, parent {})",
            child.name,
            child.generation,
            parent.name
        );
        Ok(child)
    }

    /// 演化人格：以变异率抽 1-3 个特质追加注记，否则追加固定 refined 注记；
    /// 返回新人格与显式的已用特质列表
    fn evolve_persona(&self, parent: &Agent, rng: &mut impl Rng) -> (String, Vec<String>) {
        if !self.trait_pool.is_empty() && rng.gen_bool(self.mutation_rate) {
            let count = rng.gen_range(1..=3usize).min(self.trait_pool.len());
            let picked: Vec<String> = self
                .trait_pool
                .choose_multiple(rng, count)
                .cloned()
                .collect();
            let persona = format!(
                "{}\n\nEvolved traits: You have evolved to be {}. You inherit your parent's core values but express them through these new traits.",
                parent.persona,
                picked.join(", ")
            );
            (persona, picked)
        } else {
            let persona = format!(
                "{}\n\nYou are a refined version of your predecessor, maintaining their core philosophy.",
                parent.persona
            );
            (persona, Vec::new())
        }
    }

    /// 合成子代名字：多数概率沿用 "{父名} {后缀}"，否则合成 "The {形容词} {名词}"；
    /// 与历史名册重名时重试，重试用尽后追加数字消歧
    fn synth_name(
        &self,
        parent: &Agent,
        taken_names: &HashSet<String>,
        rng: &mut impl Rng,
    ) -> String {
        let mut candidate = String::new();
        for _ in 0..16 {
            candidate = if rng.gen_bool(0.6) {
                let suffix = EVOLUTION_SUFFIXES.choose(rng).copied().unwrap_or("Neo");
                format!("{} {}", parent.name, suffix)
            } else {
                let adj = NAME_ADJECTIVES.choose(rng).copied().unwrap_or("Adaptive");
                let noun = NAME_NOUNS.choose(rng).copied().unwrap_or("Mind");
                format!("The {} {}", adj, noun)
            };
            if !taken_names.contains(&candidate) {
                return candidate;
            }
        }
        format!("{} [{}]", candidate, taken_names.len())
    }

    /// 沿 parent_name 在历史名册上回溯谱系，返回由老到新的名字序列；
    /// 祖先缺失是正常终止条件而非错误
    pub fn lineage(start: &str, roster: &[RosterEntry]) -> Vec<String> {
        let mut chain = vec![start.to_string()];
        let mut current = roster.iter().find(|e| e.name == start);

        while let Some(entry) = current {
            match &entry.parent_name {
                Some(parent) => {
                    chain.push(parent.clone());
                    current = roster.iter().find(|e| &e.name == parent);
                }
                None => break,
            }
        }

        chain.reverse();
        chain
    }

    /// 存活种群的世代统计
    pub fn generation_stats(population: &[Agent]) -> GenerationStats {
        if population.is_empty() {
            return GenerationStats::default();
        }
        let generations: Vec<u32> = population.iter().map(|a| a.generation).collect();
        let sum: u32 = generations.iter().sum();
        let distinct: HashSet<u32> = generations.iter().copied().collect();
        GenerationStats {
            average_generation: f64::from(sum) / generations.len() as f64,
            max_generation: generations.iter().copied().max().unwrap_or(0),
            min_generation: generations.iter().copied().min().unwrap_or(0),
            generation_diversity: distinct.len(),
        }
    }
}
