//! 回合引擎：驱动 回答 → 投票 → 淘汰 → 生成 的主循环
//!
//! 种群规模不变式：每回合结束时在场 Agent 数等于初始规模（淘汰一名、
//! 生成一名）。唯一例外是淘汰目标不在场（计票键与种群脱节），此时
//! 跳过本回合的生成并告警，下一回合继续。
//!
//! 单一 StdRng 贯穿全程：给定 seed 与脚本化生成后端，整个模拟可复现。

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, AgentSnapshot};
use crate::config::ArenaConfig;
use crate::core::{RunState, SimError};
use crate::evolution::{EvolutionEngine, GenerationStats, RosterEntry};
use crate::llm::{GeneratorStatsSnapshot, ResponseGenerator};
use crate::personas::Persona;
use crate::voting::{AnswerSet, VoteResult, VotingEngine};

/// 单回合完整记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundRecord {
    pub round: u32,
    pub question: String,
    pub answers: AnswerSet,
    pub votes: VoteResult,
    /// 本回合被淘汰的 Agent 名；淘汰目标缺失时为 None
    pub eliminated: Option<String>,
    /// 本回合新生 Agent 的快照；未生成时为 None
    pub spawned: Option<AgentSnapshot>,
    /// 回合结束时的在场名单（种群顺序）
    pub survivors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

/// 模拟结束时的汇总统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalStats {
    pub total_rounds: u32,
    pub eliminations: usize,
    pub creations: usize,
    pub generation: GenerationStats,
    pub generator: GeneratorStatsSnapshot,
}

/// 回合引擎：持有种群、历史名册、投票与演化引擎及全局 RNG
pub struct RoundEngine {
    cfg: ArenaConfig,
    generator: Arc<dyn ResponseGenerator>,
    voting: VotingEngine,
    evolution: EvolutionEngine,
    rng: StdRng,
    population: Vec<Agent>,
    roster: Vec<RosterEntry>,
    rounds: Vec<RoundRecord>,
    state: RunState,
}

impl RoundEngine {
    pub fn new(cfg: ArenaConfig, generator: Arc<dyn ResponseGenerator>) -> Result<Self, SimError> {
        let voting = VotingEngine::from_config(&cfg.voting.method, cfg.simulation.allow_self_voting)?;
        let evolution = EvolutionEngine::new(cfg.evolution.mutation_rate, cfg.evolution.traits.clone());
        let rng = match cfg.simulation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            cfg,
            generator,
            voting,
            evolution,
            rng,
            population: Vec::new(),
            roster: Vec::new(),
            rounds: Vec::new(),
            state: RunState::Idle,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn population(&self) -> &[Agent] {
        &self.population
    }

    pub fn roster(&self) -> &[RosterEntry] {
        &self.roster
    }

    pub fn rounds(&self) -> &[RoundRecord] {
        &self.rounds
    }

    pub fn evolution(&self) -> &EvolutionEngine {
        &self.evolution
    }

    pub fn config(&self) -> &ArenaConfig {
        &self.cfg
    }

    /// 谱系回溯：历史名册上由老到新的祖先链
    pub fn lineage_of(&self, name: &str) -> Vec<String> {
        EvolutionEngine::lineage(name, &self.roster)
    }

    /// 在场 Agent 按终身得票降序
    pub fn survivors_ranked(&self) -> Vec<&Agent> {
        let mut ranked: Vec<&Agent> = self.population.iter().collect();
        ranked.sort_by(|a, b| b.votes_received.cmp(&a.votes_received));
        ranked
    }

    pub fn final_stats(&self) -> FinalStats {
        FinalStats {
            total_rounds: self.rounds.len() as u32,
            eliminations: self.evolution.eliminations().len(),
            creations: self.evolution.creations().len(),
            generation: EvolutionEngine::generation_stats(&self.population),
            generator: self.generator.stats(),
        }
    }

    /// 创建创始种群：人格按模取循环分配，重复人格的名字加序号消歧
    pub fn initialize(&mut self, personas: &[Persona]) -> Result<(), SimError> {
        if personas.is_empty() {
            return Err(SimError::Config("no personas available".into()));
        }
        self.state = RunState::Initializing;
        self.population.clear();
        self.roster.clear();
        self.rounds.clear();

        for i in 0..self.cfg.simulation.population {
            let source = &personas[i % personas.len()];
            let name = if i < personas.len() {
                source.name.clone()
            } else {
                format!("{} {}", source.name, i / personas.len() + 1)
            };
            let agent = Agent::founder(
                name,
                source.persona.clone(),
                &self.cfg.generator.model,
                &self.cfg.memory,
            );
            self.roster.push(RosterEntry {
                name: agent.name.clone(),
                generation: 0,
                parent_name: None,
                birth_round: 0,
            });
            tracing::info!("Founder joined: {}", agent.name);
            self.population.push(agent);
        }
        Ok(())
    }

    /// 运行整场模拟。回合之间检查取消令牌；取消是干净停止而非错误。
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), SimError> {
        if self.cfg.questions.is_empty() {
            self.state = RunState::Failed;
            return Err(SimError::Config("question list is empty".into()));
        }
        if self.population.is_empty() {
            self.state = RunState::Failed;
            return Err(SimError::EmptyPopulation);
        }
        if !self.generator.check_reachable().await {
            self.state = RunState::Failed;
            return Err(SimError::GeneratorUnreachable(
                self.cfg.generator.base_url.clone(),
            ));
        }

        self.state = RunState::Running;
        let questions = self.cfg.questions.clone();
        let total_rounds = self.cfg.simulation.rounds;

        for round in 1..=total_rounds {
            if cancel.is_cancelled() {
                tracing::warn!("cancellation requested, stopping after round {}", round - 1);
                self.state = RunState::Interrupted;
                return Ok(());
            }
            let question = &questions[(round - 1) as usize % questions.len()];
            self.run_round(question, round).await;
        }

        self.state = RunState::Finalizing;
        let stats = self.final_stats();
        tracing::info!(
            "Simulation complete: {} rounds, {} eliminations, avg generation {:.2}",
            stats.total_rounds,
            stats.eliminations,
            stats.generation.average_generation
        );
        self.state = RunState::Complete;
        Ok(())
    }

    /// 单回合：存活计数自增 → 顺序作答 → 投票 → 淘汰最低分 → 生成子代
    async fn run_round(&mut self, question: &str, round: u32) {
        tracing::info!("=== Round {}/{} ===", round, self.cfg.simulation.rounds);
        tracing::info!("Question: {}", question);

        for agent in &mut self.population {
            agent.rounds_survived += 1;
        }

        let mut answers = AnswerSet::new();
        for agent in &mut self.population {
            let text = agent.answer(question, round, self.generator.as_ref()).await;
            if self.cfg.simulation.verbose {
                tracing::info!("{} answered ({} chars)", agent.name, text.chars().count());
            }
            answers.push(agent.name.clone(), text);
        }

        let votes = self
            .voting
            .conduct(
                &mut self.population,
                question,
                &answers,
                round,
                self.generator.as_ref(),
                &mut self.rng,
            )
            .await;
        if self.cfg.simulation.verbose {
            tracing::info!("{}", votes.summary());
        }

        let loser = votes.loser().map(str::to_string);
        let mut eliminated = None;
        let mut spawned = None;
        if let Some(loser_name) = loser {
            match self.evolution.eliminate(
                &mut self.population,
                &loser_name,
                round,
                "Received fewest votes",
            ) {
                Some(gone) => {
                    eliminated = Some(gone.name);
                    let taken: HashSet<String> =
                        self.roster.iter().map(|e| e.name.clone()).collect();
                    match self.evolution.spawn(
                        &self.population,
                        round,
                        &self.cfg.generator.model,
                        &self.cfg.memory,
                        &taken,
                        &mut self.rng,
                    ) {
                        Ok(child) => {
                            self.roster.push(RosterEntry {
                                name: child.name.clone(),
                                generation: child.generation,
                                parent_name: child.parent_name.clone(),
                                birth_round: child.birth_round,
                            });
                            spawned = Some(child.snapshot());
                            self.population.push(child);
                        }
                        Err(e) => {
                            tracing::warn!("spawn skipped in round {}: {}", round, e);
                        }
                    }
                }
                None => {
                    // 计票键与种群脱节：跳过生成，保持名册一致
                    tracing::warn!(
                        "elimination target {} not in population, skipping spawn",
                        loser_name
                    );
                }
            }
        }

        self.rounds.push(RoundRecord {
            round,
            question: question.to_string(),
            answers,
            votes,
            eliminated,
            spawned,
            survivors: self.population.iter().map(|a| a.name.clone()).collect(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockGenerator;
    use crate::personas::default_personas;
    use async_trait::async_trait;

    fn test_config(population: usize, rounds: u32) -> ArenaConfig {
        let mut cfg = ArenaConfig::default();
        cfg.simulation.population = population;
        cfg.simulation.rounds = rounds;
        cfg.simulation.seed = Some(42);
        cfg.simulation.verbose = false;
        cfg
    }

    struct DownGenerator;

    #[async_trait]
    impl ResponseGenerator for DownGenerator {
        async fn generate(&self, _prompt: &str, _model: &str) -> Result<String, crate::llm::GeneratorError> {
            Err(crate::llm::GeneratorError::Timeout)
        }

        async fn check_reachable(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_population_size_stays_constant() {
        let mut engine =
            RoundEngine::new(test_config(4, 3), Arc::new(MockGenerator::new())).unwrap();
        engine.initialize(&default_personas()).unwrap();
        let cancel = CancellationToken::new();

        engine.run(&cancel).await.unwrap();

        assert_eq!(engine.state(), RunState::Complete);
        assert_eq!(engine.population().len(), 4);
        assert_eq!(engine.rounds().len(), 3);
        for record in engine.rounds() {
            assert_eq!(record.survivors.len(), 4);
            assert!(record.eliminated.is_some());
            assert!(record.spawned.is_some());
        }
        // 名册 = 创始 + 每回合一名新生
        assert_eq!(engine.roster().len(), 4 + 3);
        assert_eq!(engine.evolution().eliminations().len(), 3);
        assert_eq!(engine.evolution().creations().len(), 3);
    }

    #[tokio::test]
    async fn test_questions_cycle_when_fewer_than_rounds() {
        let mut cfg = test_config(3, 3);
        cfg.questions = vec!["Q-one?".into(), "Q-two?".into()];
        let mut engine = RoundEngine::new(cfg, Arc::new(MockGenerator::new())).unwrap();
        engine.initialize(&default_personas()).unwrap();

        engine.run(&CancellationToken::new()).await.unwrap();

        assert_eq!(engine.rounds()[0].question, "Q-one?");
        assert_eq!(engine.rounds()[1].question, "Q-two?");
        assert_eq!(engine.rounds()[2].question, "Q-one?");
    }

    #[tokio::test]
    async fn test_unreachable_generator_fails_before_rounds() {
        let mut engine = RoundEngine::new(test_config(3, 2), Arc::new(DownGenerator)).unwrap();
        engine.initialize(&default_personas()).unwrap();

        let result = engine.run(&CancellationToken::new()).await;

        assert!(matches!(result, Err(SimError::GeneratorUnreachable(_))));
        assert_eq!(engine.state(), RunState::Failed);
        assert!(engine.rounds().is_empty());
    }

    #[tokio::test]
    async fn test_cancellation_interrupts_cleanly() {
        let mut engine =
            RoundEngine::new(test_config(3, 5), Arc::new(MockGenerator::new())).unwrap();
        engine.initialize(&default_personas()).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        engine.run(&cancel).await.unwrap();

        assert_eq!(engine.state(), RunState::Interrupted);
        assert!(engine.rounds().is_empty());
    }

    #[tokio::test]
    async fn test_initialize_cycles_personas_with_unique_names() {
        let mut engine =
            RoundEngine::new(test_config(10, 1), Arc::new(MockGenerator::new())).unwrap();
        engine.initialize(&default_personas()).unwrap();

        let names: HashSet<&str> = engine.population().iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names.len(), 10);
        assert!(names.contains("The Philosopher"));
        assert!(names.contains("The Philosopher 2"));
    }

    #[tokio::test]
    async fn test_same_seed_same_outcome() {
        let personas = default_personas();
        let mut outcomes = Vec::new();
        for _ in 0..2 {
            let mut engine =
                RoundEngine::new(test_config(4, 2), Arc::new(MockGenerator::new())).unwrap();
            engine.initialize(&personas).unwrap();
            engine.run(&CancellationToken::new()).await.unwrap();
            let eliminated: Vec<Option<String>> =
                engine.rounds().iter().map(|r| r.eliminated.clone()).collect();
            outcomes.push(eliminated);
        }
        assert_eq!(outcomes[0], outcomes[1]);
    }
}
