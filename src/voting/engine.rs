//! 投票引擎：多数票与排序票两种计票
//!
//! 多数票：每名在场 Agent 恰投一票，按票数累计并回写终身得票计数；
//! 排序票：每名 Agent 对全部非自身候选给出完整排序，按位置给分
//! （c 名候选时第 1 名得 c 分、第 2 名得 c-1 分……），解析失败降级为
//! 均匀随机排列并打上哨兵理由。

use rand::seq::SliceRandom;
use rand::Rng;

use crate::agent::{Agent, NO_OTHER_OPTIONS};
use crate::core::SimError;
use crate::llm::ResponseGenerator;
use crate::voting::types::{
    AnswerSet, PluralityBallot, RankedBallot, Tally, VoteMethod, VoteResult,
};

/// 排序应答解析失败、改为随机排列时的固定理由
pub const RANK_PARSE_FAILED: &str = "Ranking parsing failed, random order used.";

/// 投票引擎：方法、自投票策略与历史结果
pub struct VotingEngine {
    method: VoteMethod,
    allow_self_voting: bool,
    history: Vec<VoteResult>,
}

impl VotingEngine {
    pub fn new(method: VoteMethod, allow_self_voting: bool) -> Self {
        Self {
            method,
            allow_self_voting,
            history: Vec::new(),
        }
    }

    /// 从配置构建；未知计票方法立即失败（配置错误，见 SimError::UnknownVotingMethod）
    pub fn from_config(method: &str, allow_self_voting: bool) -> Result<Self, SimError> {
        Ok(Self::new(method.parse()?, allow_self_voting))
    }

    pub fn method(&self) -> VoteMethod {
        self.method
    }

    pub fn history(&self) -> &[VoteResult] {
        &self.history
    }

    /// 组织一轮投票并计票，结果附加进历史
    pub async fn conduct(
        &mut self,
        agents: &mut [Agent],
        question: &str,
        answers: &AnswerSet,
        round: u32,
        generator: &dyn ResponseGenerator,
        rng: &mut impl Rng,
    ) -> VoteResult {
        let result = match self.method {
            VoteMethod::Plurality => {
                self.plurality_vote(agents, question, answers, round, generator, rng)
                    .await
            }
            VoteMethod::Ranked => {
                self.ranked_vote(agents, question, answers, round, generator, rng)
                    .await
            }
        };
        self.history.push(result.clone());
        result
    }

    async fn plurality_vote(
        &self,
        agents: &mut [Agent],
        question: &str,
        answers: &AnswerSet,
        round: u32,
        generator: &dyn ResponseGenerator,
        rng: &mut impl Rng,
    ) -> VoteResult {
        let mut votes: Tally<u32> = Tally::seeded(answers.names());
        let mut ballots = Vec::with_capacity(agents.len());

        for agent in agents.iter_mut() {
            let (voted_for, justification) = agent
                .vote(
                    question,
                    answers,
                    round,
                    generator,
                    self.allow_self_voting,
                    rng,
                )
                .await;
            tracing::info!("{} voted for {}", agent.name, voted_for);
            votes.add(&voted_for, 1);
            ballots.push(PluralityBallot {
                voter: agent.name.clone(),
                voted_for,
                justification,
            });
        }

        // 本轮票数回写进终身得票计数
        for agent in agents.iter_mut() {
            if let Some(count) = votes.get(&agent.name) {
                agent.votes_received += count;
            }
        }

        VoteResult::Plurality {
            round,
            question: question.to_string(),
            votes,
            ballots,
            total_votes: agents.len(),
        }
    }

    async fn ranked_vote(
        &self,
        agents: &mut [Agent],
        question: &str,
        answers: &AnswerSet,
        round: u32,
        generator: &dyn ResponseGenerator,
        rng: &mut impl Rng,
    ) -> VoteResult {
        let mut points: Tally<f64> = Tally::seeded(answers.names());
        let mut ballots = Vec::with_capacity(agents.len());
        let num_candidates = answers.len();

        for agent in agents.iter() {
            let (rankings, justification) = self
                .collect_rankings(agent, question, answers, generator, rng)
                .await;
            tracing::info!("{} submitted rankings", agent.name);

            // 位置给分：第 idx 名（0 起）得 c - idx 分
            for (idx, name) in rankings.iter().enumerate() {
                points.add(name, (num_candidates - idx) as f64);
            }
            ballots.push(RankedBallot {
                voter: agent.name.clone(),
                rankings,
                justification,
            });
        }

        VoteResult::Ranked {
            round,
            question: question.to_string(),
            points,
            ballots,
            total_votes: agents.len(),
        }
    }

    /// 向单名 Agent 征集完整排序
    async fn collect_rankings(
        &self,
        agent: &Agent,
        question: &str,
        answers: &AnswerSet,
        generator: &dyn ResponseGenerator,
        rng: &mut impl Rng,
    ) -> (Vec<String>, String) {
        let exclude = if self.allow_self_voting {
            None
        } else {
            Some(agent.name.as_str())
        };
        let candidates = answers.excluding(exclude);

        if candidates.is_empty() {
            return (vec![agent.name.clone()], NO_OTHER_OPTIONS.to_string());
        }

        let answers_text = candidates
            .iter()
            .map(|e| format!("Agent {}:\n{}", e.agent, e.text))
            .collect::<Vec<_>>()
            .join("\n\n");

        let prompt = format!(
            "You are {}. Rank ALL of the following answers from BEST to WORST.\n\nQuestion: {}\n\nAnswers:\n{}\n\nProvide your ranking as a numbered list with the agent names, followed by a brief justification.\n\nFormat:\n1. [Agent Name]\n2. [Agent Name]\n3. [Agent Name]\n...\n\nJustification: [Your reasoning]",
            agent.name, question, answers_text
        );

        let response = match generator.generate(&prompt, &agent.model).await {
            Ok(text) => text,
            Err(e) => format!("[error: {}]", e),
        };

        let candidate_names: Vec<&str> = candidates.iter().map(|e| e.agent.as_str()).collect();
        let (mut rankings, justification) = parse_rankings(&response, &candidate_names);

        if rankings.is_empty() {
            rankings = candidate_names.iter().map(|s| s.to_string()).collect();
            rankings.shuffle(rng);
            return (rankings, RANK_PARSE_FAILED.to_string());
        }

        (rankings, justification)
    }
}

/// 解析排序应答：只接受编号或 `-` 开头、且名字命中真实候选的行，
/// 其余行静默跳过；重复出现的名字只取首次。
fn parse_rankings(response: &str, candidates: &[&str]) -> (Vec<String>, String) {
    let mut rankings: Vec<String> = Vec::new();
    let mut justification = String::new();

    for line in response.lines() {
        let line = line.trim();
        if line.to_lowercase().starts_with("justification") {
            justification = line
                .split_once(':')
                .map(|(_, rest)| rest.trim().to_string())
                .unwrap_or_default();
        } else if line.starts_with(|c: char| c.is_ascii_digit()) || line.starts_with('-') {
            let name = line
                .split_once('.')
                .or_else(|| line.split_once('-'))
                .map(|(_, rest)| rest.trim());
            if let Some(name) = name {
                if candidates.contains(&name) && !rankings.iter().any(|r| r == name) {
                    rankings.push(name.to_string());
                }
            }
        }
    }

    (rankings, justification)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemorySection;
    use crate::llm::MockGenerator;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn agents(names: &[&str]) -> Vec<Agent> {
        names
            .iter()
            .map(|n| Agent::founder(*n, "persona", "m", &MemorySection::default()))
            .collect()
    }

    fn answers_for(agents: &[Agent]) -> AnswerSet {
        let mut set = AnswerSet::new();
        for a in agents {
            set.push(a.name.clone(), format!("answer from {}", a.name));
        }
        set
    }

    #[tokio::test]
    async fn test_plurality_vote_count_equals_voter_count() {
        let mut pop = agents(&["A", "B", "C"]);
        let answers = answers_for(&pop);
        // 每票都指名候选 B（对 B 自己而言 B 不在候选集里，落入随机回退）
        let generator = MockGenerator::with_responses(["B\nok", "A\nok", "B\nok"]);
        let mut engine = VotingEngine::new(VoteMethod::Plurality, false);
        let mut rng = StdRng::seed_from_u64(3);

        let result = engine
            .conduct(&mut pop, "q?", &answers, 1, &generator, &mut rng)
            .await;

        match &result {
            VoteResult::Plurality { votes, total_votes, .. } => {
                let sum: u32 = votes.entries().iter().map(|e| e.score).sum();
                assert_eq!(sum as usize, *total_votes);
                assert_eq!(*total_votes, 3);
            }
            _ => panic!("expected plurality result"),
        }
    }

    #[tokio::test]
    async fn test_tally_keys_match_candidate_set_exactly() {
        let mut pop = agents(&["A", "B", "C", "D"]);
        let answers = answers_for(&pop);
        let generator = MockGenerator::with_responses(["B\nok", "A\nok", "A\nok", "A\nok"]);
        let mut engine = VotingEngine::new(VoteMethod::Plurality, false);
        let mut rng = StdRng::seed_from_u64(3);

        let result = engine
            .conduct(&mut pop, "q?", &answers, 1, &generator, &mut rng)
            .await;

        let mut names = result.candidate_names();
        names.sort_unstable();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
        // C 与 D 零票但仍在计票表里
        match &result {
            VoteResult::Plurality { votes, .. } => {
                assert_eq!(votes.get("C"), Some(0));
                assert_eq!(votes.get("D"), Some(0));
            }
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_plurality_updates_lifetime_vote_counters() {
        let mut pop = agents(&["A", "B"]);
        let answers = answers_for(&pop);
        let generator = MockGenerator::with_responses(["B\nok", "A\nok"]);
        let mut engine = VotingEngine::new(VoteMethod::Plurality, false);
        let mut rng = StdRng::seed_from_u64(3);

        engine
            .conduct(&mut pop, "q?", &answers, 1, &generator, &mut rng)
            .await;

        assert_eq!(pop[0].votes_received, 1);
        assert_eq!(pop[1].votes_received, 1);
    }

    #[tokio::test]
    async fn test_ranked_single_voter_points_sum() {
        // 一名投票人对 c=3 候选无缺漏排序，总给分应为 3+2+1 = 6（自己名下为 0）
        let mut pop = agents(&["A", "B", "C"]);
        let answers = answers_for(&pop);
        let generator = MockGenerator::with_responses([
            "1. B\n2. C\nJustification: ok",
            "garbled",
            "garbled",
        ]);
        let mut engine = VotingEngine::new(VoteMethod::Ranked, false);
        let mut rng = StdRng::seed_from_u64(3);

        let result = engine
            .conduct(&mut pop, "q?", &answers, 1, &generator, &mut rng)
            .await;

        match &result {
            VoteResult::Ranked { points, ballots, .. } => {
                // 票 1：B 得 3 分、C 得 2 分
                assert_eq!(ballots[0].rankings, vec!["B", "C"]);
                // 票 2、3 解析失败，降级为随机排列并打哨兵理由
                assert_eq!(ballots[1].justification, RANK_PARSE_FAILED);
                assert_eq!(ballots[1].rankings.len(), 2);
                let total: f64 = points.entries().iter().map(|e| e.score).sum();
                // 每票给分 3+2=5，共 3 票
                assert_eq!(total, 15.0);
            }
            _ => panic!("expected ranked result"),
        }
    }

    #[test]
    fn test_parse_rankings_skips_malformed_lines() {
        let response = "Here are my thoughts\n1. Alpha\nnot a ranking\n2. [Beta]\n3. Gamma\nJustification: depth";
        let (rankings, justification) = parse_rankings(response, &["Alpha", "Beta", "Gamma"]);
        // [Beta] 带括号不匹配真实候选名，被跳过
        assert_eq!(rankings, vec!["Alpha", "Gamma"]);
        assert_eq!(justification, "depth");
    }

    #[test]
    fn test_parse_rankings_accepts_dash_bullets() {
        let (rankings, _) = parse_rankings("- Alpha\n- Beta", &["Alpha", "Beta"]);
        assert_eq!(rankings, vec!["Alpha", "Beta"]);
    }

    #[test]
    fn test_unknown_method_fails_fast() {
        assert!(VotingEngine::from_config("borda", false).is_err());
    }
}
