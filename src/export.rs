//! 结果导出：完整 JSON 报告与轻量 CSV 摘要
//!
//! JSON 报告是权威产物（含配置、全回合记录、名册与历史）；CSV 只做
//! 电子表格友好的摘要，字段手工转义，不引第三方 CSV 依赖。

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::agent::AgentSnapshot;
use crate::config::ArenaConfig;
use crate::core::{FinalStats, RoundEngine, RoundRecord, RunState, SimError};
use crate::evolution::{CreationRecord, EliminationRecord, RosterEntry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// 由启动时刻派生的标识，如 20260828_153000
    pub simulation_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub version: String,
    pub final_state: RunState,
}

/// 一场模拟的完整可序列化报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub metadata: ReportMetadata,
    pub config: ArenaConfig,
    pub rounds: Vec<RoundRecord>,
    pub roster: Vec<RosterEntry>,
    pub eliminations: Vec<EliminationRecord>,
    pub creations: Vec<CreationRecord>,
    pub final_agents: Vec<AgentSnapshot>,
    pub stats: FinalStats,
}

impl SimulationReport {
    pub fn from_engine(engine: &RoundEngine, started_at: DateTime<Utc>) -> Self {
        Self {
            metadata: ReportMetadata {
                simulation_id: started_at.format("%Y%m%d_%H%M%S").to_string(),
                started_at,
                ended_at: Utc::now(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                final_state: engine.state(),
            },
            config: engine.config().clone(),
            rounds: engine.rounds().to_vec(),
            roster: engine.roster().to_vec(),
            eliminations: engine.evolution().eliminations().to_vec(),
            creations: engine.evolution().creations().to_vec(),
            final_agents: engine.survivors_ranked().iter().map(|a| a.snapshot()).collect(),
            stats: engine.final_stats(),
        }
    }

    /// 写出 JSON 报告，返回文件路径
    pub fn save_json(&self, dir: &Path) -> Result<PathBuf, SimError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("simulation_{}.json", self.metadata.simulation_id));
        let body = serde_json::to_string_pretty(self)?;
        fs::write(&path, body)?;
        tracing::info!("Saved JSON report to {}", path.display());
        Ok(path)
    }

    /// 逐回合摘要 CSV
    pub fn save_rounds_csv(&self, dir: &Path) -> Result<PathBuf, SimError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("rounds_{}.csv", self.metadata.simulation_id));
        let mut out = String::from("round,question,method,eliminated,spawned,survivors,timestamp\n");
        for record in &self.rounds {
            out.push_str(&format!(
                "{},{},{},{},{},{},{}\n",
                record.round,
                csv_escape(&record.question),
                record.votes.method(),
                csv_escape(record.eliminated.as_deref().unwrap_or("")),
                csv_escape(record.spawned.as_ref().map(|s| s.name.as_str()).unwrap_or("")),
                record.survivors.len(),
                record.timestamp.to_rfc3339(),
            ));
        }
        fs::write(&path, out)?;
        tracing::info!("Saved rounds CSV to {}", path.display());
        Ok(path)
    }

    /// 逐 Agent 摘要 CSV：先存活者（完整终身统计），后淘汰者
    pub fn save_agents_csv(&self, dir: &Path) -> Result<PathBuf, SimError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("agents_{}.csv", self.metadata.simulation_id));
        let mut out = String::from(
            "name,status,generation,parent,birth_round,votes_received,rounds_survived,answers_given\n",
        );
        for agent in &self.final_agents {
            out.push_str(&format!(
                "{},alive,{},{},{},{},{},{}\n",
                csv_escape(&agent.name),
                agent.generation,
                csv_escape(agent.parent_name.as_deref().unwrap_or("")),
                agent.birth_round,
                agent.votes_received,
                agent.rounds_survived,
                agent.answers_given,
            ));
        }
        for gone in &self.eliminations {
            out.push_str(&format!(
                "{},eliminated,{},{},,{},{},{}\n",
                csv_escape(&gone.agent_name),
                gone.generation,
                csv_escape(gone.parent.as_deref().unwrap_or("")),
                gone.votes_received,
                gone.rounds_survived,
                gone.answers_given,
            ));
        }
        fs::write(&path, out)?;
        tracing::info!("Saved agents CSV to {}", path.display());
        Ok(path)
    }

    /// 写出全部产物，返回生成的文件路径
    pub fn save_all(&self, dir: &Path) -> Result<Vec<PathBuf>, SimError> {
        Ok(vec![
            self.save_json(dir)?,
            self.save_rounds_csv(dir)?,
            self.save_agents_csv(dir)?,
        ])
    }
}

/// RFC 4180 风格字段转义：含逗号、引号或换行时整体加引号
fn csv_escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockGenerator;
    use crate::personas::default_personas;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    async fn sample_report() -> SimulationReport {
        let mut cfg = ArenaConfig::default();
        cfg.simulation.population = 3;
        cfg.simulation.rounds = 2;
        cfg.simulation.seed = Some(7);
        cfg.simulation.verbose = false;
        let mut engine = RoundEngine::new(cfg, Arc::new(MockGenerator::new())).unwrap();
        engine.initialize(&default_personas()).unwrap();
        let started = Utc::now();
        engine.run(&CancellationToken::new()).await.unwrap();
        SimulationReport::from_engine(&engine, started)
    }

    #[test]
    fn test_csv_escape() {
        assert_eq!(csv_escape("plain"), "plain");
        assert_eq!(csv_escape("a,b"), "\"a,b\"");
        assert_eq!(csv_escape("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[tokio::test]
    async fn test_save_json_roundtrips() {
        let report = sample_report().await;
        let dir = tempfile::tempdir().unwrap();

        let path = report.save_json(dir.path()).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let parsed: SimulationReport = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.metadata.simulation_id, report.metadata.simulation_id);
        assert_eq!(parsed.rounds.len(), 2);
        assert_eq!(parsed.final_agents.len(), 3);
    }

    #[tokio::test]
    async fn test_rounds_csv_has_row_per_round() {
        let report = sample_report().await;
        let dir = tempfile::tempdir().unwrap();

        let path = report.save_rounds_csv(dir.path()).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        assert_eq!(body.lines().count(), 1 + report.rounds.len());
        assert!(body.starts_with("round,question,method"));
    }

    #[tokio::test]
    async fn test_agents_csv_covers_alive_and_eliminated() {
        let report = sample_report().await;
        let dir = tempfile::tempdir().unwrap();

        let path = report.save_agents_csv(dir.path()).unwrap();

        let body = std::fs::read_to_string(&path).unwrap();
        let expected = 1 + report.final_agents.len() + report.eliminations.len();
        assert_eq!(body.lines().count(), expected);
        assert!(body.contains(",alive,"));
        assert!(body.contains(",eliminated,"));
    }
}
