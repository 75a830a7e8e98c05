//! Arena - 多智能体进化与投票模拟竞技场
//!
//! 入口：解析命令行、加载配置、初始化日志，运行整场模拟并导出结果。

use std::path::PathBuf;

use anyhow::Context;
use arena::config::load_config;
use arena::core::RoundEngine;
use arena::export::SimulationReport;
use arena::llm::create_generator_from_config;
use arena::observability::init_tracing;
use arena::personas::{default_personas, load_personas};
use chrono::Utc;
use clap::Parser;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "arena", version, about = "LLM agent evolution arena")]
struct Cli {
    /// 配置文件路径（TOML）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 初始 Agent 数量
    #[arg(short, long)]
    agents: Option<usize>,

    /// 回合数
    #[arg(short, long)]
    rounds: Option<u32>,

    /// 生成后端模型名
    #[arg(short, long)]
    model: Option<String>,

    /// 计票方法：plurality 或 ranked
    #[arg(long)]
    voting: Option<String>,

    /// 题目文件（JSON 字符串数组），缺省用内置题库
    #[arg(long)]
    questions: Option<PathBuf>,

    /// 人格库文件（JSON），缺省用内置人格
    #[arg(long)]
    personas: Option<PathBuf>,

    /// RNG 种子；给定后配合脚本化后端整场可复现
    #[arg(long)]
    seed: Option<u64>,

    /// 结果输出目录
    #[arg(long)]
    export_dir: Option<PathBuf>,

    /// 仅输出 warn 及以上日志
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(if cli.quiet { "warn" } else { "info" });

    println!("==========================================");
    println!("  Arena - agent evolution simulator");
    println!("==========================================");

    // 配置：文件 + 环境变量，命令行最后覆盖
    let mut cfg = load_config(cli.config).context("Failed to load config")?;
    if let Some(agents) = cli.agents {
        cfg.simulation.population = agents;
    }
    if let Some(rounds) = cli.rounds {
        cfg.simulation.rounds = rounds;
    }
    if let Some(model) = cli.model {
        cfg.generator.model = model;
    }
    if let Some(voting) = cli.voting {
        cfg.voting.method = voting;
    }
    if let Some(seed) = cli.seed {
        cfg.simulation.seed = Some(seed);
    }
    if let Some(dir) = cli.export_dir {
        cfg.export.dir = dir;
    }
    if let Some(path) = cli.questions {
        let body = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read questions from {}", path.display()))?;
        cfg.questions = serde_json::from_str(&body)
            .with_context(|| format!("Invalid questions file {}", path.display()))?;
    }

    let personas = match cli.personas {
        Some(path) => load_personas(&path),
        None => default_personas(),
    };

    let generator = create_generator_from_config(&cfg);
    let mut engine =
        RoundEngine::new(cfg, generator).context("Failed to build round engine")?;
    engine.initialize(&personas).context("Failed to create founding population")?;

    // Ctrl-C：当前回合跑完后干净停止
    let cancel = CancellationToken::new();
    let handle = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Ctrl-C received, stopping after the current round");
            handle.cancel();
        }
    });

    let started = Utc::now();
    let run_result = engine.run(&cancel).await;

    if !engine.rounds().is_empty() {
        println!("\nFinal standings ({}):", engine.state());
        for (rank, agent) in engine.survivors_ranked().iter().enumerate() {
            println!(
                "{:>3}. {} (gen {}, {} votes, survived {} rounds)",
                rank + 1,
                agent.name,
                agent.generation,
                agent.votes_received,
                agent.rounds_survived
            );
        }

        let report = SimulationReport::from_engine(&engine, started);
        let export_dir = engine.config().export.dir.clone();
        let paths = report.save_all(&export_dir).context("Failed to export results")?;
        println!("\nExported:");
        for path in paths {
            println!("  {}", path.display());
        }
    }

    run_result.context("Simulation failed")?;
    Ok(())
}
