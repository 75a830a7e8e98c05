//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `ARENA__*` 覆盖
//! （双下划线表示嵌套，如 `ARENA__VOTING__METHOD=ranked`）。

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    pub generator: GeneratorSection,
    pub simulation: SimulationSection,
    pub voting: VotingSection,
    pub evolution: EvolutionSection,
    pub memory: MemorySection,
    pub export: ExportSection,
    /// 题目不足回合数时按模循环补齐
    #[serde(default = "default_questions")]
    pub questions: Vec<String>,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            generator: GeneratorSection::default(),
            simulation: SimulationSection::default(),
            voting: VotingSection::default(),
            evolution: EvolutionSection::default(),
            memory: MemorySection::default(),
            export: ExportSection::default(),
            questions: default_questions(),
        }
    }
}

/// [generator] 段：后端选择、端点与重试
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorSection {
    /// 后端：ollama / mock
    pub provider: String,
    pub base_url: String,
    /// 所有 Agent 共用的默认模型
    pub model: String,
    /// 单次请求超时（秒）
    pub timeout_secs: u64,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub max_retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for GeneratorSection {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            model: "llama2".to_string(),
            timeout_secs: 120,
            temperature: 0.7,
            max_tokens: None,
            max_retries: 3,
            retry_delay_secs: 2,
        }
    }
}

/// [simulation] 段：种群规模、回合数、自投票、随机种子
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub population: usize,
    pub rounds: u32,
    pub allow_self_voting: bool,
    /// 固定随机种子（给定则整个模拟可复现）
    pub seed: Option<u64>,
    pub verbose: bool,
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            population: 8,
            rounds: 8,
            allow_self_voting: false,
            seed: None,
            verbose: true,
        }
    }
}

/// [voting] 段：计票方法（plurality / ranked），未知值在引擎构建时立即失败
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VotingSection {
    pub method: String,
}

impl Default for VotingSection {
    fn default() -> Self {
        Self {
            method: "plurality".to_string(),
        }
    }
}

/// [evolution] 段：变异率与特质词表
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionSection {
    /// 变异概率（0..1）
    pub mutation_rate: f64,
    pub traits: Vec<String>,
}

impl Default for EvolutionSection {
    fn default() -> Self {
        Self {
            mutation_rate: 0.3,
            traits: default_mutation_traits(),
        }
    }
}

fn default_mutation_traits() -> Vec<String> {
    [
        "more analytical",
        "more creative",
        "more skeptical",
        "more optimistic",
        "more concise",
        "more detailed",
        "more humorous",
        "more serious",
        "more technical",
        "more philosophical",
        "more practical",
        "more abstract",
        "more empathetic",
        "more logical",
        "more intuitive",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// [memory] 段：Agent 记忆上限与 prompt 中的记忆渲染
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySection {
    /// 记忆条数上限，超出按 FIFO 淘汰最旧
    pub max_entries: usize,
    /// prompt 中渲染的最近记忆条数
    pub context_entries: usize,
    /// 每条记忆预览的最大字符数
    pub preview_chars: usize,
}

impl Default for MemorySection {
    fn default() -> Self {
        Self {
            max_entries: 10,
            context_entries: 5,
            preview_chars: 100,
        }
    }
}

/// [export] 段：结果输出目录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    pub dir: PathBuf,
}

impl Default for ExportSection {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
        }
    }
}

fn default_questions() -> Vec<String> {
    [
        "What is the most important quality for survival in a competitive environment?",
        "How should AI systems make ethical decisions?",
        "What is the meaning of intelligence?",
        "How can we solve climate change effectively?",
        "What makes a good leader?",
        "Should AI have rights?",
        "What is the future of human-AI collaboration?",
        "How do we balance innovation with safety?",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// 从 config 目录加载配置，环境变量 ARENA__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 ARENA__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<ArenaConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("ARENA")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
