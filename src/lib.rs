//! Arena - 多智能体进化与投票模拟竞技场
//!
//! 模块划分：
//! - **agent**: Agent 模型（人格、记忆缓冲、作答与投票行为）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 回合引擎、生命周期状态与错误类型
//! - **evolution**: 淘汰、加权亲代选择与子代生成
//! - **export**: JSON 报告与 CSV 摘要导出
//! - **llm**: 文本生成后端抽象与实现（Ollama / Mock）
//! - **observability**: tracing 日志初始化
//! - **personas**: 创始人格库（内置默认 + JSON 文件加载）
//! - **voting**: 简单多数与排序积分两种计票引擎

pub mod agent;
pub mod config;
pub mod core;
pub mod evolution;
pub mod export;
pub mod llm;
pub mod observability;
pub mod personas;
pub mod voting;

pub use crate::core::{RoundEngine, RunState, SimError};
