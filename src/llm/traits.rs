//! 文本生成后端抽象
//!
//! 所有后端（Ollama / Mock）实现 ResponseGenerator：generate（单条 prompt 补全）、
//! check_reachable（运行前探活）、stats（累计调用统计）。
//! 生成失败由调用层降级为哨兵错误文本，不向回合引擎抛致命错误。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 生成调用的错误分类：超时 / 传输失败 / 上游非 2xx 状态
#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("request timeout")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream status {0}: {1}")]
    Status(u16, String),
}

impl From<reqwest::Error> for GeneratorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GeneratorError::Timeout
        } else {
            GeneratorError::Transport(e.to_string())
        }
    }
}

/// 调用统计（累计值，跨线程共享）
#[derive(Debug, Clone, Default)]
pub struct GeneratorStats {
    pub total_requests: Arc<AtomicU64>,
    pub failed_requests: Arc<AtomicU64>,
}

impl GeneratorStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> GeneratorStatsSnapshot {
        let total = self.total_requests.load(Ordering::Relaxed);
        let failed = self.failed_requests.load(Ordering::Relaxed);
        let success_rate = if total > 0 {
            (total - failed) as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        GeneratorStatsSnapshot {
            total_requests: total,
            failed_requests: failed,
            success_rate,
        }
    }
}

/// 统计快照（进入最终报告）
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GeneratorStatsSnapshot {
    pub total_requests: u64,
    pub failed_requests: u64,
    /// 成功率（百分比）
    pub success_rate: f64,
}

/// 文本生成后端 trait
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    /// 单条 prompt 补全；重试策略由实现方负责
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, GeneratorError>;

    /// 运行前探活：不可达则整个模拟以 Failed 终止
    async fn check_reachable(&self) -> bool;

    /// 累计调用统计快照
    fn stats(&self) -> GeneratorStatsSnapshot {
        GeneratorStatsSnapshot::default()
    }
}
