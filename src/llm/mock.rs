//! Mock 生成器（测试与无后端运行用）
//!
//! 按脚本队列依次出队应答，队列耗尽后回显固定文本；记录调用次数，
//! 便于测试断言「零生成调用」等边界行为。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{GeneratorError, GeneratorStats, GeneratorStatsSnapshot, ResponseGenerator};

/// Mock 生成器：脚本应答 + 调用计数
#[derive(Default)]
pub struct MockGenerator {
    scripted: Mutex<VecDeque<String>>,
    calls: AtomicU64,
    stats: GeneratorStats,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 预置脚本应答，按入队顺序消费
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            scripted: Mutex::new(responses.into_iter().map(Into::into).collect()),
            calls: AtomicU64::new(0),
            stats: GeneratorStats::new(),
        }
    }

    /// 累计 generate 调用次数
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResponseGenerator for MockGenerator {
    async fn generate(&self, _prompt: &str, _model: &str) -> Result<String, GeneratorError> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.stats.record_request();
        let next = self.scripted.lock().ok().and_then(|mut q| q.pop_front());
        Ok(next.unwrap_or_else(|| "mock response".to_string()))
    }

    async fn check_reachable(&self) -> bool {
        true
    }

    fn stats(&self) -> GeneratorStatsSnapshot {
        self.stats.snapshot()
    }
}
