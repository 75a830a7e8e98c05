//! Ollama HTTP 客户端
//!
//! 调用 /api/generate（非流式）完成补全，/api/tags 探活；
//! 单次请求受超时约束，失败按固定间隔重试至多 max_retries 次。

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::config::GeneratorSection;
use crate::llm::{GeneratorError, GeneratorStats, GeneratorStatsSnapshot, ResponseGenerator};

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama 客户端：持有 reqwest Client 与生成参数，统计累计调用次数
pub struct OllamaGenerator {
    client: reqwest::Client,
    base_url: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_retries: u32,
    retry_delay: Duration,
    stats: GeneratorStats,
}

impl OllamaGenerator {
    pub fn new(cfg: &GeneratorSection) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .unwrap_or_default();

        Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
            max_retries: cfg.max_retries,
            retry_delay: Duration::from_secs(cfg.retry_delay_secs),
            stats: GeneratorStats::new(),
        }
    }

    /// 单次 /api/generate 调用，不含重试
    async fn generate_once(&self, prompt: &str, model: &str) -> Result<String, GeneratorError> {
        self.stats.record_request();

        let mut options = json!({ "temperature": self.temperature });
        if let Some(n) = self.max_tokens {
            options["num_predict"] = json!(n);
        }
        let payload = json!({
            "model": model,
            "prompt": prompt,
            "stream": false,
            "options": options,
        });

        let url = format!("{}/api/generate", self.base_url);
        let resp = self.client.post(&url).json(&payload).send().await;

        let resp = match resp {
            Ok(r) => r,
            Err(e) => {
                self.stats.record_failure();
                return Err(e.into());
            }
        };

        let status = resp.status();
        if !status.is_success() {
            self.stats.record_failure();
            let body = resp.text().await.unwrap_or_default();
            return Err(GeneratorError::Status(status.as_u16(), body));
        }

        let data: GenerateResponse = match resp.json().await {
            Ok(d) => d,
            Err(e) => {
                self.stats.record_failure();
                return Err(e.into());
            }
        };
        Ok(data.response.trim().to_string())
    }
}

#[async_trait]
impl ResponseGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str, model: &str) -> Result<String, GeneratorError> {
        let mut last_err = GeneratorError::Transport("no attempt made".into());
        for attempt in 0..self.max_retries.max(1) {
            match self.generate_once(prompt, model).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    tracing::warn!(
                        "generation attempt {}/{} failed: {}",
                        attempt + 1,
                        self.max_retries.max(1),
                        e
                    );
                    last_err = e;
                }
            }
            if attempt + 1 < self.max_retries.max(1) {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        Err(last_err)
    }

    async fn check_reachable(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(r) => r.status().is_success(),
            Err(e) => {
                tracing::error!("Ollama connection failed: {}", e);
                false
            }
        }
    }

    fn stats(&self) -> GeneratorStatsSnapshot {
        self.stats.snapshot()
    }
}
