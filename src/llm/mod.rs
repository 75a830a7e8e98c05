//! 生成层：文本生成后端抽象与实现（Ollama / Mock）

use std::sync::Arc;

pub mod mock;
pub mod ollama;
pub mod traits;

pub use mock::MockGenerator;
pub use ollama::OllamaGenerator;
pub use traits::{GeneratorError, GeneratorStats, GeneratorStatsSnapshot, ResponseGenerator};

use crate::config::ArenaConfig;

/// 根据配置选择生成后端：provider 为 mock（或显式要求）时走 Mock，否则走 Ollama
pub fn create_generator_from_config(cfg: &ArenaConfig) -> Arc<dyn ResponseGenerator> {
    match cfg.generator.provider.to_lowercase().as_str() {
        "mock" => {
            tracing::warn!("Using mock generator, responses are canned");
            Arc::new(MockGenerator::new())
        }
        _ => {
            tracing::info!(
                "Using Ollama at {} (model {})",
                cfg.generator.base_url,
                cfg.generator.model
            );
            Arc::new(OllamaGenerator::new(&cfg.generator))
        }
    }
}
