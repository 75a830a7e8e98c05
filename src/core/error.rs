//! 模拟层错误类型

use thiserror::Error;

/// 模拟不可恢复错误。单次生成失败不在此列：答案与投票在
/// Agent 层降级为哨兵文本，模拟继续运行。
#[derive(Debug, Error)]
pub enum SimError {
    #[error("generator unreachable at {0}")]
    GeneratorUnreachable(String),

    #[error("unknown voting method: {0}")]
    UnknownVotingMethod(String),

    #[error("population is empty, cannot continue")]
    EmptyPopulation,

    #[error("config error: {0}")]
    Config(String),

    #[error("export io error: {0}")]
    Export(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}
