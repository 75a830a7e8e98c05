//! 演化模块：淘汰 / 生成引擎与历史记录类型

pub mod engine;
pub mod types;

pub use engine::EvolutionEngine;
pub use types::{CreationRecord, EliminationRecord, GenerationStats, RosterEntry};
