//! 核心模块：错误类型、生命周期状态与回合引擎

pub mod engine;
pub mod error;
pub mod state;

pub use engine::{FinalStats, RoundEngine, RoundRecord};
pub use error::SimError;
pub use state::RunState;
