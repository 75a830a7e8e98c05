//! 模拟生命周期状态机

use std::fmt;

use serde::{Deserialize, Serialize};

/// 模拟状态。合法迁移：Idle → Initializing → Running → Finalizing →
/// Complete；Running 途中取消 → Interrupted，不可恢复错误 → Failed。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Initializing,
    Running,
    Finalizing,
    Complete,
    Failed,
    Interrupted,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RunState::Idle => "idle",
            RunState::Initializing => "initializing",
            RunState::Running => "running",
            RunState::Finalizing => "finalizing",
            RunState::Complete => "complete",
            RunState::Failed => "failed",
            RunState::Interrupted => "interrupted",
        };
        f.write_str(label)
    }
}
