//! State - ノードのライフサイクル状態と終了コード

use serde::{Deserialize, Serialize};

/// NodeState はステージのライフサイクル状態
///
/// # 状態遷移
/// - Stopped -> Started: `start()`
/// - Started -> Stopping: `stop()` またはループ終了
/// - Stopping -> Stopped: 後片付け（disconnect など）完了
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    Stopped,
    Started,
    Stopping,
}

impl NodeState {
    pub fn can_transition_to(self, next: NodeState) -> bool {
        matches!(
            (self, next),
            (NodeState::Stopped, NodeState::Started)
                | (NodeState::Started, NodeState::Stopping)
                | (NodeState::Stopping, NodeState::Stopped)
        )
    }
}

/// Outcome of a run, for an external process supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitCode {
    /// Source exhausted or stop requested, nothing failed.
    Clean,
    /// A cycle's processing or commit failed.
    CycleFailed,
    /// connect/disconnect failed.
    ConnectFailed,
    /// The loop never ran to completion (not started, or its task was lost).
    NotRun,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        match self {
            ExitCode::Clean => 0,
            ExitCode::CycleFailed => 1,
            ExitCode::ConnectFailed => 2,
            ExitCode::NotRun => 3,
        }
    }

    pub fn is_clean(self) -> bool {
        self == ExitCode::Clean
    }

    /// The more severe of two outcomes.
    pub fn worst(self, other: ExitCode) -> ExitCode {
        self.max(other)
    }
}
