//! Lifecycle - 状態の公開と停止シグナル
//!
//! どちらも `tokio::sync::watch` の上に作っています。
//! - StateCell: `NodeState` をスレッド間で即座に見える形で保持
//! - ShutdownSignal: ループへの協調的な停止要求（サイクルの合間に確認）

use tokio::sync::watch;
use tracing::info;

use crate::domain::{NodeState, PipelineError};

/// StateCell はステージのライフサイクル状態
pub struct StateCell {
    name: String,
    tx: watch::Sender<NodeState>,
}

impl StateCell {
    pub fn new(name: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(NodeState::Stopped);
        Self {
            name: name.into(),
            tx,
        }
    }

    pub fn get(&self) -> NodeState {
        *self.tx.borrow()
    }

    pub fn is(&self, state: NodeState) -> bool {
        self.get() == state
    }

    /// `from` にいるときだけ `to` へ遷移する
    pub fn transition(&self, from: NodeState, to: NodeState) -> Result<(), PipelineError> {
        let mut observed = from;
        let changed = self.tx.send_if_modified(|current| {
            observed = *current;
            if *current == from && from.can_transition_to(to) {
                *current = to;
                true
            } else {
                false
            }
        });

        if changed {
            info!(node = %self.name, ?from, ?to, "state transition");
            Ok(())
        } else {
            Err(PipelineError::lifecycle(format!(
                "{}: cannot move from {observed:?} to {to:?}",
                self.name
            )))
        }
    }

    /// 遷移できれば遷移する（すでに先へ進んでいれば何もしない）
    pub fn advance(&self, from: NodeState, to: NodeState) -> bool {
        self.transition(from, to).is_ok()
    }

    /// ループ終了時の後始末用。現在の状態に関係なく書き込む。
    pub fn set(&self, state: NodeState) {
        let previous = self.tx.send_replace(state);
        if previous != state {
            info!(node = %self.name, from = ?previous, to = ?state, "state transition");
        }
    }

    pub async fn wait_for(&self, state: NodeState) {
        let mut rx = self.tx.subscribe();
        // sender は self が持っているので、ここでチャネルが閉じることはない
        let _ = rx.wait_for(|current| *current == state).await;
    }
}

/// Cooperative stop request observed by a loop between cycles.
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn request(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_requested(&self) -> bool {
        *self.tx.borrow()
    }

    /// Clear a previous request so the loop can be started again.
    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
