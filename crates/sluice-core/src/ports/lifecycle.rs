//! LifecycleComponent port - start / stop で管理されるコンポーネント

use async_trait::async_trait;

use crate::domain::{NodeState, PipelineError, ValidationError};

/// A component with a `Stopped → Started → Stopping → Stopped` lifecycle.
///
/// `start`/`stop` may be called from a different task than the one doing the
/// work; the state must be visible to every caller as soon as it changes.
#[async_trait]
pub trait LifecycleComponent: Send + Sync {
    async fn start(&self) -> Result<(), PipelineError>;

    /// Request a stop. Cooperative: work already in flight is allowed to finish.
    async fn stop(&self) -> Result<(), PipelineError>;

    fn validate(&self, errors: &mut Vec<ValidationError>);

    fn state(&self) -> NodeState;

    fn is_state(&self, state: NodeState) -> bool {
        self.state() == state
    }

    /// Wait until the component reaches `state`. No timeout; wrap with
    /// `tokio::time::timeout` if the caller needs one.
    async fn wait_for_state(&self, state: NodeState);
}
