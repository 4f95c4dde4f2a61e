//! TransactionInitiator - サイクル単位のトランザクション制御
//!
//! ReadNode と TransactedNodeRunner が共有するプロトコル:
//! 1. TransactionManager があれば get_transaction()
//! 2. downstream.process(message)
//! 3. 成功なら commit()
//! 4. 処理か commit が失敗したら rollback() を 1 回、set_error_or_exception() を 1 回
//!
//! TransactionManager が無い場合はトランザクションに一切触れません。

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::domain::{ExitCode, Message, PipelineError, Response};
use crate::ports::{MessageProcessor, Transaction, TransactionManager};

/// Result of one cycle.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Processed and committed.
    Committed(Response),
    /// Processed with no transaction manager configured.
    Completed(Response),
    /// Processing or commit failed; the transaction was rolled back.
    RolledBack(PipelineError),
    /// Failed with no transaction to roll back.
    Failed(PipelineError),
}

impl CycleOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CycleOutcome::Committed(_) | CycleOutcome::Completed(_))
    }

    pub fn response(&self) -> Option<&Response> {
        match self {
            CycleOutcome::Committed(response) | CycleOutcome::Completed(response) => Some(response),
            CycleOutcome::RolledBack(_) | CycleOutcome::Failed(_) => None,
        }
    }

    pub fn error(&self) -> Option<&PipelineError> {
        match self {
            CycleOutcome::RolledBack(err) | CycleOutcome::Failed(err) => Some(err),
            CycleOutcome::Committed(_) | CycleOutcome::Completed(_) => None,
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.is_success() {
            ExitCode::Clean
        } else {
            ExitCode::CycleFailed
        }
    }
}

/// Wraps each cycle in a transaction when a manager is configured.
#[derive(Clone, Default)]
pub struct TransactionInitiator {
    manager: Option<Arc<dyn TransactionManager>>,
}

impl TransactionInitiator {
    pub fn new(manager: Option<Arc<dyn TransactionManager>>) -> Self {
        Self { manager }
    }

    pub fn is_transacted(&self) -> bool {
        self.manager.is_some()
    }

    pub async fn run_cycle(
        &self,
        downstream: &dyn MessageProcessor,
        message: Message,
    ) -> CycleOutcome {
        let message_id = message.id();

        let Some(manager) = &self.manager else {
            return match downstream.process(message).await {
                Ok(response) => CycleOutcome::Completed(response),
                Err(err) => {
                    error!(message = %message_id, error = %err, "cycle failed");
                    CycleOutcome::Failed(err)
                }
            };
        };

        let mut tx = match manager.get_transaction().await {
            Ok(tx) => tx,
            Err(err) => {
                error!(message = %message_id, error = %err, "could not obtain transaction");
                return CycleOutcome::Failed(err);
            }
        };

        let err = match downstream.process(message).await {
            Ok(response) => match tx.commit().await {
                Ok(()) => {
                    debug!(message = %message_id, tx = %tx.id(), "committed");
                    return CycleOutcome::Committed(response);
                }
                Err(err) => err,
            },
            Err(err) => err,
        };

        Self::abort(tx.as_mut(), err).await
    }

    async fn abort(tx: &mut dyn Transaction, err: PipelineError) -> CycleOutcome {
        warn!(tx = %tx.id(), error = %err, "rolling back");
        if let Err(rollback_err) = tx.rollback().await {
            // 元のエラーをサイクルの結果として優先する
            error!(tx = %tx.id(), error = %rollback_err, "rollback failed");
        }
        tx.set_error_or_exception(err.clone());
        CycleOutcome::RolledBack(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::node::Node;
    use crate::domain::Record;
    use crate::testing::{FailingMessageProcessor, RecordingTransactionManager};

    fn message() -> Message {
        Message::new(vec![Record::data("foo")])
    }

    #[tokio::test]
    async fn successful_cycle_commits_once() {
        let manager = Arc::new(RecordingTransactionManager::new());
        let initiator = TransactionInitiator::new(Some(manager.clone()));

        let outcome = initiator.run_cycle(&Node::identity("id"), message()).await;

        assert!(matches!(outcome, CycleOutcome::Committed(_)));
        assert_eq!(manager.commits(), 1);
        assert_eq!(manager.rollbacks(), 0);
        assert_eq!(manager.errors_set(), 0);
    }

    #[tokio::test]
    async fn commit_failure_rolls_back_and_records_error_once() {
        let manager = Arc::new(RecordingTransactionManager::failing_commit_on(1));
        let initiator = TransactionInitiator::new(Some(manager.clone()));

        let outcome = initiator.run_cycle(&Node::identity("id"), message()).await;

        assert!(matches!(outcome, CycleOutcome::RolledBack(PipelineError::Transaction(_))));
        assert_eq!(outcome.exit_code(), ExitCode::CycleFailed);
        assert_eq!(manager.rollbacks(), 1);
        assert_eq!(manager.errors_set(), 1);
        assert_eq!(manager.last_error(), outcome.error().cloned());
    }

    #[tokio::test]
    async fn processing_failure_rolls_back_without_commit() {
        let manager = Arc::new(RecordingTransactionManager::new());
        let initiator = TransactionInitiator::new(Some(manager.clone()));

        let outcome = initiator.run_cycle(&FailingMessageProcessor, message()).await;

        assert!(!outcome.is_success());
        assert_eq!(manager.commits(), 0);
        assert_eq!(manager.rollbacks(), 1);
        assert_eq!(manager.errors_set(), 1);
    }

    #[tokio::test]
    async fn no_manager_means_no_transaction_calls() {
        let initiator = TransactionInitiator::default();
        assert!(!initiator.is_transacted());

        let ok = initiator.run_cycle(&Node::identity("id"), message()).await;
        assert!(matches!(ok, CycleOutcome::Completed(_)));

        let failed = initiator.run_cycle(&FailingMessageProcessor, message()).await;
        assert!(matches!(failed, CycleOutcome::Failed(_)));
        assert_eq!(failed.exit_code(), ExitCode::CycleFailed);
    }
}
