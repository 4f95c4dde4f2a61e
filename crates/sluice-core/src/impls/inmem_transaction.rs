//! InMemoryTransactionManager - 開発用のトランザクション管理
//!
//! 外部リソースは持たず、commit / rollback された ID を記録するだけです。
//! 1 つのトランザクションで commit / rollback を 2 回呼ぶとエラーになります。

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{PipelineError, TransactionId};
use crate::ports::{Transaction, TransactionManager};

/// commit / rollback の履歴
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransactionLog {
    pub committed: Vec<TransactionId>,
    pub rolled_back: Vec<TransactionId>,
}

#[derive(Default)]
pub struct InMemoryTransactionManager {
    log: Arc<Mutex<TransactionLog>>,
}

impl InMemoryTransactionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn log(&self) -> TransactionLog {
        self.log.lock().await.clone()
    }
}

#[async_trait]
impl TransactionManager for InMemoryTransactionManager {
    async fn get_transaction(&self) -> Result<Box<dyn Transaction>, PipelineError> {
        Ok(Box::new(InMemoryTransaction {
            id: TransactionId::generate(),
            log: Arc::clone(&self.log),
            error: None,
            finished: false,
        }))
    }
}

struct InMemoryTransaction {
    id: TransactionId,
    log: Arc<Mutex<TransactionLog>>,
    error: Option<PipelineError>,
    finished: bool,
}

impl InMemoryTransaction {
    fn finish(&mut self) -> Result<(), PipelineError> {
        if self.finished {
            return Err(PipelineError::transaction(format!("{} already finished", self.id)));
        }
        self.finished = true;
        Ok(())
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    async fn commit(&mut self) -> Result<(), PipelineError> {
        self.finish()?;
        self.log.lock().await.committed.push(self.id);
        debug!(tx = %self.id, "commit");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), PipelineError> {
        self.finish()?;
        self.log.lock().await.rolled_back.push(self.id);
        debug!(tx = %self.id, "rollback");
        Ok(())
    }

    fn error_or_exception(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    fn set_error_or_exception(&mut self, error: PipelineError) {
        self.error = Some(error);
    }
}
