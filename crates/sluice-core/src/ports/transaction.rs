//! Transaction port - 1 サイクル = 1 トランザクション
//!
//! # 設計原則
//! - `commit()` か `rollback()` のどちらかを 1 回だけ呼ぶ
//! - commit 失敗時は rollback → error slot への記録 → ループ終了

use async_trait::async_trait;

use crate::domain::{PipelineError, TransactionId};

/// One unit of work spanning a single read/process/deliver cycle.
#[async_trait]
pub trait Transaction: Send {
    fn id(&self) -> TransactionId;

    async fn commit(&mut self) -> Result<(), PipelineError>;

    async fn rollback(&mut self) -> Result<(), PipelineError>;

    fn error_or_exception(&self) -> Option<&PipelineError>;

    fn set_error_or_exception(&mut self, error: PipelineError);
}

/// Hands out one transaction per cycle.
#[async_trait]
pub trait TransactionManager: Send + Sync {
    async fn get_transaction(&self) -> Result<Box<dyn Transaction>, PipelineError>;
}
