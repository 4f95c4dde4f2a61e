//! Processor ports - レコード単位とメッセージ単位の処理
//!
//! - DataProcessor: 1 レコード → 0..n レコード（ユーザー提供の変換）
//! - MessageProcessor: Message → Response（ステージを連結する唯一の継ぎ目）

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{Message, PipelineError, Response, ValidationError};

/// A per-record transform supplied by the user.
///
/// Returning `Err` fails only this record; the calling stage turns it into a
/// fault marker and carries on with the rest of the batch.
#[async_trait]
pub trait DataProcessor: Send + Sync {
    async fn process(&self, record: &Value) -> Result<Vec<Value>, PipelineError>;

    /// Push configuration problems into `errors`. Never fails directly.
    fn validate(&self, _errors: &mut Vec<ValidationError>) {}
}

/// The uniform contract every stage and every downstream delegate implements.
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    async fn process(&self, message: Message) -> Result<Response, PipelineError>;
}
