//! Connector ports - 外部システムとの入出力
//!
//! 具体的な実装（DB / ファイル / ソケットなど）はこのクレートの外に置きます。
//! connect と disconnect は必ず対で呼ばれます。

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{PipelineError, Record};

/// ReadConnector はバッチを引き出すソース
#[async_trait]
pub trait ReadConnector: Send {
    async fn connect(&mut self) -> Result<(), PipelineError>;

    async fn disconnect(&mut self) -> Result<(), PipelineError>;

    /// 次のバッチを取得（`timeout` まで待つ。空の Vec は「今は何もない」）
    async fn next(&mut self, timeout: Duration) -> Result<Vec<Record>, PipelineError>;

    /// ソースが枯渇したか。サイクルの間でのみ問い合わせる。
    async fn is_dry(&mut self) -> bool;

    /// Addressing context attached to every Message built from this source.
    fn reader_context(&self) -> Option<Value> {
        None
    }
}

/// WriteConnector はバッチを届けるシンク
#[async_trait]
pub trait WriteConnector: Send {
    async fn connect(&mut self) -> Result<(), PipelineError>;

    async fn disconnect(&mut self) -> Result<(), PipelineError>;

    /// Deliver one batch and return a receipt. The receipt is opaque to the runtime.
    async fn deliver(&mut self, records: &[Record]) -> Result<Value, PipelineError>;
}
