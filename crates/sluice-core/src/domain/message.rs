//! Message / Response - ステージ間を流れる封筒
//!
//! - Message: 1 サイクルで受け渡すバッチ（不変）
//! - Response: 入力レコードごとの出力バッチ（順序を保持）

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::MessageId;
use super::record::Record;

/// Message は 1 サイクル分のバッチ
///
/// 生成後は変更しません。次のステージへ渡すときは `derived()` で新しい
/// Message を作り、`caused_by` に元の ID を残します。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    records: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    caused_by: Option<MessageId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    causing_error: Option<String>,
}

impl Message {
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            id: MessageId::generate(),
            records,
            context: None,
            caused_by: None,
            causing_error: None,
        }
    }

    /// `parent` を起点とする次段向けの Message
    pub fn derived(parent: &Message, records: Vec<Record>) -> Self {
        Self {
            id: MessageId::generate(),
            records,
            context: parent.context.clone(),
            caused_by: Some(parent.id),
            causing_error: parent.causing_error.clone(),
        }
    }

    pub fn with_context(mut self, context: Option<Value>) -> Self {
        self.context = context;
        self
    }

    pub fn with_causing_error(mut self, error: impl Into<String>) -> Self {
        self.causing_error = Some(error.into());
        self
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    pub fn caused_by(&self) -> Option<MessageId> {
        self.caused_by
    }

    pub fn causing_error(&self) -> Option<&str> {
        self.causing_error.as_deref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Response は入力レコードごとの出力バッチ
///
/// # 不変条件
/// - バッチ数 == 保持された入力レコード数
/// - `collated_output()` は順序を入れ替えない
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    batches: Vec<Vec<Record>>,
    /// Delivery receipt from a write connector, if this response came from one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    receipt: Option<Value>,
}

impl Response {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the output produced for one input record.
    pub fn add_output(&mut self, records: Vec<Record>) {
        self.batches.push(records);
    }

    pub fn with_receipt(mut self, receipt: Value) -> Self {
        self.receipt = Some(receipt);
        self
    }

    pub fn batches(&self) -> &[Vec<Record>] {
        &self.batches
    }

    pub fn receipt(&self) -> Option<&Value> {
        self.receipt.as_ref()
    }

    /// All batches concatenated in input order.
    pub fn collated_output(&self) -> Vec<Record> {
        self.batches.iter().flatten().cloned().collect()
    }

    pub fn into_collated_output(self) -> Vec<Record> {
        self.batches.into_iter().flatten().collect()
    }

    /// Total number of output records across batches.
    pub fn record_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }
}
