//! Errors - エラー型と分類
//!
//! # 分類
//! - Validation: 起動前の設定エラー（throw せず Vec に集める）
//! - Connection: connect / disconnect の失敗（run にとって致命的）
//! - Processing: レコード単位の失敗（FaultMarker に変換される）
//! - Transaction: commit の失敗（rollback を強制、run にとって致命的）
//! - Lifecycle: start / stop の状態遷移エラー

use std::fmt;

use thiserror::Error;

/// ErrorKind は運用上の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Connection,
    Processing,
    Transaction,
    Lifecycle,
}

/// PipelineError はランタイム全体で使うエラー型
///
/// トランザクションの error slot に保存しつつ呼び出し元にも返すため `Clone`。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PipelineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("processing error: {0}")]
    Processing(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("lifecycle error: {0}")]
    Lifecycle(String),
}

impl PipelineError {
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    pub fn processing(message: impl Into<String>) -> Self {
        Self::Processing(message.into())
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction(message.into())
    }

    pub fn lifecycle(message: impl Into<String>) -> Self {
        Self::Lifecycle(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::Connection(_) => ErrorKind::Connection,
            PipelineError::Processing(_) => ErrorKind::Processing,
            PipelineError::Transaction(_) => ErrorKind::Transaction,
            PipelineError::Lifecycle(_) => ErrorKind::Lifecycle,
        }
    }
}

/// A configuration problem found before a stage starts.
///
/// Stages push these into a caller-supplied `Vec` so one `validate` pass can
/// report every problem at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub component: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.component, self.message)
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for PipelineError {
    fn from(err: ValidationError) -> Self {
        PipelineError::Validation(err.to_string())
    }
}
