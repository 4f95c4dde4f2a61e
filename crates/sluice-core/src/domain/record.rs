//! Record model: the unit of payload that flows through every stage.
//!
//! The runtime never looks inside a payload. The only thing it cares about is
//! whether a record is ordinary data or a fault marker left behind by an
//! earlier stage, and that is a `match`, not a type counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::errors::PipelineError;

/// One record in a batch.
///
/// Serialized as `{"kind":"data","value":...}` / `{"kind":"fault","value":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Record {
    /// An opaque payload.
    Data(Value),

    /// A record whose processing failed upstream.
    Fault(FaultMarker),
}

impl Record {
    pub fn data(value: impl Into<Value>) -> Self {
        Record::Data(value.into())
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, Record::Fault(_))
    }

    pub fn as_data(&self) -> Option<&Value> {
        match self {
            Record::Data(value) => Some(value),
            Record::Fault(_) => None,
        }
    }

    pub fn as_fault(&self) -> Option<&FaultMarker> {
        match self {
            Record::Data(_) => None,
            Record::Fault(fault) => Some(fault),
        }
    }
}

impl From<Value> for Record {
    fn from(value: Value) -> Self {
        Record::Data(value)
    }
}

/// A record that failed processing, with the reason it failed.
///
/// Only a processor stage creates these. Fields are private so a marker can
/// not be altered once it is travelling downstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaultMarker {
    original: Value,
    cause: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<Value>,
    occurred_at: DateTime<Utc>,
}

impl FaultMarker {
    pub fn new(original: Value, cause: &PipelineError, context: Option<Value>) -> Self {
        Self {
            original,
            cause: cause.to_string(),
            context,
            occurred_at: Utc::now(),
        }
    }

    /// The payload as it was before the failing stage touched it.
    pub fn original(&self) -> &Value {
        &self.original
    }

    pub fn into_original(self) -> Value {
        self.original
    }

    pub fn cause(&self) -> &str {
        &self.cause
    }

    pub fn context(&self) -> Option<&Value> {
        self.context.as_ref()
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}
