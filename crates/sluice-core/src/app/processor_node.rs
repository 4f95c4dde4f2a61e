//! ProcessorNode - バッチ内の各レコードに DataProcessor を適用
//!
//! # 障害の分離
//! - レコード単位の失敗は FaultMarker に変換し、残りのレコードは処理を続ける
//! - すでに FaultMarker になっているレコードの扱いは `FaultPolicy` で決める

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::domain::{FaultMarker, Message, PipelineError, Record, Response, ValidationError};
use crate::ports::{DataProcessor, MessageProcessor};

/// What a processor stage does with records that already failed upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultPolicy {
    /// Emit the marker unchanged as its own batch, without processing it.
    #[default]
    Forward,
    /// Strip the marker and process the original record as ordinary data.
    Unwrap,
    /// Drop the marker: not processed, not emitted, no batch.
    Discard,
}

impl FaultPolicy {
    /// `strip_out_exceptions = true` unwraps faults, `false` forwards them.
    pub fn from_strip_out_exceptions(strip: bool) -> Self {
        if strip {
            FaultPolicy::Unwrap
        } else {
            FaultPolicy::Forward
        }
    }
}

pub struct ProcessorNode {
    name: String,
    processor: Arc<dyn DataProcessor>,
    fault_policy: FaultPolicy,
}

impl ProcessorNode {
    pub fn new(name: impl Into<String>, processor: Arc<dyn DataProcessor>) -> Self {
        Self {
            name: name.into(),
            processor,
            fault_policy: FaultPolicy::default(),
        }
    }

    pub fn with_fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    pub fn strip_out_exceptions(self, strip: bool) -> Self {
        self.with_fault_policy(FaultPolicy::from_strip_out_exceptions(strip))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fault_policy(&self) -> FaultPolicy {
        self.fault_policy
    }

    pub fn validate(&self, errors: &mut Vec<ValidationError>) {
        self.processor.validate(errors);
    }

    /// Process every record of `message` independently and collate the results.
    ///
    /// Never fails as a whole: per-record errors come back as fault records.
    pub async fn apply(&self, message: &Message) -> Response {
        let mut response = Response::new();

        for record in message.records() {
            let value = match record {
                Record::Data(value) => value.clone(),
                Record::Fault(fault) => match self.fault_policy {
                    FaultPolicy::Forward => {
                        response.add_output(vec![record.clone()]);
                        continue;
                    }
                    FaultPolicy::Discard => {
                        debug!(stage = %self.name, cause = fault.cause(), "discarding fault record");
                        continue;
                    }
                    FaultPolicy::Unwrap => fault.original().clone(),
                },
            };

            let batch = self.process_one(value, message).await;
            response.add_output(batch);
        }

        response
    }

    async fn process_one(&self, value: Value, message: &Message) -> Vec<Record> {
        match self.processor.process(&value).await {
            Ok(values) => values.into_iter().map(Record::Data).collect(),
            Err(err) => {
                debug!(stage = %self.name, message = %message.id(), error = %err, "record failed");
                let context = json!({
                    "stage": self.name,
                    "message": message.id().to_string(),
                });
                vec![Record::Fault(FaultMarker::new(value, &err, Some(context)))]
            }
        }
    }
}

#[async_trait]
impl MessageProcessor for ProcessorNode {
    async fn process(&self, message: Message) -> Result<Response, PipelineError> {
        Ok(self.apply(&message).await)
    }
}
