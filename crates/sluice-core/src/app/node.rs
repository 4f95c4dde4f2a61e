//! Node - 汎用ステージ
//!
//! - processor なし: 恒等変換（入力レコード 1 件 → 出力バッチ 1 件）
//! - processor あり: ProcessorNode に委譲
//! - downstream あり: 出力を次段の Message として渡し、その Response を返す

use std::sync::Arc;

use async_trait::async_trait;

use super::processor_node::{FaultPolicy, ProcessorNode};
use crate::domain::{Message, PipelineError, Response, ValidationError};
use crate::ports::{DataProcessor, MessageProcessor};

pub struct Node {
    name: String,
    stage: Option<ProcessorNode>,
    downstream: Option<Arc<dyn MessageProcessor>>,
}

impl Node {
    /// A node that passes every record through unchanged.
    pub fn identity(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stage: None,
            downstream: None,
        }
    }

    pub fn with_processor(
        name: impl Into<String>,
        processor: Arc<dyn DataProcessor>,
        fault_policy: FaultPolicy,
    ) -> Self {
        let name = name.into();
        let stage = ProcessorNode::new(name.clone(), processor).with_fault_policy(fault_policy);
        Self {
            name,
            stage: Some(stage),
            downstream: None,
        }
    }

    pub fn with_downstream(mut self, downstream: Arc<dyn MessageProcessor>) -> Self {
        self.downstream = Some(downstream);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_processor(&self) -> bool {
        self.stage.is_some()
    }

    /// Forwards to the processor, if any. A node without one is still valid.
    pub fn validate(&self, errors: &mut Vec<ValidationError>) {
        if let Some(stage) = &self.stage {
            stage.validate(errors);
        }
    }

    fn identity_response(message: &Message) -> Response {
        let mut response = Response::new();
        for record in message.records() {
            response.add_output(vec![record.clone()]);
        }
        response
    }
}

#[async_trait]
impl MessageProcessor for Node {
    async fn process(&self, message: Message) -> Result<Response, PipelineError> {
        let response = match &self.stage {
            Some(stage) => stage.apply(&message).await,
            None => Self::identity_response(&message),
        };

        match &self.downstream {
            Some(next) => {
                let forwarded = Message::derived(&message, response.into_collated_output());
                next.process(forwarded).await
            }
            None => Ok(response),
        }
    }
}
