//! Ready-made DataProcessor implementations.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::PipelineError;
use crate::ports::DataProcessor;

/// Returns every record unchanged.
pub struct IdentityProcessor;

#[async_trait]
impl DataProcessor for IdentityProcessor {
    async fn process(&self, record: &Value) -> Result<Vec<Value>, PipelineError> {
        Ok(vec![record.clone()])
    }
}

/// Adapts a plain closure into a DataProcessor.
pub struct FnProcessor<F> {
    f: F,
}

impl<F> FnProcessor<F>
where
    F: Fn(&Value) -> Result<Vec<Value>, PipelineError> + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> DataProcessor for FnProcessor<F>
where
    F: Fn(&Value) -> Result<Vec<Value>, PipelineError> + Send + Sync,
{
    async fn process(&self, record: &Value) -> Result<Vec<Value>, PipelineError> {
        (self.f)(record)
    }
}
