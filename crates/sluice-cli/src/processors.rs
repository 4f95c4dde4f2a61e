//! Demo processors selectable from the settings file.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use sluice_core::domain::PipelineError;
use sluice_core::impls::IdentityProcessor;
use sluice_core::ports::DataProcessor;

use crate::settings::ProcessorKind;

pub fn build(kind: ProcessorKind) -> Arc<dyn DataProcessor> {
    match kind {
        ProcessorKind::Identity => Arc::new(IdentityProcessor),
        ProcessorKind::Uppercase => Arc::new(Uppercase),
        ProcessorKind::Explode => Arc::new(Explode),
    }
}

/// Upper-cases string records; anything else is a record failure.
struct Uppercase;

#[async_trait]
impl DataProcessor for Uppercase {
    async fn process(&self, record: &Value) -> Result<Vec<Value>, PipelineError> {
        match record {
            Value::String(s) => Ok(vec![Value::String(s.to_uppercase())]),
            other => Err(PipelineError::processing(format!("expected a string, got {other}"))),
        }
    }
}

/// Splits an array record into one record per element.
struct Explode;

#[async_trait]
impl DataProcessor for Explode {
    async fn process(&self, record: &Value) -> Result<Vec<Value>, PipelineError> {
        match record {
            Value::Array(items) => Ok(items.clone()),
            other => Err(PipelineError::processing(format!("expected an array, got {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn uppercase_rejects_non_strings() {
        let p = build(ProcessorKind::Uppercase);
        assert_eq!(p.process(&json!("foo")).await.unwrap(), vec![json!("FOO")]);
        assert!(p.process(&json!(1)).await.is_err());
    }

    #[tokio::test]
    async fn explode_expands_arrays() {
        let p = build(ProcessorKind::Explode);
        assert_eq!(p.process(&json!([1, 2, 3])).await.unwrap().len(), 3);
        assert!(p.process(&json!([])).await.unwrap().is_empty());
        assert!(p.process(&json!("x")).await.is_err());
    }
}
