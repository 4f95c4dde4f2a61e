//! PipelineBuilder - パイプラインの構築とワイヤリング
//!
//! ReadNode → Node(processor) → WriteNode を組み立てます。
//! 依存はすべてコンストラクタで注入し、実行時のリフレクションやグローバル状態は使いません。
//!
//! # Fail-fast 設計
//! - build() 時に全ステージの validate() を実行
//! - 1 件でも問題があれば BuildError::Invalid にまとめて返す

use std::sync::Arc;

use tracing::{error, info};

use super::node::Node;
use super::processor_node::FaultPolicy;
use super::read_node::{ReadNode, ReadNodeSettings};
use super::write_node::WriteNode;
use crate::domain::{ExitCode, ValidationError};
use crate::ports::{DataProcessor, LifecycleComponent, ReadConnector, TransactionManager, WriteConnector};

/// ```ignore
/// let pipeline = PipelineBuilder::new(settings)
///     .source(Box::new(my_reader))
///     .processor(Arc::new(my_processor))
///     .sink(Box::new(my_writer))
///     .transaction_manager(Arc::new(my_tx_manager))
///     .build()?;
/// let code = pipeline.run().await;
/// ```
pub struct PipelineBuilder {
    settings: ReadNodeSettings,
    source: Option<Box<dyn ReadConnector>>,
    processor: Option<Arc<dyn DataProcessor>>,
    fault_policy: FaultPolicy,
    sink: Option<Box<dyn WriteConnector>>,
    transaction_manager: Option<Arc<dyn TransactionManager>>,
}

/// BuildError はパイプライン構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("invalid pipeline configuration: {}", describe(.0))]
    Invalid(Vec<ValidationError>),
}

fn describe(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl PipelineBuilder {
    pub fn new(settings: ReadNodeSettings) -> Self {
        Self {
            settings,
            source: None,
            processor: None,
            fault_policy: FaultPolicy::default(),
            sink: None,
            transaction_manager: None,
        }
    }

    pub fn source(mut self, connector: Box<dyn ReadConnector>) -> Self {
        self.source = Some(connector);
        self
    }

    pub fn processor(mut self, processor: Arc<dyn DataProcessor>) -> Self {
        self.processor = Some(processor);
        self
    }

    pub fn fault_policy(mut self, fault_policy: FaultPolicy) -> Self {
        self.fault_policy = fault_policy;
        self
    }

    pub fn sink(mut self, connector: Box<dyn WriteConnector>) -> Self {
        self.sink = Some(connector);
        self
    }

    pub fn transaction_manager(mut self, manager: Arc<dyn TransactionManager>) -> Self {
        self.transaction_manager = Some(manager);
        self
    }

    pub fn build(self) -> Result<Pipeline, BuildError> {
        let name = self.settings.name.clone();

        let sink = Arc::new(match self.sink {
            Some(connector) => WriteNode::new(format!("{name}.sink"), connector),
            None => WriteNode::unconfigured(format!("{name}.sink")),
        });

        let stage_name = format!("{name}.process");
        let node = match self.processor {
            Some(processor) => Node::with_processor(stage_name, processor, self.fault_policy),
            None => Node::identity(stage_name),
        };

        let mut errors = Vec::new();
        node.validate(&mut errors);
        sink.validate(&mut errors);

        let mut source = ReadNode::builder(self.settings)
            .downstream(Arc::new(node.with_downstream(sink.clone())));
        if let Some(connector) = self.source {
            source = source.connector(connector);
        }
        if let Some(manager) = self.transaction_manager {
            source = source.transaction_manager(manager);
        }
        let source = source.build();
        source.validate(&mut errors);

        if !errors.is_empty() {
            return Err(BuildError::Invalid(errors));
        }
        Ok(Pipeline { source, sink })
    }
}

/// A validated source → processor → sink chain.
pub struct Pipeline {
    source: ReadNode,
    sink: Arc<WriteNode>,
}

impl Pipeline {
    pub fn source(&self) -> &ReadNode {
        &self.source
    }

    pub fn sink(&self) -> &WriteNode {
        &self.sink
    }

    /// Connect the sink, drain the source, disconnect the sink.
    pub async fn run(&self) -> ExitCode {
        if let Err(err) = self.sink.connect().await {
            error!(error = %err, "sink failed to connect");
            return ExitCode::ConnectFailed;
        }

        let mut exit_code = self.source.run().await;

        if let Err(err) = self.sink.disconnect().await {
            error!(error = %err, "sink failed to disconnect");
            exit_code = exit_code.worst(ExitCode::ConnectFailed);
        }
        info!(pipeline = %self.source.name(), code = exit_code.code(), "pipeline finished");
        exit_code
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PipelineError, Record};
    use crate::impls::{CollectingWriteConnector, FnProcessor, InMemoryTransactionManager, VecReadConnector};
    use serde_json::Value;

    fn settings() -> ReadNodeSettings {
        ReadNodeSettings {
            name: "orders".to_string(),
            read_timeout_ms: 10,
        }
    }

    #[test]
    fn build_reports_every_missing_connector() {
        let result = PipelineBuilder::new(settings()).build();

        let Err(BuildError::Invalid(errors)) = result else {
            panic!("expected validation failure");
        };
        assert_eq!(errors.len(), 2);
        assert!(errors.iter().any(|e| e.component == "orders"));
        assert!(errors.iter().any(|e| e.component == "orders.sink"));
    }

    #[test]
    fn build_error_message_lists_problems() {
        let err = PipelineBuilder::new(settings())
            .sink(Box::new(CollectingWriteConnector::new()))
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("orders: no read connector configured"));
    }

    #[tokio::test]
    async fn pipeline_moves_records_from_source_to_sink() {
        let source = VecReadConnector::new(vec![
            vec![Record::data("foo"), Record::data("bar")],
            vec![Record::data("foobar")],
        ]);
        let sink = CollectingWriteConnector::new();
        let delivered = sink.delivered_handle();
        let manager = Arc::new(InMemoryTransactionManager::new());

        let pipeline = PipelineBuilder::new(settings())
            .source(Box::new(source))
            .sink(Box::new(sink))
            .transaction_manager(manager.clone())
            .build()
            .unwrap();

        assert_eq!(pipeline.run().await, ExitCode::Clean);
        assert_eq!(
            *delivered.lock().await,
            vec![Record::data("foo"), Record::data("bar"), Record::data("foobar")]
        );
        assert_eq!(manager.log().await.committed.len(), 2);
        assert!(pipeline.sink().is_state(crate::domain::NodeState::Stopped));
    }

    #[tokio::test]
    async fn record_failures_reach_the_sink_as_faults() {
        let source = VecReadConnector::new(vec![vec![Record::data(1), Record::data("two")]]);
        let sink = CollectingWriteConnector::new();
        let delivered = sink.delivered_handle();
        let numbers_only = FnProcessor::new(|v: &Value| match v.as_i64() {
            Some(n) => Ok(vec![Value::from(n * 10)]),
            None => Err(PipelineError::processing("not a number")),
        });

        let pipeline = PipelineBuilder::new(settings())
            .source(Box::new(source))
            .processor(Arc::new(numbers_only))
            .sink(Box::new(sink))
            .build()
            .unwrap();

        assert_eq!(pipeline.run().await, ExitCode::Clean);
        let delivered = delivered.lock().await;
        assert_eq!(delivered[0], Record::data(10));
        assert!(delivered[1].is_fault());
        assert_eq!(pipeline.source().status().await.faults_out, 1);
    }
}
