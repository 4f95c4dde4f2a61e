//! ReadNode - ReadConnector からバッチを引き出すループ
//!
//! # フロー
//! 1. connect()（失敗したら ConnectFailed、ループは始まらない）
//! 2. 停止要求 / is_dry() をサイクルの合間に確認
//! 3. next(timeout) でバッチ取得 → Message 化 → TransactionInitiator でサイクル実行
//! 4. サイクル失敗で CycleFailed としてループ終了
//! 5. disconnect() は成功・失敗に関係なく必ず 1 回

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::lifecycle::{ShutdownSignal, StateCell};
use super::node::Node;
use super::status::NodeStatus;
use super::transaction::TransactionInitiator;
use crate::domain::{ExitCode, Message, NodeState, PipelineError, RunId, ValidationError};
use crate::ports::{LifecycleComponent, MessageProcessor, ReadConnector, TransactionManager};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadNodeSettings {
    pub name: String,
    /// How long one `next()` call may wait for records.
    pub read_timeout_ms: u64,
}

impl ReadNodeSettings {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for ReadNodeSettings {
    fn default() -> Self {
        Self {
            name: "read-node".to_string(),
            read_timeout_ms: 1_000,
        }
    }
}

/// Builder for [`ReadNode`]. Collaborators are injected here once, at startup.
pub struct ReadNodeBuilder {
    settings: ReadNodeSettings,
    connector: Option<Box<dyn ReadConnector>>,
    downstream: Option<Arc<dyn MessageProcessor>>,
    transaction_manager: Option<Arc<dyn TransactionManager>>,
}

impl ReadNodeBuilder {
    pub fn connector(mut self, connector: Box<dyn ReadConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn downstream(mut self, downstream: Arc<dyn MessageProcessor>) -> Self {
        self.downstream = Some(downstream);
        self
    }

    pub fn transaction_manager(mut self, manager: Arc<dyn TransactionManager>) -> Self {
        self.transaction_manager = Some(manager);
        self
    }

    pub fn build(self) -> ReadNode {
        let name = self.settings.name.clone();
        let downstream = self
            .downstream
            .unwrap_or_else(|| Arc::new(Node::identity(format!("{name}.identity"))));

        ReadNode {
            inner: Arc::new(ReadNodeInner {
                state: StateCell::new(name),
                settings: self.settings,
                connector: self.connector.map(Mutex::new),
                downstream,
                initiator: TransactionInitiator::new(self.transaction_manager),
                shutdown: ShutdownSignal::new(),
                status: Mutex::new(NodeStatus::default()),
            }),
            handle: Mutex::new(None),
        }
    }
}

pub struct ReadNode {
    inner: Arc<ReadNodeInner>,
    handle: Mutex<Option<JoinHandle<ExitCode>>>,
}

struct ReadNodeInner {
    settings: ReadNodeSettings,
    connector: Option<Mutex<Box<dyn ReadConnector>>>,
    downstream: Arc<dyn MessageProcessor>,
    initiator: TransactionInitiator,
    state: StateCell,
    shutdown: ShutdownSignal,
    status: Mutex<NodeStatus>,
}

impl ReadNode {
    pub fn builder(settings: ReadNodeSettings) -> ReadNodeBuilder {
        ReadNodeBuilder {
            settings,
            connector: None,
            downstream: None,
            transaction_manager: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.settings.name
    }

    /// Run the loop on the current task until the source is dry, a cycle
    /// fails, or a stop is requested.
    pub async fn run(&self) -> ExitCode {
        if let Err(err) = self.begin().await {
            error!(node = %self.name(), error = %err, "run refused");
            return ExitCode::NotRun;
        }
        self.inner.execute().await
    }

    async fn begin(&self) -> Result<(), PipelineError> {
        let _guard = self.handle.lock().await;
        self.begin_locked()
    }

    /// Caller holds `handle`. The shutdown flag is cleared before the state
    /// becomes Started so a `stop()` racing the transition is never lost.
    fn begin_locked(&self) -> Result<(), PipelineError> {
        if !self.inner.state.is(NodeState::Stopped) {
            return Err(PipelineError::lifecycle(format!("{}: already started", self.name())));
        }
        self.inner.shutdown.reset();
        self.inner.state.transition(NodeState::Stopped, NodeState::Started)
    }

    /// Wait for a loop started with `start()` and return its exit code.
    pub async fn join(&self) -> ExitCode {
        let Some(handle) = self.handle.lock().await.take() else {
            return ExitCode::NotRun;
        };
        match handle.await {
            Ok(code) => code,
            Err(err) => {
                error!(node = %self.name(), error = %err, "read loop task failed");
                ExitCode::NotRun
            }
        }
    }

    pub async fn status(&self) -> NodeStatus {
        self.inner.status.lock().await.clone()
    }
}

impl ReadNodeInner {
    async fn execute(&self) -> ExitCode {
        let run_id = RunId::generate();
        self.status.lock().await.begin_run(run_id);
        info!(node = %self.settings.name, run = %run_id, "read loop starting");

        let exit_code = match &self.connector {
            Some(connector) => {
                let mut connector = connector.lock().await;
                self.drive(&mut **connector).await
            }
            None => {
                error!(node = %self.settings.name, "no read connector configured");
                ExitCode::ConnectFailed
            }
        };

        self.status.lock().await.finish(exit_code);
        self.state.set(NodeState::Stopped);
        info!(node = %self.settings.name, run = %run_id, code = exit_code.code(), "read loop finished");
        exit_code
    }

    async fn drive(&self, connector: &mut dyn ReadConnector) -> ExitCode {
        let mut exit_code = match connector.connect().await {
            Ok(()) => self.pull_loop(connector).await,
            Err(err) => {
                error!(node = %self.settings.name, error = %err, "connect failed");
                self.status.lock().await.record_error(&err);
                ExitCode::ConnectFailed
            }
        };

        self.state.advance(NodeState::Started, NodeState::Stopping);

        if let Err(err) = connector.disconnect().await {
            error!(node = %self.settings.name, error = %err, "disconnect failed");
            self.status.lock().await.record_error(&err);
            exit_code = exit_code.worst(ExitCode::ConnectFailed);
        }
        exit_code
    }

    async fn pull_loop(&self, connector: &mut dyn ReadConnector) -> ExitCode {
        let timeout = self.settings.read_timeout();

        loop {
            if self.shutdown.is_requested() {
                info!(node = %self.settings.name, "stop requested");
                return ExitCode::Clean;
            }
            if connector.is_dry().await {
                info!(node = %self.settings.name, "source is dry");
                return ExitCode::Clean;
            }

            let batch = match connector.next(timeout).await {
                Ok(batch) => batch,
                Err(err) => {
                    error!(node = %self.settings.name, error = %err, "read failed");
                    self.status.lock().await.record_error(&err);
                    return ExitCode::CycleFailed;
                }
            };
            if batch.is_empty() {
                continue;
            }

            let records_in = batch.len();
            let message = Message::new(batch).with_context(connector.reader_context());
            debug!(node = %self.settings.name, message = %message.id(), records = records_in, "cycle");

            let outcome = self.initiator.run_cycle(self.downstream.as_ref(), message).await;
            self.status.lock().await.record_cycle(records_in, &outcome);

            if let Some(err) = outcome.error() {
                warn!(node = %self.settings.name, error = %err, "cycle failed, stopping loop");
                return outcome.exit_code();
            }
        }
    }
}

#[async_trait]
impl LifecycleComponent for ReadNode {
    async fn start(&self) -> Result<(), PipelineError> {
        let mut handle = self.handle.lock().await;
        self.begin_locked()?;

        let inner = Arc::clone(&self.inner);
        *handle = Some(tokio::spawn(async move { inner.execute().await }));
        Ok(())
    }

    async fn stop(&self) -> Result<(), PipelineError> {
        self.inner.shutdown.request();
        self.inner.state.advance(NodeState::Started, NodeState::Stopping);
        Ok(())
    }

    fn validate(&self, errors: &mut Vec<ValidationError>) {
        if self.inner.connector.is_none() {
            errors.push(ValidationError::new(
                self.inner.settings.name.clone(),
                "no read connector configured",
            ));
        }
    }

    fn state(&self) -> NodeState {
        self.inner.state.get()
    }

    async fn wait_for_state(&self, state: NodeState) {
        self.inner.state.wait_for(state).await;
    }
}
