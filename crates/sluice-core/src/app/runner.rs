//! TransactedNodeRunner - pull ループではないステージ向けのループ
//!
//! 管理対象のコンポーネント（リスナーなど）を start/stop し、
//! inlet（mpsc）に届いた Message を ReadNode と同じトランザクション規約で
//! delegate に流します。
//!
//! # ループ条件
//! - 管理対象が Started の間だけ回る
//! - 停止要求はサイクルの合間に確認（実行中のサイクルは中断しない）
//! - ループを抜けたら inlet を閉じる。残っていた Message は処理せず warn で捨てる

use std::sync::{Arc, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::lifecycle::{ShutdownSignal, StateCell};
use super::status::NodeStatus;
use super::transaction::TransactionInitiator;
use crate::domain::{ExitCode, Message, NodeState, PipelineError, RunId, ValidationError};
use crate::ports::{LifecycleComponent, MessageProcessor, TransactionManager};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerSettings {
    pub name: String,
    /// How often the loop re-checks the managed component while idle.
    pub poll_interval_ms: u64,
    pub inlet_capacity: usize,
}

impl RunnerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            name: "runner".to_string(),
            poll_interval_ms: 100,
            inlet_capacity: 64,
        }
    }
}

pub struct TransactedNodeRunner {
    inner: Arc<RunnerInner>,
    inlet: std::sync::Mutex<mpsc::Sender<Message>>,
    handle: Mutex<Option<JoinHandle<ExitCode>>>,
}

struct RunnerInner {
    settings: RunnerSettings,
    managed: Arc<dyn LifecycleComponent>,
    delegate: Arc<dyn MessageProcessor>,
    initiator: TransactionInitiator,
    state: StateCell,
    shutdown: ShutdownSignal,
    outlet: Mutex<mpsc::Receiver<Message>>,
    status: Mutex<NodeStatus>,
}

impl TransactedNodeRunner {
    pub fn new(
        settings: RunnerSettings,
        managed: Arc<dyn LifecycleComponent>,
        delegate: Arc<dyn MessageProcessor>,
        transaction_manager: Option<Arc<dyn TransactionManager>>,
    ) -> Self {
        let (inlet, outlet) = mpsc::channel(settings.inlet_capacity.max(1));
        Self {
            inner: Arc::new(RunnerInner {
                state: StateCell::new(settings.name.clone()),
                settings,
                managed,
                delegate,
                initiator: TransactionInitiator::new(transaction_manager),
                shutdown: ShutdownSignal::new(),
                outlet: Mutex::new(outlet),
                status: Mutex::new(NodeStatus::default()),
            }),
            inlet: std::sync::Mutex::new(inlet),
            handle: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.settings.name
    }

    /// Where the managed component submits the messages it produces.
    ///
    /// Sends fail once the loop has exited; call `sender()` again after a restart.
    pub fn sender(&self) -> mpsc::Sender<Message> {
        self.inlet.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// A closed inlet is replaced so a restarted loop has somewhere to read from.
    async fn reopen_inlet(&self) {
        let mut outlet = self.inner.outlet.lock().await;
        if !outlet.is_closed() {
            return;
        }
        let (inlet, fresh) = mpsc::channel(self.inner.settings.inlet_capacity.max(1));
        *outlet = fresh;
        *self.inlet.lock().unwrap_or_else(PoisonError::into_inner) = inlet;
    }

    pub async fn join(&self) -> ExitCode {
        let Some(handle) = self.handle.lock().await.take() else {
            return ExitCode::NotRun;
        };
        match handle.await {
            Ok(code) => code,
            Err(err) => {
                error!(node = %self.name(), error = %err, "runner task failed");
                ExitCode::NotRun
            }
        }
    }

    pub async fn status(&self) -> NodeStatus {
        self.inner.status.lock().await.clone()
    }
}

impl RunnerInner {
    async fn execute(&self) -> ExitCode {
        let run_id = RunId::generate();
        self.status.lock().await.begin_run(run_id);
        info!(node = %self.settings.name, run = %run_id, "runner loop starting");

        let mut outlet = self.outlet.lock().await;
        let mut exit_code = self.cycle_loop(&mut outlet).await;
        self.close_inlet(&mut outlet);
        drop(outlet);

        self.state.advance(NodeState::Started, NodeState::Stopping);
        if self.managed.is_state(NodeState::Started)
            && let Err(err) = self.managed.stop().await
        {
            error!(node = %self.settings.name, error = %err, "failed to stop managed component");
            self.status.lock().await.record_error(&err);
            exit_code = exit_code.worst(ExitCode::ConnectFailed);
        }

        self.status.lock().await.finish(exit_code);
        self.state.set(NodeState::Stopped);
        info!(node = %self.settings.name, run = %run_id, code = exit_code.code(), "runner loop finished");
        exit_code
    }

    fn close_inlet(&self, outlet: &mut mpsc::Receiver<Message>) {
        outlet.close();
        while let Ok(message) = outlet.try_recv() {
            warn!(
                node = %self.settings.name,
                message = %message.id(),
                records = message.len(),
                "runner stopped, dropping unprocessed message"
            );
        }
    }

    async fn cycle_loop(&self, outlet: &mut mpsc::Receiver<Message>) -> ExitCode {
        let poll_interval = self.settings.poll_interval();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            if self.shutdown.is_requested() {
                info!(node = %self.settings.name, "stop requested");
                return ExitCode::Clean;
            }
            if !self.managed.is_state(NodeState::Started) {
                info!(node = %self.settings.name, "managed component left STARTED");
                return ExitCode::Clean;
            }

            let message = tokio::select! {
                _ = shutdown_rx.changed() => continue,
                received = tokio::time::timeout(poll_interval, outlet.recv()) => match received {
                    Ok(Some(message)) => message,
                    Ok(None) => return ExitCode::Clean,
                    // idle: loop back and re-check the managed component
                    Err(_) => continue,
                },
            };

            let records_in = message.len();
            debug!(node = %self.settings.name, message = %message.id(), records = records_in, "cycle");

            let outcome = self.initiator.run_cycle(self.delegate.as_ref(), message).await;
            self.status.lock().await.record_cycle(records_in, &outcome);

            if let Some(err) = outcome.error() {
                warn!(node = %self.settings.name, error = %err, "cycle failed, stopping runner");
                return outcome.exit_code();
            }
        }
    }
}

#[async_trait]
impl LifecycleComponent for TransactedNodeRunner {
    async fn start(&self) -> Result<(), PipelineError> {
        let mut errors = Vec::new();
        self.validate(&mut errors);
        if let Some(first) = errors.into_iter().next() {
            return Err(first.into());
        }

        let mut handle = self.handle.lock().await;
        self.inner.state.transition(NodeState::Stopped, NodeState::Started)?;
        self.inner.shutdown.reset();
        self.reopen_inlet().await;

        if let Err(err) = self.inner.managed.start().await {
            error!(node = %self.name(), error = %err, "managed component failed to start");
            self.inner.state.set(NodeState::Stopped);
            return Err(err);
        }

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
        self.inner.managed.validate(errors);
        if self.inner.settings.poll_interval_ms == 0 {
            errors.push(ValidationError::new(
                self.inner.settings.name.clone(),
                "poll_interval_ms must be greater than zero",
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
