//! Test doubles shared by the unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Notify;

use crate::app::StateCell;
use crate::domain::{
    Message, NodeState, PipelineError, Record, Response, TransactionId, ValidationError,
};
use crate::ports::{
    LifecycleComponent, MessageProcessor, ReadConnector, Transaction, TransactionManager,
};

// ========================================
// ReadConnector
// ========================================

#[derive(Default)]
pub struct ConnectorCounters {
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    reads: AtomicUsize,
}

impl ConnectorCounters {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

/// `is_dry()` answers come from a script; `next()` always yields one record.
pub struct ScriptedReadConnector {
    dry_script: Vec<bool>,
    endless: bool,
    fail_connect: bool,
    context: Option<Value>,
    counters: Arc<ConnectorCounters>,
}

impl ScriptedReadConnector {
    pub fn new(dry_script: Vec<bool>) -> Self {
        Self {
            dry_script,
            endless: false,
            fail_connect: false,
            context: None,
            counters: Arc::new(ConnectorCounters::default()),
        }
    }

    pub fn endless() -> Self {
        Self {
            endless: true,
            ..Self::new(vec![])
        }
    }

    pub fn failing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn counters(&self) -> Arc<ConnectorCounters> {
        Arc::clone(&self.counters)
    }
}

#[async_trait]
impl ReadConnector for ScriptedReadConnector {
    async fn connect(&mut self) -> Result<(), PipelineError> {
        self.counters.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(PipelineError::connection("refused"));
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), PipelineError> {
        self.counters.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn next(&mut self, _timeout: Duration) -> Result<Vec<Record>, PipelineError> {
        let n = self.counters.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.endless {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        Ok(vec![Record::data(format!("row-{n}"))])
    }

    async fn is_dry(&mut self) -> bool {
        if self.endless {
            return false;
        }
        if self.dry_script.is_empty() {
            true
        } else {
            self.dry_script.remove(0)
        }
    }

    fn reader_context(&self) -> Option<Value> {
        self.context.clone()
    }
}

// ========================================
// MessageProcessor
// ========================================

/// Records every message it sees and answers with identity.
#[derive(Default)]
pub struct CapturingMessageProcessor {
    seen: Mutex<Vec<Message>>,
}

impl CapturingMessageProcessor {
    pub fn messages(&self) -> Vec<Message> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageProcessor for CapturingMessageProcessor {
    async fn process(&self, message: Message) -> Result<Response, PipelineError> {
        let mut response = Response::new();
        for record in message.records() {
            response.add_output(vec![record.clone()]);
        }
        self.seen.lock().unwrap().push(message);
        Ok(response)
    }
}

/// Signals when a cycle enters it, then takes `delay` before answering with identity.
pub struct SlowMessageProcessor {
    delay: Duration,
    entered: Arc<Notify>,
    finished: AtomicUsize,
}

impl SlowMessageProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            entered: Arc::new(Notify::new()),
            finished: AtomicUsize::new(0),
        }
    }

    pub fn entered(&self) -> Arc<Notify> {
        Arc::clone(&self.entered)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageProcessor for SlowMessageProcessor {
    async fn process(&self, message: Message) -> Result<Response, PipelineError> {
        self.entered.notify_one();
        tokio::time::sleep(self.delay).await;
        let mut response = Response::new();
        for record in message.into_records() {
            response.add_output(vec![record]);
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        Ok(response)
    }
}

pub struct FailingMessageProcessor;

#[async_trait]
impl MessageProcessor for FailingMessageProcessor {
    async fn process(&self, _message: Message) -> Result<Response, PipelineError> {
        Err(PipelineError::processing("downstream rejected batch"))
    }
}

// ========================================
// TransactionManager
// ========================================

#[derive(Default)]
struct TxCalls {
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
    errors_set: AtomicUsize,
    last_error: Mutex<Option<PipelineError>>,
}

/// Counts every transactional call; optionally fails the nth commit (1-based).
pub struct RecordingTransactionManager {
    calls: Arc<TxCalls>,
    fail_commit_on: Option<usize>,
}

impl RecordingTransactionManager {
    pub fn new() -> Self {
        Self {
            calls: Arc::new(TxCalls::default()),
            fail_commit_on: None,
        }
    }

    pub fn failing_commit_on(n: usize) -> Self {
        Self {
            fail_commit_on: Some(n),
            ..Self::new()
        }
    }

    pub fn commits(&self) -> usize {
        self.calls.commits.load(Ordering::SeqCst)
    }

    pub fn rollbacks(&self) -> usize {
        self.calls.rollbacks.load(Ordering::SeqCst)
    }

    pub fn errors_set(&self) -> usize {
        self.calls.errors_set.load(Ordering::SeqCst)
    }

    pub fn last_error(&self) -> Option<PipelineError> {
        self.calls.last_error.lock().unwrap().clone()
    }
}

#[async_trait]
impl TransactionManager for RecordingTransactionManager {
    async fn get_transaction(&self) -> Result<Box<dyn Transaction>, PipelineError> {
        Ok(Box::new(RecordingTransaction {
            id: TransactionId::generate(),
            calls: Arc::clone(&self.calls),
            fail_commit_on: self.fail_commit_on,
            error: None,
        }))
    }
}

struct RecordingTransaction {
    id: TransactionId,
    calls: Arc<TxCalls>,
    fail_commit_on: Option<usize>,
    error: Option<PipelineError>,
}

#[async_trait]
impl Transaction for RecordingTransaction {
    fn id(&self) -> TransactionId {
        self.id
    }

    async fn commit(&mut self) -> Result<(), PipelineError> {
        let n = self.calls.commits.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_commit_on == Some(n) {
            return Err(PipelineError::transaction(format!("commit {n} refused")));
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), PipelineError> {
        self.calls.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn error_or_exception(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    fn set_error_or_exception(&mut self, error: PipelineError) {
        self.calls.errors_set.fetch_add(1, Ordering::SeqCst);
        *self.calls.last_error.lock().unwrap() = Some(error.clone());
        self.error = Some(error);
    }
}

// ========================================
// LifecycleComponent
// ========================================

/// A managed component with no work of its own, just a lifecycle.
pub struct ManagedFlag {
    state: StateCell,
    invalid: bool,
    stops: AtomicUsize,
}

impl ManagedFlag {
    pub fn new() -> Self {
        Self {
            state: StateCell::new("managed"),
            invalid: false,
            stops: AtomicUsize::new(0),
        }
    }

    pub fn invalid() -> Self {
        Self {
            invalid: true,
            ..Self::new()
        }
    }

    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LifecycleComponent for ManagedFlag {
    async fn start(&self) -> Result<(), PipelineError> {
        self.state.transition(NodeState::Stopped, NodeState::Started)
    }

    async fn stop(&self) -> Result<(), PipelineError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        if self.state.advance(NodeState::Started, NodeState::Stopping) {
            self.state.set(NodeState::Stopped);
        }
        Ok(())
    }

    fn validate(&self, errors: &mut Vec<ValidationError>) {
        if self.invalid {
            errors.push(ValidationError::new("managed", "misconfigured"));
        }
    }

    fn state(&self) -> NodeState {
        self.state.get()
    }

    async fn wait_for_state(&self, state: NodeState) {
        self.state.wait_for(state).await;
    }
}
