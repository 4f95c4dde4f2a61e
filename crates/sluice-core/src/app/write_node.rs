//! WriteNode - WriteConnector へバッチを届けるステージ
//!
//! connector は Mutex で守るので、複数の経路から同じ WriteNode を呼んでも
//! 1 回の deliver() はその connector に対してアトミックです。

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, error};

use super::lifecycle::StateCell;
use crate::domain::{Message, NodeState, PipelineError, Response, ValidationError};
use crate::ports::{LifecycleComponent, MessageProcessor, WriteConnector};

pub struct WriteNode {
    name: String,
    connector: Option<Mutex<Box<dyn WriteConnector>>>,
    state: StateCell,
}

impl WriteNode {
    pub fn new(name: impl Into<String>, connector: Box<dyn WriteConnector>) -> Self {
        let name = name.into();
        Self {
            state: StateCell::new(name.clone()),
            name,
            connector: Some(Mutex::new(connector)),
        }
    }

    /// A node with no connector. Fails validation; useful when wiring from settings.
    pub fn unconfigured(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            state: StateCell::new(name.clone()),
            name,
            connector: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn connector(&self) -> Result<&Mutex<Box<dyn WriteConnector>>, PipelineError> {
        self.connector
            .as_ref()
            .ok_or_else(|| PipelineError::connection(format!("{}: no write connector configured", self.name)))
    }

    pub async fn connect(&self) -> Result<(), PipelineError> {
        let mut connector = self.connector()?.lock().await;
        if !self.state.is(NodeState::Stopped) {
            return Err(PipelineError::lifecycle(format!("{}: already connected", self.name)));
        }
        connector.connect().await?;
        self.state.transition(NodeState::Stopped, NodeState::Started)
    }

    pub async fn disconnect(&self) -> Result<(), PipelineError> {
        let mut connector = self.connector()?.lock().await;
        if !self.state.advance(NodeState::Started, NodeState::Stopping) {
            return Ok(());
        }
        let result = connector.disconnect().await;
        self.state.set(NodeState::Stopped);
        if let Err(err) = &result {
            error!(node = %self.name, error = %err, "disconnect failed");
        }
        result
    }
}

#[async_trait]
impl MessageProcessor for WriteNode {
    /// Deliver the whole batch in one call. Records pass through unchanged,
    /// one batch per record, with the connector's receipt attached.
    async fn process(&self, message: Message) -> Result<Response, PipelineError> {
        let mut connector = self.connector()?.lock().await;
        if !self.state.is(NodeState::Started) {
            return Err(PipelineError::connection(format!("{}: not connected", self.name)));
        }

        let receipt = connector.deliver(message.records()).await?;
        drop(connector);
        debug!(node = %self.name, message = %message.id(), records = message.len(), "delivered");

        let mut response = Response::new();
        for record in message.into_records() {
            response.add_output(vec![record]);
        }
        Ok(response.with_receipt(receipt))
    }
}

#[async_trait]
impl LifecycleComponent for WriteNode {
    async fn start(&self) -> Result<(), PipelineError> {
        self.connect().await
    }

    async fn stop(&self) -> Result<(), PipelineError> {
        self.disconnect().await
    }

    fn validate(&self, errors: &mut Vec<ValidationError>) {
        if self.connector.is_none() {
            errors.push(ValidationError::new(self.name.clone(), "no write connector configured"));
        }
    }

    fn state(&self) -> NodeState {
        self.state.get()
    }

    async fn wait_for_state(&self, state: NodeState) {
        self.state.wait_for(state).await;
    }
}
