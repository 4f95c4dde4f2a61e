//! In-memory connectors for development and tests.
//!
//! - VecReadConnector: replays a fixed list of batches, dry once they run out.
//! - CollectingWriteConnector: appends every delivered record to a shared Vec.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::domain::{PipelineError, Record};
use crate::ports::{ReadConnector, WriteConnector};

pub struct VecReadConnector {
    batches: VecDeque<Vec<Record>>,
    context: Option<Value>,
    connected: bool,
}

impl VecReadConnector {
    pub fn new(batches: Vec<Vec<Record>>) -> Self {
        Self {
            batches: batches.into(),
            context: None,
            connected: false,
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }
}

#[async_trait]
impl ReadConnector for VecReadConnector {
    async fn connect(&mut self) -> Result<(), PipelineError> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), PipelineError> {
        self.connected = false;
        Ok(())
    }

    async fn next(&mut self, _timeout: Duration) -> Result<Vec<Record>, PipelineError> {
        if !self.connected {
            return Err(PipelineError::connection("vec reader is not connected"));
        }
        Ok(self.batches.pop_front().unwrap_or_default())
    }

    async fn is_dry(&mut self) -> bool {
        self.batches.is_empty()
    }

    fn reader_context(&self) -> Option<Value> {
        self.context.clone()
    }
}

pub struct CollectingWriteConnector {
    delivered: Arc<Mutex<Vec<Record>>>,
    connected: bool,
}

impl CollectingWriteConnector {
    pub fn new() -> Self {
        Self {
            delivered: Arc::new(Mutex::new(Vec::new())),
            connected: false,
        }
    }

    /// Shared view of everything delivered so far; stays valid after the
    /// connector is moved into a node.
    pub fn delivered_handle(&self) -> Arc<Mutex<Vec<Record>>> {
        Arc::clone(&self.delivered)
    }
}

impl Default for CollectingWriteConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WriteConnector for CollectingWriteConnector {
    async fn connect(&mut self) -> Result<(), PipelineError> {
        self.connected = true;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), PipelineError> {
        self.connected = false;
        Ok(())
    }

    async fn deliver(&mut self, records: &[Record]) -> Result<Value, PipelineError> {
        if !self.connected {
            return Err(PipelineError::connection("collecting writer is not connected"));
        }
        let mut delivered = self.delivered.lock().await;
        delivered.extend_from_slice(records);
        Ok(json!({ "delivered": records.len(), "total": delivered.len() }))
    }
}
