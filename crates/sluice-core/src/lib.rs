//! sluice-core
//!
//! Core building blocks for the Sluice pipeline runtime.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（record, message, ids, state, errors）
//! - **ports**: 抽象化レイヤー（ReadConnector, WriteConnector, DataProcessor, TransactionManager など）
//! - **app**: ランタイム（Node, ReadNode, WriteNode, TransactionInitiator, TransactedNodeRunner, builder）
//! - **impls**: 実装（InMemoryTransactionManager など開発用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

#[cfg(test)]
mod testing;
