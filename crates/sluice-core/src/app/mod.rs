//! App - アプリケーション層
//!
//! ports を組み合わせてパイプラインのランタイムを実装します。
//!
//! # 主要コンポーネント
//! - **Node / ProcessorNode**: Message → Response の変換ステージ
//! - **ReadNode / WriteNode**: ソースからの pull ループとシンクへの配送
//! - **TransactionInitiator**: サイクル単位の commit / rollback
//! - **TransactedNodeRunner**: 管理対象コンポーネントに紐づくループ
//! - **PipelineBuilder**: ワイヤリングと起動時検証

pub mod builder;
pub mod lifecycle;
pub mod node;
pub mod processor_node;
pub mod read_node;
pub mod runner;
pub mod status;
pub mod transaction;
pub mod write_node;

// 主要な型を再エクスポート
pub use self::builder::{BuildError, Pipeline, PipelineBuilder};
pub use self::lifecycle::{ShutdownSignal, StateCell};
pub use self::node::Node;
pub use self::processor_node::{FaultPolicy, ProcessorNode};
pub use self::read_node::{ReadNode, ReadNodeBuilder, ReadNodeSettings};
pub use self::runner::{RunnerSettings, TransactedNodeRunner};
pub use self::status::NodeStatus;
pub use self::transaction::{CycleOutcome, TransactionInitiator};
pub use self::write_node::WriteNode;
