//! Ports - 外部コラボレーターとの境界
//!
//! このクレートが消費・公開する trait をまとめます。
//! 具体的な実装は `impls`（開発・テスト用）かクレートの外にあります。

pub mod connector;
pub mod lifecycle;
pub mod processor;
pub mod transaction;

pub use self::connector::{ReadConnector, WriteConnector};
pub use self::lifecycle::LifecycleComponent;
pub use self::processor::{DataProcessor, MessageProcessor};
pub use self::transaction::{Transaction, TransactionManager};
