//! Impls - 開発・テスト用の実装
//!
//! 本番用の connector（DB / ファイル / ソケット）はこのクレートの外で実装します。

pub mod inmem_transaction;
pub mod processor;
pub mod vec_connector;

pub use self::inmem_transaction::{InMemoryTransactionManager, TransactionLog};
pub use self::processor::{FnProcessor, IdentityProcessor};
pub use self::vec_connector::{CollectingWriteConnector, VecReadConnector};
