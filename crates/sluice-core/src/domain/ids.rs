//! Typed ULIDs for messages, transactions and node runs.
//!
//! Rendered as `<prefix><ulid>` (`msg-01H...`, `tx-01H...`, `run-01H...`) so a
//! log line says which kind of id it carries. Parsing accepts the same form.

use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// The kind an [`Id`] belongs to.
pub trait IdKind: Send + Sync + 'static {
    const PREFIX: &'static str;
}

macro_rules! id_kind {
    ($kind:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $kind {}

        impl IdKind for $kind {
            const PREFIX: &'static str = $prefix;
        }
    };
}

id_kind!(MessageKind, "msg-");
id_kind!(TransactionKind, "tx-");
id_kind!(RunKind, "run-");

/// One batch handed between stages. Derived messages point back at their parent.
pub type MessageId = Id<MessageKind>;

/// One cycle's unit of work.
pub type TransactionId = Id<TransactionKind>;

/// One pass of a node loop, from start to Stopped.
pub type RunId = Id<RunKind>;

#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<K: IdKind> {
    ulid: Ulid,
    #[serde(skip)]
    kind: PhantomData<K>,
}

impl<K: IdKind> Id<K> {
    /// A fresh id; ids minted later sort after earlier ones.
    pub fn generate() -> Self {
        Ulid::new().into()
    }

    pub fn ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<K: IdKind> From<Ulid> for Id<K> {
    fn from(ulid: Ulid) -> Self {
        Self {
            ulid,
            kind: PhantomData,
        }
    }
}

impl<K: IdKind> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(K::PREFIX)?;
        fmt::Display::fmt(&self.ulid, f)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("expected an id starting with {expected:?}, got {input:?}")]
    WrongPrefix { expected: &'static str, input: String },

    #[error("malformed ulid in {input:?}")]
    Malformed { input: String },
}

impl<K: IdKind> FromStr for Id<K> {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(K::PREFIX).ok_or_else(|| IdParseError::WrongPrefix {
            expected: K::PREFIX,
            input: s.to_string(),
        })?;
        Ulid::from_string(raw)
            .map(Self::from)
            .map_err(|_| IdParseError::Malformed { input: s.to_string() })
    }
}
