// The request/response vocabulary the core routes by. These are opaque to
// the core in the sense that it never inspects their payloads beyond what's
// needed for sequencing and replay: it builds them, hands them to the
// parent, and pattern-matches the closed response set below.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use submerge_lang::{Path, Vals};
use submerge_net::RealmTime;

// The value stored at a path in the tree-data store. An alias, not a
// wrapper: reads/writes exchange exactly what submerge-lang's columnar
// value type already represents.
pub type Node = Vals;

// Identifies one in-flight transaction. A `RealmTime` already carries
// everything spec.md asks of an identifier (global uniqueness, routing-by-
// equality, immutability) via its `(time, node, event)` triple, so this is
// a thin newtype rather than a parallel ID scheme.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct TransactionId(pub RealmTime);

impl TransactionId {
    pub fn new(time: RealmTime) -> Self {
        TransactionId(time)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum TransactionRequest {
    Read {
        seq: u64,
        path: Path,
    },
    Exists {
        seq: u64,
        path: Path,
    },
    Write {
        seq: u64,
        path: Path,
        data: Node,
    },
    Merge {
        seq: u64,
        path: Path,
        data: Node,
    },
    Delete {
        seq: u64,
        path: Path,
    },
    Seal {
        seq: u64,
    },
    Abort {
        seq: u64,
    },
    // `coordinated=false` for `directCommit`, `true` for `canCommit`.
    Commit {
        seq: u64,
        coordinated: bool,
    },
    PreCommit {
        seq: u64,
    },
    DoCommit {
        seq: u64,
    },
    Purge {
        seq: u64,
    },
}

impl TransactionRequest {
    pub fn seq(&self) -> u64 {
        match self {
            TransactionRequest::Read { seq, .. }
            | TransactionRequest::Exists { seq, .. }
            | TransactionRequest::Write { seq, .. }
            | TransactionRequest::Merge { seq, .. }
            | TransactionRequest::Delete { seq, .. }
            | TransactionRequest::Seal { seq }
            | TransactionRequest::Abort { seq }
            | TransactionRequest::Commit { seq, .. }
            | TransactionRequest::PreCommit { seq }
            | TransactionRequest::DoCommit { seq }
            | TransactionRequest::Purge { seq } => *seq,
        }
    }

    // Whether acknowledgement of this request can be coalesced into a
    // trailing `IncrementSequence` run rather than kept verbatim (spec §3).
    pub fn is_read_type(&self) -> bool {
        matches!(
            self,
            TransactionRequest::Read { .. } | TransactionRequest::Exists { .. }
        )
    }
}

// The fixed, closed set of response variants the core pattern-matches at
// each call site (spec §6). `Other` is the catch-all that turns into
// `ProtocolViolation`.
#[derive(Clone, Debug)]
pub enum TransactionResponse {
    AbortSuccess,
    CanCommitSuccess,
    PreCommitSuccess,
    CommitSuccess,
    PurgeSuccess,
    ReadResult(Option<Node>),
    ExistsResult(bool),
    RequestFailure(Arc<submerge_base::Error>),
    Other,
}
