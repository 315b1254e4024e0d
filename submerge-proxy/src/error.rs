// The closed error taxonomy for the transaction proxy core. Unlike
// submerge-base::Error (an opaque backtrace-carrying box meant for "this
// went wrong somewhere, log it and move on"), callers here need to match on
// *which* invariant failed, so this is a plain enum rather than a wrapper.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum ProxyError {
    // A mutating operation was attempted on a snapshot-only proxy.
    ReadOnlyViolation,
    // A pre-seal operation was attempted after `seal()` already ran.
    AlreadySealed,
    // A post-seal operation was attempted before `seal()` ran.
    NotSealed,
    // `seal()` was called a second time.
    DoubleSeal,
    // The backend reported a read/exists failure.
    ReadFailed(Arc<submerge_base::Error>),
    // The backend reported a commit-phase failure.
    CommitFailed(Arc<submerge_base::Error>),
    // A response arrived that isn't one of the closed set of variants
    // expected at that call site.
    ProtocolViolation,
    // The application thread was interrupted while awaiting a successor
    // latch. Fatal to this transaction: it cannot be split across threads.
    ReconnectAborted,
}

impl fmt::Display for ProxyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProxyError::ReadOnlyViolation => write!(f, "mutating operation on a read-only proxy"),
            ProxyError::AlreadySealed => write!(f, "transaction is already sealed"),
            ProxyError::NotSealed => write!(f, "transaction is not yet sealed"),
            ProxyError::DoubleSeal => write!(f, "seal() called more than once"),
            ProxyError::ReadFailed(cause) => write!(f, "read failed: {cause:?}"),
            ProxyError::CommitFailed(cause) => write!(f, "commit failed: {cause:?}"),
            ProxyError::ProtocolViolation => write!(f, "unexpected response for this call site"),
            ProxyError::ReconnectAborted => {
                write!(f, "interrupted while awaiting a successor proxy")
            }
        }
    }
}

impl std::error::Error for ProxyError {}

impl From<submerge_base::Error> for ProxyError {
    fn from(e: submerge_base::Error) -> Self {
        ProxyError::ReadFailed(Arc::new(e))
    }
}

pub type Result<T> = std::result::Result<T, ProxyError>;
