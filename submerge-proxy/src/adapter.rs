// The seams named in spec §4.5 (BackendAdapter, implemented by the
// concrete local/remote subclasses this spec explicitly leaves out of
// scope) plus the two collaborator contracts the prose refers to but never
// tables: the parent (ProxyHistory) and the external vote aggregator.

use async_trait::async_trait;
use submerge_lang::Path;

use crate::error::ProxyError;
use crate::wire::{Node, TransactionId, TransactionRequest, TransactionResponse};

// Implemented by the three concrete proxy flavors this spec deliberately
// leaves external: snapshot-only, local read-write, remote. The core never
// downcasts this trait object; where it needs to know which concrete kind
// a *successor* is, it consults `SuccessorKind` instead (spec §9).
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    // Pure. Read-only proxies return `true`.
    fn is_snapshot_only(&self) -> bool;

    async fn do_read(&self, path: &Path) -> Result<Option<Node>, ProxyError>;
    async fn do_exists(&self, path: &Path) -> Result<bool, ProxyError>;

    // Buffers or sends; must not allocate sequences (those are reserved
    // to `SequenceAllocator`).
    async fn do_write(&self, path: &Path, data: &Node) -> Result<(), ProxyError>;
    async fn do_merge(&self, path: &Path, data: &Node) -> Result<(), ProxyError>;
    async fn do_delete(&self, path: &Path) -> Result<(), ProxyError>;

    // Finalizes buffered operations. The core guarantees this runs at most
    // once per proxy, so the adapter need not make it idempotent itself.
    async fn do_seal(&self) -> Result<(), ProxyError>;

    // Pre-seal only: emits an abort-equivalent.
    async fn do_abort(&self) -> Result<(), ProxyError>;

    // Called under the proxy monitor. Transfers adapter-owned residual
    // state to `successor` so the successor can itself be sealed.
    async fn flush_state(&self, successor: &TransactionId) -> Result<(), ProxyError>;

    // Returns a commit request specialized to this adapter. Called at most
    // once per proxy. `coordinated=false` for `directCommit`, `true` for
    // `canCommit`.
    fn commit_request(&self, seq: u64, coordinated: bool) -> TransactionRequest;

    // Accepts a request replayed from a predecessor during
    // `replay_messages`; must re-sequence it under this (successor)
    // proxy's own allocator rather than trusting the predecessor's.
    async fn handle_forwarded_remote_request(
        &self,
        req: TransactionRequest,
    ) -> Result<(), ProxyError>;
}

// The parent (`ProxyHistory`), out of scope per spec §1 beyond this
// contract: it owns the connection, dispatches requests, and is told about
// the lifecycle events the proxy can't observe on its own.
#[async_trait]
pub trait ProxyParent: Send + Sync {
    async fn send(
        &self,
        id: TransactionId,
        req: TransactionRequest,
    ) -> Result<TransactionResponse, ProxyError>;

    // Accepts a retried in-flight request, already known to be headed to a
    // backend-adapter proxy hosted in this same process.
    async fn forward_to_local(
        &self,
        id: TransactionId,
        req: TransactionRequest,
    ) -> Result<(), ProxyError>;

    // Same, but the destination is a remote node.
    async fn forward_to_remote(
        &self,
        id: TransactionId,
        req: TransactionRequest,
    ) -> Result<(), ProxyError>;

    fn on_transaction_sealed(&self, id: TransactionId);
    fn on_transaction_complete(&self, id: TransactionId);
    fn on_transaction_dropped(&self, id: TransactionId);
    fn on_transaction_purged(&self, id: TransactionId);
}

// Stands in for the external `VotingFuture` collaborator (spec §1
// Non-goals): the narrow surface this proxy calls into to contribute one
// participant's vote to a multi-shard decision it does not itself
// aggregate.
pub trait Voting: Send + Sync {
    fn vote_yes(&self);
    fn vote_no(&self, cause: ProxyError);
}
