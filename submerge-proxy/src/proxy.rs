// The state machine itself: the user-facing API, routed through
// `DualState`, plus the connection-thread entry points that install and
// replay onto a successor, kept here as inherent methods because they
// each operate on exactly one proxy's state.

use std::sync::Arc;

use submerge_lang::Path;
use tokio::sync::Mutex as AsyncMutex;

use crate::adapter::{BackendAdapter, ProxyParent, Voting};
use crate::error::ProxyError;
use crate::log::{LogEntry, SuccessfulRequestLog};
use crate::seq::SequenceAllocator;
use crate::state::{DualState, Phase, SuccessorCell, SuccessorKind};
use crate::wire::{Node, TransactionId, TransactionRequest, TransactionResponse};

pub struct ProxyTransaction {
    id: TransactionId,
    parent: Arc<dyn ProxyParent>,
    adapter: Box<dyn BackendAdapter>,
    seq: SequenceAllocator,
    log: SuccessfulRequestLog,
    state: DualState,
    // The "proxy monitor": serializes the brief CAS decision in a commit
    // fast path against `start_reconnect`'s swap. Never held across a
    // suspension point, and never taken while any queue lock (owned by the
    // parent) is held, to avoid an AB-BA deadlock against the lock
    // ordering the connection thread uses.
    commit_monitor: AsyncMutex<()>,
}

impl ProxyTransaction {
    pub fn new(
        id: TransactionId,
        parent: Arc<dyn ProxyParent>,
        adapter: Box<dyn BackendAdapter>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            parent,
            adapter,
            seq: SequenceAllocator::new(),
            log: SuccessfulRequestLog::new(),
            state: DualState::new(),
            commit_monitor: AsyncMutex::new(()),
        })
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn is_sealed(&self) -> bool {
        self.state.is_sealed()
    }

    fn check_not_sealed(&self) -> Result<(), ProxyError> {
        if self.state.is_sealed() {
            Err(ProxyError::AlreadySealed)
        } else {
            Ok(())
        }
    }

    fn check_sealed(&self) -> Result<(), ProxyError> {
        if self.state.is_sealed() {
            Ok(())
        } else {
            Err(ProxyError::NotSealed)
        }
    }

    fn check_read_write(&self) -> Result<(), ProxyError> {
        if self.adapter.is_snapshot_only() {
            Err(ProxyError::ReadOnlyViolation)
        } else {
            Ok(())
        }
    }

    // ---- read/exists ----------------------------------------------------

    pub async fn read(&self, path: Path) -> Result<Option<Node>, ProxyError> {
        self.check_not_sealed()?;
        let result = self.adapter.do_read(&path).await?;
        self.log.record_finished_request();
        Ok(result)
    }

    pub async fn exists(&self, path: Path) -> Result<bool, ProxyError> {
        self.check_not_sealed()?;
        let result = self.adapter.do_exists(&path).await?;
        self.log.record_finished_request();
        Ok(result)
    }

    // ---- write/merge/delete -----------------------------------------------

    pub async fn write(&self, path: Path, data: Node) -> Result<(), ProxyError> {
        self.check_read_write()?;
        self.check_not_sealed()?;
        self.adapter.do_write(&path, &data).await
    }

    pub async fn merge(&self, path: Path, data: Node) -> Result<(), ProxyError> {
        self.check_read_write()?;
        self.check_not_sealed()?;
        self.adapter.do_merge(&path, &data).await
    }

    pub async fn delete(&self, path: Path) -> Result<(), ProxyError> {
        self.check_read_write()?;
        self.check_not_sealed()?;
        self.adapter.do_delete(&path).await
    }

    // ---- seal ---------------------------------------------------------------

    // CAS `sealed` 0->1; must succeed or this fails with `DoubleSeal`.
    pub async fn seal(self: &Arc<Self>) -> Result<(), ProxyError> {
        if !self.state.try_seal() {
            return Err(ProxyError::DoubleSeal);
        }
        self.internal_seal().await
    }

    // Idempotent variant invoked from the successor path: CAS 0->1 and, if
    // it won, runs `internal_seal`; any later call is a silent no-op.
    pub async fn ensure_sealed(self: &Arc<Self>) -> Result<(), ProxyError> {
        if self.state.try_seal() {
            self.internal_seal().await
        } else {
            Ok(())
        }
    }

    async fn internal_seal(self: &Arc<Self>) -> Result<(), ProxyError> {
        self.adapter.do_seal().await?;
        self.parent.on_transaction_sealed(self.id);
        match self.state.try_seal_phase() {
            Ok(()) => {
                tracing::debug!(target: "submerge::proxy", txn = ?self.id, "sealed");
                Ok(())
            }
            Err(phase) => {
                let cell = successor_cell_of(&phase);
                let successor = cell.await_successor().await?;
                let successor = successor.proxy().clone();
                self.adapter.flush_state(&successor.id).await?;
                Box::pin(successor.ensure_sealed()).await
            }
        }
    }

    // ---- abort --------------------------------------------------------------

    // Pre-seal abort: fails if already sealed.
    pub async fn abort(self: &Arc<Self>) -> Result<(), ProxyError> {
        self.check_not_sealed()?;
        let seq = self.seq.next_sequence();
        self.adapter.do_abort().await?;
        let _ = self
            .parent
            .send(self.id, TransactionRequest::Abort { seq })
            .await?;
        self.parent.on_transaction_dropped(self.id);
        Ok(())
    }

    // Post-seal abort: sends an abort request and translates the response
    // into a vote, then purges.
    pub async fn abort_voting(self: &Arc<Self>, voting: Arc<dyn Voting>) -> Result<(), ProxyError> {
        self.check_sealed()?;
        let seq = self.seq.next_sequence();
        let resp = self
            .parent
            .send(self.id, TransactionRequest::Abort { seq })
            .await;
        match resp {
            Ok(TransactionResponse::AbortSuccess) => voting.vote_yes(),
            Ok(TransactionResponse::RequestFailure(cause)) => {
                voting.vote_no(ProxyError::CommitFailed(cause))
            }
            Ok(_) => voting.vote_no(ProxyError::ProtocolViolation),
            Err(e) => voting.vote_no(e),
        }
        self.purge().await
    }

    // ---- commit protocol ------------------------------------------------------

    pub async fn direct_commit(self: &Arc<Self>) -> Result<bool, ProxyError> {
        self.check_sealed()?;
        self.commit_phase(false).await?;
        self.parent.on_transaction_complete(self.id);
        self.purge().await?;
        Ok(true)
    }

    pub async fn can_commit(self: &Arc<Self>, voting: Arc<dyn Voting>) -> Result<(), ProxyError> {
        self.check_sealed()?;
        match self.commit_phase(true).await {
            Ok(()) => {
                voting.vote_yes();
                tracing::debug!(target: "submerge::proxy", txn = ?self.id, "can_commit complete");
                Ok(())
            }
            Err(e) => {
                voting.vote_no(e.clone());
                Err(e)
            }
        }
    }

    // Shared fast/slow path of the commit protocol, parameterized by
    // `coordinated` (`false` for `direct_commit`, `true` for `can_commit`).
    async fn commit_phase(self: &Arc<Self>, coordinated: bool) -> Result<(), ProxyError> {
        let flushed = {
            let _monitor = self.commit_monitor.lock().await;
            self.state.try_flush_phase()
        };
        match flushed {
            Ok(()) => {
                let seq = self.seq.next_sequence();
                let req = self.adapter.commit_request(seq, coordinated);
                let resp = self.parent.send(self.id, req.clone()).await?;
                match resp {
                    TransactionResponse::CommitSuccess | TransactionResponse::CanCommitSuccess => {
                        if coordinated {
                            self.log.record_successful_request(req);
                        }
                        Ok(())
                    }
                    TransactionResponse::RequestFailure(cause) => {
                        Err(ProxyError::CommitFailed(cause))
                    }
                    _ => Err(ProxyError::ProtocolViolation),
                }
            }
            Err(phase) => {
                let cell = successor_cell_of(&phase);
                let successor = cell.await_successor().await?;
                let successor = successor.proxy().clone();
                Box::pin(successor.commit_phase(coordinated)).await
            }
        }
    }

    // Runs only after a successful `can_commit` (so `phase` is FLUSHED).
    // On success, clears the log and records the preCommit request itself,
    // so a mid-preCommit reconnect can still resync the backend.
    pub async fn pre_commit(self: &Arc<Self>, voting: Arc<dyn Voting>) -> Result<(), ProxyError> {
        self.check_sealed()?;
        let seq = self.seq.next_sequence();
        let req = TransactionRequest::PreCommit { seq };
        let resp = self.parent.send(self.id, req.clone()).await;
        match resp {
            Ok(TransactionResponse::PreCommitSuccess) => {
                self.log.reset_to(LogEntry::Request(req));
                voting.vote_yes();
                Ok(())
            }
            Ok(TransactionResponse::RequestFailure(cause)) => {
                let e = ProxyError::CommitFailed(cause);
                voting.vote_no(e.clone());
                Err(e)
            }
            Ok(_) => {
                voting.vote_no(ProxyError::ProtocolViolation);
                Err(ProxyError::ProtocolViolation)
            }
            Err(e) => {
                voting.vote_no(e.clone());
                Err(e)
            }
        }
    }

    pub async fn do_commit(self: &Arc<Self>, voting: Arc<dyn Voting>) -> Result<(), ProxyError> {
        self.check_sealed()?;
        let seq = self.seq.next_sequence();
        let resp = self
            .parent
            .send(self.id, TransactionRequest::DoCommit { seq })
            .await;
        let result = match resp {
            Ok(TransactionResponse::CommitSuccess) => {
                voting.vote_yes();
                Ok(())
            }
            Ok(TransactionResponse::RequestFailure(cause)) => {
                let e = ProxyError::CommitFailed(cause);
                voting.vote_no(e.clone());
                Err(e)
            }
            Ok(_) => {
                voting.vote_no(ProxyError::ProtocolViolation);
                Err(ProxyError::ProtocolViolation)
            }
            Err(e) => {
                voting.vote_no(e.clone());
                Err(e)
            }
        };
        self.parent.on_transaction_complete(self.id);
        self.purge().await?;
        result
    }

    // ---- terminal --------------------------------------------------------

    // Terminal: clears the log, sends a purge request, and on
    // acknowledgement notifies the parent to remove this proxy.
    pub async fn purge(self: &Arc<Self>) -> Result<(), ProxyError> {
        self.log.clear();
        let seq = self.seq.next_sequence();
        let _ = self
            .parent
            .send(self.id, TransactionRequest::Purge { seq })
            .await?;
        self.parent.on_transaction_purged(self.id);
        Ok(())
    }

    // ---- connection-thread entry points: install and replay onto a successor --

    // Installs a fresh SUCCESSOR wrapper, swapping it atomically into
    // `phase` and capturing whatever phase was live into `prev`. Fatal if
    // a SUCCESSOR was already installed.
    pub fn start_reconnect(self: &Arc<Self>) -> Arc<SuccessorCell> {
        self.state.install_successor()
    }

    // Binds `successor` into the SUCCESSOR wrapper, replays the
    // successful-request log and the matching entries of `enqueued` onto
    // it, and, if the predecessor had already reached SEALED, carries
    // the seal across too.
    pub async fn replay_messages(
        self: &Arc<Self>,
        cell: &SuccessorCell,
        successor: SuccessorKind,
        enqueued: &mut Vec<(TransactionId, TransactionRequest, NoopCallback)>,
    ) -> Result<(), ProxyError> {
        let target = successor.proxy().clone();

        for entry in self.log.drain() {
            match entry {
                LogEntry::Request(req) => {
                    target.adapter.handle_forwarded_remote_request(req).await?;
                }
                LogEntry::IncrementSequence { delta } => {
                    target.seq.increment_sequence(delta);
                }
            }
        }

        enqueued.retain_mut(|(id, req, cb)| {
            if *id == self.id {
                let target = target.clone();
                let req = req.clone();
                cb.fire(target, req);
                false
            } else {
                true
            }
        });

        cell.set_successor(successor);

        if matches!(cell.prev(), Phase::Sealed) {
            self.adapter.flush_state(&target.id).await?;
            target.ensure_sealed().await?;
        }
        Ok(())
    }

    // Opens the latch: application threads blocked in `await_successor`
    // now observe a non-null successor and resume on it.
    pub fn finish_reconnect(&self, cell: &SuccessorCell) {
        cell.finish();
    }

    // The in-flight-retry entry point: looks up the successor and
    // dispatches via `forward_to_local`/`forward_to_remote` depending on
    // its kind. Unknown kinds can't occur here (`SuccessorKind` is a
    // closed enum), so there is no catch-all branch to panic in.
    pub async fn replay_request(
        cell: &SuccessorCell,
        req: TransactionRequest,
    ) -> Result<(), ProxyError> {
        let successor = cell.await_successor().await?;
        let proxy = successor.proxy().clone();
        match &successor {
            SuccessorKind::Local(_) => proxy.parent.forward_to_local(proxy.id, req).await,
            SuccessorKind::Remote(_) => proxy.parent.forward_to_remote(proxy.id, req).await,
        }
    }
}

// A forwarded in-flight request's original callback, preserved and
// re-invoked on the successor with no special handling needed beyond
// that, modeled as a boxed closure rather than a trait so the parent's
// queue can carry heterogeneous callbacks.
pub struct NoopCallback(Option<Box<dyn FnOnce(Arc<ProxyTransaction>, TransactionRequest) + Send>>);

impl NoopCallback {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Arc<ProxyTransaction>, TransactionRequest) + Send + 'static,
    {
        NoopCallback(Some(Box::new(f)))
    }

    pub fn noop() -> Self {
        NoopCallback(Some(Box::new(|_, _| {})))
    }

    fn fire(&mut self, target: Arc<ProxyTransaction>, req: TransactionRequest) {
        if let Some(f) = self.0.take() {
            f(target, req);
        }
    }
}

fn successor_cell_of(phase: &Arc<Phase>) -> Arc<SuccessorCell> {
    match &**phase {
        Phase::Successor(cell) => cell.clone(),
        _ => panic!("phase CAS failed but phase is not SUCCESSOR: invariant violation"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use submerge_lang::{Bin, Vals, Word};
    use submerge_net::{NodeID, NodeTime, RealmTime};
    use test_log::test as log_test;

    fn path(n: i64) -> Path {
        Path(vec![Word::new(Bin::new(0, n))])
    }

    fn txn_id(n: i64) -> TransactionId {
        TransactionId::new(RealmTime::new(NodeTime::new(0), NodeID(1), n))
    }

    #[derive(Default)]
    struct FakeAdapter {
        snapshot_only: bool,
        writes: StdMutex<Vec<(Path, Node)>>,
        sealed_calls: StdMutex<u32>,
    }

    impl FakeAdapter {
        fn read_write() -> Self {
            FakeAdapter::default()
        }

        fn snapshot() -> Self {
            FakeAdapter {
                snapshot_only: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl BackendAdapter for FakeAdapter {
        fn is_snapshot_only(&self) -> bool {
            self.snapshot_only
        }

        async fn do_read(&self, _path: &Path) -> Result<Option<Node>, ProxyError> {
            Ok(Some(Vals::I64s(vec![1])))
        }

        async fn do_exists(&self, _path: &Path) -> Result<bool, ProxyError> {
            Ok(true)
        }

        async fn do_write(&self, path: &Path, data: &Node) -> Result<(), ProxyError> {
            self.writes.lock().unwrap().push((path.clone(), data.clone()));
            Ok(())
        }

        async fn do_merge(&self, path: &Path, data: &Node) -> Result<(), ProxyError> {
            self.writes.lock().unwrap().push((path.clone(), data.clone()));
            Ok(())
        }

        async fn do_delete(&self, path: &Path) -> Result<(), ProxyError> {
            self.writes
                .lock()
                .unwrap()
                .push((path.clone(), Vals::I64s(vec![])));
            Ok(())
        }

        async fn do_seal(&self) -> Result<(), ProxyError> {
            *self.sealed_calls.lock().unwrap() += 1;
            Ok(())
        }

        async fn do_abort(&self) -> Result<(), ProxyError> {
            Ok(())
        }

        async fn flush_state(&self, _successor: &TransactionId) -> Result<(), ProxyError> {
            Ok(())
        }

        fn commit_request(&self, seq: u64, coordinated: bool) -> TransactionRequest {
            TransactionRequest::Commit { seq, coordinated }
        }

        async fn handle_forwarded_remote_request(
            &self,
            _req: TransactionRequest,
        ) -> Result<(), ProxyError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeParent {
        sent: StdMutex<Vec<TransactionRequest>>,
        events: StdMutex<Vec<String>>,
        force_other_for_docommit: AtomicBool,
    }

    #[async_trait]
    impl ProxyParent for FakeParent {
        async fn send(
            &self,
            _id: TransactionId,
            req: TransactionRequest,
        ) -> Result<TransactionResponse, ProxyError> {
            self.sent.lock().unwrap().push(req.clone());
            let resp = match &req {
                TransactionRequest::Abort { .. } => TransactionResponse::AbortSuccess,
                TransactionRequest::Commit {
                    coordinated: false, ..
                } => TransactionResponse::CommitSuccess,
                TransactionRequest::Commit {
                    coordinated: true, ..
                } => TransactionResponse::CanCommitSuccess,
                TransactionRequest::PreCommit { .. } => TransactionResponse::PreCommitSuccess,
                TransactionRequest::DoCommit { .. } => {
                    if self.force_other_for_docommit.load(Ordering::SeqCst) {
                        TransactionResponse::Other
                    } else {
                        TransactionResponse::CommitSuccess
                    }
                }
                TransactionRequest::Purge { .. } => TransactionResponse::PurgeSuccess,
                _ => TransactionResponse::Other,
            };
            Ok(resp)
        }

        async fn forward_to_local(
            &self,
            _id: TransactionId,
            _req: TransactionRequest,
        ) -> Result<(), ProxyError> {
            Ok(())
        }

        async fn forward_to_remote(
            &self,
            _id: TransactionId,
            _req: TransactionRequest,
        ) -> Result<(), ProxyError> {
            Ok(())
        }

        fn on_transaction_sealed(&self, id: TransactionId) {
            self.events.lock().unwrap().push(format!("sealed:{id:?}"));
        }

        fn on_transaction_complete(&self, id: TransactionId) {
            self.events.lock().unwrap().push(format!("complete:{id:?}"));
        }

        fn on_transaction_dropped(&self, id: TransactionId) {
            self.events.lock().unwrap().push(format!("dropped:{id:?}"));
        }

        fn on_transaction_purged(&self, id: TransactionId) {
            self.events.lock().unwrap().push(format!("purged:{id:?}"));
        }
    }

    #[derive(Default)]
    struct FakeVoting {
        yes: AtomicBool,
        no: StdMutex<Option<String>>,
    }

    impl Voting for FakeVoting {
        fn vote_yes(&self) {
            self.yes.store(true, Ordering::SeqCst);
        }

        fn vote_no(&self, cause: ProxyError) {
            *self.no.lock().unwrap() = Some(cause.to_string());
        }
    }

    fn sent_kinds(parent: &FakeParent) -> Vec<&'static str> {
        parent
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|r| match r {
                TransactionRequest::Read { .. } => "Read",
                TransactionRequest::Exists { .. } => "Exists",
                TransactionRequest::Write { .. } => "Write",
                TransactionRequest::Merge { .. } => "Merge",
                TransactionRequest::Delete { .. } => "Delete",
                TransactionRequest::Seal { .. } => "Seal",
                TransactionRequest::Abort { .. } => "Abort",
                TransactionRequest::Commit { .. } => "Commit",
                TransactionRequest::PreCommit { .. } => "PreCommit",
                TransactionRequest::DoCommit { .. } => "DoCommit",
                TransactionRequest::Purge { .. } => "Purge",
            })
            .collect()
    }

    // S1: read-then-commit, no reconnect.
    #[tokio::test]
    async fn s1_read_then_direct_commit() {
        let parent = Arc::new(FakeParent::default());
        let adapter = Box::new(FakeAdapter::read_write());
        let p = ProxyTransaction::new(txn_id(1), parent.clone(), adapter);

        let got = p.read(path(0)).await.unwrap();
        assert!(got.is_some());

        p.write(path(0), Vals::I64s(vec![42])).await.unwrap();
        p.seal().await.unwrap();
        let committed = p.direct_commit().await.unwrap();
        assert!(committed);

        assert_eq!(sent_kinds(&parent), vec!["Commit", "Purge"]);
        let events = parent.events.lock().unwrap();
        assert!(events.iter().any(|e| e.starts_with("sealed:")));
        assert!(events.iter().any(|e| e.starts_with("complete:")));
        assert!(events.iter().any(|e| e.starts_with("purged:")));
    }

    // S2: double seal, first seal's commit still succeeds.
    #[tokio::test]
    async fn s2_double_seal_fails_but_commit_still_succeeds() {
        let parent = Arc::new(FakeParent::default());
        let p = ProxyTransaction::new(
            txn_id(2),
            parent.clone(),
            Box::new(FakeAdapter::read_write()),
        );

        p.seal().await.unwrap();
        let second = p.seal().await;
        assert!(matches!(second, Err(ProxyError::DoubleSeal)));

        let committed = p.direct_commit().await.unwrap();
        assert!(committed);
    }

    // S3: reconnect races seal; the successor reaches SEALED.
    #[log_test(tokio::test)]
    async fn s3_reconnect_during_seal() {
        let parent = Arc::new(FakeParent::default());
        let predecessor = ProxyTransaction::new(
            txn_id(3),
            parent.clone(),
            Box::new(FakeAdapter::read_write()),
        );
        let successor = ProxyTransaction::new(
            txn_id(30),
            parent.clone(),
            Box::new(FakeAdapter::read_write()),
        );

        // The connection thread wins the race: it installs the successor
        // wrapper before the application thread's seal() attempts its
        // phase CAS.
        let cell = predecessor.start_reconnect();
        let mut enqueued: Vec<(TransactionId, TransactionRequest, NoopCallback)> = vec![];

        let (seal_result, _) = tokio::join!(predecessor.seal(), async {
            predecessor
                .replay_messages(
                    &cell,
                    SuccessorKind::Local(successor.clone()),
                    &mut enqueued,
                )
                .await
                .unwrap();
            predecessor.finish_reconnect(&cell);
        });

        seal_result.unwrap();
        assert!(successor.is_sealed());
    }

    // S4: reconnect races canCommit; the vote still comes back yes, routed
    // through the successor.
    #[tokio::test]
    async fn s4_reconnect_during_can_commit() {
        let parent = Arc::new(FakeParent::default());
        let predecessor = ProxyTransaction::new(
            txn_id(4),
            parent.clone(),
            Box::new(FakeAdapter::read_write()),
        );
        predecessor.seal().await.unwrap();

        let successor = ProxyTransaction::new(
            txn_id(40),
            parent.clone(),
            Box::new(FakeAdapter::read_write()),
        );
        successor.seal().await.unwrap();

        let cell = predecessor.start_reconnect();
        let mut enqueued: Vec<(TransactionId, TransactionRequest, NoopCallback)> = vec![];
        let voting = Arc::new(FakeVoting::default());

        let (commit_result, _) = tokio::join!(predecessor.can_commit(voting.clone()), async {
            predecessor
                .replay_messages(
                    &cell,
                    SuccessorKind::Local(successor.clone()),
                    &mut enqueued,
                )
                .await
                .unwrap();
            predecessor.finish_reconnect(&cell);
        });

        commit_result.unwrap();
        assert!(voting.yes.load(Ordering::SeqCst));
        assert_eq!(sent_kinds(&parent), vec!["Commit"]);
    }

    // S5: read-only snapshot proxy rejects writes; pre-seal abort notifies
    // the parent and sends an AbortRequest.
    #[tokio::test]
    async fn s5_snapshot_only_rejects_writes_and_aborts_cleanly() {
        let parent = Arc::new(FakeParent::default());
        let p = ProxyTransaction::new(txn_id(5), parent.clone(), Box::new(FakeAdapter::snapshot()));

        let err = p.write(path(0), Vals::I64s(vec![1])).await.unwrap_err();
        assert!(matches!(err, ProxyError::ReadOnlyViolation));

        p.abort().await.unwrap();
        assert_eq!(sent_kinds(&parent), vec!["Abort"]);
        assert!(parent
            .events
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.starts_with("dropped:")));
    }

    // S6: an unrelated response class to DoCommitRequest votes no with
    // ProtocolViolation, but purge still runs.
    #[tokio::test]
    async fn s6_protocol_violation_still_purges() {
        let parent = Arc::new(FakeParent::default());
        parent.force_other_for_docommit.store(true, Ordering::SeqCst);
        let p = ProxyTransaction::new(
            txn_id(6),
            parent.clone(),
            Box::new(FakeAdapter::read_write()),
        );
        p.seal().await.unwrap();

        let voting = Arc::new(FakeVoting::default());
        let result = p.do_commit(voting.clone()).await;
        assert!(matches!(result, Err(ProxyError::ProtocolViolation)));
        assert!(!voting.yes.load(Ordering::SeqCst));
        assert_eq!(voting.no.lock().unwrap().as_deref(), Some("unexpected response for this call site"));
        assert_eq!(sent_kinds(&parent), vec!["DoCommit", "Purge"]);
    }

    #[log_test(tokio::test)]
    async fn pre_commit_then_reconnect_retains_one_log_entry() {
        let parent = Arc::new(FakeParent::default());
        let p = ProxyTransaction::new(
            txn_id(7),
            parent.clone(),
            Box::new(FakeAdapter::read_write()),
        );
        p.seal().await.unwrap();
        let voting = Arc::new(FakeVoting::default());
        p.can_commit(voting.clone()).await.unwrap();
        // canCommit recorded its own request in the log.
        assert_eq!(p.log.len(), 1);

        let voting2 = Arc::new(FakeVoting::default());
        p.pre_commit(voting2.clone()).await.unwrap();
        assert!(voting2.yes.load(Ordering::SeqCst));
        // preCommit replaces the log with exactly one entry: itself.
        assert_eq!(p.log.len(), 1);
    }

    // preCommit/doCommit are post-seal operations (spec §4.2); calling
    // either before seal() must fail with NotSealed rather than reaching
    // the backend.
    #[tokio::test]
    async fn pre_commit_and_do_commit_reject_unsealed_proxy() {
        let parent = Arc::new(FakeParent::default());
        let p = ProxyTransaction::new(
            txn_id(8),
            parent.clone(),
            Box::new(FakeAdapter::read_write()),
        );

        let voting = Arc::new(FakeVoting::default());
        let err = p.pre_commit(voting.clone()).await.unwrap_err();
        assert!(matches!(err, ProxyError::NotSealed));

        let voting2 = Arc::new(FakeVoting::default());
        let err2 = p.do_commit(voting2.clone()).await.unwrap_err();
        assert!(matches!(err2, ProxyError::NotSealed));

        assert!(sent_kinds(&parent).is_empty());
    }
}
