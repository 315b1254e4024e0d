// The two-axis state model: a 32-bit `sealed` flag that flips 0->1 exactly
// once, and a `phase` slot that walks OPEN -> SEALED -> FLUSHED or, at any
// point, gets swapped for a SUCCESSOR wrapper closing the fast paths. Kept
// as two separate atomics on purpose, not collapsed into one word: the
// SUCCESSOR payload is variably sized, and the two axes (user-visible
// sealing vs. commit/reconnect coordination) are read independently by
// different call sites.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use once_cell::sync::Lazy;
use tokio::sync::Notify;

use crate::proxy::ProxyTransaction;

// One-shot gate: `open()` may be called at most once; any number of
// tasks may `wait()` before or after that call. Built from a `Notify`
// plus a flag rather than a semaphore, since there is exactly one permit
// ever granted, to all waiters at once.
#[derive(Debug, Default)]
pub struct Latch {
    notify: Notify,
    opened: AtomicBool,
}

impl Latch {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn wait(&self) {
        if self.opened.load(Ordering::Acquire) {
            return;
        }
        let notified = self.notify.notified();
        if self.opened.load(Ordering::Acquire) {
            return;
        }
        notified.await;
    }

    pub fn open(&self) {
        self.opened.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_open(&self) -> bool {
        self.opened.load(Ordering::Acquire)
    }
}

// Which adapter-seam method a replayed in-flight request dispatches
// through: a typed match on this tag, not a downcast of the adapter
// trait object.
#[derive(Clone)]
pub enum SuccessorKind {
    Local(Arc<ProxyTransaction>),
    Remote(Arc<ProxyTransaction>),
}

impl SuccessorKind {
    pub fn proxy(&self) -> &Arc<ProxyTransaction> {
        match self {
            SuccessorKind::Local(p) => p,
            SuccessorKind::Remote(p) => p,
        }
    }
}

// Fields are each written exactly once and then only read. `OnceLock`
// gives initialize-once-then-immutable semantics without a lock on the
// read path.
pub struct SuccessorCell {
    prev: std::sync::OnceLock<Phase>,
    successor: std::sync::OnceLock<SuccessorKind>,
    latch: Latch,
}

impl SuccessorCell {
    fn new() -> Self {
        Self {
            prev: std::sync::OnceLock::new(),
            successor: std::sync::OnceLock::new(),
            latch: Latch::new(),
        }
    }

    // Written exactly once, by `start_reconnect`, before the latch opens.
    pub fn set_prev(&self, prev: Phase) {
        self.prev
            .set(prev)
            .expect("SuccessorCell.prev written more than once");
    }

    pub fn prev(&self) -> &Phase {
        self.prev
            .get()
            .expect("SuccessorCell.prev read before start_reconnect set it")
    }

    // Written exactly once, by `replay_messages`, before `finish`.
    pub fn set_successor(&self, successor: SuccessorKind) {
        self.successor
            .set(successor)
            .ok()
            .expect("SuccessorCell.successor written more than once");
    }

    pub async fn await_successor(&self) -> Result<SuccessorKind, crate::error::ProxyError> {
        self.latch.wait().await;
        self.successor
            .get()
            .cloned()
            .ok_or(crate::error::ProxyError::ReconnectAborted)
    }

    pub fn finish(&self) {
        self.latch.open();
    }
}

impl Clone for SuccessorKind {
    fn clone(&self) -> Self {
        match self {
            SuccessorKind::Local(p) => SuccessorKind::Local(p.clone()),
            SuccessorKind::Remote(p) => SuccessorKind::Remote(p.clone()),
        }
    }
}

// `phase` walks the lattice OPEN < SEALED < FLUSHED, or gets replaced by a
// SUCCESSOR wrapper from any of those three states (installed at most
// once, `start_reconnect` treats finding one already installed as a fatal
// invariant violation).
#[derive(Clone)]
pub enum Phase {
    Open,
    Sealed,
    Flushed,
    Successor(Arc<SuccessorCell>),
}

impl Phase {
    pub fn is_successor(&self) -> bool {
        matches!(self, Phase::Successor(_))
    }
}

// OPEN/SEALED/FLUSHED carry no data, so each is a single process-wide
// singleton `Arc`. `ArcSwap::compare_and_swap` compares by pointer identity
// (`Arc::ptr_eq`), not structural equality, so every phase CAS has to
// compare against these same `Arc`s, not fresh `Arc::new`s.
static PHASE_OPEN: Lazy<Arc<Phase>> = Lazy::new(|| Arc::new(Phase::Open));
static PHASE_SEALED: Lazy<Arc<Phase>> = Lazy::new(|| Arc::new(Phase::Sealed));
static PHASE_FLUSHED: Lazy<Arc<Phase>> = Lazy::new(|| Arc::new(Phase::Flushed));

pub struct DualState {
    sealed: AtomicU32,
    phase: ArcSwap<Phase>,
}

impl Default for DualState {
    fn default() -> Self {
        Self {
            sealed: AtomicU32::new(0),
            phase: ArcSwap::new(PHASE_OPEN.clone()),
        }
    }
}

impl DualState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire) != 0
    }

    // CAS 0->1. Returns `true` if this call performed the transition.
    pub fn try_seal(&self) -> bool {
        self.sealed
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn phase(&self) -> Arc<Phase> {
        self.phase.load_full()
    }

    // CAS OPEN -> SEALED. `Ok(())` on success; `Err(current)` otherwise, in
    // which case `current` must be a SUCCESSOR wrapper, anything else is
    // a fatal invariant violation.
    pub fn try_seal_phase(&self) -> Result<(), Arc<Phase>> {
        self.cas_phase(&PHASE_OPEN, PHASE_SEALED.clone())
    }

    // CAS SEALED -> FLUSHED, the commit fast path's gate.
    pub fn try_flush_phase(&self) -> Result<(), Arc<Phase>> {
        self.cas_phase(&PHASE_SEALED, PHASE_FLUSHED.clone())
    }

    fn cas_phase(&self, current: &Arc<Phase>, new: Arc<Phase>) -> Result<(), Arc<Phase>> {
        let prev = self.phase.compare_and_swap(current, new);
        if Arc::ptr_eq(&*prev, current) {
            Ok(())
        } else {
            Err(prev.into_inner())
        }
    }

    // Unconditionally swaps in a SUCCESSOR wrapper, capturing whatever
    // phase was live into `prev`. Fatal if a SUCCESSOR was already
    // installed, a reconnect can graft a successor onto a proxy at most
    // once.
    pub fn install_successor(&self) -> Arc<SuccessorCell> {
        let cell = Arc::new(SuccessorCell::new());
        let new_phase = Arc::new(Phase::Successor(cell.clone()));
        let prev = self.phase.swap(new_phase);
        if prev.is_successor() {
            panic!("start_reconnect: phase already carried a successor wrapper");
        }
        cell.set_prev((*prev).clone());
        cell
    }
}
