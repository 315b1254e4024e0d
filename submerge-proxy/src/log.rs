// Append-only record of requests the backend has acknowledged, kept so a
// reconnect can replay them onto a successor (spec §3, §4.1).
//
// Writer: application thread only, via `record_successful_request` and
// `record_finished_request`. Reader: the connection thread, only from
// inside `replay_messages`, which happens strictly after `start_reconnect`
// has forced every application fast path onto the successor's latch; that
// CAS/swap on `phase` is the happens-before edge, so a plain `Mutex` here
// is a formality rather than a contended lock.

use std::sync::Mutex;

use crate::wire::TransactionRequest;

#[derive(Debug, Clone)]
pub enum LogEntry {
    Request(TransactionRequest),
    // Coalesces `delta` consecutive read-type acknowledgements into one
    // counter, instead of keeping a verbatim entry per read.
    IncrementSequence { delta: u64 },
}

#[derive(Debug, Default)]
pub struct SuccessfulRequestLog {
    entries: Mutex<Vec<LogEntry>>,
}

impl SuccessfulRequestLog {
    pub fn new() -> Self {
        Self::default()
    }

    // Appends a concrete request, to be re-sent verbatim on replay.
    pub fn record_successful_request(&self, req: TransactionRequest) {
        self.entries.lock().unwrap().push(LogEntry::Request(req));
    }

    // Records that one more read-type request finished, folding it into a
    // trailing `IncrementSequence` run when possible.
    pub fn record_finished_request(&self) {
        let mut entries = self.entries.lock().unwrap();
        if let Some(LogEntry::IncrementSequence { delta }) = entries.last_mut() {
            *delta += 1;
        } else {
            entries.push(LogEntry::IncrementSequence { delta: 1 });
        }
    }

    // Drains the log in order, for replay. Leaves the log empty, matching
    // the "cleared on preCommit-complete and on replay" invariant (spec §3).
    pub fn drain(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.entries.lock().unwrap())
    }

    // Clears the log and records a single entry in its place, used by
    // `preCommit` to retain just the preCommit request itself (spec §4.4).
    pub fn reset_to(&self, entry: LogEntry) {
        let mut entries = self.entries.lock().unwrap();
        entries.clear();
        entries.push(entry);
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
