use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Bounded record of recently accepted signature tokens, oldest evicted
/// first. Membership test and insert happen under one lock, so of two
/// concurrent requests carrying the same token exactly one is accepted.
///
/// The ledger lives for the process lifetime only; replay protection does
/// not survive a restart.
#[derive(Debug, Clone)]
pub struct ReplayLedger {
    capacity: usize,
    inner: Arc<Mutex<LedgerInner>>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    seen: HashSet<String>,
    order: VecDeque<String>,
}

impl ReplayLedger {
    pub const DEFAULT_CAPACITY: usize = 100;

    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: Arc::new(Mutex::new(LedgerInner::default())),
        }
    }

    /// Returns true when the token has not been seen before (and records
    /// it); false when it duplicates a still-tracked token.
    pub async fn check_and_record(&self, token: &str) -> bool {
        let mut inner = self.inner.lock().await;
        if inner.seen.contains(token) {
            return false;
        }
        inner.seen.insert(token.to_string());
        inner.order.push_back(token.to_string());
        if inner.order.len() > self.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.seen.remove(&oldest);
            }
        }
        true
    }
}

impl Default for ReplayLedger {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}
