//! Local tracking of in-flight requests.
//!
//! One [`InflightEntry`] exists per fingerprint while its response is being
//! consumed. The entry counts the frames delivered to the caller so a later
//! `resume` can re-attach exactly where delivery stopped, and records the
//! server's run id so that offset is never applied to a later run.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::fingerprint::Fingerprint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenState {
    Pending,
    Open,
    Failed,
}

/// Delivery state of one in-flight request.
#[derive(Debug)]
pub struct InflightEntry {
    delivered: AtomicUsize,
    reader: AtomicU64,
    run_id: Mutex<Option<String>>,
    state: watch::Sender<OpenState>,
}

impl InflightEntry {
    fn new() -> Self {
        let (state, _) = watch::channel(OpenState::Pending);
        Self {
            delivered: AtomicUsize::new(0),
            reader: AtomicU64::new(0),
            run_id: Mutex::new(None),
            state,
        }
    }

    /// Frames delivered to the caller so far.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }

    /// Server run the delivered count refers to, once a response named it.
    pub fn run_id(&self) -> Option<String> {
        lock(&self.run_id).clone()
    }

    pub(crate) fn set_run_id(&self, run_id: String) {
        *lock(&self.run_id) = Some(run_id);
    }

    /// Make a new reader the one whose progress is tracked.
    pub(crate) fn take_over(&self) -> u64 {
        self.reader.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Count one delivered frame if `reader` still owns the entry.
    pub(crate) fn advance(&self, reader: u64) {
        if self.reader.load(Ordering::SeqCst) == reader {
            self.delivered.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub(crate) fn mark_open(&self) {
        self.state.send_replace(OpenState::Open);
    }

    pub(crate) fn mark_failed(&self) {
        self.state.send_replace(OpenState::Failed);
    }

    /// Wait until the owning request has a response. `false` if it failed.
    pub(crate) async fn wait_open(&self) -> bool {
        let mut rx = self.state.subscribe();
        let open = match rx.wait_for(|state| *state != OpenState::Pending).await {
            Ok(state) => *state == OpenState::Open,
            Err(_) => false,
        };
        open
    }
}

/// Outcome of [`InflightRegistry::get_or_create`].
#[derive(Debug, Clone)]
pub enum Claim {
    /// No request was in flight; the caller must issue it.
    Owner(Arc<InflightEntry>),
    /// A request is already in flight for the fingerprint.
    Follower(Arc<InflightEntry>),
}

/// Injectable registry of in-flight fingerprints.
#[derive(Debug, Default)]
pub struct InflightRegistry {
    entries: Mutex<HashMap<Fingerprint, Arc<InflightEntry>>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    match m.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl InflightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically look up the entry for `fingerprint` or register a new one.
    pub fn get_or_create(&self, fingerprint: &Fingerprint) -> Claim {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get(fingerprint) {
            return Claim::Follower(Arc::clone(entry));
        }
        let entry = Arc::new(InflightEntry::new());
        entries.insert(fingerprint.clone(), Arc::clone(&entry));
        Claim::Owner(entry)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<Arc<InflightEntry>> {
        lock(&self.entries).get(fingerprint).cloned()
    }

    pub fn contains(&self, fingerprint: &Fingerprint) -> bool {
        lock(&self.entries).contains_key(fingerprint)
    }

    /// Remove `entry` if it is still the one registered for `fingerprint`.
    pub fn release(&self, fingerprint: &Fingerprint, entry: &Arc<InflightEntry>) -> bool {
        let mut entries = lock(&self.entries);
        match entries.get(fingerprint) {
            Some(current) if Arc::ptr_eq(current, entry) => {
                entries.remove(fingerprint);
                true
            }
            _ => false,
        }
    }

    pub fn remove(&self, fingerprint: &Fingerprint) -> Option<Arc<InflightEntry>> {
        lock(&self.entries).remove(fingerprint)
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
