use std::collections::{HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Ordered list of batch locations waiting for delivery.
///
/// Shared by the harvest loop (producer) and the delivery loop (consumer).
/// Entries are unique: a location is tracked either as pending or, between
/// [`dequeue`](Self::dequeue) and [`complete`](Self::complete) /
/// [`requeue_front`](Self::requeue_front), as in flight. A failed delivery goes
/// back to the front so it is retried before anything produced after it.
#[derive(Debug, Default)]
pub struct DeliveryQueue {
    inner: Mutex<QueueState>,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<PathBuf>,
    in_flight: HashSet<PathBuf>,
}

impl QueueState {
    fn tracks(&self, location: &Path) -> bool {
        self.in_flight.contains(location) || self.pending.iter().any(|p| p == location)
    }
}

impl DeliveryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a location unless it is already tracked. Returns whether it was added.
    pub fn enqueue(&self, location: PathBuf) -> bool {
        let mut state = self.state();
        if state.tracks(&location) {
            return false;
        }
        state.pending.push_back(location);
        true
    }

    /// Puts a location whose delivery failed back at the head of the queue.
    /// Returns whether it was inserted.
    pub fn requeue_front(&self, location: PathBuf) -> bool {
        let mut state = self.state();
        state.in_flight.remove(&location);
        if state.pending.contains(&location) {
            return false;
        }
        state.pending.push_front(location);
        true
    }

    /// Takes the head of the queue and marks it in flight. Never blocks.
    pub fn dequeue(&self) -> Option<PathBuf> {
        let mut state = self.state();
        let location = state.pending.pop_front()?;
        state.in_flight.insert(location.clone());
        Some(location)
    }

    /// Stops tracking a location after its delivery was confirmed
    pub fn complete(&self, location: &Path) {
        self.state().in_flight.remove(location);
    }

    /// Drops pending locations that are not in `on_disk`. Entries in flight
    /// are left alone. Returns the number of entries dropped.
    pub fn retain_existing(&self, on_disk: &[PathBuf]) -> usize {
        let mut state = self.state();
        let before = state.pending.len();
        state.pending.retain(|location| on_disk.contains(location));
        before - state.pending.len()
    }

    /// Whether the location is pending or in flight
    pub fn contains(&self, location: &Path) -> bool {
        self.state().tracks(location)
    }

    /// Number of pending entries
    pub fn len(&self) -> usize {
        self.state().pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().pending.is_empty()
    }

    pub fn in_flight(&self) -> usize {
        self.state().in_flight.len()
    }

    /// Pending entries in delivery order
    pub fn snapshot(&self) -> Vec<PathBuf> {
        self.state().pending.iter().cloned().collect()
    }
}
