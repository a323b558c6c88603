//! # Request Mailbox
//!
//! FIFO hand-off between the network runtime (producer) and the UI thread
//! (consumer). Both sides take the same lock, and only for the length of a
//! single push or a single splice.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Mutex-guarded queue of fully decoded inbound items.
pub struct Mailbox<T> {
    pending: Mutex<VecDeque<T>>,
}

impl<T> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<T>> {
        // A panicking producer cannot leave the deque half-spliced.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one item in arrival order.
    pub fn push(&self, item: T) {
        self.lock().push_back(item);
    }

    /// Moves every pending item to the back of `out`, leaving the mailbox
    /// empty. Returns how many items were moved.
    pub fn drain_into(&self, out: &mut VecDeque<T>) -> usize {
        let mut pending = self.lock();
        let moved = pending.len();
        out.append(&mut pending);
        moved
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn drain_preserves_arrival_order() {
        let mailbox = Mailbox::new();
        for i in 0..5 {
            mailbox.push(i);
        }
        let mut out = VecDeque::from([-1]);
        assert_eq!(mailbox.drain_into(&mut out), 5);
        assert_eq!(out, VecDeque::from([-1, 0, 1, 2, 3, 4]));
    }

    #[test]
    fn second_drain_is_empty() {
        let mailbox = Mailbox::new();
        mailbox.push("a");
        let mut out = VecDeque::new();
        mailbox.drain_into(&mut out);
        let mut again = VecDeque::new();
        assert_eq!(mailbox.drain_into(&mut again), 0);
        assert!(again.is_empty());
        assert!(mailbox.is_empty());
    }

    #[test]
    fn concurrent_producers_lose_nothing() {
        let mailbox = Arc::new(Mailbox::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let mailbox = mailbox.clone();
                thread::spawn(move || {
                    for i in 0..250 {
                        mailbox.push((p, i));
                    }
                })
            })
            .collect();

        let mut out = VecDeque::new();
        for producer in producers {
            producer.join().unwrap();
            mailbox.drain_into(&mut out);
        }
        mailbox.drain_into(&mut out);
        assert_eq!(out.len(), 1000);

        // Per-producer order survives interleaving.
        for p in 0..4 {
            let seq: Vec<_> = out.iter().filter(|(q, _)| *q == p).map(|(_, i)| *i).collect();
            assert_eq!(seq, (0..250).collect::<Vec<_>>());
        }
    }
}
