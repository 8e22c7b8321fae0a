//! Bounded drop-oldest queue between key capture and the network.
//!
//! The capture path pushes and returns immediately, whatever the network
//! is doing. When the transport stalls long enough to fill the queue,
//! the *oldest* entries go: stale key timing replayed late sounds worse
//! on the far end than a clean gap.

use std::collections::VecDeque;
use std::sync::Mutex;

use keyline_protocol::TimingMessage;
use tokio::sync::Notify;

struct Inner {
    buf: VecDeque<TimingMessage>,
    closed: bool,
    dropped: u64,
}

/// Bounded queue of outgoing timing messages.
pub(crate) struct EdgeQueue {
    inner: Mutex<Inner>,
    notify: Notify,
    capacity: usize,
}

impl EdgeQueue {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                buf: VecDeque::with_capacity(capacity.max(1)),
                closed: false,
                dropped: 0,
            }),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Enqueues a message without blocking. Returns `false` if the
    /// queue is closed. On overflow the oldest entry is discarded.
    pub(crate) fn push(&self, msg: TimingMessage) -> bool {
        {
            let mut inner =
                self.inner.lock().expect("edge queue lock poisoned");
            if inner.closed {
                return false;
            }
            if inner.buf.len() >= self.capacity {
                inner.buf.pop_front();
                inner.dropped += 1;
                tracing::warn!(
                    dropped = inner.dropped,
                    "edge queue full, oldest edge discarded"
                );
            }
            inner.buf.push_back(msg);
        }
        self.notify.notify_one();
        true
    }

    /// Dequeues the next message, waiting if the queue is empty.
    ///
    /// Returns `None` once the queue is closed and drained; closing
    /// wakes every waiter immediately, so nothing blocks past a
    /// disconnect.
    pub(crate) async fn pop(&self) -> Option<TimingMessage> {
        loop {
            // Register interest before checking, so a push between the
            // check and the await cannot be missed.
            let notified = self.notify.notified();
            {
                let mut inner =
                    self.inner.lock().expect("edge queue lock poisoned");
                if let Some(msg) = inner.buf.pop_front() {
                    return Some(msg);
                }
                if inner.closed {
                    return None;
                }
            }
            notified.await;
        }
    }

    /// Closes the queue and wakes all waiters.
    pub(crate) fn close(&self) {
        self.inner
            .lock()
            .expect("edge queue lock poisoned")
            .closed = true;
        self.notify.notify_waiters();
    }

    /// How many edges have been discarded to overflow so far.
    #[cfg(test)]
    pub(crate) fn dropped(&self) -> u64 {
        self.inner
            .lock()
            .expect("edge queue lock poisoned")
            .dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyline_protocol::{EdgeEvent, StationId};

    fn msg(seq: u64) -> TimingMessage {
        TimingMessage {
            station: StationId(1),
            seq,
            edge: EdgeEvent::down(seq * 1_000),
        }
    }

    #[tokio::test]
    async fn test_push_then_pop_in_order() {
        let q = EdgeQueue::new(8);
        assert!(q.push(msg(1)));
        assert!(q.push(msg(2)));
        assert_eq!(q.pop().await.unwrap().seq, 1);
        assert_eq!(q.pop().await.unwrap().seq, 2);
    }

    #[tokio::test]
    async fn test_overflow_drops_oldest() {
        let q = EdgeQueue::new(2);
        q.push(msg(1));
        q.push(msg(2));
        q.push(msg(3));
        assert_eq!(q.dropped(), 1);
        assert_eq!(q.pop().await.unwrap().seq, 2);
        assert_eq!(q.pop().await.unwrap().seq, 3);
    }

    #[tokio::test]
    async fn test_close_unblocks_a_waiting_pop() {
        let q = std::sync::Arc::new(EdgeQueue::new(4));
        let waiter = {
            let q = q.clone();
            tokio::spawn(async move { q.pop().await })
        };
        // Let the waiter park, then close.
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        q.close();
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            waiter,
        )
        .await
        .expect("pop did not unblock")
        .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_push_after_close_is_refused() {
        let q = EdgeQueue::new(4);
        q.close();
        assert!(!q.push(msg(1)));
    }

    #[tokio::test]
    async fn test_close_drains_remaining_items_first() {
        let q = EdgeQueue::new(4);
        q.push(msg(1));
        q.close();
        assert_eq!(q.pop().await.unwrap().seq, 1);
        assert!(q.pop().await.is_none());
    }
}
