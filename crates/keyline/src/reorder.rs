//! Per-sender reorder buffer for incoming timing messages.
//!
//! Each sender numbers its own edges, so reordering is tracked per
//! sender. An out-of-order edge waits briefly for the gap to fill; a gap
//! older than the timeout is skipped and the stream moves on; a missing
//! edge garbles one character, a stalled stream kills the whole line.
//!
//! The clock is passed in, so this stays pure and unit-testable; the
//! client's I/O task supplies real time and a wakeup timer.

use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use keyline_protocol::{EdgeEvent, StationId};

struct SenderStream {
    started: bool,
    /// Next expected per-sender sequence number.
    next_seq: u64,
    /// Edges that arrived ahead of a gap, keyed by sequence.
    pending: BTreeMap<u64, EdgeEvent>,
    /// When the oldest open gap gives up waiting.
    deadline: Option<Instant>,
}

impl SenderStream {
    fn new() -> Self {
        Self {
            started: false,
            next_seq: 0,
            pending: BTreeMap::new(),
            deadline: None,
        }
    }

    /// Pops every consecutively numbered pending edge.
    fn drain_ready(&mut self, out: &mut Vec<EdgeEvent>) {
        while let Some(edge) = self.pending.remove(&self.next_seq) {
            out.push(edge);
            self.next_seq += 1;
        }
    }
}

/// Reorders timing messages from all senders on a wire.
pub(crate) struct ReorderBuffer {
    timeout: Duration,
    senders: HashMap<StationId, SenderStream>,
}

impl ReorderBuffer {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            senders: HashMap::new(),
        }
    }

    /// Accepts one timing message and returns the edges (from that
    /// sender) that are now deliverable, in sequence order.
    pub(crate) fn accept(
        &mut self,
        station: StationId,
        seq: u64,
        edge: EdgeEvent,
        now: Instant,
    ) -> Vec<EdgeEvent> {
        let stream = self
            .senders
            .entry(station)
            .or_insert_with(SenderStream::new);
        let mut out = Vec::new();

        if !stream.started {
            // First message from this sender sets the baseline.
            stream.started = true;
            stream.next_seq = seq + 1;
            out.push(edge);
            return out;
        }

        if seq < stream.next_seq {
            tracing::debug!(%station, seq, "stale or duplicate edge dropped");
            return out;
        }

        if seq == stream.next_seq {
            stream.next_seq += 1;
            out.push(edge);
            stream.drain_ready(&mut out);
            stream.deadline = if stream.pending.is_empty() {
                None
            } else {
                Some(now + self.timeout)
            };
            return out;
        }

        // Ahead of a gap: hold it and start (or keep) the gap clock.
        stream.pending.insert(seq, edge);
        stream.deadline.get_or_insert(now + self.timeout);
        out
    }

    /// The earliest gap deadline across all senders, if any.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.senders
            .values()
            .filter_map(|s| s.deadline)
            .min()
    }

    /// Skips any gap whose deadline has passed, returning the released
    /// edges grouped with their sender.
    pub(crate) fn release_expired(
        &mut self,
        now: Instant,
    ) -> Vec<(StationId, EdgeEvent)> {
        let mut out = Vec::new();
        for (station, stream) in &mut self.senders {
            let Some(deadline) = stream.deadline else {
                continue;
            };
            if deadline > now {
                continue;
            }
            // Jump the stream past the gap to the oldest held edge.
            let first = stream.pending.keys().next().copied();
            if let Some(first) = first {
                tracing::debug!(
                    %station,
                    expected = stream.next_seq,
                    resumed_at = first,
                    "gap timed out, skipping ahead"
                );
                stream.next_seq = first;
                let mut ready = Vec::new();
                stream.drain_ready(&mut ready);
                out.extend(ready.into_iter().map(|e| (*station, e)));
            }
            stream.deadline = if stream.pending.is_empty() {
                None
            } else {
                Some(now + self.timeout)
            };
        }
        out
    }

    /// Drops a sender's state (it left the wire).
    pub(crate) fn forget(&mut self, station: StationId) {
        self.senders.remove(&station);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);
    const S: StationId = StationId(1);

    fn edge(n: u64) -> EdgeEvent {
        EdgeEvent::down(n * 1_000)
    }

    #[test]
    fn test_in_order_messages_pass_straight_through() {
        let mut buf = ReorderBuffer::new(TIMEOUT);
        let now = Instant::now();
        assert_eq!(buf.accept(S, 1, edge(1), now), vec![edge(1)]);
        assert_eq!(buf.accept(S, 2, edge(2), now), vec![edge(2)]);
        assert_eq!(buf.next_deadline(), None);
    }

    #[test]
    fn test_out_of_order_pair_is_reordered() {
        let mut buf = ReorderBuffer::new(TIMEOUT);
        let now = Instant::now();
        buf.accept(S, 1, edge(1), now);
        assert!(buf.accept(S, 3, edge(3), now).is_empty());
        // 2 arrives late: both come out, in order.
        assert_eq!(
            buf.accept(S, 2, edge(2), now),
            vec![edge(2), edge(3)]
        );
        assert_eq!(buf.next_deadline(), None);
    }

    #[test]
    fn test_missing_edge_is_skipped_after_timeout() {
        let mut buf = ReorderBuffer::new(TIMEOUT);
        let now = Instant::now();
        buf.accept(S, 1, edge(1), now);
        buf.accept(S, 3, edge(3), now); // 2 never arrives
        assert!(buf.release_expired(now).is_empty());
        let released = buf.release_expired(now + TIMEOUT);
        assert_eq!(released, vec![(S, edge(3))]);
        // Stream has moved on; a very late 2 is stale.
        assert!(buf.accept(S, 2, edge(2), now + TIMEOUT).is_empty());
        // And 4 flows normally.
        assert_eq!(
            buf.accept(S, 4, edge(4), now + TIMEOUT),
            vec![edge(4)]
        );
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let mut buf = ReorderBuffer::new(TIMEOUT);
        let now = Instant::now();
        buf.accept(S, 5, edge(5), now);
        assert!(buf.accept(S, 5, edge(5), now).is_empty());
    }

    #[test]
    fn test_first_message_sets_the_baseline() {
        let mut buf = ReorderBuffer::new(TIMEOUT);
        let now = Instant::now();
        // A receiver joining mid-transmission starts wherever the
        // sender is.
        assert_eq!(buf.accept(S, 700, edge(700), now), vec![edge(700)]);
        assert_eq!(
            buf.accept(S, 701, edge(701), now),
            vec![edge(701)]
        );
    }

    #[test]
    fn test_senders_are_independent() {
        let mut buf = ReorderBuffer::new(TIMEOUT);
        let now = Instant::now();
        let other = StationId(2);
        buf.accept(S, 1, edge(1), now);
        buf.accept(S, 3, edge(3), now); // S has a gap open
        // The other sender's stream is unaffected by S's gap.
        assert_eq!(
            buf.accept(other, 1, edge(10), now),
            vec![edge(10)]
        );
    }

    #[test]
    fn test_forget_clears_sender_state() {
        let mut buf = ReorderBuffer::new(TIMEOUT);
        let now = Instant::now();
        buf.accept(S, 1, edge(1), now);
        buf.accept(S, 3, edge(3), now);
        buf.forget(S);
        assert_eq!(buf.next_deadline(), None);
        // Re-joining sender starts a fresh baseline.
        assert_eq!(buf.accept(S, 9, edge(9), now), vec![edge(9)]);
    }
}
