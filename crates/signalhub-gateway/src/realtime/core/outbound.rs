//! Bounded per-connection outbound queue.
//!
//! Producers (`push`) never await: a full queue is resolved by the configured
//! `OverflowPolicy`. The single consumer is the connection's session loop.
//! Closing the queue discards pending frames and wakes the consumer.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

use tokio::sync::Notify;

use crate::config::OverflowPolicy;
use crate::realtime::types::PreparedMsg;

/// Result of a single `push`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest pending frame.
    DroppedOldest,
    /// Queue was full under `Disconnect`; it is now closed.
    Overflow,
    /// Queue was already closed; frame discarded.
    Closed,
}

impl PushOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            PushOutcome::Queued => "queued",
            PushOutcome::DroppedOldest => "dropped_oldest",
            PushOutcome::Overflow => "overflow",
            PushOutcome::Closed => "closed",
        }
    }

    /// Whether the frame itself was enqueued.
    pub fn accepted(self) -> bool {
        matches!(self, PushOutcome::Queued | PushOutcome::DroppedOldest)
    }
}

#[derive(Default)]
struct QueueInner {
    frames: VecDeque<PreparedMsg>,
    closed: bool,
}

pub struct OutboundQueue {
    inner: Mutex<QueueInner>,
    notify: Notify,
    capacity: usize,
    policy: OverflowPolicy,
}

impl OutboundQueue {
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(QueueInner {
                frames: VecDeque::with_capacity(capacity.min(64)),
                closed: false,
            }),
            notify: Notify::new(),
            capacity,
            policy,
        }
    }

    // A poisoned lock only means another holder panicked mid-push; the deque
    // itself is still structurally valid.
    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn push(&self, msg: PreparedMsg) -> PushOutcome {
        let outcome = {
            let mut q = self.lock();
            if q.closed {
                return PushOutcome::Closed;
            }
            if q.frames.len() < self.capacity {
                q.frames.push_back(msg);
                PushOutcome::Queued
            } else {
                match self.policy {
                    OverflowPolicy::DropOldest => {
                        q.frames.pop_front();
                        q.frames.push_back(msg);
                        PushOutcome::DroppedOldest
                    }
                    OverflowPolicy::Disconnect => {
                        q.closed = true;
                        q.frames.clear();
                        PushOutcome::Overflow
                    }
                }
            }
        };
        self.notify.notify_one();
        outcome
    }

    /// Next frame, or `None` once the queue is closed.
    ///
    /// Cancel-safe: a frame is only removed after the wait completes.
    pub async fn recv(&self) -> Option<PreparedMsg> {
        loop {
            {
                let mut q = self.lock();
                if q.closed {
                    return None;
                }
                if let Some(m) = q.frames.pop_front() {
                    return Some(m);
                }
            }
            self.notify.notified().await;
        }
    }

    /// Non-blocking variant of `recv`.
    pub fn try_recv(&self) -> Option<PreparedMsg> {
        let mut q = self.lock();
        if q.closed {
            return None;
        }
        q.frames.pop_front()
    }

    /// Close the queue, returning how many pending frames were discarded.
    pub fn close(&self) -> usize {
        let discarded = {
            let mut q = self.lock();
            if q.closed {
                return 0;
            }
            q.closed = true;
            let n = q.frames.len();
            q.frames.clear();
            n
        };
        self.notify.notify_one();
        discarded
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn text(s: &str) -> PreparedMsg {
        PreparedMsg::Text(Arc::from(s))
    }

    fn as_text(m: Option<PreparedMsg>) -> Option<String> {
        match m {
            Some(PreparedMsg::Text(s)) => Some(s.to_string()),
            _ => None,
        }
    }

    #[test]
    fn drop_oldest_keeps_newest_frames() {
        let q = OutboundQueue::new(2, OverflowPolicy::DropOldest);
        assert_eq!(q.push(text("1")), PushOutcome::Queued);
        assert_eq!(q.push(text("2")), PushOutcome::Queued);
        assert_eq!(q.push(text("3")), PushOutcome::DroppedOldest);
        assert_eq!(as_text(q.try_recv()).as_deref(), Some("2"));
        assert_eq!(as_text(q.try_recv()).as_deref(), Some("3"));
        assert!(q.try_recv().is_none());
    }

    #[test]
    fn disconnect_policy_closes_on_overflow() {
        let q = OutboundQueue::new(1, OverflowPolicy::Disconnect);
        assert_eq!(q.push(text("1")), PushOutcome::Queued);
        assert_eq!(q.push(text("2")), PushOutcome::Overflow);
        assert!(q.is_closed());
        assert!(q.is_empty());
        assert_eq!(q.push(text("3")), PushOutcome::Closed);
    }

    #[tokio::test]
    async fn close_wakes_pending_receiver() {
        let q = Arc::new(OutboundQueue::new(4, OverflowPolicy::DropOldest));
        let q2 = Arc::clone(&q);
        let waiter = tokio::spawn(async move {
            let mut n = 0;
            while q2.recv().await.is_some() {
                n += 1;
            }
            n
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        q.close();
        let received = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("receiver must wake on close")
            .expect("receiver task");
        assert_eq!(received, 0);
    }

    #[tokio::test]
    async fn recv_preserves_fifo_order() {
        let q = OutboundQueue::new(16, OverflowPolicy::DropOldest);
        for i in 0..10 {
            q.push(text(&i.to_string()));
        }
        for i in 0..10 {
            assert_eq!(as_text(q.recv().await), Some(i.to_string()));
        }
    }

    #[test]
    fn close_reports_discarded_frames() {
        let q = OutboundQueue::new(4, OverflowPolicy::DropOldest);
        q.push(text("a"));
        q.push(text("b"));
        assert_eq!(q.close(), 2);
        assert_eq!(q.close(), 0);
    }
}
