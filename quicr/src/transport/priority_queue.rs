use std::collections::VecDeque;
use std::sync::Arc;

use super::TickService;

/// Priorities range 0..MAX_PRIORITY, lower value drains first.
pub const MAX_PRIORITY: u8 = 32;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum QueueError {
    #[error("priority out of range")]
    PriorityOutOfRange,

    #[error("queue full")]
    Full,
}

struct Entry<T> {
    value: T,
    pushed_at: u64,
    /// Tick after which the entry is dropped instead of popped.
    expires_at: Option<u64>,
    /// Tick before which the entry is not eligible to pop.
    ready_at: u64,
}

/// Result of a pop attempt.
pub enum Popped<T> {
    /// A value, plus how long it sat in the queue (ms).
    Item { value: T, queued_ms: u64 },
    /// All heads are delayed; retry in this many ms.
    Waiting(u64),
    Empty,
}

/// A queue per priority, each entry carrying a TTL and an optional pop
/// delay. Pop serves the lowest ready priority first, FIFO within it, and
/// drops expired entries as it encounters them.
pub struct PriorityQueue<T> {
    queues: Vec<VecDeque<Entry<T>>>,
    tick: Arc<TickService>,
    limit: usize,
    len: usize,

    /// Entries dropped due to TTL expiry since the last counter drain.
    expired: u64,
    /// Entries dropped by clear() since the last counter drain.
    discarded: u64,
}

impl<T> PriorityQueue<T> {
    pub fn new(tick: Arc<TickService>, limit: usize) -> Self {
        Self {
            queues: (0..MAX_PRIORITY as usize).map(|_| VecDeque::new()).collect(),
            tick,
            limit,
            len: 0,
            expired: 0,
            discarded: 0,
        }
    }

    pub fn push(
        &mut self,
        value: T,
        priority: u8,
        ttl_ms: Option<u32>,
        delay_ms: u32,
    ) -> Result<(), QueueError> {
        if priority >= MAX_PRIORITY {
            return Err(QueueError::PriorityOutOfRange);
        }
        if self.len >= self.limit {
            return Err(QueueError::Full);
        }

        let now = self.tick.milliseconds();
        self.queues[priority as usize].push_back(Entry {
            value,
            pushed_at: now,
            expires_at: ttl_ms.map(|ttl| now + ttl as u64),
            ready_at: now + delay_ms as u64,
        });
        self.len += 1;

        Ok(())
    }

    /// Pop the highest priority ready entry.
    pub fn pop(&mut self) -> Popped<T> {
        let now = self.tick.milliseconds();
        let mut next_ready: Option<u64> = None;

        for queue in &mut self.queues {
            // Expired entries at the head never leave the queue.
            while let Some(head) = queue.front() {
                match head.expires_at {
                    Some(expires_at) if expires_at <= now => {
                        queue.pop_front();
                        self.len -= 1;
                        self.expired += 1;
                    }
                    _ => break,
                }
            }

            match queue.front() {
                Some(head) if head.ready_at <= now => {
                    let entry = queue.pop_front().unwrap();
                    self.len -= 1;
                    return Popped::Item {
                        queued_ms: now.saturating_sub(entry.pushed_at),
                        value: entry.value,
                    };
                }
                Some(head) => {
                    let wait = head.ready_at - now;
                    next_ready = Some(next_ready.map_or(wait, |w| w.min(wait)));
                }
                None => (),
            }
        }

        match next_ready {
            Some(wait) => Popped::Waiting(wait),
            None => Popped::Empty,
        }
    }

    /// Drop everything queued, counting the discards.
    pub fn clear(&mut self) -> usize {
        let mut dropped = 0;
        for queue in &mut self.queues {
            dropped += queue.len();
            queue.clear();
        }
        self.len = 0;
        self.discarded += dropped as u64;
        dropped
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Drain the expiry counter (for metrics sampling).
    pub fn take_expired(&mut self) -> u64 {
        std::mem::take(&mut self.expired)
    }

    /// Drain the discard counter (for metrics sampling).
    pub fn take_discarded(&mut self) -> u64 {
        std::mem::take(&mut self.discarded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn queue() -> PriorityQueue<&'static str> {
        PriorityQueue::new(TickService::new(), 64)
    }

    #[tokio::test(start_paused = true)]
    async fn priority_order() {
        let mut q = queue();

        q.push("a", 5, None, 0).unwrap();
        q.push("b", 2, None, 0).unwrap();
        q.push("c", 2, None, 0).unwrap();

        // Lowest priority value first; FIFO within a priority.
        assert!(matches!(q.pop(), Popped::Item { value: "b", .. }));
        assert!(matches!(q.pop(), Popped::Item { value: "c", .. }));
        assert!(matches!(q.pop(), Popped::Item { value: "a", .. }));
        assert!(matches!(q.pop(), Popped::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn ttl_expiry() {
        let mut q = queue();

        q.push("short", 0, Some(100), 0).unwrap();
        q.push("long", 0, Some(10_000), 0).unwrap();

        tokio::time::advance(Duration::from_millis(150)).await;

        assert!(matches!(q.pop(), Popped::Item { value: "long", .. }));
        assert_eq!(q.take_expired(), 1);
        assert_eq!(q.take_expired(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn delayed_pop() {
        let mut q = queue();

        q.push("later", 0, None, 500).unwrap();

        match q.pop() {
            Popped::Waiting(wait) => assert_eq!(wait, 500),
            _ => panic!("expected waiting"),
        }

        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(matches!(q.pop(), Popped::Item { value: "later", .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn queued_duration() {
        let mut q = queue();

        q.push("x", 0, None, 0).unwrap();
        tokio::time::advance(Duration::from_millis(42)).await;

        match q.pop() {
            Popped::Item { queued_ms, .. } => assert_eq!(queued_ms, 42),
            _ => panic!("expected item"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn limits() {
        let mut q = PriorityQueue::new(TickService::new(), 2);

        assert!(q.push("1", 0, None, 0).is_ok());
        assert!(q.push("2", 31, None, 0).is_ok());
        assert_eq!(q.push("3", 0, None, 0).unwrap_err(), QueueError::Full);
        assert_eq!(
            q.push("4", 32, None, 0).unwrap_err(),
            QueueError::PriorityOutOfRange
        );

        assert_eq!(q.clear(), 2);
        assert_eq!(q.take_discarded(), 2);
        assert!(q.is_empty());
    }
}
