use std::collections::VecDeque;

use super::State;

/// The shared buffer behind a [Queue].
struct Buffer<T> {
    items: VecDeque<T>,

    /// Maximum depth; None means unbounded.
    capacity: Option<usize>,

    /// Entries shed from the front of a full bounded queue.
    lagged: u64,
}

impl<T> Default for Buffer<T> {
    fn default() -> Self {
        Self {
            items: VecDeque::new(),
            capacity: None,
            lagged: 0,
        }
    }
}

/// An async FIFO built on [State].
///
/// Unbounded by default; [Queue::bounded] caps the depth. A full bounded
/// queue sheds its oldest entry to admit the new one and counts the loss,
/// so a slow reader lags instead of buffering live data without limit.
pub struct Queue<T> {
    state: State<Buffer<T>>,
}

impl<T> std::fmt::Debug for Queue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Queue").finish_non_exhaustive()
    }
}

impl<T> Queue<T> {
    /// A queue that holds at most `capacity` entries.
    pub fn bounded(capacity: usize) -> Self {
        Self {
            state: State::new(Buffer {
                capacity: Some(capacity.max(1)),
                ..Default::default()
            }),
        }
    }

    /// Push an item. Returns Err(item) if the queue has been closed. On a
    /// full bounded queue the oldest entry is dropped to make room.
    pub fn push(&mut self, item: T) -> Result<(), T> {
        let Some(mut buffer) = self.state.lock_mut() else {
            return Err(item);
        };

        if let Some(capacity) = buffer.capacity {
            while buffer.items.len() >= capacity {
                buffer.items.pop_front();
                buffer.lagged += 1;
            }
        }
        buffer.items.push_back(item);

        Ok(())
    }

    /// Pop the next item, waiting if necessary. None when the other half
    /// is gone and the buffer is drained.
    pub async fn pop(&mut self) -> Option<T> {
        loop {
            let notified = {
                let buffer = self.state.lock();
                if !buffer.items.is_empty() {
                    return buffer.into_mut()?.items.pop_front();
                }
                buffer.modified()?
            };

            notified.await;
        }
    }

    /// True while the other half is still alive.
    pub fn is_open(&self) -> bool {
        self.state.lock_mut().is_some()
    }

    /// How many entries were shed to keep a bounded queue within capacity.
    pub fn lagged(&self) -> u64 {
        self.state.lock().lagged
    }

    /// Split into two handles that share the same buffer.
    pub fn split(self) -> (Self, Self) {
        let state = self.state.split();
        (Self { state: state.0 }, Self { state: state.1 })
    }
}

impl<T> Clone for Queue<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T> Default for Queue<T> {
    fn default() -> Self {
        Self {
            state: State::new(Buffer::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn push_pop() {
        let (mut tx, mut rx) = Queue::default().split();

        tx.push(1).unwrap();
        tx.push(2).unwrap();
        assert_eq!(rx.pop().await, Some(1));
        assert_eq!(rx.pop().await, Some(2));
    }

    #[tokio::test]
    async fn pop_waits_for_push() {
        let (mut tx, mut rx) = Queue::default().split();

        let task = tokio::spawn(async move { rx.pop().await });
        tokio::task::yield_now().await;

        tx.push(9).unwrap();
        assert_eq!(task.await.unwrap(), Some(9));
    }

    #[tokio::test]
    async fn closed() {
        let (tx, mut rx) = Queue::<u32>::default().split();

        drop(tx);
        assert_eq!(rx.pop().await, None);

        let (mut tx, rx) = Queue::<u32>::default().split();
        drop(rx);
        assert!(tx.push(1).is_err());
    }

    #[tokio::test]
    async fn bounded_sheds_oldest() {
        let (mut tx, mut rx) = Queue::bounded(2).split();

        tx.push(1).unwrap();
        tx.push(2).unwrap();
        // Full: 1 is shed to admit 3.
        tx.push(3).unwrap();

        assert_eq!(rx.pop().await, Some(2));
        assert_eq!(rx.pop().await, Some(3));
        assert_eq!(rx.lagged(), 1);

        drop(tx);
        assert_eq!(rx.pop().await, None);
    }
}
