//! A split watchable state.
//!
//! [State::split] returns two halves sharing one value. Either half can read
//! and mutate it; mutation wakes anyone waiting on [StateRef::modified].
//! When every clone of one half is dropped the state is closed: `lock_mut`
//! and `modified` return None, which callers treat as "the other side went
//! away".

use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll, Waker};

struct StateInner<T> {
    value: T,
    epoch: u64,
    closed: bool,
    wakers: Vec<Waker>,
}

impl<T> StateInner<T> {
    fn wake(&mut self) {
        for waker in self.wakers.drain(..) {
            waker.wake();
        }
    }
}

// Marks one half; when the last clone drops, the state closes.
struct Half<T> {
    inner: Arc<Mutex<StateInner<T>>>,
}

impl<T> Drop for Half<T> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        inner.closed = true;
        inner.wake();
    }
}

pub struct State<T> {
    inner: Arc<Mutex<StateInner<T>>>,
    half: Arc<Half<T>>,
}

impl<T> std::fmt::Debug for State<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("State").finish_non_exhaustive()
    }
}

impl<T> State<T> {
    pub fn new(value: T) -> Self {
        let inner = Arc::new(Mutex::new(StateInner {
            value,
            epoch: 0,
            closed: false,
            wakers: Vec::new(),
        }));

        Self {
            half: Arc::new(Half {
                inner: inner.clone(),
            }),
            inner,
        }
    }

    /// Split into two halves sharing the value; dropping either half closes
    /// the state for the other.
    pub fn split(self) -> (Self, Self) {
        let other = Self {
            inner: self.inner.clone(),
            half: Arc::new(Half {
                inner: self.inner.clone(),
            }),
        };

        (self, other)
    }

    /// Lock for reading.
    pub fn lock(&self) -> StateRef<'_, T> {
        StateRef {
            guard: self.inner.lock().unwrap(),
            inner: &self.inner,
        }
    }

    /// Lock for writing; None if the other half was dropped.
    pub fn lock_mut(&self) -> Option<StateMut<'_, T>> {
        let guard = self.inner.lock().unwrap();
        if guard.closed {
            return None;
        }
        Some(StateMut { guard })
    }
}

impl<T> Clone for State<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            half: self.half.clone(),
        }
    }
}

impl<T: Default> Default for State<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Read guard returned by [State::lock].
pub struct StateRef<'a, T> {
    guard: MutexGuard<'a, StateInner<T>>,
    inner: &'a Arc<Mutex<StateInner<T>>>,
}

impl<'a, T> StateRef<'a, T> {
    /// Upgrade to a write guard; None if the other half was dropped.
    pub fn into_mut(self) -> Option<StateMut<'a, T>> {
        if self.guard.closed {
            return None;
        }
        Some(StateMut { guard: self.guard })
    }

    /// A future that resolves on the next mutation (or close). None if the
    /// state is already closed. The lock is released before waiting.
    pub fn modified(self) -> Option<StateChanged<T>> {
        if self.guard.closed {
            return None;
        }

        Some(StateChanged {
            inner: self.inner.clone(),
            epoch: self.guard.epoch,
        })
    }
}

impl<T> Deref for StateRef<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard.value
    }
}

/// Write guard; bumps the epoch and wakes watchers when dropped.
pub struct StateMut<'a, T> {
    guard: MutexGuard<'a, StateInner<T>>,
}

impl<T> Deref for StateMut<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard.value
    }
}

impl<T> DerefMut for StateMut<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard.value
    }
}

impl<T> Drop for StateMut<'_, T> {
    fn drop(&mut self) {
        self.guard.epoch += 1;
        self.guard.wake();
    }
}

/// Future returned by [StateRef::modified].
pub struct StateChanged<T> {
    inner: Arc<Mutex<StateInner<T>>>,
    epoch: u64,
}

impl<T> Future for StateChanged<T> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.epoch != self.epoch || inner.closed {
            return Poll::Ready(());
        }

        inner.wakers.push(cx.waker().clone());
        Poll::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutate_and_read() {
        let (a, b) = State::new(1u32).split();

        *a.lock_mut().unwrap() = 2;
        assert_eq!(*b.lock(), 2);
    }

    #[test]
    fn close_on_drop() {
        let (a, b) = State::new(0u32).split();

        assert!(a.lock_mut().is_some());
        drop(b);
        assert!(a.lock_mut().is_none());
        assert!(a.lock().modified().is_none());
    }

    #[test]
    fn clone_keeps_half_alive() {
        let (a, b) = State::new(0u32).split();
        let b2 = b.clone();

        drop(b);
        // A clone of the half still exists, so the state stays open.
        assert!(a.lock_mut().is_some());

        drop(b2);
        assert!(a.lock_mut().is_none());
    }

    #[tokio::test]
    async fn modified_wakes() {
        let (a, b) = State::new(0u32).split();

        let notify = a.lock().modified().unwrap();
        let task = tokio::spawn(async move {
            notify.await;
            *a.lock() // value visible after wake
        });

        tokio::task::yield_now().await;
        *b.lock_mut().unwrap() = 7;

        assert_eq!(task.await.unwrap(), 7);
    }
}
