//! FIFO async mutex for serializing commands on a shared connection.
//!
//! Acquisition order is wakeup order: waiters park in a queue and release
//! hands the lock to the queue head directly. The queue lives under a
//! short `std::sync::Mutex` critical section that is never held across a
//! suspension point.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex as StdMutex, PoisonError};
use std::task::{Context, Poll, Waker};

/// Fair, cancel-safe asynchronous mutual exclusion.
///
/// A caller that finds the lock free and the queue empty acquires
/// immediately; otherwise it parks at the tail. Releasing transfers
/// ownership to the queue head without clearing the locked flag, so a
/// late-arriving caller can never barge past a parked waiter.
#[derive(Debug, Default)]
pub struct AsyncMutex {
    state: StdMutex<LockState>,
}

#[derive(Debug, Default)]
struct LockState {
    locked: bool,
    next_id: u64,
    waiters: VecDeque<Waiter>,
}

#[derive(Debug)]
struct Waiter {
    id: u64,
    waker: Option<Waker>,
    granted: bool,
}

impl AsyncMutex {
    /// Creates an unlocked mutex.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock, waiting in FIFO order.
    ///
    /// Dropping the returned future before completion removes the waiter
    /// from the queue; if ownership was already handed to it, the lock
    /// passes on to the next waiter.
    pub fn lock(&self) -> LockFuture<'_> {
        LockFuture {
            mutex: self,
            id: None,
            done: false,
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, LockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn unlock(&self) {
        let waker = {
            let mut state = self.state();
            match state.waiters.front_mut() {
                // Ownership transfers directly: `locked` stays set and the
                // woken waiter consumes the grant.
                Some(waiter) => {
                    waiter.granted = true;
                    waiter.waker.take()
                }
                None => {
                    state.locked = false;
                    None
                }
            }
        };
        if let Some(waker) = waker {
            waker.wake();
        }
    }
}

/// Future returned by [`AsyncMutex::lock`].
#[derive(Debug)]
pub struct LockFuture<'a> {
    mutex: &'a AsyncMutex,
    id: Option<u64>,
    done: bool,
}

impl<'a> Future for LockFuture<'a> {
    type Output = MutexGuard<'a>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = &mut *self;
        let mut state = this.mutex.state();

        let Some(id) = this.id else {
            if !state.locked && state.waiters.is_empty() {
                state.locked = true;
                this.done = true;
                return Poll::Ready(MutexGuard { mutex: this.mutex });
            }
            let id = state.next_id;
            state.next_id += 1;
            state.waiters.push_back(Waiter {
                id,
                waker: Some(cx.waker().clone()),
                granted: false,
            });
            this.id = Some(id);
            return Poll::Pending;
        };

        let Some(index) = state.waiters.iter().position(|waiter| waiter.id == id) else {
            debug_assert!(false, "waiter entry lost");
            return Poll::Pending;
        };
        if state.waiters[index].granted {
            debug_assert_eq!(index, 0);
            state.waiters.remove(index);
            this.done = true;
            Poll::Ready(MutexGuard { mutex: this.mutex })
        } else {
            state.waiters[index].waker = Some(cx.waker().clone());
            Poll::Pending
        }
    }
}

impl Drop for LockFuture<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        let Some(id) = self.id else {
            return;
        };
        let granted = {
            let mut state = self.mutex.state();
            state
                .waiters
                .iter()
                .position(|waiter| waiter.id == id)
                .and_then(|index| state.waiters.remove(index))
                .is_some_and(|waiter| waiter.granted)
        };
        if granted {
            // The grant reached a cancelled waiter; pass the lock on.
            self.mutex.unlock();
        }
    }
}

/// Guard releasing the lock on drop. Release never fails.
#[derive(Debug)]
pub struct MutexGuard<'a> {
    mutex: &'a AsyncMutex,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[tokio::test]
    async fn uncontended_lock_is_immediate() {
        let mutex = AsyncMutex::new();
        let guard = mutex.lock().await;
        drop(guard);
        let _again = mutex.lock().await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn wakeup_order_is_fifo() {
        let mutex = Arc::new(AsyncMutex::new());
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();

        let first = mutex.lock().await;

        let mut handles = Vec::new();
        for i in 0..4u32 {
            let mutex = Arc::clone(&mutex);
            let tx = tx.clone();
            handles.push(tokio::spawn(async move {
                let _guard = mutex.lock().await;
                tx.send(i).unwrap();
            }));
            // Let the task park before spawning the next one.
            tokio::task::yield_now().await;
        }

        drop(first);
        for handle in handles {
            handle.await.unwrap();
        }

        let mut order = Vec::new();
        while let Ok(i) = rx.try_recv() {
            order.push(i);
        }
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn no_barging_past_waiters() {
        let mutex = Arc::new(AsyncMutex::new());
        let held = mutex.lock().await;

        let waiter = {
            let mutex = Arc::clone(&mutex);
            tokio::spawn(async move {
                let _guard = mutex.lock().await;
            })
        };
        tokio::task::yield_now().await;

        // A fresh lock future must queue behind the parked waiter even
        // though it is polled right after release.
        let mut late = Box::pin(mutex.lock());
        assert!(futures_poll_once(late.as_mut()).await.is_none());

        drop(held);
        waiter.await.unwrap();
        let _guard = late.await;
    }

    #[tokio::test(flavor = "current_thread")]
    async fn cancelled_waiter_does_not_stall_queue() {
        let mutex = Arc::new(AsyncMutex::new());
        let held = mutex.lock().await;

        let mut cancelled = Box::pin(mutex.lock());
        assert!(futures_poll_once(cancelled.as_mut()).await.is_none());

        let survivor = {
            let mutex = Arc::clone(&mutex);
            tokio::spawn(async move {
                let _guard = mutex.lock().await;
            })
        };
        tokio::task::yield_now().await;

        drop(cancelled);
        drop(held);
        survivor.await.unwrap();
    }

    #[tokio::test(flavor = "current_thread")]
    async fn grant_to_cancelled_waiter_is_passed_on() {
        let mutex = Arc::new(AsyncMutex::new());
        let held = mutex.lock().await;

        let mut cancelled = Box::pin(mutex.lock());
        assert!(futures_poll_once(cancelled.as_mut()).await.is_none());

        // Release hands ownership to the parked waiter, which is then
        // dropped without ever observing the grant.
        drop(held);
        drop(cancelled);

        // The lock must be acquirable again.
        let _guard = mutex.lock().await;
    }

    async fn futures_poll_once<F: Future>(future: Pin<&mut F>) -> Option<F::Output> {
        struct PollOnce<'a, F> {
            future: Option<Pin<&'a mut F>>,
        }
        impl<F: Future> Future for PollOnce<'_, F> {
            type Output = Option<F::Output>;
            fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
                let future = self.future.take().expect("polled after completion");
                match future.poll(cx) {
                    Poll::Ready(value) => Poll::Ready(Some(value)),
                    Poll::Pending => Poll::Ready(None),
                }
            }
        }
        PollOnce {
            future: Some(future),
        }
        .await
    }
}
