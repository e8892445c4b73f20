// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! An async mutex with LIFO fairness among contended waiters: the most
//! recently parked waiter is resumed first, favoring cache locality
//! over strict arrival order. Waiters are plain [`Waker`]s in a
//! mutex-guarded `VecDeque` rather than an intrusive pinned linked
//! list of waiter nodes living in each coroutine frame; `unlock` pops
//! from the back (LIFO) and wakes that waiter, which re-attempts the
//! CAS rather than receiving the lock as a direct handoff.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::future::Future;
use std::ops::{Deref, DerefMut};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::task::{Context, Poll, Waker};

pub struct AsyncMutex<T> {
    locked: AtomicBool,
    waiters: StdMutex<VecDeque<Waker>>,
    data: UnsafeCell<T>,
}

// SAFETY: access to `data` is gated by `locked`, exactly like
// `std::sync::Mutex`; only the holder of the lock bit ever dereferences it.
unsafe impl<T: Send> Sync for AsyncMutex<T> {}
unsafe impl<T: Send> Send for AsyncMutex<T> {}

impl<T> AsyncMutex<T> {
    pub const fn new(value: T) -> Self {
        AsyncMutex {
            locked: AtomicBool::new(false),
            waiters: StdMutex::new(VecDeque::new()),
            data: UnsafeCell::new(value),
        }
    }

    /// Attempts to acquire the lock without suspending.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, T>> {
        self.locked
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .ok()
            .map(|()| MutexGuard { mutex: self })
    }

    /// Returns a future that resolves to a [`MutexGuard`] once the
    /// lock is acquired.
    pub fn lock(&self) -> Lock<'_, T> {
        Lock { mutex: self }
    }

    fn unlock(&self) {
        // LIFO: the most recently parked waiter gets first crack at
        // the now-unlocked mutex.
        let next = self.waiters.lock().unwrap().pop_back();
        self.locked.store(false, Ordering::Release);
        if let Some(waker) = next {
            waker.wake();
        }
    }
}

#[must_use = "futures do nothing unless polled or awaited"]
pub struct Lock<'a, T> {
    mutex: &'a AsyncMutex<T>,
}

impl<'a, T> Future for Lock<'a, T> {
    type Output = MutexGuard<'a, T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(guard) = self.mutex.try_lock() {
            return Poll::Ready(guard);
        }
        self.mutex.waiters.lock().unwrap().push_back(cx.waker().clone());
        // Re-check: the lock may have been released between the
        // failed `try_lock` above and registering our waker.
        if let Some(guard) = self.mutex.try_lock() {
            return Poll::Ready(guard);
        }
        Poll::Pending
    }
}

/// An RAII guard that releases the lock on [`AsyncMutex`] when dropped.
pub struct MutexGuard<'a, T> {
    mutex: &'a AsyncMutex<T>,
}

impl<T> Deref for MutexGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: holding a `MutexGuard` is proof the lock bit is set
        // and we are its sole holder.
        unsafe { &*self.mutex.data.get() }
    }
}

impl<T> DerefMut for MutexGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: see `Deref` above.
        unsafe { &mut *self.mutex.data.get() }
    }
}

impl<T> Drop for MutexGuard<'_, T> {
    fn drop(&mut self) {
        self.mutex.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn block_on<F: Future>(mut fut: F) -> F::Output {
        use std::task::{RawWaker, RawWakerVTable};
        fn clone(_: *const ()) -> RawWaker {
            raw()
        }
        fn noop(_: *const ()) {}
        fn raw() -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        // SAFETY: every vtable function ignores the data pointer.
        let waker = unsafe { Waker::from_raw(raw()) };
        let mut cx = Context::from_waker(&waker);
        // SAFETY: `fut` is not moved again after this point.
        let mut fut = unsafe { Pin::new_unchecked(&mut fut) };
        loop {
            if let Poll::Ready(v) = fut.as_mut().poll(&mut cx) {
                return v;
            }
            thread::yield_now();
        }
    }

    #[test]
    fn try_lock_then_contend() {
        let mutex = AsyncMutex::new(0u32);
        let guard = mutex.try_lock().unwrap();
        assert!(mutex.try_lock().is_none());
        drop(guard);
        assert!(mutex.try_lock().is_some());
    }

    #[test]
    fn concurrent_increments_are_serialized() {
        let mutex = Arc::new(AsyncMutex::new(0u64));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let mutex = mutex.clone();
                thread::spawn(move || {
                    for _ in 0..1000 {
                        let mut guard = block_on(mutex.lock());
                        *guard += 1;
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(*block_on(mutex.lock()), 8000);
    }
}
