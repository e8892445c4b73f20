// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A one-shot result slot shared between a spawned coroutine and
//! whoever awaits it.
//!
//! [`Promise`] is the producer half, fulfilled exactly once by
//! [`Promise::fulfill`]/[`Promise::fail`] (or implicitly by
//! [`Promise::drop`], which reports [`Closed`]). [`Task`] is the
//! consumer half: a `Future` that transfers control to the promise's
//! fulfiller and registers itself as the single continuation, the same
//! way awaiting a coroutine handle does. A value stored before the
//! `Task` is ever polled is observed immediately; a value stored while
//! the `Task` is pending wakes its registered waker, running the
//! continuation inline the way final suspension does.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use crate::error::Closed;

type BoxError = Box<dyn StdError + Send + Sync + 'static>;

/// A failure captured by a [`Promise`] and re-raised when the matching
/// [`Task`] is awaited.
#[derive(Debug)]
pub struct TaskFailure(BoxError);

impl TaskFailure {
    pub fn new(err: impl Into<BoxError>) -> Self {
        TaskFailure(err.into())
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl StdError for TaskFailure {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        Some(self.0.as_ref())
    }
}

/// Either the task's captured failure was re-raised, or the promise
/// was dropped without ever being fulfilled.
#[derive(Debug)]
pub enum TaskError {
    Failed(TaskFailure),
    Closed(Closed),
}

impl fmt::Display for TaskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskError::Failed(e) => fmt::Display::fmt(e, f),
            TaskError::Closed(e) => fmt::Display::fmt(e, f),
        }
    }
}

impl StdError for TaskError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            TaskError::Failed(e) => Some(e),
            TaskError::Closed(e) => Some(e),
        }
    }
}

enum Slot<T> {
    Empty,
    Value(T),
    Failure(TaskFailure),
}

struct Inner<T> {
    slot: std::cell::UnsafeCell<Slot<T>>,
    waker: std::sync::Mutex<Option<Waker>>,
    ready: std::sync::atomic::AtomicBool,
}

// SAFETY: `slot` is only ever touched by the promise side (before
// fulfillment) and the task side (after `ready` is observed true via
// `Acquire`), which the `ready` flag's release/acquire pair makes
// mutually exclusive in time.
unsafe impl<T: Send> Sync for Inner<T> {}

/// The producer half of a [`Task`]. Created alongside its `Task` by
/// [`channel`].
pub struct Promise<T> {
    inner: Arc<Inner<T>>,
}

/// The consumer half: a one-shot `Future` that resolves with the
/// value the matching [`Promise`] was fulfilled with, or a
/// [`TaskError`] if it failed or was dropped unfulfilled.
#[must_use = "a Task does nothing unless polled or awaited"]
pub struct Task<T> {
    inner: Arc<Inner<T>>,
}

/// Creates a fresh one-shot [`Promise`]/[`Task`] pair.
#[must_use]
pub fn channel<T>() -> (Promise<T>, Task<T>) {
    let inner = Arc::new(Inner {
        slot: std::cell::UnsafeCell::new(Slot::Empty),
        waker: std::sync::Mutex::new(None),
        ready: std::sync::atomic::AtomicBool::new(false),
    });
    (
        Promise {
            inner: inner.clone(),
        },
        Task { inner },
    )
}

impl<T> Promise<T> {
    fn fulfill_slot(&self, slot: Slot<T>) {
        // SAFETY: only the promise writes the slot, and only once
        // (fulfill/fail/drop each consume `self` or run at most once),
        // strictly before `ready` is published with `Release`.
        unsafe {
            *self.inner.slot.get() = slot;
        }
        self.inner.ready.store(true, Ordering::Release);
        if let Some(waker) = self.inner.waker.lock().unwrap().take() {
            waker.wake();
        }
    }

    /// Fulfills the promise with a value, waking the task's registered
    /// continuation if one is waiting.
    pub fn fulfill(self, value: T) {
        self.fulfill_slot(Slot::Value(value));
    }

    /// Fulfills the promise with a captured failure, re-raised when
    /// the task is awaited.
    pub fn fail(self, err: impl Into<BoxError>) {
        self.fulfill_slot(Slot::Failure(TaskFailure::new(err)));
    }
}

impl<T> Drop for Promise<T> {
    fn drop(&mut self) {
        if self.inner.ready.load(Ordering::Acquire) {
            return;
        }
        // Dropped without ever being fulfilled: wake the task so it
        // observes `Closed` instead of hanging forever.
        self.inner.ready.store(true, Ordering::Release);
        if let Some(waker) = self.inner.waker.lock().unwrap().take() {
            waker.wake();
        }
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, TaskError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if !self.inner.ready.load(Ordering::Acquire) {
            *self.inner.waker.lock().unwrap() = Some(cx.waker().clone());
            // Re-check: the promise may have published between our
            // first load and registering the waker above.
            if !self.inner.ready.load(Ordering::Acquire) {
                return Poll::Pending;
            }
        }
        // SAFETY: `ready` observed `true` with `Acquire`, synchronizing
        // with the promise's `Release` store after writing the slot.
        let slot = unsafe { &mut *self.inner.slot.get() };
        match std::mem::replace(slot, Slot::Empty) {
            Slot::Empty => Poll::Ready(Err(TaskError::Closed(Closed(())))),
            Slot::Value(v) => Poll::Ready(Ok(v)),
            Slot::Failure(e) => Poll::Ready(Err(TaskError::Failed(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_observed_before_poll() {
        let (p, t) = channel::<u32>();
        p.fulfill(42);
        let waker = futures_noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut t = Box::pin(t);
        match t.as_mut().poll(&mut cx) {
            Poll::Ready(Ok(v)) => assert_eq!(v, 42),
            other => panic!("expected Ready(Ok(42)), got {other:?}"),
        }
    }

    #[test]
    fn dropped_promise_reports_closed() {
        let (p, t) = channel::<u32>();
        drop(p);
        let waker = futures_noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut t = Box::pin(t);
        match t.as_mut().poll(&mut cx) {
            Poll::Ready(Err(TaskError::Closed(_))) => {}
            other => panic!("expected Ready(Err(Closed)), got {other:?}"),
        }
    }

    #[test]
    fn failure_is_reraised() {
        let (p, t) = channel::<u32>();
        p.fail("boom");
        let waker = futures_noop_waker();
        let mut cx = Context::from_waker(&waker);
        let mut t = Box::pin(t);
        match t.as_mut().poll(&mut cx) {
            Poll::Ready(Err(TaskError::Failed(_))) => {}
            other => panic!("expected Ready(Err(Failed)), got {other:?}"),
        }
    }

    fn futures_noop_waker() -> Waker {
        use std::task::{RawWaker, RawWakerVTable};
        fn clone(_: *const ()) -> RawWaker {
            raw()
        }
        fn noop(_: *const ()) {}
        fn raw() -> RawWaker {
            RawWaker::new(std::ptr::null(), &VTABLE)
        }
        static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
        // SAFETY: the vtable's functions are all no-ops that never
        // dereference the data pointer, so a null pointer is sound.
        unsafe { Waker::from_raw(raw()) }
    }
}
