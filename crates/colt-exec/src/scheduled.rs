// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! [`ScheduledExecutor`] layers a timer thread and a deadline-ordered
//! min-heap on top of [`Executor`]: `post` queues a future to run no
//! earlier than a given deadline, the timer thread sleeps until the
//! earliest one is due, then hands it to the base executor's own
//! `spawn`. Ties break FIFO by insertion sequence.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::error::ScheduleError;
use crate::executor::Executor;
use crate::task::Task;

const TIMER_RUNNING: u8 = 0;
const TIMER_STOPPING: u8 = 1;
const TIMER_JOINED: u8 = 2;

type Thunk = Box<dyn FnOnce() + Send>;

struct TimerEntry {
    deadline: Instant,
    sequence: u64,
    run: Thunk,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.sequence == other.sequence
    }
}
impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        (self.deadline, self.sequence).cmp(&(other.deadline, other.sequence))
    }
}

struct TimerShared {
    heap: Mutex<BinaryHeap<Reverse<TimerEntry>>>,
    state: AtomicU8,
    sequence: AtomicU64,
    wake: Condvar,
}

/// An [`Executor`] plus a timer thread for deadline-ordered work.
pub struct ScheduledExecutor {
    pool: Arc<Executor>,
    timer: Arc<TimerShared>,
    timer_thread: Mutex<Option<JoinHandle<()>>>,
}

impl ScheduledExecutor {
    #[must_use]
    pub fn new(num_workers: usize) -> Self {
        let timer = Arc::new(TimerShared {
            heap: Mutex::new(BinaryHeap::new()),
            state: AtomicU8::new(TIMER_RUNNING),
            sequence: AtomicU64::new(0),
            wake: Condvar::new(),
        });
        let pool = Arc::new(Executor::new(num_workers));
        let thread_timer = timer.clone();
        let timer_thread = std::thread::Builder::new()
            .name("colt-exec-timer".into())
            .spawn(move || run_timer(&thread_timer))
            .expect("failed to spawn timer thread");

        ScheduledExecutor {
            pool,
            timer,
            timer_thread: Mutex::new(Some(timer_thread)),
        }
    }

    /// Schedules `fut` to run on the pool no earlier than `deadline`.
    ///
    /// # Errors
    /// Returns [`ScheduleError::DeadlinePassed`] if `deadline` is
    /// already in the past, or [`ScheduleError::Closed`] if the timer
    /// or pool has been stopped.
    pub fn post<F>(&self, fut: F, deadline: Instant) -> Result<Task<F::Output>, ScheduleError>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        if self.timer.state.load(Ordering::Acquire) != TIMER_RUNNING {
            return Err(ScheduleError::Closed);
        }
        if deadline <= Instant::now() {
            return Err(ScheduleError::DeadlinePassed);
        }

        let (promise, task) = crate::task::channel();
        let pool = self.pool.clone();
        let run: Thunk = Box::new(move || {
            if pool.spawn(async move { promise.fulfill(fut.await) }).is_err() {
                // Pool stopped between queueing and firing; the
                // promise simply drops, reporting `Closed` to `task`.
            }
        });
        let sequence = self.timer.sequence.fetch_add(1, Ordering::Relaxed);
        self.timer
            .heap
            .lock()
            .unwrap()
            .push(Reverse(TimerEntry { deadline, sequence, run }));
        self.timer.wake.notify_one();
        Ok(task)
    }

    /// Stops the timer thread first (dropping any not-yet-due work),
    /// then stops the underlying pool.
    pub fn stop(&self) {
        if self
            .timer
            .state
            .compare_exchange(
                TIMER_RUNNING,
                TIMER_STOPPING,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
        {
            self.timer.wake.notify_all();
            if let Some(join) = self.timer_thread.lock().unwrap().take() {
                let _ = join.join();
            }
            self.timer.state.store(TIMER_JOINED, Ordering::Release);
        }
        self.pool.stop();
    }

    #[must_use]
    pub fn num_workers(&self) -> usize {
        self.pool.num_workers()
    }
}

impl Drop for ScheduledExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_timer(shared: &TimerShared) {
    loop {
        let mut heap = shared.heap.lock().unwrap();
        if shared.state.load(Ordering::Acquire) != TIMER_RUNNING {
            return;
        }
        match heap.peek() {
            None => {
                let (_guard, _timeout) = shared
                    .wake
                    .wait_timeout(heap, Duration::from_millis(100))
                    .unwrap();
            }
            Some(Reverse(entry)) => {
                let now = Instant::now();
                if entry.deadline <= now {
                    let Reverse(entry) = heap.pop().unwrap();
                    drop(heap);
                    (entry.run)();
                } else {
                    let wait = entry.deadline - now;
                    let (_guard, _timeout) = shared.wake.wait_timeout(heap, wait).unwrap();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    fn futures_block_on<F: Future>(mut fut: F) -> F::Output {
        use std::pin::Pin;
        use std::task::{Context, RawWaker, RawWakerVTable, Waker};
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
            if let std::task::Poll::Ready(v) = fut.as_mut().poll(&mut cx) {
                return v;
            }
            std::thread::yield_now();
        }
    }

    #[test]
    fn deadline_in_past_is_rejected() {
        init_tracing();
        let exec = ScheduledExecutor::new(1);
        let past = Instant::now() - Duration::from_secs(1);
        let result = exec.post(async {}, past);
        assert!(matches!(result, Err(ScheduleError::DeadlinePassed)));
    }

    #[test]
    fn fires_after_deadline() {
        init_tracing();
        let exec = ScheduledExecutor::new(2);
        let fired = Arc::new(AtomicBool::new(false));
        let fired2 = fired.clone();
        let task = exec
            .post(
                async move {
                    fired2.store(true, Ordering::SeqCst);
                },
                Instant::now() + Duration::from_millis(20),
            )
            .unwrap();
        futures_block_on(task).unwrap();
        assert!(fired.load(Ordering::SeqCst));
    }

    #[test]
    fn fifo_tie_break_preserves_insertion_order() {
        init_tracing();
        let exec = ScheduledExecutor::new(1);
        let order = Arc::new(Mutex::new(Vec::new()));
        let deadline = Instant::now() + Duration::from_millis(20);
        let mut tasks = Vec::new();
        for i in 0..5 {
            let order = order.clone();
            tasks.push(
                exec.post(
                    async move {
                        order.lock().unwrap().push(i);
                    },
                    deadline,
                )
                .unwrap(),
            );
        }
        for task in tasks {
            futures_block_on(task).unwrap();
        }
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }
}
