// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use colt_exec::Executor;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn spawn_and_drain(workers: usize, tasks: usize) {
    let exec = Executor::new(workers);
    let remaining = Arc::new(AtomicUsize::new(tasks));
    let done = Arc::new((std::sync::Mutex::new(()), std::sync::Condvar::new()));
    for _ in 0..tasks {
        let remaining = remaining.clone();
        let done = done.clone();
        let _task = exec
            .spawn(async move {
                if remaining.fetch_sub(1, Ordering::AcqRel) == 1 {
                    done.1.notify_all();
                }
            })
            .expect("pool is running");
    }
    let guard = done.0.lock().expect("lock not poisoned");
    let _ = done
        .1
        .wait_while(guard, |_: &mut ()| remaining.load(Ordering::Acquire) != 0)
        .expect("lock not poisoned");
}

fn bench_spawn_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_and_drain");
    for workers in [1, 2, 4] {
        group.bench_with_input(
            BenchmarkId::from_parameter(workers),
            &workers,
            |b, &workers| {
                b.iter(|| spawn_and_drain(workers, 1000));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_spawn_drain);
criterion_main!(benches);
