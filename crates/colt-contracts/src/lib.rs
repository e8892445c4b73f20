// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! The process-wide collaborator hooks every other `colt-*` crate calls
//! into: a panic entry point for failed preconditions (the "contract
//! violation hook") and an allocation-failure hook for infallible
//! allocators. Both are atomically swappable and default to logging a
//! diagnostic and terminating the process; neither ever returns.
//!
//! The precondition!/postcondition!/for-each macro DSLs that would
//! normally sit in front of these hooks are a collaborator, not part of
//! this crate (see spec §1 "out of scope"); this crate only owns the
//! two hook call sites themselves.

use std::fmt;
use std::panic::Location;
use std::sync::RwLock;

/// The kind of contract that was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    Precondition,
    Postcondition,
    Assertion,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ViolationKind::Precondition => "precondition",
            ViolationKind::Postcondition => "postcondition",
            ViolationKind::Assertion => "assertion",
        })
    }
}

/// `(expression, explanation, kind, location) -> !`
pub type ViolationHook =
    dyn Fn(&str, &str, ViolationKind, Option<&Location<'_>>) + Send + Sync + 'static;

/// `(requested_size, requested_align, location) -> !`
pub type AllocFailureHook = dyn Fn(usize, usize, &Location<'_>) + Send + Sync + 'static;

fn default_violation_hook(
    expr: &str,
    explanation: &str,
    kind: ViolationKind,
    location: Option<&Location<'_>>,
) {
    match location {
        Some(loc) => {
            tracing::error!(target: "colt_contracts", %kind, %expr, %explanation, %loc, "contract violated");
        }
        None => {
            tracing::error!(target: "colt_contracts", %kind, %expr, %explanation, "contract violated");
        }
    }
}

fn default_alloc_failure_hook(size: usize, align: usize, location: &Location<'_>) {
    tracing::error!(target: "colt_contracts", size, align, %location, "allocation failure");
}

static VIOLATION_HOOK: RwLock<Option<Box<ViolationHook>>> = RwLock::new(None);
static ALLOC_FAILURE_HOOK: RwLock<Option<Box<AllocFailureHook>>> = RwLock::new(None);

/// Replaces the process-wide contract-violation hook.
///
/// The previous hook is dropped. The new hook must never return normally;
/// callers of [`violate`] abort the process regardless of what the hook
/// does, but a hook that blocks or panics will itself be the cause of any
/// resulting confusion.
pub fn set_violation_hook(hook: Box<ViolationHook>) {
    *VIOLATION_HOOK.write().unwrap() = Some(hook);
}

/// Replaces the process-wide allocation-failure hook.
pub fn set_alloc_failure_hook(hook: Box<AllocFailureHook>) {
    *ALLOC_FAILURE_HOOK.write().unwrap() = Some(hook);
}

/// Reports a failed precondition/postcondition/assertion and terminates the
/// process. Invokes the registered hook (or the default) first.
#[track_caller]
pub fn violate(expr: &str, explanation: &str, kind: ViolationKind) -> ! {
    let location = Location::caller();
    match VIOLATION_HOOK.read().unwrap().as_ref() {
        Some(hook) => hook(expr, explanation, kind, Some(location)),
        None => default_violation_hook(expr, explanation, kind, Some(location)),
    }
    abort();
}

/// Reports that an infallible allocator failed to satisfy a request and
/// terminates the process. Invoked by [`colt_alloc`]'s null-abort leaf.
#[track_caller]
pub fn alloc_failure(size: usize, align: usize) -> ! {
    let location = Location::caller();
    match ALLOC_FAILURE_HOOK.read().unwrap().as_ref() {
        Some(hook) => hook(size, align, location),
        None => default_alloc_failure_hook(size, align, location),
    }
    abort();
}

/// Terminates the process without unwinding.
#[inline(never)]
pub fn abort() -> ! {
    std::process::abort();
}

/// Asserts a precondition, reporting via [`violate`] on failure.
#[macro_export]
macro_rules! precondition {
    ($cond:expr, $explanation:expr) => {
        if !($cond) {
            $crate::violate(stringify!($cond), $explanation, $crate::ViolationKind::Precondition);
        }
    };
}

/// Asserts a postcondition, reporting via [`violate`] on failure.
#[macro_export]
macro_rules! postcondition {
    ($cond:expr, $explanation:expr) => {
        if !($cond) {
            $crate::violate(stringify!($cond), $explanation, $crate::ViolationKind::Postcondition);
        }
    };
}

/// Asserts an invariant, reporting via [`violate`] on failure.
#[macro_export]
macro_rules! invariant {
    ($cond:expr, $explanation:expr) => {
        if !($cond) {
            $crate::violate(stringify!($cond), $explanation, $crate::ViolationKind::Assertion);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn default_hooks_do_not_panic_before_abort() {
        // We can't actually call `violate`/`alloc_failure` here since they abort
        // the test process; instead we exercise the hook plumbing directly.
        default_violation_hook("1 == 2", "sanity", ViolationKind::Assertion, None);
        default_alloc_failure_hook(8, 8, Location::caller());
    }

    #[test]
    fn custom_violation_hook_is_invoked() {
        let called = Arc::new(AtomicBool::new(false));
        let called2 = called.clone();
        set_violation_hook(Box::new(move |_, _, _, _| {
            called2.store(true, Ordering::SeqCst);
        }));
        match VIOLATION_HOOK.read().unwrap().as_ref() {
            Some(hook) => hook("x", "y", ViolationKind::Precondition, None),
            None => unreachable!(),
        }
        assert!(called.load(Ordering::SeqCst));
        // restore default for other tests running in the same process
        *VIOLATION_HOOK.write().unwrap() = None;
    }
}
