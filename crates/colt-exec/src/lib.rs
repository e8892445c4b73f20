// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Coroutine executor and synchronization primitives: a one-shot
//! [`task::Task`]/[`task::Promise`] channel, boolean wakeup signals
//! ([`flags::FlagSpsc`], [`flags::FlagMpmc`]), an [`mutex::AsyncMutex`],
//! a work-stealing [`executor::Executor`] and its timer-driven
//! [`scheduled::ScheduledExecutor`] extension, structured-concurrency
//! [`scope::AsyncScope`], and lazy [`generator::Generator`] sequences.

mod loom;
pub mod util;

pub mod error;
pub mod executor;
pub mod flags;
pub mod generator;
pub mod mutex;
pub mod scheduled;
pub mod scope;
pub mod task;

pub use error::{Closed, SpawnError};
pub use executor::Executor;
pub use flags::{FlagMpmc, FlagSpsc};
pub use generator::Generator;
pub use mutex::{AsyncMutex, MutexGuard};
pub use scheduled::ScheduledExecutor;
pub use scope::AsyncScope;
pub use task::{Promise, Task, TaskError, TaskFailure};
