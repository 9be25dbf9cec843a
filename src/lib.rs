//! Portable stackful coroutines.
//!
//! ## Overview
//!
//! This crate provides a cooperative multitasking primitive in the style of
//! Lua's coroutines: a [`Coroutine`] owns a private call stack and can
//! suspend itself from any point of its call tree with [`yield_now`], to be
//! continued later by another [`resume`](Coroutine::resume). Scheduling is
//! entirely explicit; there is no preemption and no OS thread per
//! coroutine. One coroutine at most runs on a given thread at any instant,
//! and `resume` does not return until it yields or finishes.
//!
//! ## Example
//!
//! ```rust
//! use corolite::{yield_now, Coroutine, Status};
//!
//! let mut coroutine = Coroutine::new(|| {
//!     println!("[coroutine] started");
//!     for i in 0..3 {
//!         println!("[coroutine] yielding {}", i);
//!         yield_now();
//!     }
//!     println!("[coroutine] done");
//! })
//! .expect("failed to create coroutine");
//!
//! while coroutine.resume() {
//!     println!("[main] coroutine suspended, status {:?}", coroutine.status());
//! }
//!
//! assert_eq!(coroutine.status(), Status::Dead);
//! ```
//!
//! ## Backends
//!
//! The context switch itself is performed by one of three interchangeable
//! backends, selected per target at compile time:
//!
//! | Target                      | Backend                        |
//! |-----------------------------|--------------------------------|
//! | Windows                     | OS fibers                      |
//! | Unix on x86_64 / AArch64    | inline-assembly register pivot |
//! | other Unix (glibc)          | POSIX `ucontext`               |
//!
//! All three present the same bind/switch/release contract to the layers
//! above; see the `context` module documentation.
//!
//! ## Threads
//!
//! Coroutines may be used from any number of threads at once, but each
//! individual coroutine is affine to the thread that created it:
//! [`Coroutine`] is `!Send`, and the "currently running coroutine" and host
//! return context are tracked per thread.
//!
//! ## Panics
//!
//! A panic inside a coroutine body aborts the process. Propagating panics
//! across a stack switch is out of scope for this crate; treat a coroutine
//! body like a thread main function that must not unwind.

#![warn(missing_docs)]

mod context;
mod coroutine;
mod scheduler;
mod stack;

pub use coroutine::{running, yield_now, Coroutine, CoroutineId, NewError, Status};
pub use stack::{DEFAULT_STACK_SIZE, MIN_STACK_SIZE};

#[cfg(test)]
mod tests;
