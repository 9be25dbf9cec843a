//! Execution-context backends.
//!
//! A backend captures, restores and switches the CPU execution state bound
//! to a coroutine's stack. Three interchangeable strategies exist, selected
//! per target at compile time:
//!
//! - [`fiber`] delegates to Windows fibers, the OS's own user-mode threads.
//! - [`switch`] snapshots the callee-saved register set in hand-written
//!   assembly and pivots the stack pointer itself. Used on the Unix
//!   architectures it has been ported to; no syscall per switch.
//! - [`ucontext`] uses the POSIX user-context API. Portable fallback for
//!   Unix targets the register pivot does not cover.
//!
//! Every backend exposes the same surface, consumed by the protocol layer:
//!
//! - `Context::new()` — an unbound per-coroutine context slot.
//! - `Context::bind(&mut self, stack, block)` — associate the slot with a
//!   stack and the fixed entry trampoline. Called exactly once, at creation
//!   time, and performs no switch; it fails only on OS resource exhaustion.
//! - `Context::switch_in(ctx, host)` — suspend the host state into `host`
//!   and resume the coroutine. Returns when the coroutine switches back.
//! - `Context::switch_out(ctx, host)` — the reverse direction, used by
//!   yield and by the trampoline's final switch on completion.
//! - `Context::release(&mut self)` — tear down any OS handle, at most once.
//! - `HostContext::new()` — the per-thread slot holding the host's state,
//!   owned by the scheduler cell and lazily populated on first use.
//!
//! All state transfer happens through the two context slots; switches carry
//! no values.

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        mod fiber;
        pub(crate) use self::fiber::{Context, HostContext};
    } else if #[cfg(all(unix, any(target_arch = "x86_64", target_arch = "aarch64")))] {
        mod switch;
        pub(crate) use self::switch::{Context, HostContext};
    } else if #[cfg(all(unix, target_env = "gnu"))] {
        mod ucontext;
        pub(crate) use self::ucontext::{Context, HostContext};
    } else {
        compile_error!("no execution context backend for this target");
    }
}
