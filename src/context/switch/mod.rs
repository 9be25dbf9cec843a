//! Manual register pivot backend.
//!
//! This strategy snapshots and restores the minimal register set by hand in
//! a small piece of architecture-specific assembly, pivoting the stack
//! pointer into the coroutine's private buffer on the first entry. It needs
//! no OS object per coroutine, which also makes it the cheapest backend: a
//! switch is a couple dozen moves, with no syscall (`swapcontext` takes a
//! signal-mask round trip on every switch, which is why the architectures
//! supported here prefer this backend over the ucontext one).
//!
//! All raw stack and register manipulation in the crate is confined to this
//! module and its per-architecture submodules; the layers above only see the
//! uniform bind/switch/release contract.

use std::io;
use std::ptr::NonNull;

use crate::coroutine::ControlBlock;
use crate::stack::Stack;

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        use self::x86_64::{switch_context, RegisterFrame, STACK_ALIGNMENT};
    } else if #[cfg(target_arch = "aarch64")] {
        mod aarch64;
        use self::aarch64::{switch_context, RegisterFrame, STACK_ALIGNMENT};
    } else {
        compile_error!("register pivot backend not ported to this architecture");
    }
}

/// Saved machine state of one coroutine.
///
/// Holds the callee-saved register frame the coroutine was suspended with;
/// between [`Context::bind`] and the first switch it holds the synthetic
/// frame that enters the trampoline.
pub(crate) struct Context {
    callee: RegisterFrame,
}

/// Per-thread storage for the host's machine state.
///
/// Overwritten on every switch into a coroutine and jumped back to by the
/// next yield or completion on the same thread.
pub(crate) struct HostContext {
    frame: RegisterFrame,
}

impl HostContext {
    pub(crate) fn new() -> Self {
        Self {
            frame: RegisterFrame::default(),
        }
    }
}

/// Fixed entry point handed to [`RegisterFrame::bind`]; runs on the
/// coroutine stack with the control-block pointer as its only argument.
extern "C" fn trampoline(block: *mut ControlBlock) -> ! {
    unsafe { crate::coroutine::enter(NonNull::new_unchecked(block)) }
}

impl Context {
    /// Creates a context that is not yet bound to any stack.
    pub(crate) fn new() -> Self {
        Self {
            callee: RegisterFrame::default(),
        }
    }

    /// Binds this context to `stack`, ready for its first activation.
    ///
    /// Pure register and memory setup; cannot fail on this backend. The
    /// `io::Result` matches the contract shared with the OS-object backends.
    pub(crate) fn bind(&mut self, stack: &Stack, block: NonNull<ControlBlock>) -> io::Result<()> {
        let base = stack.base().get();
        debug_assert_eq!(base % STACK_ALIGNMENT, 0);
        debug_assert!(stack.len() >= crate::stack::MIN_STACK_SIZE);
        self.callee =
            unsafe { RegisterFrame::bind(base, trampoline as usize, block.as_ptr() as usize) };
        Ok(())
    }

    /// Switches from the host to the coroutine owning `ctx`. Returns when
    /// the coroutine yields or finishes.
    ///
    /// # Safety
    ///
    /// `ctx` must be bound and suspended; `host` must be the calling
    /// thread's scheduler slot; the caller must be the host context.
    pub(crate) unsafe fn switch_in(ctx: *mut Context, host: *mut HostContext) {
        switch_context(&mut (*host).frame, &(*ctx).callee);
    }

    /// Switches from the coroutine owning `ctx` back to the host. Returns
    /// when the coroutine is next resumed.
    ///
    /// # Safety
    ///
    /// Must be called on the coroutine's own stack, with `host` holding the
    /// state saved by the `switch_in` that activated it.
    pub(crate) unsafe fn switch_out(ctx: *mut Context, host: *mut HostContext) {
        switch_context(&mut (*ctx).callee, &(*host).frame);
    }

    /// No OS resources to release on this backend.
    pub(crate) fn release(&mut self) {}
}
