//! POSIX ucontext backend.
//!
//! Strategy: capture the creating thread's state with `getcontext`, redirect
//! the captured state's stack fields into the coroutine's private buffer and
//! attach the entry trampoline with `makecontext`. Every switch afterwards
//! is a `swapcontext` between the coroutine's slot and the thread's host
//! slot.
//!
//! `makecontext` only passes integer arguments to the entry function, so on
//! 64-bit targets the control-block address is split into two 32-bit halves
//! and reassembled inside the trampoline.
//!
//! `uc_link` is deliberately left null: completion is an explicit switch
//! performed by the shared trampoline, identical on every backend, rather
//! than the automatic link-return some ucontext designs use.

use std::io;
use std::mem;
use std::ptr::{self, NonNull};

use libc::c_uint;

use crate::coroutine::ControlBlock;
use crate::stack::Stack;

/// Saved machine state of one coroutine.
pub(crate) struct Context {
    callee: libc::ucontext_t,
}

/// Per-thread storage for the host's machine state.
pub(crate) struct HostContext {
    frame: libc::ucontext_t,
}

impl HostContext {
    pub(crate) fn new() -> Self {
        // Fully overwritten by the first swapcontext out of the host.
        Self {
            frame: unsafe { mem::zeroed() },
        }
    }
}

#[cfg(target_pointer_width = "64")]
extern "C" fn trampoline(hi: c_uint, lo: c_uint) {
    let addr = ((hi as usize) << 32) | lo as usize;
    unsafe { crate::coroutine::enter(NonNull::new_unchecked(addr as *mut ControlBlock)) }
}

#[cfg(target_pointer_width = "32")]
extern "C" fn trampoline(addr: c_uint) {
    unsafe { crate::coroutine::enter(NonNull::new_unchecked(addr as usize as *mut ControlBlock)) }
}

impl Context {
    /// Creates a context that is not yet bound to any stack.
    pub(crate) fn new() -> Self {
        Self {
            callee: unsafe { mem::zeroed() },
        }
    }

    /// Binds this context to `stack`, ready for its first activation.
    pub(crate) fn bind(&mut self, stack: &Stack, block: NonNull<ControlBlock>) -> io::Result<()> {
        unsafe {
            if libc::getcontext(&mut self.callee) != 0 {
                return Err(io::Error::last_os_error());
            }

            self.callee.uc_stack.ss_sp = stack.limit().get() as *mut libc::c_void;
            self.callee.uc_stack.ss_size = stack.len();
            self.callee.uc_stack.ss_flags = 0;
            self.callee.uc_link = ptr::null_mut();

            let entry = mem::transmute::<*const (), extern "C" fn()>(trampoline as *const ());
            let addr = block.as_ptr() as usize;
            #[cfg(target_pointer_width = "64")]
            libc::makecontext(
                &mut self.callee,
                entry,
                2,
                (addr >> 32) as c_uint,
                (addr & 0xFFFF_FFFF) as c_uint,
            );
            #[cfg(target_pointer_width = "32")]
            libc::makecontext(&mut self.callee, entry, 1, addr as c_uint);
        }
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
        let rc = libc::swapcontext(&mut (*host).frame, &(*ctx).callee);
        debug_assert_eq!(rc, 0);
    }

    /// Switches from the coroutine owning `ctx` back to the host. Returns
    /// when the coroutine is next resumed.
    ///
    /// # Safety
    ///
    /// Must be called on the coroutine's own stack, with `host` holding the
    /// state saved by the `switch_in` that activated it.
    pub(crate) unsafe fn switch_out(ctx: *mut Context, host: *mut HostContext) {
        let rc = libc::swapcontext(&mut (*ctx).callee, &(*host).frame);
        debug_assert_eq!(rc, 0);
    }

    /// No OS resources to release on this backend.
    pub(crate) fn release(&mut self) {}
}
