//! Windows fiber backend.
//!
//! Strategy: delegate context switching to the OS. Every coroutine is a
//! fiber created with `CreateFiberEx`; the host side of a thread becomes a
//! fiber itself via `ConvertThreadToFiber` the first time a coroutine is
//! resumed on it, and both directions of a switch are `SwitchToFiber`.
//!
//! The fiber handle is released exactly once, by [`Context::release`] when
//! the coroutine is destroyed. Completion of the fiber's entry function only
//! marks the coroutine dead; letting the trampoline delete its own running
//! fiber would free the stack it is executing on.

use std::ffi::c_void;
use std::io;
use std::ptr::{self, NonNull};

use windows_sys::Win32::System::Threading::{
    ConvertThreadToFiber, CreateFiberEx, DeleteFiber, IsThreadAFiber, SwitchToFiber,
    FIBER_FLAG_FLOAT_SWITCH,
};

use crate::coroutine::ControlBlock;
use crate::stack::Stack;

/// Saved machine state of one coroutine: the fiber that runs it.
pub(crate) struct Context {
    fiber: *mut c_void,
}

/// Per-thread storage for the host's machine state: the converted thread
/// fiber, null until the first resume on the thread.
pub(crate) struct HostContext {
    thread_fiber: *mut c_void,
}

impl HostContext {
    pub(crate) fn new() -> Self {
        Self {
            thread_fiber: ptr::null_mut(),
        }
    }
}

/// Fixed entry point of every fiber created by [`Context::bind`].
unsafe extern "system" fn trampoline(param: *mut c_void) {
    crate::coroutine::enter(NonNull::new_unchecked(param.cast::<ControlBlock>()));
}

impl Context {
    /// Creates a context that is not yet bound to any fiber.
    pub(crate) fn new() -> Self {
        Self {
            fiber: ptr::null_mut(),
        }
    }

    /// Binds this context by creating the fiber that will run the coroutine.
    ///
    /// The stack is reserved by the OS at the size carried in `stack`; a
    /// commit size of zero lets the kernel grow the committed region on
    /// demand up to the reserve.
    pub(crate) fn bind(&mut self, stack: &Stack, block: NonNull<ControlBlock>) -> io::Result<()> {
        let fiber = unsafe {
            CreateFiberEx(
                0,
                stack.reserve_size(),
                FIBER_FLAG_FLOAT_SWITCH,
                Some(trampoline),
                block.as_ptr().cast(),
            )
        };
        if fiber.is_null() {
            return Err(io::Error::last_os_error());
        }
        self.fiber = fiber;
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
        if (*host).thread_fiber.is_null() {
            let fiber = ConvertThreadToFiber(ptr::null());
            if fiber.is_null() {
                if IsThreadAFiber() != 0 {
                    // The host application converted this thread before us
                    // and owns the fiber pointer; we have no way to recover
                    // it through the documented API.
                    panic!("thread was already converted to a fiber outside this crate");
                }
                panic!(
                    "cannot convert thread to fiber: {}",
                    io::Error::last_os_error()
                );
            }
            (*host).thread_fiber = fiber;
        }

        SwitchToFiber((*ctx).fiber);
    }

    /// Switches from the coroutine owning `ctx` back to the host. Returns
    /// when the coroutine is next resumed.
    ///
    /// # Safety
    ///
    /// Must be called on the coroutine's own fiber, on a thread whose `host`
    /// slot holds the converted thread fiber.
    pub(crate) unsafe fn switch_out(_ctx: *mut Context, host: *mut HostContext) {
        debug_assert!(!(*host).thread_fiber.is_null());
        SwitchToFiber((*host).thread_fiber);
    }

    /// Deletes the fiber. Safe to call more than once; only the first call
    /// releases the handle.
    pub(crate) fn release(&mut self) {
        if !self.fiber.is_null() {
            unsafe { DeleteFiber(self.fiber) };
            self.fiber = ptr::null_mut();
        }
    }
}
