//! Per-thread scheduler state.
//!
//! Each OS thread owns one cell holding the two pieces of global state the
//! protocol layer needs: the host ("primary") execution context that
//! coroutines switch back to, and the coroutine currently executing on the
//! thread, if any. The cell is genuinely thread-local; it is never read or
//! written across threads, and [`Coroutine`](crate::Coroutine) being `!Send`
//! keeps every coroutine on the thread whose cell first resumed it.

use core::cell::{Cell, UnsafeCell};
use core::ptr::NonNull;

use crate::context::HostContext;
use crate::coroutine::ControlBlock;

struct SchedulerCell {
    /// Host execution state of this thread. Lazily populated by the backend
    /// on the first switch out of the host.
    primary: UnsafeCell<HostContext>,

    /// Coroutine presently executing on this thread. Identity only; the
    /// owning handle lives in host code.
    current: Cell<Option<NonNull<ControlBlock>>>,
}

thread_local! {
    static SCHEDULER: SchedulerCell = SchedulerCell {
        primary: UnsafeCell::new(HostContext::new()),
        current: Cell::new(None),
    };
}

/// The coroutine currently executing on this thread, if any.
pub(crate) fn current() -> Option<NonNull<ControlBlock>> {
    SCHEDULER.with(|cell| cell.current.get())
}

pub(crate) fn set_current(block: NonNull<ControlBlock>) {
    SCHEDULER.with(|cell| cell.current.set(Some(block)));
}

pub(crate) fn clear_current() {
    SCHEDULER.with(|cell| cell.current.set(None));
}

/// Clears `current` only if it still points at `block`. Used when a
/// coroutine finishes or is destroyed, so the cell never dangles.
pub(crate) fn clear_if_current(block: NonNull<ControlBlock>) {
    // try_with: a handle may be dropped during thread-local teardown, after
    // this cell is gone; there is nothing left to clear then.
    let _ = SCHEDULER.try_with(|cell| {
        if cell.current.get() == Some(block) {
            cell.current.set(None);
        }
    });
}

/// Raw pointer to this thread's host context slot.
///
/// The pointer stays valid for the lifetime of the thread, and coroutines
/// cannot migrate threads, so it may be held across a context switch. It
/// must not be held across anything else.
pub(crate) fn primary_context() -> *mut HostContext {
    SCHEDULER.with(|cell| cell.primary.get())
}
