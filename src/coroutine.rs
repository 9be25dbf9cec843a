//! Coroutine control blocks and the resume/yield protocol.

use std::cell::Cell;
use std::fmt;
use std::io;
use std::marker::PhantomData;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::process;
use std::ptr::{self, NonNull};

use log::trace;
use thiserror::Error;

use crate::context::Context;
use crate::scheduler;
use crate::stack::{self, Stack};

/// Execution status of a coroutine.
///
/// The transitions are `Suspended -> Running` on [`Coroutine::resume`],
/// `Running -> Suspended` on [`yield_now`] and `Running -> Dead` when the
/// body returns. `Dead` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// Waiting in a call to [`yield_now`], or created and not started yet.
    Suspended,

    /// Currently executing on its thread.
    Running,

    /// The body has returned; the coroutine cannot be resumed again.
    Dead,
}

/// Error returned when a coroutine could not be created.
#[derive(Debug, Error)]
pub enum NewError {
    /// The coroutine stack could not be allocated.
    #[error("failed to allocate coroutine stack")]
    Stack(#[source] io::Error),

    /// The execution context could not be bound to the stack.
    #[error("failed to bind execution context")]
    Bind(#[source] io::Error),
}

/// Identity of a coroutine, as reported by [`running`] and
/// [`Coroutine::id`].
///
/// An id is a plain token: it carries no ownership and cannot be used to
/// reach the coroutine it names. Ids are unique among coroutines that are
/// alive at the same time; an id may be reused after its coroutine is
/// destroyed.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoroutineId(NonZeroUsize);

impl CoroutineId {
    fn from_block(block: NonNull<ControlBlock>) -> Self {
        Self(block.addr())
    }
}

impl fmt::Debug for CoroutineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CoroutineId({:#x})", self.0)
    }
}

/// The record representing one coroutine: its status, entry closure, stack
/// and saved execution context.
///
/// Heap-allocated and never moved afterwards; the bound context stores raw
/// addresses into the block and its stack.
pub(crate) struct ControlBlock {
    status: Cell<Status>,

    /// Taken by the entry trampoline on first activation.
    entry: Option<Box<dyn FnOnce()>>,

    stack: Stack,

    context: Context,
}

/// A stackful coroutine: a function running on its own private stack, able
/// to suspend itself at any depth of its call tree and be resumed later.
///
/// A coroutine runs only inside a call to [`resume`](Coroutine::resume) on
/// the thread that owns the handle. It suspends itself with [`yield_now`]
/// and finishes by returning from its body. Creation runs no user code; the
/// body starts on the first resume.
///
/// # Example
///
/// ```
/// use corolite::{running, yield_now, Coroutine, Status};
///
/// let mut coroutine = Coroutine::new(|| {
///     assert!(running().is_some());
///     yield_now();
/// })
/// .unwrap();
///
/// assert_eq!(coroutine.status(), Status::Suspended);
/// assert!(coroutine.resume()); // runs until the yield
/// assert!(coroutine.resume()); // runs to completion
/// assert!(!coroutine.resume()); // already dead
/// assert_eq!(coroutine.status(), Status::Dead);
/// ```
///
/// # Dropping a coroutine
///
/// Dropping the handle destroys the coroutine and frees its stack. If the
/// coroutine is suspended mid-body, the values live on its stack are
/// discarded without running their destructors; a coroutine that should
/// clean up after itself must be resumed to completion first.
///
/// # Threads
///
/// A coroutine is affine to the thread that created it: the handle is
/// `!Send`, so every resume happens on the thread whose scheduler state the
/// coroutine switches through.
pub struct Coroutine {
    inner: Box<ControlBlock>,

    // Coroutine must be !Send.
    /// ```compile_fail
    /// fn send<T: Send>() {}
    /// send::<corolite::Coroutine>();
    /// ```
    _not_send: PhantomData<*mut ()>,
}

impl Coroutine {
    /// Creates a coroutine that will execute `f` on a default-sized stack.
    ///
    /// Equivalent to [`with_stack_size`](Self::with_stack_size) with a size
    /// hint of 0.
    pub fn new<F>(f: F) -> Result<Self, NewError>
    where
        F: FnOnce() + 'static,
    {
        Self::with_stack_size(0, f)
    }

    /// Creates a coroutine that will execute `f` on a stack of at least
    /// `stack_size` bytes.
    ///
    /// A `stack_size` of 0 selects the platform default
    /// ([`DEFAULT_STACK_SIZE`](crate::DEFAULT_STACK_SIZE)); sizes below
    /// [`MIN_STACK_SIZE`](crate::MIN_STACK_SIZE) are raised to it. No user
    /// code runs until the first [`resume`](Self::resume).
    pub fn with_stack_size<F>(stack_size: usize, f: F) -> Result<Self, NewError>
    where
        F: FnOnce() + 'static,
    {
        let stack = Stack::new(stack::resolve_size(stack_size)).map_err(NewError::Stack)?;

        let mut inner = Box::new(ControlBlock {
            status: Cell::new(Status::Suspended),
            entry: Some(Box::new(f)),
            stack,
            context: Context::new(),
        });

        let block = NonNull::from(&mut *inner);
        {
            let ControlBlock { context, stack, .. } = &mut *inner;
            context.bind(stack, block).map_err(NewError::Bind)?;
        }

        let coroutine = Coroutine {
            inner,
            _not_send: PhantomData,
        };
        trace!("created coroutine {:?}", coroutine.id());
        Ok(coroutine)
    }

    /// Starts or continues execution of this coroutine.
    ///
    /// Control transfers into the coroutine body and stays there until the
    /// body calls [`yield_now`] or returns; only then does `resume` return
    /// to its caller.
    ///
    /// Returns `false` without running anything if the coroutine is not
    /// [`Suspended`](Status::Suspended), or if the caller is itself a
    /// coroutine: nested resume would overwrite the thread's saved host
    /// state, so it is rejected rather than left undefined.
    pub fn resume(&mut self) -> bool {
        if self.inner.status.get() != Status::Suspended {
            return false;
        }
        if scheduler::current().is_some() {
            return false;
        }

        let block = NonNull::from(&mut *self.inner);
        unsafe {
            let cb = block.as_ptr();
            (*cb).status.set(Status::Running);
            scheduler::set_current(block);

            let ctx = ptr::addr_of_mut!((*cb).context);
            Context::switch_in(ctx, scheduler::primary_context());

            // Back on the host: the coroutine yielded or finished. The
            // yield path already moved the scheduler state; the completion
            // path leaves a stale `current` behind for us to clear.
            if (*cb).status.get() == Status::Dead {
                scheduler::clear_if_current(block);
                trace!("coroutine {:?} finished", CoroutineId::from_block(block));
            }
        }
        true
    }

    /// Current status of this coroutine.
    pub fn status(&self) -> Status {
        self.inner.status.get()
    }

    /// Identity token for this coroutine; matches what [`running`] reports
    /// inside its body.
    pub fn id(&self) -> CoroutineId {
        CoroutineId::from_block(NonNull::from(&*self.inner))
    }
}

impl fmt::Debug for Coroutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}

impl Drop for Coroutine {
    fn drop(&mut self) {
        // A Running coroutine cannot reach this drop: `resume` borrows the
        // handle for as long as the body executes.
        debug_assert_ne!(self.inner.status.get(), Status::Running);
        scheduler::clear_if_current(NonNull::from(&mut *self.inner));
        trace!("destroying coroutine {:?}", self.id());
        self.inner.context.release();
    }
}

/// Suspends the coroutine that is currently executing on this thread.
///
/// Control returns to the `resume` call that activated the coroutine, and
/// the next resume of the same coroutine continues right after this call.
///
/// Called from host code, outside any coroutine, this does nothing.
pub fn yield_now() {
    let Some(block) = scheduler::current() else {
        return;
    };
    unsafe {
        let cb = block.as_ptr();
        if (*cb).status.get() != Status::Running {
            return;
        }

        scheduler::clear_current();
        (*cb).status.set(Status::Suspended);

        let ctx = ptr::addr_of_mut!((*cb).context);
        Context::switch_out(ctx, scheduler::primary_context());
    }
}

/// The coroutine currently executing on the calling thread, or `None` when
/// called from host code.
pub fn running() -> Option<CoroutineId> {
    let block = scheduler::current()?;
    unsafe {
        if (*block.as_ptr()).status.get() == Status::Running {
            Some(CoroutineId::from_block(block))
        } else {
            None
        }
    }
}

/// Body of the fixed entry trampoline. Runs on the coroutine's own stack.
///
/// # Safety
///
/// Only the backend trampolines call this, exactly once per control block,
/// with the pointer that was passed to `Context::bind`.
pub(crate) unsafe fn enter(block: NonNull<ControlBlock>) -> ! {
    let cb = block.as_ptr();
    let entry = (*cb).entry.take().expect("coroutine entered twice");

    // Unwinding would run off this stack into the foreign switch frames
    // below it; a panicking body takes the process down instead.
    if panic::catch_unwind(AssertUnwindSafe(entry)).is_err() {
        log::error!(
            "coroutine {:?} panicked; aborting",
            CoroutineId::from_block(block)
        );
        process::abort();
    }

    (*cb).status.set(Status::Dead);

    let ctx = ptr::addr_of_mut!((*cb).context);
    Context::switch_out(ctx, scheduler::primary_context());
    unreachable!("a finished coroutine was switched into");
}
