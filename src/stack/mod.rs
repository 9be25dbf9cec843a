//! Stacks used by coroutines.
//!
//! Every coroutine exclusively owns one fixed-size stack for its whole
//! lifetime. On Unix targets the stack is a private `mmap` allocation with a
//! guard page below the usable region, so running off the end of the stack
//! faults instead of silently corrupting adjacent memory. On Windows the
//! fiber that backs the coroutine allocates and owns the real stack, and the
//! [`Stack`] type only records the reserve size handed to the OS.
//!
//! Stacks are never grown, shrunk or shared.

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        mod unix;
        pub(crate) use self::unix::Stack;

        /// Type used to represent a stack address.
        pub(crate) type StackAddr = core::num::NonZeroUsize;
    } else if #[cfg(windows)] {
        mod windows;
        pub(crate) use self::windows::Stack;
    } else {
        compile_error!("no stack implementation for this target");
    }
}

/// Smallest usable stack this crate will allocate.
///
/// Small enough for trivial bodies, large enough that the entry trampoline
/// and a shallow call into user code always fit.
pub const MIN_STACK_SIZE: usize = 16 * 1024;

cfg_if::cfg_if! {
    if #[cfg(windows)] {
        /// Stack size used when the caller does not ask for one.
        ///
        /// Matches the usual thread stack reserve on Windows.
        pub const DEFAULT_STACK_SIZE: usize = 1024 * 1024;
    } else {
        /// Stack size used when the caller does not ask for one.
        pub const DEFAULT_STACK_SIZE: usize = 256 * 1024;
    }
}

/// Resolves a caller-provided stack size hint to an actual size.
///
/// A hint of 0 selects [`DEFAULT_STACK_SIZE`]; anything smaller than
/// [`MIN_STACK_SIZE`] is bumped up to it. The platform stack implementation
/// additionally rounds to its allocation granularity.
pub(crate) fn resolve_size(hint: usize) -> usize {
    if hint == 0 {
        DEFAULT_STACK_SIZE
    } else {
        hint.max(MIN_STACK_SIZE)
    }
}
