//! x86_64 System V implementation of the register pivot.
//!
//! The saved state is the callee-saved register set: RSP, RBP, RBX and
//! R12-R15. Nothing else needs to survive a switch because a switch looks
//! like an ordinary function call to the compiler, and caller-saved
//! registers are already spilled around calls. The XMM registers are all
//! caller-saved under System V and are not touched here.
//!
//! A freshly bound stack looks like this:
//!
//! ```text
//! +-----------------+  <- stack base (16-byte aligned)
//! | 0 (frame chain  |
//! |    terminator)  |
//! +-----------------+
//! | stack_init_     |  <- initial RSP; popped by the `ret` of the first
//! |   trampoline    |     switch into this context
//! +-----------------+
//! ```
//!
//! The first switch into the context therefore "returns" into
//! `stack_init_trampoline` with RSP ≡ 8 (mod 16), exactly the alignment an
//! x86_64 function expects at its entry point. The trampoline finds the
//! control-block pointer in R15 and the real entry function in R12 (both
//! planted by [`RegisterFrame::bind`]), moves the payload into RDI and jumps.

use core::arch::naked_asm;
use core::ptr;

pub(crate) const STACK_ALIGNMENT: usize = 16;

/// Callee-saved register frame for one suspended execution state.
#[repr(C)]
#[derive(Default)]
pub(crate) struct RegisterFrame {
    rsp: u64,
    rbp: u64,
    rbx: u64,
    r12: u64,
    r13: u64,
    r14: u64,
    r15: u64,
}

impl RegisterFrame {
    /// Prepares a frame whose first activation enters `entry` with `payload`
    /// as its argument, running on the stack that ends at `stack_base`.
    ///
    /// # Safety
    ///
    /// `stack_base` must be the top of a writable, `STACK_ALIGNMENT`-aligned
    /// stack with room for at least two words below it.
    pub(crate) unsafe fn bind(stack_base: usize, entry: usize, payload: usize) -> Self {
        debug_assert_eq!(stack_base % STACK_ALIGNMENT, 0);

        // Zero word at the top so frame-pointer walks terminate cleanly.
        ptr::write((stack_base - 8) as *mut u64, 0);

        // The first switch pops this and lands in the trampoline.
        let initial_rsp = stack_base - 16;
        ptr::write(
            initial_rsp as *mut u64,
            stack_init_trampoline as usize as u64,
        );

        RegisterFrame {
            rsp: initial_rsp as u64,
            r12: entry as u64,
            r15: payload as u64,
            ..Default::default()
        }
    }
}

/// Bootstrap entry of every coroutine on this architecture.
///
/// Reached via the `ret` of the first [`switch_context`] into a bound frame.
/// RBP is already zero from the bound frame, so backtraces stop here.
#[unsafe(naked)]
extern "C" fn stack_init_trampoline() -> ! {
    naked_asm!(
        // Control-block pointer was parked in r15 by bind(); the entry
        // function never returns, so a plain jump keeps RSP ≡ 8 (mod 16)
        // as required at function entry.
        "mov rdi, r15",
        "jmp r12",
    )
}

/// Saves the current execution state into `_save` and resumes the state in
/// `_restore`. Returns only when something later switches back to `_save`.
///
/// # Safety
///
/// Both pointers must be valid, and `_restore` must hold a state produced
/// by [`RegisterFrame::bind`] or by an earlier save through this function.
#[unsafe(naked)]
pub(crate) unsafe extern "C" fn switch_context(
    _save: *mut RegisterFrame,
    _restore: *const RegisterFrame,
) {
    naked_asm!(
        // Spill callee-saved registers into the outgoing frame (rdi).
        "mov [rdi + 0x00], rsp",
        "mov [rdi + 0x08], rbp",
        "mov [rdi + 0x10], rbx",
        "mov [rdi + 0x18], r12",
        "mov [rdi + 0x20], r13",
        "mov [rdi + 0x28], r14",
        "mov [rdi + 0x30], r15",
        // Reload them from the incoming frame (rsi). The stack pointer moves
        // to the other stack here; everything after this line executes on it.
        "mov rsp, [rsi + 0x00]",
        "mov rbp, [rsi + 0x08]",
        "mov rbx, [rsi + 0x10]",
        "mov r12, [rsi + 0x18]",
        "mov r13, [rsi + 0x20]",
        "mov r14, [rsi + 0x28]",
        "mov r15, [rsi + 0x30]",
        // Pops either the trampoline address planted by bind() or the return
        // address of the switch_context call that suspended this frame.
        "ret",
    )
}
