//! AArch64 (AAPCS64) implementation of the register pivot.
//!
//! The saved state is the callee-saved register set: SP, the link register,
//! the frame pointer, X19-X28 and the low 64 bits of V8-V15 (D8-D15). The
//! NZCV flags and caller-saved registers are spilled by the compiler around
//! the call to [`switch_context`] like for any other function call.
//!
//! Unlike x86_64 there is no return address on the stack: `ret` jumps to the
//! link register, so a freshly bound frame simply points LR at the
//! trampoline and SP at the (16-byte aligned) stack base. The control-block
//! pointer rides in X19 and the entry function in X20 until the trampoline
//! moves them into place.

use core::arch::naked_asm;

pub(crate) const STACK_ALIGNMENT: usize = 16;

/// Callee-saved register frame for one suspended execution state.
#[repr(C)]
#[derive(Default)]
pub(crate) struct RegisterFrame {
    sp: u64,
    lr: u64,
    fp: u64,
    x19: u64,
    x20: u64,
    x21: u64,
    x22: u64,
    x23: u64,
    x24: u64,
    x25: u64,
    x26: u64,
    x27: u64,
    x28: u64,
    d8: u64,
    d9: u64,
    d10: u64,
    d11: u64,
    d12: u64,
    d13: u64,
    d14: u64,
    d15: u64,
}

impl RegisterFrame {
    /// Prepares a frame whose first activation enters `entry` with `payload`
    /// as its argument, running on the stack that ends at `stack_base`.
    ///
    /// # Safety
    ///
    /// `stack_base` must be the top of a writable, `STACK_ALIGNMENT`-aligned
    /// stack.
    pub(crate) unsafe fn bind(stack_base: usize, entry: usize, payload: usize) -> Self {
        debug_assert_eq!(stack_base % STACK_ALIGNMENT, 0);

        RegisterFrame {
            sp: stack_base as u64,
            lr: stack_init_trampoline as usize as u64,
            x19: payload as u64,
            x20: entry as u64,
            ..Default::default()
        }
    }
}

/// Bootstrap entry of every coroutine on this architecture.
///
/// Reached via the `ret` of the first [`switch_context`] into a bound frame.
#[unsafe(naked)]
extern "C" fn stack_init_trampoline() -> ! {
    naked_asm!(
        // Control-block pointer was parked in x19 by bind(). Zero the frame
        // pointer and link register so stack walks terminate here; the entry
        // function never returns.
        "mov x0, x19",
        "mov x29, xzr",
        "mov x30, xzr",
        "br x20",
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
        // Spill callee-saved registers into the outgoing frame (x0).
        "mov x9, sp",
        "str x9,  [x0, #0x00]",
        "str x30, [x0, #0x08]",
        "str x29, [x0, #0x10]",
        "stp x19, x20, [x0, #0x18]",
        "stp x21, x22, [x0, #0x28]",
        "stp x23, x24, [x0, #0x38]",
        "stp x25, x26, [x0, #0x48]",
        "stp x27, x28, [x0, #0x58]",
        "stp d8,  d9,  [x0, #0x68]",
        "stp d10, d11, [x0, #0x78]",
        "stp d12, d13, [x0, #0x88]",
        "stp d14, d15, [x0, #0x98]",
        // Reload them from the incoming frame (x1). The stack pointer moves
        // to the other stack here; everything after this line executes on it.
        "ldr x9,  [x1, #0x00]",
        "mov sp, x9",
        "ldr x30, [x1, #0x08]",
        "ldr x29, [x1, #0x10]",
        "ldp x19, x20, [x1, #0x18]",
        "ldp x21, x22, [x1, #0x28]",
        "ldp x23, x24, [x1, #0x38]",
        "ldp x25, x26, [x1, #0x48]",
        "ldp x27, x28, [x1, #0x58]",
        "ldp d8,  d9,  [x1, #0x68]",
        "ldp d10, d11, [x1, #0x78]",
        "ldp d12, d13, [x1, #0x88]",
        "ldp d14, d15, [x1, #0x98]",
        // Jumps either to the trampoline planted by bind() or back to the
        // switch_context call that suspended this frame.
        "ret",
    )
}
