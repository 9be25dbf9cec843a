use std::io::{Error, Result};
use std::ptr;

use super::StackAddr;

fn page_size() -> usize {
    let pagesize = unsafe { libc::sysconf(libc::_SC_PAGESIZE) } as usize;
    debug_assert!(pagesize.is_power_of_two());
    pagesize
}

/// An `mmap`-backed coroutine stack with a single guard page at the low end.
///
/// The layout, from low to high addresses:
///
/// ```text
/// +------------+  <- mmap base
/// | Guard page |  [PROT_NONE]
/// +------------+  <- limit()
/// |            |
/// ~   Usable   ~  [PROT_READ | PROT_WRITE]
/// |            |
/// +------------+  <- base()
/// ```
pub(crate) struct Stack {
    base: StackAddr,
    mmap_len: usize,
}

impl Stack {
    /// Allocates a stack with at least `size` usable bytes.
    pub(crate) fn new(size: usize) -> Result<Self> {
        // Round the usable region up to a page boundary, then add the guard
        // page below it.
        let page_size = page_size();
        let size = size
            .checked_add(page_size - 1)
            .expect("integer overflow while calculating stack size")
            & !(page_size - 1);
        let mmap_len = size + page_size;

        // OpenBSD requires MAP_STACK on anything that is used as a stack.
        cfg_if::cfg_if! {
            if #[cfg(target_os = "openbsd")] {
                let map_flags = libc::MAP_ANONYMOUS | libc::MAP_PRIVATE | libc::MAP_STACK;
            } else {
                let map_flags = libc::MAP_ANONYMOUS | libc::MAP_PRIVATE;
            }
        }

        unsafe {
            // Reserve address space for the guard page and the stack proper.
            let mmap = libc::mmap(ptr::null_mut(), mmap_len, libc::PROT_NONE, map_flags, -1, 0);
            if mmap == libc::MAP_FAILED {
                return Err(Error::last_os_error());
            }

            // Construct the result before the mprotect call so the mapping is
            // unmapped on the error path.
            let out = Self {
                base: StackAddr::new(mmap as usize + mmap_len).unwrap(),
                mmap_len,
            };

            // Make everything except the guard page writable.
            if libc::mprotect(
                mmap.cast::<u8>().add(page_size).cast(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
            ) != 0
            {
                return Err(Error::last_os_error());
            }

            Ok(out)
        }
    }

    /// Highest address of the stack. Stacks grow downwards, so this is where
    /// execution starts. Page-aligned, which satisfies every ABI's stack
    /// alignment requirement.
    #[inline]
    pub(crate) fn base(&self) -> StackAddr {
        self.base
    }

    /// Lowest usable address, just above the guard page.
    #[inline]
    pub(crate) fn limit(&self) -> StackAddr {
        StackAddr::new(self.base.get() - self.mmap_len + page_size()).unwrap()
    }

    /// Number of usable bytes between [`Self::limit`] and [`Self::base`].
    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.base.get() - self.limit().get()
    }
}

impl Drop for Stack {
    fn drop(&mut self) {
        unsafe {
            let mmap = self.base.get() - self.mmap_len;
            let ret = libc::munmap(mmap as _, self.mmap_len);
            debug_assert_eq!(ret, 0);
        }
    }
}
