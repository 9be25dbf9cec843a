use crate::stack::{resolve_size, DEFAULT_STACK_SIZE, MIN_STACK_SIZE};

#[test]
fn size_resolution() {
    assert_eq!(resolve_size(0), DEFAULT_STACK_SIZE);
    assert_eq!(resolve_size(1), MIN_STACK_SIZE);
    assert_eq!(resolve_size(MIN_STACK_SIZE), MIN_STACK_SIZE);
    assert_eq!(resolve_size(MIN_STACK_SIZE + 1), MIN_STACK_SIZE + 1);
    assert_eq!(resolve_size(4 * 1024 * 1024), 4 * 1024 * 1024);
}

#[cfg(unix)]
mod unix {
    use crate::stack::{resolve_size, Stack, MIN_STACK_SIZE};

    #[test]
    fn allocates_at_least_the_requested_size() {
        let stack = Stack::new(resolve_size(1)).unwrap();
        assert!(stack.len() >= MIN_STACK_SIZE);
        assert_eq!(stack.base().get() - stack.limit().get(), stack.len());
    }

    #[test]
    fn base_is_aligned_for_a_stack() {
        let stack = Stack::new(MIN_STACK_SIZE).unwrap();
        assert_eq!(stack.base().get() % 16, 0);
    }

    #[test]
    fn usable_region_reads_and_writes() {
        let stack = Stack::new(MIN_STACK_SIZE).unwrap();
        unsafe {
            let top = stack.base().get() as *mut u8;
            top.sub(1).write(0xAA);
            assert_eq!(top.sub(1).read(), 0xAA);

            // Lowest usable byte sits directly above the guard page.
            let bottom = stack.limit().get() as *mut u8;
            bottom.write(0xBB);
            assert_eq!(bottom.read(), 0xBB);
        }
    }

    #[test]
    fn odd_sizes_round_up_to_pages() {
        let stack = Stack::new(MIN_STACK_SIZE + 1).unwrap();
        assert!(stack.len() > MIN_STACK_SIZE);
        assert_eq!(stack.len() % 4096, 0);
    }
}
