use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::thread;

use crate::{running, yield_now, Coroutine, Status};

#[test]
fn smoke() {
    let hit = Rc::new(Cell::new(false));
    let hit2 = hit.clone();
    let mut coroutine = Coroutine::new(move || {
        hit2.set(true);
    })
    .unwrap();
    assert!(!hit.get());
    assert_eq!(coroutine.status(), Status::Suspended);
    assert!(coroutine.resume());
    assert!(hit.get());
    assert_eq!(coroutine.status(), Status::Dead);
}

#[test]
fn round_trip() {
    let entered = Rc::new(Cell::new(0));
    let entered2 = entered.clone();
    let mut coroutine = Coroutine::new(move || {
        entered2.set(entered2.get() + 1);
        for _ in 0..3 {
            yield_now();
        }
    })
    .unwrap();

    // A body that yields 3 times needs exactly 4 resumes to finish.
    for _ in 0..3 {
        assert!(coroutine.resume());
        assert_eq!(coroutine.status(), Status::Suspended);
    }
    assert!(coroutine.resume());
    assert_eq!(coroutine.status(), Status::Dead);

    assert!(!coroutine.resume());
    assert!(!coroutine.resume());
    assert_eq!(entered.get(), 1);
}

#[test]
fn running_identity() {
    let seen = Rc::new(Cell::new(None));
    let seen2 = seen.clone();

    assert!(running().is_none());

    let mut coroutine = Coroutine::new(move || {
        seen2.set(running());
        yield_now();
        seen2.set(running());
    })
    .unwrap();
    let id = coroutine.id();

    assert!(coroutine.resume());
    assert_eq!(seen.get(), Some(id));
    assert!(running().is_none());

    seen.set(None);
    assert!(coroutine.resume());
    assert_eq!(seen.get(), Some(id));

    assert_eq!(coroutine.status(), Status::Dead);
    assert!(running().is_none());
}

#[test]
fn ids_are_distinct() {
    let a = Coroutine::new(|| {}).unwrap();
    let b = Coroutine::new(|| {}).unwrap();
    assert_ne!(a.id(), b.id());
    assert_eq!(a.id(), a.id());
}

#[test]
fn resume_on_dead_does_not_reenter() {
    let entered = Rc::new(Cell::new(0));
    let entered2 = entered.clone();
    let mut coroutine = Coroutine::new(move || {
        entered2.set(entered2.get() + 1);
    })
    .unwrap();

    assert!(coroutine.resume());
    assert!(!coroutine.resume());
    assert!(!coroutine.resume());
    assert_eq!(entered.get(), 1);
}

#[test]
fn round_robin_isolation() {
    fn counting(counter: Rc<Cell<u32>>) -> impl FnOnce() {
        move || {
            for _ in 0..5 {
                counter.set(counter.get() + 1);
                yield_now();
            }
        }
    }

    let first = Rc::new(Cell::new(0));
    let second = Rc::new(Cell::new(0));
    let mut a = Coroutine::new(counting(first.clone())).unwrap();
    let mut b = Coroutine::new(counting(second.clone())).unwrap();

    loop {
        let more_a = a.resume();
        let more_b = b.resume();
        if !more_a && !more_b {
            break;
        }
    }

    assert_eq!(first.get(), 5);
    assert_eq!(second.get(), 5);
    assert_eq!(a.status(), Status::Dead);
    assert_eq!(b.status(), Status::Dead);
}

#[test]
fn yield_outside_coroutine_is_inert() {
    assert!(running().is_none());
    yield_now();
    assert!(running().is_none());
}

#[test]
fn yields_partition_the_body() {
    let output = Rc::new(RefCell::new(Vec::new()));
    let output2 = output.clone();
    let mut coroutine = Coroutine::new(move || {
        output2.borrow_mut().push("A");
        yield_now();
        output2.borrow_mut().push("B");
        yield_now();
        output2.borrow_mut().push("C");
    })
    .unwrap();

    assert!(coroutine.resume());
    assert_eq!(*output.borrow(), ["A"]);
    assert!(coroutine.resume());
    assert_eq!(*output.borrow(), ["A", "B"]);
    assert!(coroutine.resume());
    assert_eq!(*output.borrow(), ["A", "B", "C"]);
    assert!(!coroutine.resume());
}

#[test]
fn nested_resume_is_rejected() {
    let observed = Rc::new(Cell::new(None));
    let observed2 = observed.clone();

    let inner = Coroutine::new(|| {}).unwrap();
    let mut outer = Coroutine::new(move || {
        let mut inner = inner;
        observed2.set(Some(inner.resume()));
        // The rejected resume must not have disturbed this coroutine.
        yield_now();
    })
    .unwrap();

    assert!(outer.resume());
    assert_eq!(observed.get(), Some(false));
    assert_eq!(outer.status(), Status::Suspended);
    assert!(outer.resume());
    assert_eq!(outer.status(), Status::Dead);
}

#[test]
fn drop_while_suspended() {
    let hit_second_half = Rc::new(Cell::new(false));
    let hit2 = hit_second_half.clone();
    let mut coroutine = Coroutine::new(move || {
        yield_now();
        hit2.set(true);
    })
    .unwrap();

    assert!(coroutine.resume());
    drop(coroutine);

    assert!(!hit_second_half.get());
    assert!(running().is_none());
}

#[test]
fn drop_while_suspended_discards_stack_values() {
    let payload = Rc::new(());
    let payload2 = payload.clone();
    let mut coroutine = Coroutine::new(move || {
        let _keep = payload2;
        yield_now();
    })
    .unwrap();

    assert!(coroutine.resume());
    drop(coroutine);

    // The clone lives in a stack frame that was abandoned, not unwound.
    assert_eq!(Rc::strong_count(&payload), 2);
}

#[test]
fn unstarted_entry_is_dropped() {
    let payload = Rc::new(());
    let payload2 = payload.clone();
    let coroutine = Coroutine::new(move || {
        drop(payload2);
    })
    .unwrap();

    assert_eq!(Rc::strong_count(&payload), 2);
    drop(coroutine);
    assert_eq!(Rc::strong_count(&payload), 1);
}

#[test]
fn many_sequential_coroutines() {
    let total = Rc::new(Cell::new(0));
    for _ in 0..50 {
        let total2 = total.clone();
        let mut coroutine = Coroutine::new(move || {
            total2.set(total2.get() + 1);
            yield_now();
            total2.set(total2.get() + 1);
        })
        .unwrap();
        while coroutine.resume() {}
    }
    assert_eq!(total.get(), 100);
}

#[test]
fn independent_threads() {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            thread::spawn(|| {
                let counter = Rc::new(Cell::new(0));
                let counter2 = counter.clone();
                let mut coroutine = Coroutine::new(move || {
                    for _ in 0..10 {
                        counter2.set(counter2.get() + 1);
                        yield_now();
                    }
                })
                .unwrap();
                while coroutine.resume() {}
                assert_eq!(counter.get(), 10);
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn recursion_within_default_stack() {
    fn recurse(depth: usize) -> usize {
        let frame = std::hint::black_box([0u8; 64]);
        if depth == 0 {
            yield_now();
            frame.len()
        } else {
            frame.len() + recurse(depth - 1)
        }
    }

    let mut coroutine = Coroutine::new(|| {
        assert_eq!(recurse(400), 64 * 401);
    })
    .unwrap();

    // First resume suspends deep in the call tree; the second unwinds it.
    assert!(coroutine.resume());
    assert_eq!(coroutine.status(), Status::Suspended);
    assert!(coroutine.resume());
    assert_eq!(coroutine.status(), Status::Dead);
}

#[test]
fn custom_stack_size() {
    let hit = Rc::new(Cell::new(false));
    let hit2 = hit.clone();
    let mut coroutine = Coroutine::with_stack_size(64 * 1024, move || {
        hit2.set(true);
        yield_now();
    })
    .unwrap();
    while coroutine.resume() {}
    assert!(hit.get());

    // Far below the minimum; the size is raised, not rejected.
    let mut tiny = Coroutine::with_stack_size(1, || {}).unwrap();
    assert!(tiny.resume());
    assert_eq!(tiny.status(), Status::Dead);
}

#[test]
fn debug_output_names_status() {
    let coroutine = Coroutine::new(|| {}).unwrap();
    let rendered = format!("{:?}", coroutine);
    assert!(rendered.contains("Suspended"));
}
