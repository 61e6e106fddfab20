//! Integration Tests for Reactive System
//!
//! These tests verify that signals, computeds, and effects work together
//! correctly through the public API.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use ripple_core::{
    batch, node_count, set_error_handler, take_error_handler, Computed, Effect, Handle,
    ReactiveError, Signal,
};
use test_log::test;

fn counter() -> Rc<Cell<u32>> {
    Rc::new(Cell::new(0))
}

fn bump(count: &Cell<u32>) {
    count.set(count.get() + 1);
}

/// Effect that reads `node` and nothing else.
fn observe<T: Clone + 'static>(node: impl Into<Handle<T>>) -> Effect {
    let node = node.into();
    Effect::new(move || {
        node.get();
    })
}

/// Test that a computed joining two paths from one signal runs once per write.
#[test]
fn diamond_updates_once_per_write() {
    let a = Signal::new("a".to_string());
    let b = Computed::new({
        let a = a.clone();
        move || a.get()
    });
    let c = Computed::new({
        let a = a.clone();
        move || a.get()
    });

    let d_runs = counter();
    let d = Computed::new({
        let (b, c, d_runs) = (b.clone(), c.clone(), d_runs.clone());
        move || {
            bump(&d_runs);
            format!("{} {}", b.get(), c.get())
        }
    });
    let _effect = observe(d.clone());

    assert_eq!(d.peek(), "a a");
    assert_eq!(d_runs.get(), 1);

    a.set("aa".to_string()).unwrap();
    assert_eq!(d.peek(), "aa aa");
    assert_eq!(d_runs.get(), 2);

    a.set("aaa".to_string()).unwrap();
    assert_eq!(d_runs.get(), 3);
}

/// a -> b -> e, a -> c -> d -> e, e -> f, e -> g
#[test]
fn jagged_diamond_evaluates_in_dependency_order() {
    let order = Rc::new(RefCell::new(Vec::new()));
    let log = |name: &'static str| {
        let order = order.clone();
        move || order.borrow_mut().push(name)
    };

    let a = Signal::new(1);
    let b = Computed::new({
        let (a, log) = (a.clone(), log("b"));
        move || {
            log();
            a.get()
        }
    });
    let c = Computed::new({
        let (a, log) = (a.clone(), log("c"));
        move || {
            log();
            a.get()
        }
    });
    let d = Computed::new({
        let (c, log) = (c.clone(), log("d"));
        move || {
            log();
            c.get()
        }
    });
    let e = Computed::new({
        let (b, d, log) = (b.clone(), d.clone(), log("e"));
        move || {
            log();
            b.get() + d.get()
        }
    });
    let f = Computed::new({
        let (e, log) = (e.clone(), log("f"));
        move || {
            log();
            e.get()
        }
    });
    let g = Computed::new({
        let (e, log) = (e.clone(), log("g"));
        move || {
            log();
            e.get()
        }
    });
    let _effect_f = observe(f.clone());
    let _effect_g = observe(g.clone());

    order.borrow_mut().clear();
    a.set(2).unwrap();

    assert_eq!(*order.borrow(), vec!["b", "c", "d", "e", "f", "g"]);
    assert_eq!(f.peek(), 4);
    assert_eq!(g.peek(), 4);
}

/// Test that a computed stops listening to a branch it no longer reads.
#[test]
fn conditional_branch_is_unsubscribed() {
    let cond = Signal::new(true);
    let a = Signal::new(1);
    let b = Signal::new(2);

    let runs = counter();
    let c = Computed::new({
        let (cond, a, b, runs) = (cond.clone(), a.clone(), b.clone(), runs.clone());
        move || {
            bump(&runs);
            if cond.get() {
                a.get()
            } else {
                b.get()
            }
        }
    });
    let _effect = observe(c.clone());
    assert_eq!(runs.get(), 1);

    cond.set(false).unwrap();
    assert_eq!(c.peek(), 2);
    assert_eq!(runs.get(), 2);

    a.set(10).unwrap();
    a.set(11).unwrap();
    assert_eq!(runs.get(), 2);

    b.set(20).unwrap();
    assert_eq!(runs.get(), 3);
    assert_eq!(c.peek(), 20);
}

/// Test that a computed whose only consumer is disposed stops recomputing.
#[test]
fn disposal_deactivates_upstream_computeds() {
    let a = Signal::new(1);
    let runs = counter();
    let b = Computed::new({
        let (a, runs) = (a.clone(), runs.clone());
        move || {
            bump(&runs);
            a.get() * 2
        }
    });

    let effect = observe(b.clone());
    assert_eq!(runs.get(), 1);
    a.set(2).unwrap();
    assert_eq!(runs.get(), 2);

    effect.dispose();
    a.set(3).unwrap();
    a.set(4).unwrap();
    assert_eq!(runs.get(), 2);

    // Reading it again refreshes it once.
    assert_eq!(b.get(), 8);
    assert_eq!(runs.get(), 3);
}

/// Test that an inactive computed is refreshed when peeked.
#[test]
fn stale_computed_refreshes_on_peek() {
    let s = Signal::new(1);
    let s1 = Computed::new({
        let s = s.clone();
        move || s.get() + 1
    });

    let effect = observe(s1.clone());
    effect.dispose();

    s.set(2).unwrap();
    assert_eq!(s1.peek(), 3);
}

/// Test that a computed writing its own dependency is rejected as a cycle.
#[test]
fn self_write_is_a_cycle() {
    let source = Signal::new(0);
    let inner_result = Rc::new(RefCell::new(None));

    let looping = Computed::new({
        let (source, inner_result) = (source.clone(), inner_result.clone());
        move || {
            let value = source.get();
            if value == 1 {
                *inner_result.borrow_mut() = Some(source.set(value + 1));
            }
            value
        }
    });
    let _effect = observe(looping.clone());

    let outer = source.set(1);

    let cycle = ReactiveError::CycleDetected { node: looping.id() };
    assert_eq!(*inner_result.borrow(), Some(Err(cycle.clone())));
    assert_eq!(outer, Err(cycle));

    // The graph is usable after the aborted wave.
    assert_eq!(source.peek(), 2);
    source.set(5).unwrap();
    assert_eq!(looping.get(), 5);
}

/// Test that a dependency returning an equal value does not hide a sibling's
/// change, and stops propagation when it is the only input that was hit.
#[test]
fn unchanged_values_short_circuit() {
    let a = Signal::new(1);
    let b = Computed::new({
        let a = a.clone();
        move || a.get()
    });
    let c_runs = counter();
    let c = Computed::new({
        let (a, c_runs) = (a.clone(), c_runs.clone());
        move || {
            bump(&c_runs);
            a.get();
            "c".to_string()
        }
    });
    let d_runs = counter();
    let d = Computed::new({
        let (b, c, d_runs) = (b.clone(), c.clone(), d_runs.clone());
        move || {
            bump(&d_runs);
            format!("{}{}", b.get(), c.get())
        }
    });
    let _effect = observe(d.clone());
    assert_eq!(d.peek(), "1c");

    a.set(2).unwrap();
    assert_eq!(c_runs.get(), 2);
    assert_eq!(d_runs.get(), 2);
    assert_eq!(d.peek(), "2c");
}

#[test]
fn equal_values_stop_propagation() {
    let a = Signal::new(0);
    let parity = Computed::new({
        let a = a.clone();
        move || a.get() % 2
    });
    let runs = counter();
    let label = Computed::new({
        let (parity, runs) = (parity.clone(), runs.clone());
        move || {
            bump(&runs);
            if parity.get() == 0 {
                "even"
            } else {
                "odd"
            }
        }
    });
    let _effect = observe(label.clone());

    a.set(2).unwrap();
    a.set(4).unwrap();
    assert_eq!(runs.get(), 1);

    a.set(5).unwrap();
    assert_eq!(runs.get(), 2);
    assert_eq!(label.peek(), "odd");
}

/// Test that a computed pulled early in a wave can start reading another
/// computed that is still waiting in the same wave.
#[test]
fn pulled_computed_can_start_reading_a_pending_node() {
    let s = Signal::new(0);
    let (a_runs, t_runs, r_runs, p_runs) = (counter(), counter(), counter(), counter());
    let a = Computed::new({
        let (s, a_runs) = (s.clone(), a_runs.clone());
        move || {
            bump(&a_runs);
            s.get() + 1
        }
    });
    let t = Computed::new({
        let (s, t_runs) = (s.clone(), t_runs.clone());
        move || {
            bump(&t_runs);
            s.get() * 10
        }
    });
    let r = Computed::new({
        let (s, a, t, r_runs) = (s.clone(), a.clone(), t.clone(), r_runs.clone());
        move || {
            bump(&r_runs);
            if s.get() > 0 {
                t.get() + a.get()
            } else {
                a.get()
            }
        }
    });
    // Reads r only once s is positive, so it pulls r before r's turn.
    let p = Computed::new({
        let (s, r, p_runs) = (s.clone(), r.clone(), p_runs.clone());
        move || {
            bump(&p_runs);
            if s.get() > 0 {
                r.get()
            } else {
                -1
            }
        }
    });
    let p_effect = observe(p.clone());
    let r_effect = observe(r.clone());
    let _t_effect = observe(t.clone());

    s.set(1).unwrap();
    assert_eq!(p.peek(), 12);
    assert_eq!(r.peek(), 12);
    assert_eq!(
        [a_runs.get(), t_runs.get(), r_runs.get(), p_runs.get()],
        [2, 2, 2, 2]
    );
    assert_eq!(p_effect.run_count(), 2);
    assert_eq!(r_effect.run_count(), 2);

    s.set(2).unwrap();
    assert_eq!(p.peek(), 23);
    assert_eq!(
        [a_runs.get(), t_runs.get(), r_runs.get(), p_runs.get()],
        [3, 3, 3, 3]
    );

    s.set(0).unwrap();
    assert_eq!(p.peek(), -1);
    assert_eq!(r.peek(), 1);
}

/// Test that a computed pulled early in a wave can drop a dependency that is
/// still waiting in the same wave.
#[test]
fn pulled_computed_can_stop_reading_a_pending_node() {
    let s = Signal::new(0);
    let (a_runs, r_runs) = (counter(), counter());
    let a = Computed::new({
        let (s, a_runs) = (s.clone(), a_runs.clone());
        move || {
            bump(&a_runs);
            s.get() + 1
        }
    });
    let t = Computed::new({
        let s = s.clone();
        move || s.get() * 10
    });
    let r = Computed::new({
        let (s, a, t, r_runs) = (s.clone(), a.clone(), t.clone(), r_runs.clone());
        move || {
            bump(&r_runs);
            if s.get() > 0 {
                t.get()
            } else {
                a.get()
            }
        }
    });
    let p = Computed::new({
        let (s, r) = (s.clone(), r.clone());
        move || if s.get() > 0 { r.get() } else { -1 }
    });
    let _p_effect = observe(p.clone());
    let r_effect = observe(r.clone());
    let _t_effect = observe(t.clone());

    s.set(1).unwrap();
    assert_eq!(p.peek(), 10);
    assert_eq!(r.peek(), 10);
    assert_eq!(r_runs.get(), 2);
    assert_eq!(r_effect.run_count(), 2);
    // Nothing reads a any more, so it was left alone.
    assert_eq!(a_runs.get(), 1);

    s.set(2).unwrap();
    assert_eq!(p.peek(), 20);
    assert_eq!(r_runs.get(), 3);
    assert_eq!(a_runs.get(), 1);
    assert_eq!(a.peek(), 3);
}

/// Test that a computed read twice while it is still pending runs once.
#[test]
fn pending_computed_read_twice_runs_once() {
    let s = Signal::new(1);
    let (c0_runs, c2_runs, c3_runs) = (counter(), counter(), counter());
    let c0 = Computed::new({
        let (s, c0_runs) = (s.clone(), c0_runs.clone());
        move || {
            bump(&c0_runs);
            s.get() * 10
        }
    });
    let c2 = Computed::new({
        let (c0, c2_runs) = (c0.clone(), c2_runs.clone());
        move || {
            bump(&c2_runs);
            c0.get() + 1
        }
    });
    let c3 = Computed::new({
        let (c0, c2, c3_runs) = (c0.clone(), c2.clone(), c3_runs.clone());
        move || {
            bump(&c3_runs);
            c0.get() + c2.get()
        }
    });
    let effect = observe(c3.clone());

    batch(|| {
        s.set(2).unwrap();
        assert_eq!(c3.get(), 41);
        assert_eq!(c3.get(), 41);
        assert_eq!(c2.get(), 21);
    })
    .unwrap();

    assert_eq!([c0_runs.get(), c2_runs.get(), c3_runs.get()], [2, 2, 2]);
    assert_eq!(effect.run_count(), 2);

    // A later write in the same batch makes the pulled values stale again.
    batch(|| {
        s.set(3).unwrap();
        assert_eq!(c3.get(), 61);
        s.set(4).unwrap();
        assert_eq!(c3.get(), 81);
    })
    .unwrap();
    assert_eq!(c3_runs.get(), 4);
    assert_eq!(effect.run_count(), 3);
}

/// Test that a write made by a computed reaches a reader of both signals
/// before that reader's turn, so the reader sees both values in one run.
#[test]
fn write_inside_a_computed_is_seen_with_its_cause() {
    let s = Signal::new(1);
    let t = Signal::new(10);
    let writer = Computed::new({
        let (s, t) = (s.clone(), t.clone());
        move || {
            let value = s.get();
            t.set(value * 10).unwrap();
            value
        }
    });
    let runs = counter();
    let reader = Computed::new({
        let (s, t, runs) = (s.clone(), t.clone(), runs.clone());
        move || {
            bump(&runs);
            s.get() + t.get()
        }
    });
    let _writer_effect = observe(writer.clone());
    let reader_effect = observe(reader.clone());
    assert_eq!(reader.peek(), 11);

    assert_eq!(s.set(2), Ok(()));

    assert_eq!(t.peek(), 20);
    assert_eq!(reader.peek(), 22);
    assert_eq!(runs.get(), 2);
    assert_eq!(reader_effect.run_count(), 2);
}

/// Test that a write made later in a wave reaches a node that already
/// settled in that wave.
#[test]
fn write_inside_a_computed_reaches_a_settled_node() {
    let s = Signal::new(1);
    let t = Signal::new(10);
    let runs = counter();
    let reader = Computed::new({
        let (s, t, runs) = (s.clone(), t.clone(), runs.clone());
        move || {
            bump(&runs);
            s.get() + t.get()
        }
    });
    let writer = Computed::new({
        let (s, t) = (s.clone(), t.clone());
        move || {
            let value = s.get();
            t.set(value * 10).unwrap();
            value
        }
    });
    // The reader subscribes to s first, so it settles before the writer runs.
    let reader_effect = observe(reader.clone());
    let _writer_effect = observe(writer.clone());
    assert_eq!(reader.peek(), 11);
    assert_eq!(runs.get(), 1);

    assert_eq!(s.set(2), Ok(()));

    assert_eq!(reader.peek(), 22);
    assert_eq!(runs.get(), 3);
    assert_eq!(reader_effect.run_count(), 3);
}

#[test]
fn computeds_nest() {
    let base = Signal::new(2);
    let squared = Computed::new({
        let base = base.clone();
        move || base.get() * base.get()
    });
    let plus_one = Computed::new({
        let squared = squared.clone();
        move || squared.get() + 1
    });
    let doubled = Computed::new({
        let plus_one = plus_one.clone();
        move || plus_one.get() * 2
    });

    assert_eq!(doubled.get(), 10);
    base.set(3).unwrap();
    assert_eq!(doubled.get(), 20);
}

#[test]
fn batch_recomputes_each_node_once() {
    let first = Signal::new(1);
    let second = Signal::new(2);
    let runs = counter();
    let sum = Computed::new({
        let (first, second, runs) = (first.clone(), second.clone(), runs.clone());
        move || {
            bump(&runs);
            first.get() + second.get()
        }
    });
    let _effect = observe(sum.clone());

    let returned = batch(|| {
        first.set(10).unwrap();
        second.set(20).unwrap();
        "done"
    });

    assert_eq!(returned, Ok("done"));
    assert_eq!(runs.get(), 2);
    assert_eq!(sum.peek(), 30);
}

#[test]
fn writes_through_a_computed_handle_are_rejected() {
    let source = Signal::new(1);
    let doubled = Computed::new({
        let source = source.clone();
        move || source.get() * 2
    });

    let handles: Vec<Handle<i32>> = vec![source.clone().into(), doubled.clone().into()];
    assert_eq!(handles[0].set(3), Ok(()));
    assert_eq!(
        handles[1].set(3),
        Err(ReactiveError::ReadonlyWrite { node: doubled.id() })
    );
    assert_eq!(handles[1].get(), 6);
}

#[test]
fn compute_errors_are_contained_and_reported() {
    let errors = Rc::new(RefCell::new(Vec::new()));
    set_error_handler({
        let errors = errors.clone();
        move |err: &ReactiveError| errors.borrow_mut().push(err.clone())
    });

    let input = Signal::new(4);
    let checked = Computed::try_new({
        let input = input.clone();
        move || {
            let value = input.get();
            if value < 0 {
                Err(format!("negative input {value}"))
            } else {
                Ok(value)
            }
        }
    });
    let independent = Computed::new({
        let input = input.clone();
        move || input.get() * 10
    });
    let _checked_effect = observe(checked.clone());
    let _independent_effect = observe(independent.clone());

    input.set(-1).unwrap();

    // Last good value is kept; the independent branch still updates.
    assert_eq!(checked.peek(), 4);
    assert_eq!(independent.peek(), -10);
    assert_eq!(
        *errors.borrow(),
        vec![ReactiveError::Compute {
            node: checked.id(),
            message: "negative input -1".to_string(),
        }]
    );

    input.set(7).unwrap();
    assert_eq!(checked.peek(), 7);
    assert_eq!(errors.borrow().len(), 1);

    assert!(take_error_handler().is_some());
    assert!(take_error_handler().is_none());
}

#[test]
fn subscribe_follows_signal_changes() {
    let name = Signal::new("ripple");
    let seen = Rc::new(RefCell::new(Vec::new()));

    let subscription = name.subscribe({
        let seen = seen.clone();
        move |value| seen.borrow_mut().push(value)
    });
    name.set("wave").unwrap();
    subscription.dispose();
    name.set("still").unwrap();

    assert_eq!(*seen.borrow(), vec!["ripple", "wave"]);
}

#[test]
fn dropped_handles_free_their_nodes() {
    let before = node_count();
    {
        let source = Signal::new(1);
        let derived = Computed::new({
            let source = source.clone();
            move || source.get() + 1
        });
        let effect = observe(derived.clone());
        assert_eq!(node_count(), before + 3);

        effect.dispose();
    }
    assert_eq!(node_count(), before);
}
