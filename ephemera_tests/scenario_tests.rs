//! End to end scenarios driven through the public `ephemera` API.

use std::{cell::RefCell, rc::Rc};

use ephemera::{
    common::options::OptionsBuilder,
    runtime::gc::HeapPtr,
    Context, ContextBuilder, Exception, FinalizationRegistry, FinalizationRegistryObject,
    NativeFunction, ObjectRef, Value, WeakRef, WeakRefError, WeakRefObject,
};
use parking_lot::Mutex;

type Calls = Rc<RefCell<Vec<Value>>>;

fn new_context() -> Context {
    ContextBuilder::new().build()
}

fn recorder() -> (Calls, Value) {
    let calls: Calls = Rc::new(RefCell::new(vec![]));
    let recorded = calls.clone();
    let callback = NativeFunction::new(move |_, held_value| {
        recorded.borrow_mut().push(held_value);
        Ok(())
    });

    (calls, Value::from(callback))
}

fn new_registry(cx: &mut Context, callback: Value) -> HeapPtr<FinalizationRegistryObject> {
    let registry = FinalizationRegistry::create(cx, callback).unwrap();
    cx.root(registry);
    registry
}

fn weak_ref(cx: &mut Context, target: ObjectRef) -> HeapPtr<WeakRefObject> {
    let weak_ref = WeakRef::create(cx, Value::from(target)).unwrap();
    cx.root(weak_ref);
    weak_ref
}

/// Drop to a fresh turn, collect, then drain the job queue.
fn collect_and_dispatch(cx: &mut Context) -> usize {
    cx.advance_turn();
    cx.collect_garbage();
    cx.run_jobs()
}

#[test]
fn unreachable_target_observed_empty() {
    let mut cx = new_context();

    let x = cx.alloc_object(vec![]).unwrap();
    let x_root = cx.root(x);
    let r1 = weak_ref(&mut cx, x);
    cx.unroot(x_root);

    cx.advance_turn();
    cx.collect_garbage();

    assert_eq!(WeakRef::deref(&mut cx, r1), None);
}

#[test]
fn handles_to_one_target_cleared_in_same_cycle() {
    let mut cx = new_context();

    let x = cx.alloc_object(vec![]).unwrap();
    let x_root = cx.root(x);
    let r1 = weak_ref(&mut cx, x);
    let r2 = weak_ref(&mut cx, x);
    cx.unroot(x_root);

    cx.advance_turn();
    cx.collect_garbage();

    assert_eq!(cx.gc_stats().cycles, 1);
    assert_eq!(WeakRef::deref(&mut cx, r1), None);
    assert_eq!(WeakRef::deref(&mut cx, r2), None);
}

#[test]
fn target_as_its_own_token() {
    let mut cx = new_context();
    let (calls, callback) = recorder();
    let registry = new_registry(&mut cx, callback);

    let x = cx.alloc_object(vec![]).unwrap();
    let x_value = Value::from(x);
    FinalizationRegistry::register(
        &mut cx,
        registry,
        x_value.clone(),
        Value::from("held"),
        Some(x_value.clone()),
    )
    .unwrap();

    collect_and_dispatch(&mut cx);

    assert_eq!(*calls.borrow(), vec![Value::from("held")]);
    assert!(!FinalizationRegistry::unregister(&mut cx, registry, &x_value));
    assert_eq!(cx.finalization().num_registrations(), 0);
}

#[test]
fn unregister_before_dispatch_suppresses_callback() {
    let mut cx = new_context();
    let (calls, callback) = recorder();
    let registry = new_registry(&mut cx, callback);

    let token = cx.alloc_object(vec![]).unwrap();
    cx.root(token);

    let x = cx.alloc_object(vec![]).unwrap();
    FinalizationRegistry::register(
        &mut cx,
        registry,
        Value::from(x),
        Value::from("held"),
        Some(Value::from(token)),
    )
    .unwrap();

    cx.advance_turn();
    cx.collect_garbage();
    assert_eq!(FinalizationRegistry::pending_count(&cx, registry), 1);

    assert!(FinalizationRegistry::unregister(&mut cx, registry, &Value::from(token)));
    cx.run_jobs();

    assert!(calls.borrow().is_empty());
}

#[test]
fn deref_is_stable_within_a_turn() {
    let mut cx = new_context();

    let x = cx.alloc_object(vec![]).unwrap();
    let x_root = cx.root(x);
    let r1 = weak_ref(&mut cx, x);
    cx.unroot(x_root);

    // Each collection finishes inside the turn that observed the target
    cx.execute_turn(|cx| {
        assert_eq!(WeakRef::deref(cx, r1), Some(x));
        for _ in 0..3 {
            cx.collect_garbage();
            assert_eq!(WeakRef::deref(cx, r1), Some(x));
        }
    });

    cx.advance_turn();
    cx.collect_garbage();
    assert_eq!(WeakRef::deref(&mut cx, r1), None);
}

#[test]
fn handles_agree_across_incremental_steps() {
    let mut cx = new_context();

    let mut targets = vec![];
    let mut handles = vec![];
    for i in 0..32 {
        let target = cx.alloc_object(vec![]).unwrap();
        let root = cx.root(target);
        handles.push((weak_ref(&mut cx, target), weak_ref(&mut cx, target)));
        targets.push((target, root, i % 2 == 0));
    }

    for (_, root, keep) in &targets {
        if !keep {
            cx.unroot(*root);
        }
    }

    cx.advance_turn();
    cx.start_gc();
    while cx.gc_step() {
        for (first, second) in &handles {
            assert_eq!(first.target(), second.target());
        }
    }

    for ((target, _, keep), (first, second)) in targets.iter().zip(&handles) {
        let expected = if *keep { Some(*target) } else { None };
        assert_eq!(WeakRef::deref(&mut cx, *first), expected);
        assert_eq!(WeakRef::deref(&mut cx, *second), expected);
    }
}

#[test]
fn callback_runs_at_most_once() {
    let mut cx = new_context();
    let (calls, callback) = recorder();
    let registry = new_registry(&mut cx, callback);

    let x = cx.alloc_object(vec![]).unwrap();
    FinalizationRegistry::register(&mut cx, registry, Value::from(x), Value::from(1.0), None)
        .unwrap();

    for _ in 0..4 {
        collect_and_dispatch(&mut cx);
    }

    assert_eq!(*calls.borrow(), vec![Value::from(1.0)]);
    assert_eq!(FinalizationRegistry::pending_count(&cx, registry), 0);
    assert_eq!(FinalizationRegistry::active_count(&cx, registry), 0);
}

#[test]
fn unregister_is_idempotent() {
    let mut cx = new_context();
    let (calls, callback) = recorder();
    let registry = new_registry(&mut cx, callback);

    let token = cx.alloc_object(vec![]).unwrap();
    let token_value = Value::from(token);
    cx.root(token);

    let x = cx.alloc_object(vec![]).unwrap();
    cx.root(x);
    for held in ["a", "b"] {
        FinalizationRegistry::register(
            &mut cx,
            registry,
            Value::from(x),
            Value::from(held),
            Some(token_value.clone()),
        )
        .unwrap();
    }

    assert!(FinalizationRegistry::unregister(&mut cx, registry, &token_value));
    assert!(!FinalizationRegistry::unregister(&mut cx, registry, &token_value));
    assert_eq!(FinalizationRegistry::active_count(&cx, registry), 0);

    collect_and_dispatch(&mut cx);
    assert!(calls.borrow().is_empty());
}

#[test]
fn registration_in_other_registry_is_independent() {
    let mut cx = new_context();
    let (first_calls, first_callback) = recorder();
    let (second_calls, second_callback) = recorder();
    let first = new_registry(&mut cx, first_callback);
    let second = new_registry(&mut cx, second_callback);

    let token = cx.alloc_object(vec![]).unwrap();
    let token_value = Value::from(token);
    cx.root(token);

    let x = cx.alloc_object(vec![]).unwrap();
    for registry in [first, second] {
        FinalizationRegistry::register(
            &mut cx,
            registry,
            Value::from(x),
            Value::from("held"),
            Some(token_value.clone()),
        )
        .unwrap();
    }

    assert!(FinalizationRegistry::unregister(&mut cx, first, &token_value));
    collect_and_dispatch(&mut cx);

    assert!(first_calls.borrow().is_empty());
    assert_eq!(*second_calls.borrow(), vec![Value::from("held")]);
}

#[test]
fn cross_domain_target_is_never_finalized() {
    let mut cx = new_context();
    let (calls, callback) = recorder();
    let registry = new_registry(&mut cx, callback);

    let other = cx.create_domain();
    let x = cx.enter_domain(other, |cx| cx.alloc_object(vec![]).unwrap());
    let handle = weak_ref(&mut cx, x);
    FinalizationRegistry::register(&mut cx, registry, Value::from(x), Value::from("held"), None)
        .unwrap();

    collect_and_dispatch(&mut cx);

    assert_eq!(WeakRef::deref(&mut cx, handle), Some(x));
    assert!(calls.borrow().is_empty());
    assert_eq!(FinalizationRegistry::active_count(&cx, registry), 1);
}

#[test]
fn handle_created_inside_domain_holds_its_own_objects_weakly() {
    let mut cx = new_context();
    let other = cx.create_domain();

    let handle = cx.enter_domain(other, |cx| {
        let x = cx.alloc_object(vec![]).unwrap();
        let x_root = cx.root(x);
        let handle = weak_ref(cx, x);
        cx.unroot(x_root);
        handle
    });

    assert_eq!(handle.domain(), other);
    assert!(handle.target_edge().is_some_and(|edge| edge.is_weak()));

    cx.advance_turn();
    cx.collect_garbage();
    assert!(handle.is_cleared());
}

#[test]
fn shutdown_then_reuse() {
    let mut cx = new_context();
    let (calls, callback) = recorder();
    let registry = new_registry(&mut cx, callback);

    for i in 0..4 {
        let x = cx.alloc_object(vec![]).unwrap();
        FinalizationRegistry::register(&mut cx, registry, Value::from(x), Value::from(i as f64), None)
            .unwrap();
    }

    FinalizationRegistry::shutdown(&mut cx, registry);
    FinalizationRegistry::shutdown(&mut cx, registry);
    collect_and_dispatch(&mut cx);
    assert!(calls.borrow().is_empty());

    let x = cx.alloc_object(vec![]).unwrap();
    FinalizationRegistry::register(&mut cx, registry, Value::from(x), Value::from("again"), None)
        .unwrap();
    collect_and_dispatch(&mut cx);
    assert_eq!(*calls.borrow(), vec![Value::from("again")]);
}

#[test]
fn batched_dispatch_spreads_over_jobs() {
    let options = OptionsBuilder::new().cleanup_batch_size(Some(3)).build();
    let mut cx = ContextBuilder::new().set_options(Rc::new(options)).build();
    let (calls, callback) = recorder();
    let registry = new_registry(&mut cx, callback);

    for i in 0..7 {
        let x = cx.alloc_object(vec![]).unwrap();
        FinalizationRegistry::register(&mut cx, registry, Value::from(x), Value::from(i as f64), None)
            .unwrap();
    }

    let num_jobs = collect_and_dispatch(&mut cx);

    assert_eq!(num_jobs, 3);
    let expected = (0..7).map(|i| Value::from(i as f64)).collect::<Vec<_>>();
    assert_eq!(*calls.borrow(), expected);
}

#[test]
fn throwing_callback_does_not_block_others() {
    let mut cx = new_context();
    let (calls, recording) = recorder();
    let throwing = Value::from(NativeFunction::new(|_, held_value| {
        Err(Exception::new(format!("cannot clean up {}", held_value.to_console_string())))
    }));

    let throwing_registry = new_registry(&mut cx, throwing);
    let recording_registry = new_registry(&mut cx, recording);

    for registry in [throwing_registry, recording_registry] {
        for held in ["a", "b"] {
            let x = cx.alloc_object(vec![]).unwrap();
            FinalizationRegistry::register(&mut cx, registry, Value::from(x), Value::from(held), None)
                .unwrap();
        }
    }

    collect_and_dispatch(&mut cx);

    assert_eq!(*calls.borrow(), vec![Value::from("a"), Value::from("b")]);
    let exceptions = cx.take_uncaught_exceptions();
    assert_eq!(exceptions.len(), 2);
    assert_eq!(exceptions[0].to_string(), "Uncaught cannot clean up a");
}

#[test]
fn callbacks_print_to_dump_buffer() {
    let options = OptionsBuilder::new()
        .dump_buffer(Some(Mutex::new(String::new())))
        .build();
    let mut cx = ContextBuilder::new().set_options(Rc::new(options)).build();

    let callback = Value::from(NativeFunction::new(|cx, held_value| {
        cx.print(&format!("finalized {}", held_value.to_console_string()));
        Ok(())
    }));
    let registry = new_registry(&mut cx, callback);

    for held in ["first", "second"] {
        let x = cx.alloc_object(vec![]).unwrap();
        FinalizationRegistry::register(&mut cx, registry, Value::from(x), Value::from(held), None)
            .unwrap();
    }

    collect_and_dispatch(&mut cx);

    let dump = cx.options().dump_buffer().map(|buffer| buffer.clone());
    assert_eq!(dump.as_deref(), Some("finalized first\nfinalized second\n"));
}

#[test]
fn invalid_arguments_are_rejected() {
    let mut cx = new_context();
    let (_, callback) = recorder();

    assert!(matches!(
        WeakRef::create(&mut cx, Value::from(3.0)),
        Err(WeakRefError::InvalidTarget("number"))
    ));
    assert!(matches!(
        FinalizationRegistry::create(&mut cx, Value::Null),
        Err(WeakRefError::InvalidCallback("null"))
    ));

    let registry = new_registry(&mut cx, callback);
    let x = Value::from(cx.alloc_object(vec![]).unwrap());
    cx.root(x.clone());

    assert!(matches!(
        FinalizationRegistry::register(&mut cx, registry, x.clone(), x.clone(), None),
        Err(WeakRefError::HeldValueIsTarget)
    ));
    assert!(matches!(
        FinalizationRegistry::register(
            &mut cx,
            registry,
            x.clone(),
            Value::Undefined,
            Some(Value::from(true))
        ),
        Err(WeakRefError::InvalidToken("boolean"))
    ));
    assert_eq!(FinalizationRegistry::active_count(&cx, registry), 0);
}
