//! Property tests for `Variable` notification invariants.
//!
//! Invariants under test:
//!
//! 1. A listener fires exactly once per value-changing `set`; a `set` with
//!    a structurally equal value fires nothing.
//! 2. `version()` equals the number of value-changing sets.
//! 3. A dropped subscription never fires again.
//! 4. The value visible after a sequence of sets is the last one written.

use std::cell::RefCell;
use std::rc::Rc;

use proptest::prelude::*;
use weft_core::Value;
use weft_reactive::Variable;

fn scalar() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        (-1000i32..1000).prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::from),
    ]
}

/// Nested values a few levels deep. Functions are excluded: they have no
/// structural equality to exercise.
fn value() -> impl Strategy<Value = Value> {
    scalar().prop_recursive(3, 24, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::list),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..6)
                .prop_map(|entries| Value::map(entries)),
        ]
    })
}

proptest! {
    #[test]
    fn notifications_match_actual_changes(values in prop::collection::vec(value(), 1..24)) {
        let var = Variable::new(Value::Null);
        let fired = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&fired);
        let _sub = var.subscribe(move |v| sink.borrow_mut().push(v.clone()), false);

        let mut expected = Vec::new();
        let mut current = Value::Null;
        for v in &values {
            if *v != current {
                expected.push(v.clone());
                current = v.clone();
            }
            var.set(v.clone());
        }

        prop_assert_eq!(&*fired.borrow(), &expected, "one notification per real change");
        prop_assert_eq!(var.version(), expected.len() as u64);
        prop_assert_eq!(var.get(), current);
    }

    #[test]
    fn dropped_subscription_never_fires(values in prop::collection::vec(value(), 1..16)) {
        let var = Variable::new(Value::Null);
        let count = Rc::new(RefCell::new(0usize));
        let sink = Rc::clone(&count);
        let sub = var.subscribe(move |_| *sink.borrow_mut() += 1, false);
        drop(sub);

        for v in values {
            var.set(v);
        }
        prop_assert_eq!(*count.borrow(), 0, "listener fired after unsubscribe");
    }

    #[test]
    fn repeat_of_final_value_is_silent(v in value()) {
        let var = Variable::new(Value::Null);
        var.set(v.clone());
        let version = var.version();

        let fired = Rc::new(RefCell::new(0usize));
        let sink = Rc::clone(&fired);
        let _sub = var.subscribe(move |_| *sink.borrow_mut() += 1, false);
        var.set(v);

        prop_assert_eq!(*fired.borrow(), 0);
        prop_assert_eq!(var.version(), version);
    }
}
