//! Property-based tests for the queue operations
//!
//! Every property drives the queue with arbitrary operation sequences and
//! compares it against a `VecDeque` model.

use std::collections::VecDeque;

use proptest::prelude::*;
use strqueue::{Harness, Queue};

#[derive(Clone, Debug)]
enum Op {
    InsertHead(Vec<u8>),
    InsertTail(Vec<u8>),
    RemoveHead,
    Reverse,
    Sort,
}

fn arb_value() -> impl Strategy<Value = Vec<u8>> {
    // a small alphabet makes duplicates, and therefore stability, likely
    prop::collection::vec(prop::sample::select(vec![b'a', b'b', b'c', b'Z']), 0..4)
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => arb_value().prop_map(Op::InsertHead),
        3 => arb_value().prop_map(Op::InsertTail),
        2 => Just(Op::RemoveHead),
        1 => Just(Op::Reverse),
        1 => Just(Op::Sort),
    ]
}

fn to_vec<A: strqueue::Allocator>(q: &Queue<A>) -> Vec<Vec<u8>> {
    q.iter().map(<[u8]>::to_vec).collect()
}

proptest! {
    #[test]
    fn matches_model(ops in prop::collection::vec(arb_op(), 0..64)) {
        let harness = Harness::new();
        let mut q = Queue::with_allocator(&harness).unwrap();
        let mut model: VecDeque<Vec<u8>> = VecDeque::new();
        let mut inserted = 0usize;
        let mut removed = 0usize;

        for op in ops {
            match op {
                Op::InsertHead(v) => {
                    q.insert_head(&v).unwrap();
                    model.push_front(v);
                    inserted += 1;
                }
                Op::InsertTail(v) => {
                    q.insert_tail(&v).unwrap();
                    model.push_back(v);
                    inserted += 1;
                }
                Op::RemoveHead => {
                    let mut buffer = [0u8; 8];
                    match model.pop_front() {
                        Some(expected) => {
                            let copied = q.remove_head(Some(&mut buffer)).unwrap();
                            prop_assert_eq!(&buffer[..copied], &expected[..]);
                            removed += 1;
                        }
                        None => prop_assert!(q.remove_head(Some(&mut buffer)).is_err()),
                    }
                }
                Op::Reverse => {
                    q.reverse();
                    model.make_contiguous().reverse();
                }
                Op::Sort => {
                    q.sort();
                    model.make_contiguous().sort();
                }
            }
            prop_assert!(q.check_invariants().is_ok());
            prop_assert_eq!(q.size(), inserted - removed);
            prop_assert_eq!(to_vec(&q), model.iter().cloned().collect::<Vec<_>>());
        }

        drop(q);
        prop_assert!(harness.check_leaks().is_ok());
    }

    #[test]
    fn reverse_is_an_involution(values in prop::collection::vec(arb_value(), 0..32)) {
        let mut q = Queue::new();
        for v in &values {
            q.insert_tail(v).unwrap();
        }
        q.reverse();
        q.reverse();
        prop_assert_eq!(to_vec(&q), values);
        prop_assert!(q.check_invariants().is_ok());
    }

    #[test]
    fn sort_is_ordered_permutation_and_idempotent(values in prop::collection::vec(arb_value(), 0..48)) {
        let mut q = Queue::new();
        for v in &values {
            q.insert_tail(v).unwrap();
        }
        q.sort();
        let sorted = to_vec(&q);
        prop_assert!(sorted.windows(2).all(|w| w[0] <= w[1]));

        let mut expected = values.clone();
        expected.sort();
        prop_assert_eq!(&sorted, &expected);

        q.sort();
        prop_assert_eq!(to_vec(&q), sorted);
        prop_assert!(q.check_invariants().is_ok());
    }

    #[test]
    fn sort_is_stable(keys in prop::collection::vec(0u8..4, 0..48)) {
        // equal keys are told apart by the address of their payload
        let mut q = Queue::new();
        for k in &keys {
            q.insert_tail([b'k', b'0' + k]).unwrap();
        }
        let nodes_before: Vec<*const u8> = q.iter().map(<[u8]>::as_ptr).collect();
        q.sort();

        let mut order: Vec<usize> = (0..keys.len()).collect();
        order.sort_by_key(|&i| keys[i]);
        let expected: Vec<*const u8> = order.iter().map(|&i| nodes_before[i]).collect();
        let nodes_after: Vec<*const u8> = q.iter().map(<[u8]>::as_ptr).collect();
        prop_assert_eq!(nodes_after, expected);
    }

    #[test]
    fn small_queues_are_untouched(value in arb_value(), single in any::<bool>()) {
        let mut q = Queue::new();
        if single {
            q.insert_tail(&value).unwrap();
        }
        let before = q.peek_head().map(<[u8]>::as_ptr);
        q.reverse();
        q.sort();
        prop_assert_eq!(q.peek_head().map(<[u8]>::as_ptr), before);
        prop_assert_eq!(q.size(), usize::from(single));
        prop_assert!(q.check_invariants().is_ok());
    }
}
