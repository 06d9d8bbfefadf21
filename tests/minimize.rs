use goods_tree::{Contribution, GoodsTreeBuilder, TotalF64, TreeError};

fn pairs(p: &[(&str, u8)], utility: i64, confirmed: bool) -> Contribution<u8, i64> {
    Contribution::from_pairs(p.iter().copied(), utility, confirmed)
}

#[test]
fn costs_are_extracted_cheapest_first() {
    let mut tree = GoodsTreeBuilder::<u8, i64>::new(1).minimize().build().unwrap();
    tree.add_contribution(0, &pairs(&[("x", 1)], 3, true)).unwrap();
    let best = tree.extract_best().unwrap();
    assert!(best.confirmed);
    assert_eq!((best.value_of("x"), best.utility), (Some(&1), 3));

    tree.add_contribution(0, &pairs(&[("x", 0)], 5, true)).unwrap();
    let next = tree.extract_best().unwrap();
    assert!(next.confirmed);
    assert_eq!((next.value_of("x"), next.utility), (Some(&0), 5));

    // Cheaper than what was already confirmed: the child broke best-first order.
    assert_eq!(
        tree.add_contribution(0, &pairs(&[("x", 2)], 4, true)),
        Err(TreeError::BoundRegression { sender: 0 })
    );
    assert!(tree.set_child_done(0).unwrap());
    assert!(!tree.has_more());
}

#[test]
fn unbounded_cost_is_rejected() {
    let mut tree = GoodsTreeBuilder::<u8, i64>::new(1).minimize().build().unwrap();
    assert_eq!(
        tree.add_contribution(0, &pairs(&[("x", 0)], i64::MIN, false)),
        Err(TreeError::UnboundedUtility)
    );
    // `+∞` is an infeasible cost, which is a legal report.
    tree.add_contribution(0, &pairs(&[("x", 0)], i64::MAX, false)).unwrap();
    assert!(tree.extract_best().is_none());
}

#[test]
fn float_costs_sum_across_children() {
    let mut tree = GoodsTreeBuilder::<u8, TotalF64>::new(2).minimize().build().unwrap();
    let report = |v: u8, cost: f64| Contribution::from_pairs([("x", v)], TotalF64(cost), true);
    tree.add_contribution(0, &report(0, 1.5)).unwrap();
    assert!(!tree.extract_best().unwrap().confirmed);
    tree.add_contribution(1, &report(0, 2.0)).unwrap();

    let best = tree.extract_best().unwrap();
    assert!(best.confirmed);
    assert_eq!(best.utility, TotalF64(3.5));
    assert_eq!(tree.upper_bound(), None);
}
