use goods_tree::{Contribution, GoodsTreeBuilder, TreeError};

fn pairs(p: &[(&str, u8)], utility: i64, confirmed: bool) -> Contribution<u8, i64> {
    Contribution::from_pairs(p.iter().copied(), utility, confirmed)
}

#[test]
fn malformed_contributions_are_rejected_without_side_effects() {
    let mut tree = GoodsTreeBuilder::<u8, i64>::new(2).build().unwrap();
    tree.add_contribution(0, &pairs(&[("x", 0)], 5, true)).unwrap();
    let before = tree.stats();

    assert_eq!(
        tree.add_contribution(2, &pairs(&[("x", 0)], 1, true)),
        Err(TreeError::UnknownSender { sender: 2, children: 2 })
    );
    let lopsided = Contribution {
        variables: vec!["x".into(), "y".into()],
        values: vec![0],
        utility: 1,
        confirmed: false,
    };
    assert_eq!(
        tree.add_contribution(1, &lopsided),
        Err(TreeError::ArityMismatch { variables: 2, values: 1 })
    );
    assert_eq!(
        tree.add_contribution(1, &pairs(&[("y", 0), ("y", 1)], 1, false)),
        Err(TreeError::DuplicateVariable("y".into()))
    );
    assert_eq!(
        tree.add_contribution(1, &pairs(&[("x", 0)], i64::MAX, false)),
        Err(TreeError::UnboundedUtility)
    );
    assert_eq!(
        tree.add_contribution(0, &pairs(&[("z", 0)], 1, false)),
        Err(TreeError::MissingSeparatorVariable { sender: 0, variable: "x".into() })
    );

    assert_eq!(tree.stats(), before);
    assert!(!tree.knows_variable("y"));
    assert!(!tree.knows_variable("z"));
}

#[test]
fn confirmed_entries_are_permanent() {
    let mut tree = GoodsTreeBuilder::<u8, i64>::new(1).build().unwrap();
    tree.add_contribution(0, &pairs(&[("x", 0)], 5, true)).unwrap();
    assert_eq!(
        tree.add_contribution(0, &pairs(&[("x", 0)], 4, true)),
        Err(TreeError::ConfirmedConflict { sender: 0 })
    );
}

#[test]
fn confirmed_bounds_only_tighten() {
    let mut tree = GoodsTreeBuilder::<u8, i64>::new(1).build().unwrap();
    tree.add_contribution(0, &pairs(&[("x", 0)], 5, true)).unwrap();
    assert_eq!(
        tree.add_contribution(0, &pairs(&[("x", 1)], 7, true)),
        Err(TreeError::BoundRegression { sender: 0 })
    );
    assert_eq!(tree.tighten_bound(0, 9), Err(TreeError::BoundRegression { sender: 0 }));
    // The rejected report did not add its value.
    assert_eq!(tree.domains(), vec![("x", &[0u8][..])]);
    tree.tighten_bound(0, 3).unwrap();
    assert_eq!(tree.upper_bound(), Some(5));
}

#[test]
fn speculative_reports_are_overwritten() {
    let mut tree = GoodsTreeBuilder::<u8, i64>::new(1).build().unwrap();
    tree.add_contribution(0, &pairs(&[("x", 0)], 9, false)).unwrap();
    tree.add_contribution(0, &pairs(&[("x", 1)], 6, false)).unwrap();
    let best = tree.extract_best().unwrap();
    assert_eq!(best.value_of("x"), Some(&0));
    assert_eq!(best.utility, 9);

    tree.add_contribution(0, &pairs(&[("x", 0)], 2, false)).unwrap();
    let best = tree.extract_best().unwrap();
    assert_eq!(best.value_of("x"), Some(&1));
    assert_eq!(best.utility, 6);

    // Later confirmation replaces the speculative value exactly.
    tree.add_contribution(0, &pairs(&[("x", 1)], 6, true)).unwrap();
    tree.add_contribution(0, &pairs(&[("x", 0)], 2, true)).unwrap();
    tree.set_final_domain_size("x", 2).unwrap();
    let best = tree.extract_best().unwrap();
    assert!(best.confirmed);
    assert_eq!((best.value_of("x"), best.utility), (Some(&1), 6));
    let next = tree.extract_best().unwrap();
    assert!(next.confirmed);
    assert_eq!((next.value_of("x"), next.utility), (Some(&0), 2));
    assert!(tree.extract_best().is_none());
}

#[test]
fn infeasible_speculative_report_can_recover() {
    let mut tree = GoodsTreeBuilder::<u8, i64>::new(1).build().unwrap();
    tree.add_contribution(0, &pairs(&[("x", 0)], i64::MIN, false)).unwrap();
    assert!(tree.extract_best().is_none());
    tree.add_contribution(0, &pairs(&[("x", 0)], 3, false)).unwrap();
    let best = tree.extract_best().unwrap();
    assert_eq!(best.utility, 3);
}

#[test]
fn repeated_reports_still_discover_new_variables() {
    let mut tree = GoodsTreeBuilder::<u8, i64>::new(2).build().unwrap();
    tree.add_contribution(0, &pairs(&[("x", 0)], 5, true)).unwrap();

    let repeat = pairs(&[("x", 0), ("y", 1)], 5, true);
    assert!(tree.is_contribution_stale(&repeat, 0));
    assert_eq!(tree.add_contribution(0, &repeat).unwrap(), 1);
    assert!(tree.knows_variable("y"));
    assert_eq!(tree.variables(), vec!["y", "x"]);
    let stats = tree.stats();
    assert_eq!((stats.contributions, stats.stale_contributions), (1, 1));
    // The sender now depends on `y`.
    assert_eq!(
        tree.add_contribution(0, &pairs(&[("x", 1)], 4, true)),
        Err(TreeError::MissingSeparatorVariable { sender: 0, variable: "y".into() })
    );

    let echo = pairs(&[("x", 0), ("y", 1), ("z", 1)], 9, false);
    assert_eq!(tree.add_contribution(0, &echo).unwrap(), 1);
    assert!(tree.knows_variable("z"));

    // A conflicting report is rejected as a whole.
    let conflict = pairs(&[("x", 0), ("y", 1), ("z", 1), ("w", 1)], 4, true);
    assert_eq!(
        tree.add_contribution(0, &conflict),
        Err(TreeError::ConfirmedConflict { sender: 0 })
    );
    assert!(!tree.knows_variable("w"));
    assert_eq!(tree.variable_count(), 3);
}

#[test]
fn repeated_report_discovers_new_values() {
    let mut tree = GoodsTreeBuilder::<u8, i64>::new(2).build().unwrap();
    tree.add_contribution(0, &pairs(&[("x", 0)], 5, true)).unwrap();
    tree.add_contribution(1, &pairs(&[("x", 0), ("y", 1)], 3, true)).unwrap();
    // Child 0 does not depend on `y`; its entry covers the unseen `y = 4`.
    let repeat = pairs(&[("x", 0), ("y", 4)], 5, true);
    assert!(tree.is_contribution_stale(&repeat, 0));
    assert_eq!(tree.add_contribution(0, &repeat).unwrap(), 0);
    assert_eq!(tree.domains(), vec![("y", &[1u8, 4][..]), ("x", &[0u8][..])]);
}
