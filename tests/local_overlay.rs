use goods_tree::{Contribution, GoodsTreeBuilder, Objective, TableLocalProblem, TreeError};
use std::collections::HashMap;

fn pairs(p: &[(&str, u8)], utility: i64, confirmed: bool) -> Contribution<u8, i64> {
    Contribution::from_pairs(p.iter().copied(), utility, confirmed)
}

fn own_preference() -> TableLocalProblem<u8, i64> {
    TableLocalProblem::new(
        vec!["o".into()],
        vec![vec![0, 1]],
        vec![3, 1],
        Objective::Maximize,
    )
}

#[test]
fn own_variables_are_projected_out_and_remembered() {
    let mut tree = GoodsTreeBuilder::new(1)
        .own_variable("o", vec![0u8, 1])
        .local_problem(own_preference())
        .build()
        .unwrap();
    assert_eq!(tree.own_variables(), vec!["o"]);
    // Nothing outside the node is known yet, so there is nothing to report.
    assert!(tree.extract_best().is_none());

    tree.add_contribution(0, &pairs(&[("x", 0)], 10, true)).unwrap();
    let best = tree.extract_best().unwrap();
    assert!(best.confirmed);
    assert_eq!(best.variables, vec!["x".to_string()]);
    assert_eq!(best.utility, 13);

    let context: HashMap<String, u8> = [("x".to_string(), 0)].into_iter().collect();
    assert_eq!(tree.best_own_assignment(&context), Some(vec![0]));
    assert_eq!(tree.child_context(0, &context).unwrap(), vec![("x".to_string(), 0)]);

    tree.add_contribution(0, &pairs(&[("x", 1)], 2, true)).unwrap();
    let next = tree.extract_best().unwrap();
    assert!(next.confirmed);
    assert_eq!((next.value_of("x"), next.utility), (Some(&1), 5));

    assert!(tree.set_child_done(0).unwrap());
    assert!(tree.extract_best().is_none());
}

#[test]
fn local_optimum_is_offered_while_bounds_are_missing() {
    let mut tree = GoodsTreeBuilder::new(2)
        .own_variable("o", vec![0u8, 1])
        .local_problem(own_preference())
        .build()
        .unwrap();
    tree.add_contribution(0, &pairs(&[("x", 0)], 1, false)).unwrap();

    let good = tree.extract_best().unwrap();
    assert!(!good.confirmed);
    assert_eq!(good.value_of("x"), Some(&0));
    assert_eq!(good.utility, 3);
    assert!(tree.extract_best().is_none());
}

#[test]
fn live_leaf_answers_own_assignment_before_certification() {
    let mut tree = GoodsTreeBuilder::new(2)
        .own_variable("o", vec![0u8, 1])
        .local_problem(TableLocalProblem::new(
            vec!["o".into()],
            vec![vec![0, 1]],
            vec![0, 0],
            Objective::Maximize,
        ))
        .build()
        .unwrap();
    tree.add_contribution(0, &Contribution::from_pairs([("o", 1)], 4, false)).unwrap();
    tree.add_contribution(0, &Contribution::from_pairs([("o", 0)], 2, false)).unwrap();
    assert_eq!(tree.best_own_assignment(&HashMap::new()), Some(vec![1]));
}

#[test]
fn local_scope_declares_known_remote_variables() {
    let problem = TableLocalProblem::from_fn(
        vec!["p".into(), "o".into()],
        vec![vec![0u8, 1], vec![0u8, 1]],
        Objective::Maximize,
        |v| if v[0] == v[1] { 5 } else { 0 },
    );
    let mut tree = GoodsTreeBuilder::new(1)
        .own_variable("o", vec![0u8, 1])
        .local_problem(problem)
        .build()
        .unwrap();
    assert!(tree.knows_variable("p"));
    assert_eq!(tree.variables(), vec!["p", "o"]);
    assert_eq!(
        tree.add_contribution(0, &pairs(&[("p", 4)], 1, true)),
        Err(TreeError::DomainClosed("p".into()))
    );

    // `p` is already fully known: nothing new is discovered.
    assert_eq!(tree.add_contribution(0, &pairs(&[("p", 1)], 6, true)).unwrap(), 0);
    // Unreported `p = 0` can reach at most the local optimum 5 plus the
    // child's bound 6, which does not beat 11.
    let best = tree.extract_best().unwrap();
    assert!(best.confirmed);
    assert_eq!((best.value_of("p"), best.utility), (Some(&1), 11));

    tree.add_contribution(0, &pairs(&[("p", 0)], 6, true)).unwrap();
    let last = tree.extract_best().unwrap();
    assert!(last.confirmed);
    assert_eq!((last.value_of("p"), last.utility), (Some(&0), 11));
    assert!(tree.extract_best().is_none());
    assert!(!tree.has_more());
}

#[test]
fn restart_reoffers_the_first_candidate() {
    let mut tree = GoodsTreeBuilder::new(1)
        .own_variable("o", vec![0u8, 1])
        .local_problem(own_preference())
        .build()
        .unwrap();
    tree.restart_local_search();
    tree.add_contribution(0, &pairs(&[("x", 0)], 10, true)).unwrap();
    assert_eq!(tree.extract_best().map(|g| g.utility), Some(13));
}

#[test]
fn node_without_outside_variables_confirms_an_empty_good() {
    let mut tree = GoodsTreeBuilder::new(0)
        .own_variable("o", vec![0u8, 1])
        .local_problem(own_preference())
        .build()
        .unwrap();
    let good = tree.extract_best().unwrap();
    assert!(good.confirmed);
    assert!(good.variables.is_empty());
    assert_eq!(good.utility, 3);
    assert_eq!(tree.best_own_assignment(&HashMap::new()), Some(vec![0]));
    assert!(tree.extract_best().is_none());
    assert!(!tree.has_more());
}
