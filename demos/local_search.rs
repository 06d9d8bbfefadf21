//! Example: a node with its own variable and a local sub-problem.
//!
//! The node owns `o` and prefers `o` equal to its parent's `p`. Its single child
//! reports on `p`; the goods sent upward mention `p` only.
//!
//! Run with:
//! `cargo run --example local_search`

use goods_tree::{Contribution, GoodsTreeBuilder, Objective, TableLocalProblem, TreeError};
use std::collections::HashMap;

fn main() -> Result<(), TreeError> {
    let domain: Vec<u8> = (0..3).collect();
    let local = TableLocalProblem::from_fn(
        vec!["p".into(), "o".into()],
        vec![domain.clone(), domain.clone()],
        Objective::Maximize,
        |v| if v[0] == v[1] { 10 } else { i64::from(v[1]) },
    );
    let mut tree = GoodsTreeBuilder::new(1)
        .own_variable("o", domain)
        .local_problem(local)
        .build()?;
    println!("variables: {:?}, own: {:?}", tree.variables(), tree.own_variables());

    // Before the child says anything, only the local optimum is known.
    if let Some(good) = tree.extract_best() {
        println!("early {:?} = {} (confirmed: {})", good.values, good.utility, good.confirmed);
    }

    for (p, utility) in [(2u8, 7i64), (0, 6), (1, 1)] {
        tree.add_contribution(0, &Contribution::from_pairs([("p", p)], utility, true))?;
        while let Some(good) = tree.extract_best() {
            let context: HashMap<String, u8> = good
                .variables
                .iter()
                .cloned()
                .zip(good.values.iter().copied())
                .collect();
            let own = tree.best_own_assignment(&context);
            println!(
                "p={:?} utility {} (confirmed: {}) own o={:?}",
                good.value_of("p"),
                good.utility,
                good.confirmed,
                own
            );
            if !good.confirmed {
                break;
            }
        }
    }
    println!("fill ratio {:.2}, has more: {}", tree.fill_ratio(), tree.has_more());
    Ok(())
}
