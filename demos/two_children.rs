//! Example: a node aggregating two children that discover variables at runtime.
//!
//! Run with:
//! `cargo run --example two_children`

use goods_tree::{Contribution, GoodsTreeBuilder, TreeError};

fn main() -> Result<(), TreeError> {
    let mut tree = GoodsTreeBuilder::<u8, i64>::new(2).maximize().build()?;

    // Child 0 reports on `x`, child 1 on `x` and `y`, best first.
    let reports = [
        (0, Contribution::from_pairs([("x", 0)], 5, true)),
        (1, Contribution::from_pairs([("x", 0), ("y", 1)], 3, true)),
        (0, Contribution::from_pairs([("x", 1)], 4, true)),
        (1, Contribution::from_pairs([("x", 1), ("y", 1)], 2, true)),
        (1, Contribution::from_pairs([("x", 0), ("y", 0)], 1, true)),
    ];

    for (sender, report) in &reports {
        let new = tree.add_contribution(*sender, report)?;
        println!(
            "child {sender} -> {:?} = {} ({new} new variables)",
            report.values, report.utility
        );
        while let Some(good) = tree.extract_best() {
            print_good(&good);
            if !good.confirmed {
                break;
            }
        }
    }

    for sender in 0..tree.children() {
        tree.set_child_done(sender)?;
    }
    while let Some(good) = tree.extract_best() {
        print_good(&good);
    }
    println!("stats: {:?}", tree.stats());
    Ok(())
}

fn print_good(good: &goods_tree::Good<u8, i64>) {
    let assignment: Vec<String> = good
        .variables
        .iter()
        .zip(&good.values)
        .map(|(n, v)| format!("{n}={v}"))
        .collect();
    let kind = if good.confirmed { "confirmed" } else { "speculative" };
    println!("  {kind} good [{}] utility {}", assignment.join(", "), good.utility);
}
