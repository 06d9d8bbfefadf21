//! Goods tree: incremental utility aggregation for ODPOP-style distributed
//! constraint optimization.
//!
//! A node in a DFS tree of agents owns some variables and receives, from each
//! of its children, a stream of *contributions*: partial assignments with a
//! utility that is either confirmed (final) or speculative. The [`GoodsTree`]
//! aggregates these reports without ever enumerating the cross product of all
//! domains, and at any time answers with the best joint assignment known so
//! far, certified optimal when nothing still unreported could beat it.
//!
//! Variables and domain values are discovered at runtime. Each discovered
//! variable adds a level to a prefix tree; unseen values share one reserved
//! slot until they show up.
//!
//! ## Core pieces
//! 1. [`Utility`] values with `±∞` sentinels and an [`Objective`] direction.
//! 2. A per-child ledger of the latest report for each restricted assignment.
//! 3. Per-child bounds with a subset-sum table, giving O(1) leaf bounds.
//! 4. The aggregation tree, with cached best-utility and best-bound pointers.
//! 5. An optional [`LocalProblem`] overlay supplying the node's own optimum.
//!
//! ## Quick start
//! ```
//! use goods_tree::{Contribution, GoodsTreeBuilder};
//!
//! let mut tree = GoodsTreeBuilder::<u8, i64>::new(2).maximize().build().unwrap();
//!
//! let a = Contribution::from_pairs([("x", 0)], 5, true);
//! assert_eq!(tree.add_contribution(0, &a).unwrap(), 1);
//! let b = Contribution::from_pairs([("x", 0), ("y", 1)], 3, true);
//! assert_eq!(tree.add_contribution(1, &b).unwrap(), 1);
//!
//! let best = tree.extract_best().unwrap();
//! assert!(best.confirmed);
//! assert_eq!(best.utility, 8);
//! assert_eq!(best.value_of("x"), Some(&0));
//! assert_eq!(best.value_of("y"), Some(&1));
//! assert!(tree.extract_best().is_none());
//! ```
//!
//! ## Features
//! - `parallel`: build and update the subset-sum table with rayon.
//! - `tracing`: spans and events through the `tracing` crate.
//! - `heavy`: enables the long-running stress tests.

pub mod builder;
pub mod contribution;
pub mod error;
pub mod goods;
pub mod local;
pub mod traits;
pub mod utility;
pub mod utils;

mod bounds;
mod ledger;
mod node;
mod schema;
mod tree;

pub use crate::builder::GoodsTreeBuilder;
pub use crate::contribution::{Contribution, Good};
pub use crate::error::{Result, TreeError};
pub use crate::goods::{GoodsTree, TreeStats};
pub use crate::local::TableLocalProblem;
pub use crate::traits::{LocalProblem, Utility};
pub use crate::utility::{Objective, TotalF64};
