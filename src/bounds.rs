//! Per-child bounds and the subset-sum table over them.
//!
//! A child's bound is the utility of the last confirmed contribution it sent:
//! children report confirmed goods best-first, so nothing it confirms later can
//! beat it. Until every child has a bound, no leaf bound is known.
//!
//! Once all bounds are known the table holds, for every non-empty set of
//! children, the sum of their bounds, at index `mask - 1`. Sums accumulate the
//! members in ascending child order, both when building and when updating, so
//! serial and parallel runs agree bit for bit.

use crate::error::{Result, TreeError};
use crate::traits::Utility;
use crate::utility::Objective;
use crate::utils::{child_bit, full_mask, subset_count, ChildMask};
#[cfg(not(feature = "parallel"))]
use crate::utils::highest_child;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Effect of [`BoundCache::tighten`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Tightening {
    Unchanged,
    Tightened,
    /// The last unknown bound arrived and the table was built.
    Ready,
}

#[derive(Debug, Clone)]
pub(crate) struct BoundCache<U> {
    objective: Objective,
    bounds: Vec<Option<U>>,
    unknown: usize,
    sums: Vec<U>,
    epoch: u64,
}

impl<U: Utility> BoundCache<U> {
    pub fn new(objective: Objective, children: usize) -> Self {
        Self {
            objective,
            bounds: vec![None; children],
            unknown: children,
            sums: Vec::new(),
            epoch: 0,
        }
    }

    pub fn children(&self) -> usize {
        self.bounds.len()
    }

    pub fn is_ready(&self) -> bool {
        self.unknown == 0
    }

    /// Bumped whenever a leaf bound anywhere may have changed.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn bound(&self, child: usize) -> Option<U> {
        self.bounds[child]
    }

    /// Fails if `bound` is looser than the child's current bound.
    pub fn check(&self, child: usize, bound: U) -> Result<()> {
        match self.bounds[child] {
            Some(old) if self.objective.better(bound, old) => {
                Err(TreeError::BoundRegression { sender: child })
            }
            _ => Ok(()),
        }
    }

    pub fn tighten(&mut self, child: usize, bound: U) -> Result<Tightening> {
        self.check(child, bound)?;
        let old = self.bounds[child].replace(bound);
        match old {
            Some(old) if old == bound => Ok(Tightening::Unchanged),
            Some(_) => {
                if self.is_ready() {
                    self.update(child);
                    self.epoch += 1;
                }
                Ok(Tightening::Tightened)
            }
            None => {
                self.unknown -= 1;
                if self.is_ready() {
                    self.build();
                    self.epoch += 1;
                    Ok(Tightening::Ready)
                } else {
                    Ok(Tightening::Tightened)
                }
            }
        }
    }

    /// Sum of the bounds of the children in `mask`, once every bound is known.
    #[inline]
    pub fn subset_sum(&self, mask: ChildMask) -> Option<U> {
        if !self.is_ready() {
            None
        } else if mask == 0 {
            Some(U::zero())
        } else {
            Some(self.sums[mask as usize - 1])
        }
    }

    /// Sum of every child's bound.
    pub fn total(&self) -> Option<U> {
        self.subset_sum(full_mask(self.children()))
    }

    fn known(&self, child: usize) -> U {
        self.bounds[child].unwrap_or_else(|| self.objective.unbounded())
    }

    #[cfg(not(feature = "parallel"))]
    fn build(&mut self) {
        #[cfg(feature = "tracing")]
        let span = tracing::trace_span!("build_subset_sums", children = self.children());
        #[cfg(feature = "tracing")]
        let _enter = span.enter();

        let n = subset_count(self.children());
        let mut sums = Vec::with_capacity(n);
        for mask in 1..=n as ChildMask {
            let top = highest_child(mask);
            let rest = mask ^ child_bit(top);
            let base = if rest == 0 {
                U::zero()
            } else {
                sums[rest as usize - 1]
            };
            sums.push(base.plus(self.known(top)));
        }
        self.sums = sums;
    }

    #[cfg(feature = "parallel")]
    fn build(&mut self) {
        #[cfg(feature = "tracing")]
        let span = tracing::trace_span!("build_subset_sums", children = self.children());
        #[cfg(feature = "tracing")]
        let _enter = span.enter();

        let n = subset_count(self.children());
        let this = &*self;
        let sums: Vec<U> = (1..=n as ChildMask)
            .into_par_iter()
            .map(|mask| this.fold(mask))
            .collect();
        self.sums = sums;
    }

    #[cfg(not(feature = "parallel"))]
    fn update(&mut self, child: usize) {
        let bit = child_bit(child);
        for mask in 1..=subset_count(self.children()) as ChildMask {
            if mask & bit == 0 {
                continue;
            }
            let top = highest_child(mask);
            let rest = mask ^ child_bit(top);
            let base = if rest == 0 {
                U::zero()
            } else {
                self.sums[rest as usize - 1]
            };
            self.sums[mask as usize - 1] = base.plus(self.known(top));
        }
    }

    #[cfg(feature = "parallel")]
    fn update(&mut self, child: usize) {
        let bit = child_bit(child);
        let this = &*self;
        let fresh: Vec<(usize, U)> = (1..=subset_count(this.children()) as ChildMask)
            .into_par_iter()
            .filter(|mask| mask & bit != 0)
            .map(|mask| (mask as usize - 1, this.fold(mask)))
            .collect();
        for (i, sum) in fresh {
            self.sums[i] = sum;
        }
    }

    #[cfg(feature = "parallel")]
    fn fold(&self, mask: ChildMask) -> U {
        crate::utils::children_in(mask).fold(U::zero(), |acc, c| acc.plus(self.known(c)))
    }
}
