//! Core trait definitions.
//!
//! Two seams plug into the goods tree:
//! - [`Utility`]: the numeric type carried by contributions, an ordered additive
//!   domain extended with two absorbing sentinels.
//! - [`LocalProblem`]: the node's own constraints, queried for single
//!   assignments and enumerated best-first.

use std::fmt::Debug;

/// Utility values with `+∞` and `-∞` sentinels.
///
/// Arithmetic saturates: once an operand is infinite the result stays
/// infinite. When both operands are infinite the left one wins, so an
/// infeasible partial sum is never revived by a later term.
///
/// Finite overflow should saturate to the matching sentinel.
pub trait Utility: Copy + Ord + Debug + Send + Sync + 'static {
    /// Additive identity.
    fn zero() -> Self;

    /// The `+∞` sentinel.
    fn plus_infinity() -> Self;

    /// The `-∞` sentinel.
    fn minus_infinity() -> Self;

    /// Saturating sum.
    fn plus(self, rhs: Self) -> Self;

    /// Saturating difference. Subtracting `+∞` yields `-∞` and vice versa.
    fn minus(self, rhs: Self) -> Self;

    #[inline]
    fn is_infinite(self) -> bool {
        self == Self::plus_infinity() || self == Self::minus_infinity()
    }
}

/// The node's purely local sub-problem.
///
/// `V` is the value type of the variables, `U` the utility type. The variables
/// listed by [`LocalProblem::variables`] are the scope of the local utility;
/// their domains are fixed and fully known.
///
/// Candidates are produced lazily by [`LocalProblem::next_candidate`] in
/// non-increasing order of preference for the tree's objective, and only
/// feasible ones are produced. [`LocalProblem::restart`] rewinds the stream.
pub trait LocalProblem<V, U: Utility>: Send {
    /// Names of the scope variables.
    fn variables(&self) -> &[String];

    /// Domain of the `i`-th scope variable.
    fn domain(&self, i: usize) -> &[V];

    /// Utility of a full scope assignment, given in [`LocalProblem::variables`]
    /// order. Infeasible assignments return the objective's infeasible sentinel.
    fn utility(&self, values: &[V]) -> U;

    /// Next best candidate, or `None` once the stream is exhausted.
    fn next_candidate(&mut self) -> Option<(Vec<V>, U)>;

    /// Rewind the candidate stream to its start.
    fn restart(&mut self);
}
