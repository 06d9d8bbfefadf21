//! Error type for rejected contributions and queries.
//!
//! Every check runs before the tree is touched, so a returned error leaves the
//! structure exactly as it was. Callers that prefer to ignore bad messages can
//! drop the error and carry on.

/// Errors reported by [`crate::GoodsTree`] and [`crate::GoodsTreeBuilder`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("sender {sender} is not a child (tree has {children} children)")]
    UnknownSender { sender: usize, children: usize },

    #[error("contribution lists {variables} variables but {values} values")]
    ArityMismatch { variables: usize, values: usize },

    #[error("variable `{0}` appears more than once")]
    DuplicateVariable(String),

    #[error("sender {sender} previously reported `{variable}` but omitted it")]
    MissingSeparatorVariable { sender: usize, variable: String },

    #[error("utility is the unbounded sentinel")]
    UnboundedUtility,

    #[error("sender {sender} already confirmed a different utility for this assignment")]
    ConfirmedConflict { sender: usize },

    #[error("bound of sender {sender} would loosen")]
    BoundRegression { sender: usize },

    #[error("domain of `{0}` is closed and does not contain the reported value")]
    DomainClosed(String),

    #[error("unknown variable `{0}`")]
    UnknownVariable(String),

    #[error("{children} children exceed the limit of {max}")]
    TooManyChildren { children: usize, max: usize },

    #[error("domain of `{variable}` cannot have size {size}: {known} values already known")]
    DomainTooSmall {
        variable: String,
        size: usize,
        known: usize,
    },
}

pub type Result<T, E = TreeError> = std::result::Result<T, E>;
