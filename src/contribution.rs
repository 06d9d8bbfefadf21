//! Messages flowing into and out of the tree.

/// A child's report: a partial assignment with its utility.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contribution<V, U> {
    pub variables: Vec<String>,
    pub values: Vec<V>,
    pub utility: U,
    /// Guaranteed never to improve.
    pub confirmed: bool,
}

impl<V, U> Contribution<V, U> {
    pub fn confirmed(variables: Vec<String>, values: Vec<V>, utility: U) -> Self {
        Self {
            variables,
            values,
            utility,
            confirmed: true,
        }
    }

    pub fn speculative(variables: Vec<String>, values: Vec<V>, utility: U) -> Self {
        Self {
            variables,
            values,
            utility,
            confirmed: false,
        }
    }

    /// Build from `(name, value)` pairs.
    pub fn from_pairs<S: Into<String>>(
        pairs: impl IntoIterator<Item = (S, V)>,
        utility: U,
        confirmed: bool,
    ) -> Self {
        let (variables, values) = pairs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        Self {
            variables,
            values,
            utility,
            confirmed,
        }
    }
}

/// The tree's answer: the best assignment of the variables reported upward.
///
/// Variables are listed in tree order, outermost first. Own variables are
/// projected out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Good<V, U> {
    pub variables: Vec<String>,
    pub values: Vec<V>,
    pub utility: U,
    pub confirmed: bool,
}

impl<V, U> Good<V, U> {
    pub fn value_of(&self, variable: &str) -> Option<&V> {
        self.variables
            .iter()
            .position(|v| v == variable)
            .map(|i| &self.values[i])
    }

    /// Re-label as a contribution, as sent to the parent.
    pub fn into_contribution(self) -> Contribution<V, U> {
        Contribution {
            variables: self.variables,
            values: self.values,
            utility: self.utility,
            confirmed: self.confirmed,
        }
    }
}
