use crate::error::{Result, TreeError};
use crate::goods::GoodsTree;
use crate::local::LocalOverlay;
use crate::schema::Schema;
use crate::traits::{LocalProblem, Utility};
use crate::utility::Objective;
use crate::utils::MAX_CHILDREN;
use std::hash::Hash;

/// Configures a [`GoodsTree`].
///
/// ```
/// use goods_tree::GoodsTreeBuilder;
///
/// let tree = GoodsTreeBuilder::<u8, i64>::new(2)
///     .maximize()
///     .own_variable("x", vec![0, 1])
///     .build()
///     .unwrap();
/// assert_eq!(tree.variable_count(), 1);
/// ```
pub struct GoodsTreeBuilder<V, U> {
    children: usize,
    objective: Objective,
    own: Vec<(String, Vec<V>)>,
    local: Option<Box<dyn LocalProblem<V, U>>>,
}

impl<V, U> GoodsTreeBuilder<V, U>
where
    V: Clone + Eq + Hash + 'static,
    U: Utility,
{
    pub fn new(children: usize) -> Self {
        Self {
            children,
            objective: Objective::Maximize,
            own: Vec::new(),
            local: None,
        }
    }
    pub fn maximize(self) -> Self {
        self.objective(Objective::Maximize)
    }
    pub fn minimize(self) -> Self {
        self.objective(Objective::Minimize)
    }
    pub fn objective(mut self, objective: Objective) -> Self {
        self.objective = objective;
        self
    }
    /// Declare a variable owned by this node, with its full domain.
    pub fn own_variable(mut self, name: impl Into<String>, domain: Vec<V>) -> Self {
        self.own.push((name.into(), domain));
        self
    }
    /// Attach the node's local sub-problem. Its variables that are not own
    /// variables are declared as known remote variables with closed domains.
    pub fn local_problem(mut self, problem: impl LocalProblem<V, U> + 'static) -> Self {
        self.local = Some(Box::new(problem));
        self
    }
    pub fn build(self) -> Result<GoodsTree<V, U>> {
        if self.children > MAX_CHILDREN {
            return Err(TreeError::TooManyChildren {
                children: self.children,
                max: MAX_CHILDREN,
            });
        }
        let mut remote = Vec::new();
        if let Some(problem) = &self.local {
            for (i, name) in problem.variables().iter().enumerate() {
                let declared =
                    self.own.iter().any(|(n, _)| n == name) || remote.iter().any(|(n, _)| n == name);
                if !declared {
                    remote.push((name.clone(), problem.domain(i).to_vec()));
                }
            }
        }
        let schema = Schema::new(remote, self.own)?;
        let local = match self.local {
            Some(problem) => {
                let scope = problem
                    .variables()
                    .iter()
                    .map(|name| {
                        schema
                            .lookup(name)
                            .ok_or_else(|| TreeError::UnknownVariable(name.clone()))
                    })
                    .collect::<Result<Vec<_>>>()?;
                for (i, &var) in scope.iter().enumerate() {
                    if let Some(v) = problem.domain(i).iter().find(|v| schema.value_index(var, v).is_none()) {
                        schema.check_value(var, v)?;
                    }
                }
                Some(LocalOverlay::new(problem, scope))
            }
            None => None,
        };
        Ok(GoodsTree::from_parts(self.objective, self.children, schema, local))
    }
}
