//! Stateful components that own nodes

use super::{NodeKey, Variable};
use std::collections::HashSet;
use std::sync::Arc;

/// A stateful component owning nodes and possibly other modules.
///
/// Modules replace their nodes rather than mutate them: an update creates a
/// new node whose predecessors include the old one, and the module re-points
/// its reference. `variables` and `submodules` therefore report the current
/// nodes only.
pub trait Module: Send + Sync {
    /// Nodes owned directly by this module
    fn variables(&self) -> Vec<Variable> {
        Vec::new()
    }

    /// Modules owned by this module
    fn submodules(&self) -> Vec<Arc<dyn Module>> {
        Vec::new()
    }

    /// Every owned node that requires feedback, across the module tree
    fn parameters(&self) -> Vec<Variable>
    where
        Self: Sized,
    {
        collect_parameters(self)
    }
}

/// Collect parameters from a module tree.
///
/// Each module is visited once even if it is reachable along several paths
/// or through a reference cycle, and each node is yielded once.
pub fn collect_parameters(root: &dyn Module) -> Vec<Variable> {
    let mut params = Vec::new();
    let mut seen_nodes: HashSet<NodeKey> = HashSet::new();
    let mut seen_modules: HashSet<usize> = HashSet::new();

    seen_modules.insert(module_key(root));
    visit(root, &mut params, &mut seen_nodes);

    let mut pending: Vec<Arc<dyn Module>> = root.submodules().into_iter().rev().collect();
    while let Some(module) = pending.pop() {
        if !seen_modules.insert(module_key(module.as_ref())) {
            continue;
        }
        visit(module.as_ref(), &mut params, &mut seen_nodes);
        pending.extend(module.submodules().into_iter().rev());
    }

    params
}

fn visit(module: &dyn Module, params: &mut Vec<Variable>, seen: &mut HashSet<NodeKey>) {
    for var in module.variables() {
        if var.requires_feedback() && seen.insert(var.key()) {
            params.push(var);
        }
    }
}

fn module_key(module: &dyn Module) -> usize {
    (module as *const dyn Module).cast::<()>() as usize
}
