//! Position of the user inside the cluster tree.
//!
//! Descending records the chosen group index in the path and the reached
//! node in a parallel trail; going back pops both. Leaves and the root are
//! boundaries that leave the state untouched.

use serde::Serialize;

use super::clustering::{ClusterTree, NodeId};

/// Result of a navigation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationOutcome {
    Success,
    /// Already at a leaf (descend) or at the root (ascend); state unchanged
    Boundary,
}

impl NavigationOutcome {
    pub fn is_success(self) -> bool {
        self == NavigationOutcome::Success
    }
}

/// Tracks the user's position in the cluster tree
///
/// The position is the sequence of group indices chosen since the root. The
/// node reached by each step is kept alongside so the current node never has
/// to be re-derived from the path.
#[derive(Debug, Clone)]
pub struct Navigator {
    path: Vec<usize>,
    /// `trail[0]` is the root, `trail[k]` the node reached after `path[..k]`
    trail: Vec<NodeId>,
}

impl Navigator {
    pub fn new(tree: &ClusterTree) -> Self {
        Self {
            path: Vec::new(),
            trail: vec![tree.root()],
        }
    }

    pub fn path(&self) -> &[usize] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn current(&self) -> NodeId {
        self.trail[self.trail.len() - 1]
    }

    /// Descends into group `index` of the current node's cut into `groups`
    pub fn choose_column(
        &mut self,
        tree: &ClusterTree,
        index: usize,
        groups: usize,
    ) -> NavigationOutcome {
        let current = self.current();
        if tree.is_leaf(current) {
            return NavigationOutcome::Boundary;
        }

        match tree.cut(current, groups).get(index) {
            Some(&next) => {
                self.path.push(index);
                self.trail.push(next);
                NavigationOutcome::Success
            }
            None => NavigationOutcome::Boundary,
        }
    }

    pub fn go_back(&mut self) -> NavigationOutcome {
        if self.path.pop().is_none() {
            return NavigationOutcome::Boundary;
        }
        self.trail.pop();
        NavigationOutcome::Success
    }

    /// Dot-joined path, or `root` at the top of the tree
    pub fn current_branch_label(&self) -> String {
        if self.path.is_empty() {
            return "root".to_string();
        }
        self.path
            .iter()
            .map(|index| index.to_string())
            .collect::<Vec<_>>()
            .join(".")
    }
}
