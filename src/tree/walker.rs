use crate::tree::{Tree, TreeNode};

/// Predicates steering a depth-first walk. `should_visit` gates the visitor
/// for a node; `should_continue_branch` gates descent into its children.
/// Both default to "yes".
pub struct WalkConditions<'a, N> {
    pub should_continue_branch: Option<Box<dyn Fn(&N) -> bool + 'a>>,
    pub should_visit: Option<Box<dyn Fn(&N) -> bool + 'a>>,
}

impl<N> Default for WalkConditions<'_, N> {
    fn default() -> Self {
        Self {
            should_continue_branch: None,
            should_visit: None,
        }
    }
}

/// Pre-order depth-first traversal over a [`Tree`]. Children are walked in
/// the order the store reports them, so traversal is stable for a fixed
/// tree. A visitor error aborts the walk and is returned unchanged.
pub struct DepthFirstWalker<'t, N: TreeNode> {
    tree: &'t Tree<N>,
}

impl<'t, N: TreeNode> DepthFirstWalker<'t, N> {
    pub fn new(tree: &'t Tree<N>) -> Self {
        Self { tree }
    }

    pub fn walk<E>(
        &self,
        mut visit: impl FnMut(&N) -> Result<(), E>,
        conditions: Option<&WalkConditions<'_, N>>,
    ) -> Result<(), E> {
        let Some(root) = self.tree.root() else {
            return Ok(());
        };

        let mut stack = vec![root.id().to_string()];
        while let Some(id) = stack.pop() {
            let Some(node) = self.tree.node(&id) else {
                continue;
            };

            let visitable = conditions
                .and_then(|c| c.should_visit.as_ref())
                .map_or(true, |pred| pred(node));
            if visitable {
                visit(node)?;
            }

            let descend = conditions
                .and_then(|c| c.should_continue_branch.as_ref())
                .map_or(true, |pred| pred(node));
            if descend {
                // pushed in reverse so the first child is walked first
                let mut child_ids: Vec<String> =
                    self.tree.children(&id).iter().map(|child| child.id().to_string()).collect();
                child_ids.reverse();
                stack.extend(child_ids);
            }
        }
        Ok(())
    }
}
