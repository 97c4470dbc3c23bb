/*
Inherent impls on arena types live next to their data; rendering is kept
behind a trait so the domain layer stays free of display concerns.
 */
use termtree::Tree;
use tracing::instrument;

use crate::domain::{NodeId, TreeArena};

pub trait TreeNodeConvert {
    fn to_tree_string(&self, start: NodeId) -> Tree<String>;
}

impl TreeNodeConvert for TreeArena {
    #[instrument(level = "trace", skip(self))]
    fn to_tree_string(&self, start: NodeId) -> Tree<String> {
        fn build_tree(arena: &TreeArena, node_idx: NodeId, parent_tree: &mut Tree<String>) {
            if let Some(node) = arena.get_node(node_idx) {
                for &child_idx in node.children.values() {
                    if let Some(child) = arena.get_node(child_idx) {
                        let mut child_tree = Tree::new(child.name.clone());
                        build_tree(arena, child_idx, &mut child_tree);
                        parent_tree.push(child_tree);
                    }
                }
            }
        }

        match self.get_node(start) {
            Some(node) => {
                let mut tree = Tree::new(node.name.clone());
                build_tree(self, start, &mut tree);
                tree
            }
            None => Tree::new("Empty tree".to_string()),
        }
    }
}
