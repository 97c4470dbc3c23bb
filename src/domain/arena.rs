use std::fmt;

use generational_arena::{Arena, Index};
use indexmap::IndexMap;
use serde_json::Value;
use tracing::instrument;

use crate::tree::Component;

/// Stable handle of a node in the model arena.
pub type NodeId = Index;

/// Lifecycle state of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeState {
    Initialized,
    Preparing,
    Prepared,
    Starting,
    Started,
    Running,
    Pausing,
    Paused,
    Stopping,
    Stopped,
    Resetting,
    Reset,
    Destroying,
    Destroyed,
    Fault,
    Unknown,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeState::Initialized => "INITIALIZED",
            NodeState::Preparing => "PREPARING",
            NodeState::Prepared => "PREPARED",
            NodeState::Starting => "STARTING",
            NodeState::Started => "STARTED",
            NodeState::Running => "RUNNING",
            NodeState::Pausing => "PAUSING",
            NodeState::Paused => "PAUSED",
            NodeState::Stopping => "STOPPING",
            NodeState::Stopped => "STOPPED",
            NodeState::Resetting => "RESETTING",
            NodeState::Reset => "RESET",
            NodeState::Destroying => "DESTROYING",
            NodeState::Destroyed => "DESTROYED",
            NodeState::Fault => "FAULT",
            NodeState::Unknown => "UNKNOWN",
        };
        f.write_str(s)
    }
}

/// The seven lifecycle operations every node understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Prepare,
    Run,
    Start,
    Pause,
    Stop,
    Reset,
    Destroy,
}

impl Op {
    /// Hook event fired before the operation runs.
    pub fn hook_event(self) -> &'static str {
        match self {
            Op::Prepare => "on_prepare",
            Op::Run => "on_run",
            Op::Start => "on_start",
            Op::Pause => "on_pause",
            Op::Stop => "on_stop",
            Op::Reset => "on_reset",
            Op::Destroy => "on_destroy",
        }
    }

    pub fn transitional(self) -> NodeState {
        match self {
            Op::Prepare => NodeState::Preparing,
            Op::Run => NodeState::Running,
            Op::Start => NodeState::Starting,
            Op::Pause => NodeState::Pausing,
            Op::Stop => NodeState::Stopping,
            Op::Reset => NodeState::Resetting,
            Op::Destroy => NodeState::Destroying,
        }
    }

    pub fn terminal(self) -> NodeState {
        match self {
            Op::Prepare => NodeState::Prepared,
            // a run cycle completes back into the stopped state
            Op::Run => NodeState::Stopped,
            Op::Start => NodeState::Started,
            Op::Pause => NodeState::Paused,
            Op::Stop => NodeState::Stopped,
            Op::Reset => NodeState::Reset,
            Op::Destroy => NodeState::Destroyed,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Op::Prepare => "prepare",
            Op::Run => "run",
            Op::Start => "start",
            Op::Pause => "pause",
            Op::Stop => "stop",
            Op::Reset => "reset",
            Op::Destroy => "destroy",
        }
    }
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tree node stored in the arena.
pub struct TreeNode {
    /// Name, unique among siblings
    pub name: String,
    /// Canonical name of the type that built this node
    pub type_name: String,
    /// Index of parent node in the arena, None for roots and orphans
    pub parent: Option<NodeId>,
    /// Children in declaration order
    pub children: IndexMap<String, NodeId>,
    pub state: NodeState,
    pub enabled: bool,
    /// Event name to registered hook nodes (non-owning)
    pub hooks: IndexMap<String, Vec<NodeId>>,
    /// Configuration the node was built from
    pub definition: Value,
    /// Type-specific behavior; taken out of the slot while it executes
    pub(crate) behavior: Option<Box<dyn Component>>,
}

impl TreeNode {
    pub fn new(name: &str, type_name: &str, definition: Value) -> Self {
        Self {
            name: name.to_string(),
            type_name: type_name.to_string(),
            parent: None,
            children: IndexMap::new(),
            state: NodeState::Initialized,
            enabled: true,
            hooks: IndexMap::new(),
            definition,
            behavior: None,
        }
    }
}

impl fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TreeNode")
            .field("name", &self.name)
            .field("type_name", &self.type_name)
            .field("state", &self.state)
            .field("enabled", &self.enabled)
            .field("children", &self.children.len())
            .finish()
    }
}

/// Arena storage for every node of a model.
///
/// Nodes address each other only by `NodeId`; the arena may hold several
/// independent roots as well as detached subtrees.
#[derive(Default)]
pub struct TreeArena {
    arena: Arena<TreeNode>,
}

impl TreeArena {
    pub fn new() -> Self {
        Self {
            arena: Arena::new(),
        }
    }

    #[instrument(level = "trace", skip(self, node), fields(name = %node.name))]
    pub fn insert_node(&mut self, node: TreeNode) -> NodeId {
        self.arena.insert(node)
    }

    pub fn get_node(&self, idx: NodeId) -> Option<&TreeNode> {
        self.arena.get(idx)
    }

    pub fn get_node_mut(&mut self, idx: NodeId) -> Option<&mut TreeNode> {
        self.arena.get_mut(idx)
    }

    pub fn remove_node(&mut self, idx: NodeId) -> Option<TreeNode> {
        self.arena.remove(idx)
    }

    pub fn contains(&self, idx: NodeId) -> bool {
        self.arena.contains(idx)
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Post-order walk of the subtree rooted at `start` (children before parents).
    pub fn iter_postorder(&self, start: NodeId) -> PostOrderIterator<'_> {
        PostOrderIterator::new(self, start)
    }

    /// Number of ancestors above `idx`.
    pub fn level(&self, idx: NodeId) -> usize {
        let mut level = 0;
        let mut current = self.get_node(idx).and_then(|n| n.parent);
        while let Some(parent) = current {
            level += 1;
            current = self.get_node(parent).and_then(|n| n.parent);
        }
        level
    }
}

pub struct PostOrderIterator<'a> {
    arena: &'a TreeArena,
    stack: Vec<(NodeId, bool)>,
}

impl<'a> PostOrderIterator<'a> {
    fn new(arena: &'a TreeArena, start: NodeId) -> Self {
        Self {
            arena,
            stack: vec![(start, false)],
        }
    }
}

impl<'a> Iterator for PostOrderIterator<'a> {
    type Item = (NodeId, &'a TreeNode);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((current_idx, visited)) = self.stack.pop() {
            if let Some(node) = self.arena.get_node(current_idx) {
                if !visited {
                    self.stack.push((current_idx, true));
                    for &child in node.children.values().rev() {
                        self.stack.push((child, false));
                    }
                } else {
                    return Some((current_idx, node));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn attach(arena: &mut TreeArena, name: &str, parent: Option<NodeId>) -> NodeId {
        let mut node = TreeNode::new(name, "Component", Value::Null);
        node.parent = parent;
        let idx = arena.insert_node(node);
        if let Some(p) = parent {
            arena
                .get_node_mut(p)
                .unwrap()
                .children
                .insert(name.to_string(), idx);
        }
        idx
    }

    fn sample() -> (TreeArena, NodeId) {
        let mut arena = TreeArena::new();
        let root = attach(&mut arena, "root", None);
        let a = attach(&mut arena, "a", Some(root));
        attach(&mut arena, "a1", Some(a));
        attach(&mut arena, "b", Some(root));
        (arena, root)
    }

    fn names<'a>(it: impl Iterator<Item = (NodeId, &'a TreeNode)>) -> Vec<String> {
        it.map(|(_, n)| n.name.clone()).collect()
    }

    #[test]
    fn given_tree_when_iterating_postorder_then_children_come_first() {
        let (arena, root) = sample();
        assert_eq!(names(arena.iter_postorder(root)), vec!["a1", "a", "b", "root"]);
    }

    #[test]
    fn given_nested_node_when_level_then_counts_ancestors() {
        let (arena, root) = sample();
        let a1 = arena.iter_postorder(root).find(|(_, n)| n.name == "a1").unwrap().0;
        assert_eq!(arena.level(a1), 2);
        assert_eq!(arena.level(root), 0);
    }

    #[test]
    fn given_run_op_when_mapping_states_then_ends_stopped() {
        assert_eq!(Op::Run.transitional(), NodeState::Running);
        assert_eq!(Op::Run.terminal(), NodeState::Stopped);
        assert_eq!(Op::Prepare.hook_event(), "on_prepare");
        assert_eq!(NodeState::Prepared.to_string(), "PREPARED");
    }
}
