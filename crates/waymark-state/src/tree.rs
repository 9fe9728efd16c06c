//! Index-based ownership tree
//!
//! Nodes live in one flat vector and refer to each other by [`NodeId`], so a
//! value never needs a back-pointer to the tree that owns it.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Id of the root in every tree.
    pub const ROOT: NodeId = NodeId(0);

    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Owned recursive node, used while a tree is still being assembled.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeNode<T> {
    pub value: T,
    pub children: Vec<TreeNode<T>>,
}

impl<T> TreeNode<T> {
    pub fn new(value: T, children: Vec<TreeNode<T>>) -> Self {
        Self { value, children }
    }

    pub fn leaf(value: T) -> Self {
        Self {
            value,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone)]
struct Node<T> {
    value: T,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Tree<T> {
    nodes: Vec<Node<T>>,
}

impl<T> Tree<T> {
    pub fn new(root: T) -> Self {
        Self {
            nodes: vec![Node {
                value: root,
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    /// Flattens an owned tree. Ids are assigned in pre-order, root first.
    pub fn from_node(root: TreeNode<T>) -> Self {
        let TreeNode { value, children } = root;
        let mut tree = Self::new(value);
        let root_id = tree.root();
        for child in children {
            tree.attach(root_id, child);
        }
        tree
    }

    fn attach(&mut self, parent: NodeId, node: TreeNode<T>) {
        let TreeNode { value, children } = node;
        let id = self.add_child(parent, value);
        for child in children {
            self.attach(id, child);
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// A tree always holds its root, so this is never true.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn add_child(&mut self, parent: NodeId, value: T) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            value,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Value of a node. Ids are only ever handed out by this tree.
    pub fn get(&self, id: NodeId) -> &T {
        &self.nodes[id.0].value
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        &mut self.nodes[id.0].value
    }

    pub fn try_get(&self, id: NodeId) -> Option<&T> {
        self.nodes.get(id.0).map(|n| &n.value)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].children.first().copied()
    }

    /// Other children of this node's parent, in order.
    pub fn siblings(&self, id: NodeId) -> Vec<NodeId> {
        match self.parent(id) {
            Some(parent) => self
                .children(parent)
                .iter()
                .copied()
                .filter(|c| *c != id)
                .collect(),
            None => Vec::new(),
        }
    }

    /// Ids from the root down to and including `id`.
    pub fn path_from_root(&self, id: NodeId) -> Vec<NodeId> {
        let mut path = vec![id];
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            path.push(parent);
            current = parent;
        }
        path.reverse();
        path
    }

    /// `id` and everything below it, pre-order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).iter().rev().copied());
        }
        out
    }

    /// All ids, pre-order from the root.
    pub fn preorder(&self) -> Vec<NodeId> {
        self.descendants(self.root())
    }

    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<NodeId> {
        self.preorder()
            .into_iter()
            .find(|id| predicate(self.get(*id)))
    }

    /// Same shape and ids, new values.
    pub fn map<U>(&self, mut f: impl FnMut(NodeId, &T) -> U) -> Tree<U> {
        Tree {
            nodes: self
                .nodes
                .iter()
                .enumerate()
                .map(|(idx, node)| Node {
                    value: f(NodeId(idx), &node.value),
                    parent: node.parent,
                    children: node.children.clone(),
                })
                .collect(),
        }
    }
}
