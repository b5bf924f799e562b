use std::sync::{Arc, OnceLock};

use alloy_primitives::B256;
use tree_hash::{TreeHash, TreeHashType};

use crate::hash::{hash_pair, zero_hash};

/// Maximum height of the packed subtree held by a single leaf node (8 chunks).
const MAX_LEAF_DEPTH: u32 = 3;

/// Shape of a tree for a given element type and length limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Layout {
    /// Number of elements stored in one leaf bucket.
    pub(crate) values_per_leaf: usize,
    /// Number of 32-byte chunks a full leaf bucket hashes to.
    pub(crate) leaf_chunks: usize,
    pub(crate) leaf_depth: u32,
    /// Number of branch levels above the leaf buckets.
    pub(crate) depth: u32,
}

impl Layout {
    pub(crate) fn new<T: TreeHash>(limit: usize) -> Self {
        let packing_factor = match T::tree_hash_type() {
            TreeHashType::Basic => T::tree_hash_packing_factor(),
            _ => 1,
        };
        let chunk_limit = limit.div_ceil(packing_factor).max(1);
        let chunk_depth = chunk_limit.next_power_of_two().trailing_zeros();
        let leaf_depth = chunk_depth.min(MAX_LEAF_DEPTH);

        Self {
            values_per_leaf: packing_factor << leaf_depth,
            leaf_chunks: 1 << leaf_depth,
            leaf_depth,
            depth: chunk_depth - leaf_depth,
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.values_per_leaf << self.depth
    }
}

#[derive(Clone)]
enum Node<T> {
    Branch {
        children: [Option<Arc<Node<T>>>; 2],
        root: OnceLock<B256>,
    },
    Leaf {
        values: Vec<T>,
        root: OnceLock<B256>,
    },
}

impl<T> Node<T> {
    fn leaf(values: Vec<T>) -> Self {
        Self::Leaf {
            values,
            root: OnceLock::new(),
        }
    }

    fn branch(children: [Option<Arc<Node<T>>>; 2]) -> Self {
        Self::Branch {
            children,
            root: OnceLock::new(),
        }
    }

    /// A chain of branches down to a fresh leaf holding `value`.
    fn path(leaf_index: usize, height: u32, value: T) -> Self {
        if height == 0 {
            return Self::leaf(vec![value]);
        }
        let mut children = [None, None];
        children[(leaf_index >> (height - 1)) & 1] =
            Some(Arc::new(Self::path(leaf_index, height - 1, value)));
        Self::branch(children)
    }
}

impl<T: TreeHash> Node<T> {
    fn root(&self, layout: Layout, height: u32) -> B256 {
        match self {
            Node::Branch { children, root } => *root.get_or_init(|| {
                let [left, right] = children.each_ref().map(|child| match child {
                    Some(child) => child.root(layout, height - 1),
                    None => zero_hash(layout.leaf_depth + height - 1),
                });
                hash_pair(&left, &right)
            }),
            Node::Leaf { values, root } => {
                *root.get_or_init(|| leaf_root(values, layout.leaf_chunks))
            }
        }
    }
}

fn leaf_root<T: TreeHash>(values: &[T], leaf_chunks: usize) -> B256 {
    let mut bytes = Vec::with_capacity(leaf_chunks * 32);
    match T::tree_hash_type() {
        TreeHashType::Basic => {
            for value in values {
                bytes.extend_from_slice(&value.tree_hash_packed_encoding());
            }
        }
        _ => {
            for value in values {
                bytes.extend_from_slice(value.tree_hash_root().as_slice());
            }
        }
    }
    tree_hash::merkle_root(&bytes, leaf_chunks)
}

fn get_mut<T: Clone>(
    node: &mut Arc<Node<T>>,
    leaf_index: usize,
    height: u32,
    offset: usize,
) -> Option<&mut T> {
    match Arc::make_mut(node) {
        Node::Branch { children, root } => {
            let child = children[(leaf_index >> height.checked_sub(1)?) & 1].as_mut()?;
            root.take();
            get_mut(child, leaf_index, height - 1, offset)
        }
        Node::Leaf { values, root } => {
            root.take();
            values.get_mut(offset)
        }
    }
}

fn insert<T: Clone>(slot: &mut Option<Arc<Node<T>>>, leaf_index: usize, height: u32, value: T) {
    match slot {
        None => *slot = Some(Arc::new(Node::path(leaf_index, height, value))),
        Some(node) => match Arc::make_mut(node) {
            Node::Branch { children, root } => {
                root.take();
                let height = height.saturating_sub(1);
                insert(
                    &mut children[(leaf_index >> height) & 1],
                    leaf_index,
                    height,
                    value,
                );
            }
            Node::Leaf { values, root } => {
                root.take();
                values.push(value);
            }
        },
    }
}

/// Binary tree of leaf buckets shared between clones.
pub(crate) struct Tree<T> {
    root: Option<Arc<Node<T>>>,
    len: usize,
    layout: Layout,
}

impl<T> Clone for Tree<T> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            len: self.len,
            layout: self.layout,
        }
    }
}

impl<T> Tree<T> {
    pub(crate) fn empty(layout: Layout) -> Self {
        Self {
            root: None,
            len: 0,
            layout,
        }
    }

    /// Builds the tree bottom-up. The caller guarantees `values` fits the layout.
    pub(crate) fn from_values(values: Vec<T>, layout: Layout) -> Self {
        let len = values.len();
        let mut nodes = Vec::with_capacity(len.div_ceil(layout.values_per_leaf));
        let mut values = values.into_iter().peekable();
        while values.peek().is_some() {
            let bucket = values.by_ref().take(layout.values_per_leaf).collect();
            nodes.push(Arc::new(Node::leaf(bucket)));
        }

        for _ in 0..layout.depth {
            if nodes.is_empty() {
                break;
            }
            let mut parents = Vec::with_capacity(nodes.len().div_ceil(2));
            let mut children = nodes.into_iter();
            while let Some(left) = children.next() {
                parents.push(Arc::new(Node::branch([Some(left), children.next()])));
            }
            nodes = parents;
        }

        Self {
            root: nodes.into_iter().next(),
            len,
            layout,
        }
    }

    /// A full tree where every element is `value`. All leaves share one allocation.
    pub(crate) fn repeat(value: T, count: usize, layout: Layout) -> Self
    where
        T: Clone,
    {
        if count != layout.capacity() {
            return Self::from_values(vec![value; count], layout);
        }
        let mut node = Arc::new(Node::leaf(vec![value; layout.values_per_leaf]));
        for _ in 0..layout.depth {
            node = Arc::new(Node::branch([Some(node.clone()), Some(node)]));
        }
        Self {
            root: Some(node),
            len: count,
            layout,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn layout(&self) -> Layout {
        self.layout
    }

    pub(crate) fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.root, &other.root) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub(crate) fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        let leaf_index = index / self.layout.values_per_leaf;
        let mut node = self.root.as_deref()?;
        for bit in (0..self.layout.depth).rev() {
            match node {
                Node::Branch { children, .. } => {
                    node = children[(leaf_index >> bit) & 1].as_deref()?;
                }
                Node::Leaf { .. } => return None,
            }
        }
        match node {
            Node::Leaf { values, .. } => values.get(index % self.layout.values_per_leaf),
            Node::Branch { .. } => None,
        }
    }

    pub(crate) fn get_mut(&mut self, index: usize) -> Option<&mut T>
    where
        T: Clone,
    {
        if index >= self.len {
            return None;
        }
        let leaf_index = index / self.layout.values_per_leaf;
        let offset = index % self.layout.values_per_leaf;
        get_mut(self.root.as_mut()?, leaf_index, self.layout.depth, offset)
    }

    /// Appends `value`. The caller guarantees the tree is below capacity.
    pub(crate) fn push(&mut self, value: T)
    where
        T: Clone,
    {
        let leaf_index = self.len / self.layout.values_per_leaf;
        insert(&mut self.root, leaf_index, self.layout.depth, value);
        self.len += 1;
    }

    pub(crate) fn iter(&self) -> Iter<'_, T> {
        Iter {
            stack: self.root.as_deref().into_iter().collect(),
            current: Default::default(),
            remaining: self.len,
        }
    }

    pub(crate) fn root(&self) -> B256
    where
        T: TreeHash,
    {
        match &self.root {
            Some(node) => node.root(self.layout, self.layout.depth),
            None => zero_hash(self.layout.leaf_depth + self.layout.depth),
        }
    }
}

impl<T: PartialEq> PartialEq for Tree<T> {
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && (self.ptr_eq(other) || self.iter().eq(other.iter()))
    }
}

/// In-order iterator over the elements of a persistent collection.
pub struct Iter<'a, T> {
    stack: Vec<&'a Node<T>>,
    current: std::slice::Iter<'a, T>,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(value) = self.current.next() {
                self.remaining -= 1;
                return Some(value);
            }
            match self.stack.pop()? {
                Node::Branch { children, .. } => {
                    for child in children.iter().rev().flatten() {
                        self.stack.push(child.as_ref());
                    }
                }
                Node::Leaf { values, .. } => self.current = values.iter(),
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_packs_basic_values() {
        let layout = Layout::new::<u64>(8192);
        assert_eq!(layout.values_per_leaf, 32);
        assert_eq!(layout.leaf_chunks, 8);
        assert_eq!(layout.depth, 8);
        assert_eq!(layout.capacity(), 8192);

        let layout = Layout::new::<B256>(64);
        assert_eq!(layout.values_per_leaf, 8);
        assert_eq!(layout.depth, 3);
    }

    #[test]
    fn push_matches_bottom_up_build() {
        let layout = Layout::new::<u64>(1 << 20);
        let values: Vec<u64> = (0..1000).collect();

        let mut pushed = Tree::empty(layout);
        for value in &values {
            pushed.push(*value);
        }
        let built = Tree::from_values(values, layout);

        assert_eq!(pushed.root(), built.root());
        assert!(pushed == built);
        assert_eq!(pushed.iter().len(), 1000);
        assert_eq!(pushed.get(999), Some(&999));
        assert_eq!(pushed.get(1000), None);
    }

    #[test]
    fn mutation_copies_only_the_touched_path() {
        let layout = Layout::new::<u64>(1024);
        let original = Tree::from_values((0..1024).collect::<Vec<u64>>(), layout);
        let original_root = original.root();

        let mut modified = original.clone();
        assert!(modified.ptr_eq(&original));
        if let Some(value) = modified.get_mut(5) {
            *value = 42;
        }

        assert!(!modified.ptr_eq(&original));
        assert_eq!(original.get(5), Some(&5));
        assert_eq!(modified.get(5), Some(&42));
        assert_eq!(original.root(), original_root);
        assert_ne!(modified.root(), original_root);
    }

    #[test]
    fn repeat_shares_leaves() {
        let layout = Layout::new::<B256>(64);
        let shared = Tree::repeat(B256::ZERO, 64, layout);
        let built = Tree::from_values(vec![B256::ZERO; 64], layout);
        assert_eq!(shared.root(), built.root());
        assert_eq!(shared.root(), zero_hash(6));
    }
}
