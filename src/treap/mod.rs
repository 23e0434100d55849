//! Treap Module
//!
//! A randomized balanced binary search tree whose nodes live in block store
//! slots rather than in memory.
//!
//! ## Responsibilities
//! - Insert with rotations driven by node priorities (min-heap)
//! - Maintain per-node subtree sizes incrementally
//! - Point lookup by key descent
//! - Range, prefix and order-statistics traversals (see `query`)
//!
//! ## Invariants
//! - BST: left subtree keys < node key < right subtree keys
//! - Heap: a node's priority is <= the priority of each child
//! - Size: `left_size`/`right_size` count the nodes under each child
//! - A slot, once allocated, is never moved or reused
//!
//! Nodes reference children by slot index. Every node touched on an
//! insertion path is written back immediately.

mod priority;
mod query;

pub use priority::{PriorityGenerator, RandomPriority, SequencePriority};

use std::cmp::Ordering;
use std::fmt::Debug;
use std::marker::PhantomData;

use crate::error::{Result, TreapError};
use crate::storage::{BlockStore, Header, Node, Slot};

/// Tree algorithms over a block store
pub struct Treap<K, V, S> {
    store: S,
    priorities: Box<dyn PriorityGenerator>,
    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V, S> Treap<K, V, S>
where
    K: Ord + Clone + Debug,
    V: Clone,
    S: BlockStore<K, V>,
{
    pub fn new(store: S, priorities: Box<dyn PriorityGenerator>) -> Self {
        Self {
            store,
            priorities,
            _marker: PhantomData,
        }
    }

    /// Access the underlying store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current header
    pub fn header(&self) -> Result<Header> {
        self.store.read_header()
    }

    /// Insert or update `key`
    ///
    /// The header is read before the descent and re-read afterwards, since
    /// node allocation bumps the slot count during the descent.
    pub fn put(&mut self, key: K, value: V) -> Result<()> {
        let header = self.store.read_header()?;
        let root = self.insert(header.root, key, value)?;

        let mut header = self.store.read_header()?;
        header.root = Some(root);
        self.store.write_header(&header)
    }

    /// Look up the value stored for `key`
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        let header = self.store.read_header()?;
        match self.find(header.root, key)? {
            Some(slot) => Ok(self.store.read_node(slot, true)?.value),
            None => Ok(None),
        }
    }

    /// Number of entries, read from the root's cached subtree sizes
    pub fn length(&self) -> Result<u64> {
        match self.store.read_header()?.root {
            Some(root) => Ok(self.store.read_node(root, false)?.subtree_size()),
            None => Ok(0),
        }
    }

    /// Insert into the subtree rooted at `slot`, returning the new subtree root
    pub fn insert(&mut self, slot: Option<Slot>, key: K, value: V) -> Result<Slot> {
        let Some(slot) = slot else {
            return self.allocate(key, value);
        };

        let mut node = self.store.read_node(slot, false)?;
        match key.cmp(&node.key) {
            Ordering::Equal => {
                node.value = Some(value);
                self.store.write_node(slot, &node, true)?;
                Ok(slot)
            }
            Ordering::Less => {
                let child_slot = self.insert(node.left, key, value)?;
                let child = self.store.read_node(child_slot, false)?;
                node.left = Some(child_slot);
                node.left_size = child.subtree_size();
                self.store.write_node(slot, &node, false)?;

                if child.priority < node.priority {
                    self.rotate_right(slot)
                } else {
                    Ok(slot)
                }
            }
            Ordering::Greater => {
                let child_slot = self.insert(node.right, key, value)?;
                let child = self.store.read_node(child_slot, false)?;
                node.right = Some(child_slot);
                node.right_size = child.subtree_size();
                self.store.write_node(slot, &node, false)?;

                if child.priority < node.priority {
                    self.rotate_left(slot)
                } else {
                    Ok(slot)
                }
            }
        }
    }

    /// Write a new leaf at the next free slot
    fn allocate(&mut self, key: K, value: V) -> Result<Slot> {
        let mut header = self.store.read_header()?;
        let slot = header.size;
        let node = Node::new(key, value, self.priorities.next_priority());

        self.store.write_node(slot, &node, true)?;
        header.size += 1;
        self.store.write_header(&header)?;

        tracing::trace!("Allocated slot {} (priority {})", slot, node.priority);
        Ok(slot)
    }

    /// Promote the right child of `slot`, returning the child's slot
    pub fn rotate_left(&mut self, slot: Slot) -> Result<Slot> {
        let mut x = self.store.read_node(slot, false)?;
        let y_slot = x.right.ok_or_else(|| {
            TreapError::Corruption(format!("rotate_left on slot {} without right child", slot))
        })?;
        let mut y = self.store.read_node(y_slot, false)?;

        x.right = y.left;
        x.right_size = y.left_size;
        y.left = Some(slot);
        y.left_size += x.left_size + 1;

        self.store.write_node(slot, &x, false)?;
        self.store.write_node(y_slot, &y, false)?;
        Ok(y_slot)
    }

    /// Promote the left child of `slot`, returning the child's slot
    pub fn rotate_right(&mut self, slot: Slot) -> Result<Slot> {
        let mut x = self.store.read_node(slot, false)?;
        let y_slot = x.left.ok_or_else(|| {
            TreapError::Corruption(format!("rotate_right on slot {} without left child", slot))
        })?;
        let mut y = self.store.read_node(y_slot, false)?;

        x.left = y.right;
        x.left_size = y.right_size;
        y.right = Some(slot);
        y.right_size += x.right_size + 1;

        self.store.write_node(slot, &x, false)?;
        self.store.write_node(y_slot, &y, false)?;
        Ok(y_slot)
    }

    /// Slot holding `key` within the subtree at `slot`
    pub fn find(&self, mut slot: Option<Slot>, key: &K) -> Result<Option<Slot>> {
        while let Some(current) = slot {
            let node = self.store.read_node(current, false)?;
            slot = match key.cmp(&node.key) {
                Ordering::Equal => return Ok(Some(current)),
                Ordering::Less => node.left,
                Ordering::Greater => node.right,
            };
        }
        Ok(None)
    }

    /// Walk the whole tree and verify the BST, heap and size invariants
    ///
    /// Returns the number of reachable nodes. Intended for tests and offline
    /// checks; it reads every slot.
    pub fn check_invariants(&self) -> Result<u64> {
        let header = self.store.read_header()?;
        let count = self.check_subtree(header.root, None, None, None)?;
        if count > header.size {
            return Err(TreapError::Corruption(format!(
                "{} reachable nodes but only {} slots allocated",
                count, header.size
            )));
        }
        Ok(count)
    }

    fn check_subtree(
        &self,
        slot: Option<Slot>,
        lower: Option<&K>,
        upper: Option<&K>,
        parent_priority: Option<u32>,
    ) -> Result<u64> {
        let Some(slot) = slot else {
            return Ok(0);
        };
        let node = self.store.read_node(slot, false)?;

        if lower.is_some_and(|low| node.key <= *low) || upper.is_some_and(|high| node.key >= *high) {
            return Err(TreapError::Corruption(format!(
                "slot {} key {:?} violates search order",
                slot, node.key
            )));
        }
        if parent_priority.is_some_and(|p| node.priority < p) {
            return Err(TreapError::Corruption(format!(
                "slot {} priority {} is below its parent's",
                slot, node.priority
            )));
        }

        let left = self.check_subtree(node.left, lower, Some(&node.key), Some(node.priority))?;
        let right = self.check_subtree(node.right, Some(&node.key), upper, Some(node.priority))?;
        if left != node.left_size || right != node.right_size {
            return Err(TreapError::Corruption(format!(
                "slot {} records sizes ({}, {}) but subtrees hold ({}, {})",
                slot, node.left_size, node.right_size, left, right
            )));
        }
        Ok(left + right + 1)
    }

    /// Close the underlying store
    pub fn close(&mut self) -> Result<()> {
        self.store.close()
    }
}
