//! In-memory Block Store
//!
//! Growable vector of slots. Used by tests and benchmarks, and for
//! throwaway trees that never need to outlive the process.

use crate::error::{Result, TreapError};

use super::{BlockStore, Header, Node, Slot};

/// Block store backed by a `Vec`
pub struct MemoryBlockStore<K, V> {
    header: Header,
    slots: Vec<Node<K, V>>,
    closed: bool,
}

impl<K, V> MemoryBlockStore<K, V> {
    pub fn new() -> Self {
        Self {
            header: Header::default(),
            slots: Vec::new(),
            closed: false,
        }
    }

    /// Number of slots written so far
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            Err(TreapError::Closed)
        } else {
            Ok(())
        }
    }
}

impl<K, V> Default for MemoryBlockStore<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> BlockStore<K, V> for MemoryBlockStore<K, V>
where
    K: Clone + Send + Sync,
    V: Clone + Send + Sync,
{
    fn read_header(&self) -> Result<Header> {
        self.check_open()?;
        Ok(self.header)
    }

    fn write_header(&mut self, header: &Header) -> Result<()> {
        self.check_open()?;
        self.header = *header;
        Ok(())
    }

    fn read_node(&self, slot: Slot, include_value: bool) -> Result<Node<K, V>> {
        self.check_open()?;
        let stored = self
            .slots
            .get(slot as usize)
            .ok_or_else(|| TreapError::Corruption(format!("slot {} was never written", slot)))?;

        Ok(Node {
            key: stored.key.clone(),
            value: if include_value {
                stored.value.clone()
            } else {
                None
            },
            priority: stored.priority,
            left: stored.left,
            right: stored.right,
            left_size: stored.left_size,
            right_size: stored.right_size,
        })
    }

    fn write_node(&mut self, slot: Slot, node: &Node<K, V>, include_value: bool) -> Result<()> {
        self.check_open()?;
        let index = slot as usize;

        if include_value && node.value.is_none() {
            return Err(TreapError::Serialization(format!(
                "node for slot {} carries no value",
                slot
            )));
        }

        if index == self.slots.len() {
            if !include_value {
                return Err(TreapError::Serialization(format!(
                    "new slot {} must be written with its value",
                    slot
                )));
            }
            self.slots.push(node.clone());
            return Ok(());
        }

        let stored = self.slots.get_mut(index).ok_or_else(|| {
            TreapError::Corruption(format!("slot {} skips past the end of the store", slot))
        })?;

        let value = if include_value {
            node.value.clone()
        } else {
            stored.value.take()
        };
        *stored = Node {
            value,
            ..node.clone()
        };
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}
