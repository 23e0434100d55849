//! Tree queries
//!
//! Range, prefix and order-statistics traversals. Each one prunes using
//! key comparisons or cached subtree sizes and collects into a `BTreeMap`,
//! so results come back in ascending key order whatever the visit order.

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::error::{Result, TreapError};
use crate::storage::{BlockStore, Slot};

use super::Treap;

impl<K, V, S> Treap<K, V, S>
where
    K: Ord + Clone + Debug,
    V: Clone,
    S: BlockStore<K, V>,
{
    /// Entries with `start <= key < end`, at most `limit` of them
    ///
    /// Qualifying nodes are visited largest key first, so a truncated
    /// result holds the greatest keys of the range.
    pub fn range(&self, start: &K, end: &K, limit: usize) -> Result<BTreeMap<K, V>> {
        if start >= end {
            return Err(TreapError::InvalidRange {
                start: format!("{:?}", start),
                end: format!("{:?}", end),
            });
        }

        let mut out = BTreeMap::new();
        let root = self.store().read_header()?.root;
        self.collect_range(root, start, end, limit, &mut out)?;
        Ok(out)
    }

    fn collect_range(
        &self,
        slot: Option<Slot>,
        start: &K,
        end: &K,
        limit: usize,
        out: &mut BTreeMap<K, V>,
    ) -> Result<()> {
        let Some(slot) = slot else {
            return Ok(());
        };
        if out.len() >= limit {
            return Ok(());
        }

        let node = self.store().read_node(slot, true)?;
        let after_start = node.key >= *start;
        let before_end = node.key < *end;

        if after_start && before_end {
            self.collect_range(node.right, start, end, limit, out)?;
            if out.len() >= limit {
                return Ok(());
            }
            let value = node.value.ok_or_else(|| missing_value(slot))?;
            out.insert(node.key, value);
            self.collect_range(node.left, start, end, limit, out)?;
        } else if !after_start {
            self.collect_range(node.right, start, end, limit, out)?;
        } else {
            self.collect_range(node.left, start, end, limit, out)?;
        }
        Ok(())
    }

    /// The `k` smallest entries (`k` is clamped to the number of slots)
    pub fn kmin(&self, k: u64) -> Result<BTreeMap<K, V>> {
        let header = self.store().read_header()?;
        let mut out = BTreeMap::new();
        self.collect_kmin(header.root, k.min(header.size), &mut out)?;
        Ok(out)
    }

    fn collect_kmin(&self, slot: Option<Slot>, k: u64, out: &mut BTreeMap<K, V>) -> Result<()> {
        let Some(slot) = slot else {
            return Ok(());
        };
        if k == 0 {
            return Ok(());
        }

        let node = self.store().read_node(slot, true)?;
        if k <= node.left_size {
            return self.collect_kmin(node.left, k, out);
        }

        self.collect_kmin(node.left, node.left_size, out)?;
        let remaining = k - node.left_size - 1;
        let value = node.value.ok_or_else(|| missing_value(slot))?;
        out.insert(node.key, value);
        if remaining > 0 {
            self.collect_kmin(node.right, remaining, out)?;
        }
        Ok(())
    }

    /// The `k` largest entries (`k` is clamped to the number of slots)
    pub fn kmax(&self, k: u64) -> Result<BTreeMap<K, V>> {
        let header = self.store().read_header()?;
        let mut out = BTreeMap::new();
        self.collect_kmax(header.root, k.min(header.size), &mut out)?;
        Ok(out)
    }

    fn collect_kmax(&self, slot: Option<Slot>, k: u64, out: &mut BTreeMap<K, V>) -> Result<()> {
        let Some(slot) = slot else {
            return Ok(());
        };
        if k == 0 {
            return Ok(());
        }

        let node = self.store().read_node(slot, true)?;
        if k <= node.right_size {
            return self.collect_kmax(node.right, k, out);
        }

        self.collect_kmax(node.right, node.right_size, out)?;
        let remaining = k - node.right_size - 1;
        let value = node.value.ok_or_else(|| missing_value(slot))?;
        out.insert(node.key, value);
        if remaining > 0 {
            self.collect_kmax(node.left, remaining, out)?;
        }
        Ok(())
    }
}

impl<K, V, S> Treap<K, V, S>
where
    K: Ord + Clone + Debug + AsRef<str>,
    V: Clone,
    S: BlockStore<K, V>,
{
    /// Entries whose key starts with `prefix`, smallest first, at most `limit`
    pub fn prefix(&self, prefix: &K, limit: usize) -> Result<BTreeMap<K, V>> {
        let mut out = BTreeMap::new();
        let root = self.store().read_header()?.root;
        self.collect_prefix(root, prefix, limit, &mut out)?;
        Ok(out)
    }

    fn collect_prefix(
        &self,
        slot: Option<Slot>,
        prefix: &K,
        limit: usize,
        out: &mut BTreeMap<K, V>,
    ) -> Result<()> {
        let Some(slot) = slot else {
            return Ok(());
        };
        if out.len() >= limit {
            return Ok(());
        }

        let node = self.store().read_node(slot, true)?;
        if *prefix > node.key {
            // Every smaller key also sorts before the prefix
            return self.collect_prefix(node.right, prefix, limit, out);
        }

        if !node.key.as_ref().starts_with(prefix.as_ref()) {
            return self.collect_prefix(node.left, prefix, limit, out);
        }

        self.collect_prefix(node.left, prefix, limit, out)?;
        if out.len() >= limit {
            return Ok(());
        }
        let value = node.value.ok_or_else(|| missing_value(slot))?;
        out.insert(node.key, value);
        self.collect_prefix(node.right, prefix, limit, out)
    }
}

fn missing_value(slot: Slot) -> TreapError {
    TreapError::Corruption(format!("node at slot {} was read without its value", slot))
}
