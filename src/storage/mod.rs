//! Storage Module
//!
//! Slot-addressed persistence for treap nodes.
//!
//! ## Responsibilities
//! - Persist the singleton header (root slot, allocated slot count)
//! - Persist fixed-size node records addressed by slot index
//! - Allow metadata-only reads/writes that skip the value payload
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Header Region (64 bytes)                                     │
//! │   Magic "TRDB" (4) | Version u16 (2) | BlockSize u32 (4)     │
//! │   Root u64 (8) | Size u64 (8) | CRC32 (4) | zero padding     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Slot 0 (block_size bytes)                                    │
//! │   MetaLen u32 (4) | ValueLen u32 (4) | Meta | Value | pad    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ Slot 1 ...                                                   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//! An empty child or root is written as `u64::MAX`.

mod file;
mod memory;

pub use file::FileBlockStore;
pub use memory::MemoryBlockStore;

use crate::error::Result;

/// Index of a node record. Slots are appended and never reused.
pub type Slot = u64;

/// On-disk encoding of an empty slot reference
pub(crate) const NIL_SLOT: u64 = u64::MAX;

pub(crate) fn encode_slot(slot: Option<Slot>) -> u64 {
    slot.unwrap_or(NIL_SLOT)
}

pub(crate) fn decode_slot(raw: u64) -> Option<Slot> {
    (raw != NIL_SLOT).then_some(raw)
}

/// The singleton store header
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Header {
    /// Root of the tree, `None` while the tree is empty
    pub root: Option<Slot>,

    /// Number of slots ever allocated (also the next free slot)
    pub size: u64,
}

/// One treap node as stored in a slot
#[derive(Debug, Clone, PartialEq)]
pub struct Node<K, V> {
    pub key: K,

    /// `None` when the node was read without its value
    pub value: Option<V>,

    /// Heap priority; a parent's priority never exceeds its children's
    pub priority: u32,

    pub left: Option<Slot>,
    pub right: Option<Slot>,

    /// Number of nodes under `left`
    pub left_size: u64,

    /// Number of nodes under `right`
    pub right_size: u64,
}

impl<K, V> Node<K, V> {
    /// Create a detached leaf node
    pub fn new(key: K, value: V, priority: u32) -> Self {
        Self {
            key,
            value: Some(value),
            priority,
            left: None,
            right: None,
            left_size: 0,
            right_size: 0,
        }
    }

    /// Number of nodes in the subtree rooted here
    pub fn subtree_size(&self) -> u64 {
        self.left_size + self.right_size + 1
    }
}

/// Slot-addressed record storage consumed by the treap
///
/// ## Concurrency:
/// - Reads take `&self` and may run concurrently
/// - Writes take `&mut self`; callers serialize them behind the engine gate
pub trait BlockStore<K, V>: Send + Sync {
    /// Read the header record
    fn read_header(&self) -> Result<Header>;

    /// Replace the header record
    fn write_header(&mut self, header: &Header) -> Result<()>;

    /// Read the node in `slot`; the value is only decoded when `include_value` is set
    fn read_node(&self, slot: Slot, include_value: bool) -> Result<Node<K, V>>;

    /// Write the node in `slot`; without `include_value` the stored value is kept
    fn write_node(&mut self, slot: Slot, node: &Node<K, V>, include_value: bool) -> Result<()>;

    /// Release underlying resources. Calling it twice is a no-op.
    fn close(&mut self) -> Result<()>;
}
