//! File Block Store
//!
//! Fixed-stride node records in a single index file.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TreapError};

use super::{decode_slot, encode_slot, BlockStore, Header, Node, Slot};

/// Magic bytes identifying a TreapDB index file
const MAGIC: &[u8; 4] = b"TRDB";

/// Current index format version
const VERSION: u16 = 1;

/// Bytes reserved for the header before slot 0
pub(crate) const HEADER_REGION: u64 = 64;

/// Encoded header: Magic (4) + Version (2) + BlockSize (4) + Root (8) + Size (8)
const HEADER_BODY: usize = 26;

/// Record prefix: MetaLen (4) + ValueLen (4)
const RECORD_PREFIX: usize = 8;

/// Smallest block that can hold a prefix and a minimal meta section
pub const MIN_BLOCK_SIZE: usize = 64;

/// Node fields other than the value, as laid out on disk
#[derive(Serialize)]
struct MetaRef<'a, K> {
    key: &'a K,
    priority: u32,
    left: u64,
    right: u64,
    left_size: u64,
    right_size: u64,
}

#[derive(Deserialize)]
struct Meta<K> {
    key: K,
    priority: u32,
    left: u64,
    right: u64,
    left_size: u64,
    right_size: u64,
}

/// Block store over a single index file
///
/// Every record occupies exactly `block_size` bytes at
/// `HEADER_REGION + slot * block_size`. The file handle sits behind a mutex
/// because reads seek.
pub struct FileBlockStore<K, V> {
    path: PathBuf,

    /// `None` once closed
    file: Mutex<Option<File>>,

    block_size: usize,

    _marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> FileBlockStore<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    /// Open or create an index file
    ///
    /// A new (empty) file gets an empty header. An existing file must have
    /// been created with the same block size.
    pub fn open(path: &Path, block_size: usize) -> Result<Self> {
        if block_size < MIN_BLOCK_SIZE || block_size > u32::MAX as usize {
            return Err(TreapError::Config(format!(
                "block size {} out of range (min {})",
                block_size, MIN_BLOCK_SIZE
            )));
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        if file.metadata()?.len() == 0 {
            file.write_all(&encode_header(&Header::default(), block_size))?;
            file.sync_all()?;
            tracing::debug!("Created index file {}", path.display());
        } else {
            let mut region = [0u8; HEADER_REGION as usize];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut region)?;
            let (header, stored_block_size) = decode_header(&region)?;
            if stored_block_size != block_size {
                return Err(TreapError::Config(format!(
                    "index file {} uses block size {}, requested {}",
                    path.display(),
                    stored_block_size,
                    block_size
                )));
            }
            tracing::debug!(
                "Opened index file {} (root={:?}, slots={})",
                path.display(),
                header.root,
                header.size
            );
        }

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(Some(file)),
            block_size,
            _marker: PhantomData,
        })
    }

    /// Path of the index file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Size of one node record
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn slot_offset(&self, slot: Slot) -> u64 {
        HEADER_REGION + slot * self.block_size as u64
    }

    fn with_file<T>(&self, f: impl FnOnce(&mut File) -> Result<T>) -> Result<T> {
        let mut guard = self.file.lock();
        let file = guard.as_mut().ok_or(TreapError::Closed)?;
        f(file)
    }

    fn read_block(&self, slot: Slot) -> Result<Vec<u8>> {
        let offset = self.slot_offset(slot);
        let mut block = vec![0u8; self.block_size];
        self.with_file(|file| {
            file.seek(SeekFrom::Start(offset))?;
            file.read_exact(&mut block).map_err(|e| {
                if e.kind() == ErrorKind::UnexpectedEof {
                    TreapError::Corruption(format!("slot {} lies beyond the end of the index", slot))
                } else {
                    TreapError::Io(e)
                }
            })
        })?;
        Ok(block)
    }

    fn write_at(&self, offset: u64, bytes: &[u8]) -> Result<()> {
        self.with_file(|file| {
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(bytes)?;
            Ok(())
        })
    }

    /// Assemble a full padded record
    fn build_record(&self, meta: &[u8], value: &[u8]) -> Result<Vec<u8>> {
        let needed = RECORD_PREFIX + meta.len() + value.len();
        if needed > self.block_size {
            return Err(TreapError::RecordTooLarge {
                needed,
                block_size: self.block_size,
            });
        }

        let mut record = vec![0u8; self.block_size];
        record[0..4].copy_from_slice(&(meta.len() as u32).to_le_bytes());
        record[4..8].copy_from_slice(&(value.len() as u32).to_le_bytes());
        record[RECORD_PREFIX..RECORD_PREFIX + meta.len()].copy_from_slice(meta);
        record[RECORD_PREFIX + meta.len()..needed].copy_from_slice(value);
        Ok(record)
    }

    /// Split a record into its meta and value sections
    fn split_record<'a>(&self, slot: Slot, block: &'a [u8]) -> Result<(&'a [u8], &'a [u8])> {
        let meta_len = le_u32(block, 0) as usize;
        let value_len = le_u32(block, 4) as usize;
        let end = RECORD_PREFIX + meta_len + value_len;
        if meta_len == 0 || end > block.len() {
            return Err(TreapError::Corruption(format!(
                "slot {} has invalid record lengths (meta={}, value={})",
                slot, meta_len, value_len
            )));
        }
        Ok((
            &block[RECORD_PREFIX..RECORD_PREFIX + meta_len],
            &block[RECORD_PREFIX + meta_len..end],
        ))
    }
}

impl<K, V> BlockStore<K, V> for FileBlockStore<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    fn read_header(&self) -> Result<Header> {
        let mut region = [0u8; HEADER_REGION as usize];
        self.with_file(|file| {
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut region)?;
            Ok(())
        })?;
        let (header, _) = decode_header(&region)?;
        Ok(header)
    }

    fn write_header(&mut self, header: &Header) -> Result<()> {
        let region = encode_header(header, self.block_size);
        self.write_at(0, &region)
    }

    fn read_node(&self, slot: Slot, include_value: bool) -> Result<Node<K, V>> {
        let block = self.read_block(slot)?;
        let (meta_bytes, value_bytes) = self.split_record(slot, &block)?;

        let meta: Meta<K> = bincode::deserialize(meta_bytes)?;
        let value = if include_value {
            Some(bincode::deserialize(value_bytes)?)
        } else {
            None
        };

        Ok(Node {
            key: meta.key,
            value,
            priority: meta.priority,
            left: decode_slot(meta.left),
            right: decode_slot(meta.right),
            left_size: meta.left_size,
            right_size: meta.right_size,
        })
    }

    fn write_node(&mut self, slot: Slot, node: &Node<K, V>, include_value: bool) -> Result<()> {
        let meta = bincode::serialize(&MetaRef {
            key: &node.key,
            priority: node.priority,
            left: encode_slot(node.left),
            right: encode_slot(node.right),
            left_size: node.left_size,
            right_size: node.right_size,
        })?;
        let offset = self.slot_offset(slot);

        if include_value {
            let value = node.value.as_ref().ok_or_else(|| {
                TreapError::Serialization(format!("node for slot {} carries no value", slot))
            })?;
            let value = bincode::serialize(value)?;
            let record = self.build_record(&meta, &value)?;
            return self.write_at(offset, &record);
        }

        // Metadata-only update: keep whatever value is already stored
        let block = self.read_block(slot)?;
        let (old_meta, old_value) = self.split_record(slot, &block)?;
        if old_meta.len() == meta.len() {
            self.write_at(offset + RECORD_PREFIX as u64, &meta)
        } else {
            let record = self.build_record(&meta, old_value)?;
            self.write_at(offset, &record)
        }
    }

    fn close(&mut self) -> Result<()> {
        if let Some(file) = self.file.lock().take() {
            file.sync_all()?;
            tracing::debug!("Closed index file {}", self.path.display());
        }
        Ok(())
    }
}

impl<K, V> Drop for FileBlockStore<K, V> {
    fn drop(&mut self) {
        if let Some(file) = self.file.get_mut().take() {
            let _ = file.sync_all();
        }
    }
}

// =============================================================================
// Header Encoding
// =============================================================================

fn encode_header(header: &Header, block_size: usize) -> [u8; HEADER_REGION as usize] {
    let mut region = [0u8; HEADER_REGION as usize];
    region[0..4].copy_from_slice(MAGIC);
    region[4..6].copy_from_slice(&VERSION.to_le_bytes());
    region[6..10].copy_from_slice(&(block_size as u32).to_le_bytes());
    region[10..18].copy_from_slice(&encode_slot(header.root).to_le_bytes());
    region[18..26].copy_from_slice(&header.size.to_le_bytes());
    let crc = crc32fast::hash(&region[..HEADER_BODY]);
    region[HEADER_BODY..HEADER_BODY + 4].copy_from_slice(&crc.to_le_bytes());
    region
}

fn decode_header(region: &[u8]) -> Result<(Header, usize)> {
    if &region[0..4] != MAGIC {
        return Err(TreapError::Corruption(format!(
            "Invalid index magic: expected TRDB, got {:?}",
            &region[0..4]
        )));
    }

    let version = u16::from_le_bytes([region[4], region[5]]);
    if version != VERSION {
        return Err(TreapError::Corruption(format!(
            "Unsupported index version: {}",
            version
        )));
    }

    let stored_crc = le_u32(region, HEADER_BODY);
    let crc = crc32fast::hash(&region[..HEADER_BODY]);
    if stored_crc != crc {
        return Err(TreapError::Corruption(format!(
            "Header checksum mismatch: stored {:08x}, computed {:08x}",
            stored_crc, crc
        )));
    }

    let block_size = le_u32(region, 6) as usize;
    let header = Header {
        root: decode_slot(le_u64(region, 10)),
        size: le_u64(region, 18),
    };
    Ok((header, block_size))
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    let mut raw = [0u8; 4];
    raw.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(raw)
}

fn le_u64(bytes: &[u8], at: usize) -> u64 {
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&bytes[at..at + 8]);
    u64::from_le_bytes(raw)
}
