//! The block store: every byte of packet data and every list node.

use crate::config::StoreConfig;
use crate::error::{AllocError, Resource};
use crate::handle::{BlockId, HandleTable};
use crate::list::{ListEntry, ListHeader};

/// One allocation in the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Block {
    /// Raw bytes: a packet, the cells of an array, a dense list run or a
    /// string.
    Data(Vec<u8>),
    /// Header of a linked list.
    List(ListHeader),
    /// One fragmented list entry.
    Entry(ListEntry),
}

/// Allocation counters of a [`Store`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Blocks currently live.
    pub live_blocks: usize,
    /// Bytes held by live data blocks.
    pub live_bytes: usize,
    /// Blocks ever inserted.
    pub blocks_allocated: u64,
    /// Blocks ever removed.
    pub blocks_freed: u64,
}

/// Slot + generation table of blocks with allocation counting and limits.
///
/// # Examples
///
/// ```
/// use gds_arena::{Store, StoreConfig};
///
/// let mut store = Store::new(StoreConfig::default());
/// let block = store.alloc_bytes(16, true).unwrap();
/// assert_eq!(store.bytes(block), Some(&[0u8; 16][..]));
/// assert!(store.free(block));
/// assert_eq!(store.bytes(block), None);
/// assert_eq!(store.stats().live_blocks, 0);
/// ```
pub struct Store {
    table: HandleTable<Block>,
    config: StoreConfig,
    stats: StoreStats,
    recycled: Vec<Vec<u8>>,
}

impl Store {
    /// Create an empty store.
    pub fn new(config: StoreConfig) -> Self {
        Self {
            table: HandleTable::new(),
            config,
            stats: StoreStats::default(),
            recycled: Vec::new(),
        }
    }

    /// The limits this store enforces.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Current allocation counters.
    pub fn stats(&self) -> StoreStats {
        self.stats
    }

    /// Number of live blocks.
    pub fn live_blocks(&self) -> usize {
        self.table.len()
    }

    /// Bytes held by live data blocks.
    pub fn live_bytes(&self) -> usize {
        self.stats.live_bytes
    }

    /// Whether `id` names a live block.
    pub fn contains(&self, id: BlockId) -> bool {
        self.table.get(id).is_some()
    }

    /// Allocate a data block of `len` bytes.
    ///
    /// With `clear` the block is zero-filled. Without it the block may be a
    /// recycled buffer whose bytes are initialised but unspecified.
    pub fn alloc_bytes(&mut self, len: usize, clear: bool) -> Result<BlockId, AllocError> {
        self.reserve(len)?;
        let recycled = if clear {
            None
        } else {
            self.recycled.iter().position(|b| b.capacity() >= len)
        };
        let buf = match recycled {
            Some(i) => {
                let mut buf = self.recycled.swap_remove(i);
                buf.resize(len, 0);
                buf
            }
            None => zeroed(len)?,
        };
        self.stats.live_bytes += len;
        Ok(self.insert(Block::Data(buf)))
    }

    /// Allocate an empty list header.
    pub fn alloc_list_header(&mut self) -> Result<BlockId, AllocError> {
        self.reserve(0)?;
        Ok(self.insert(Block::List(ListHeader::default())))
    }

    /// Allocate a list entry node.
    pub fn alloc_entry(&mut self, entry: ListEntry) -> Result<BlockId, AllocError> {
        self.reserve(0)?;
        Ok(self.insert(Block::Entry(entry)))
    }

    /// Free one block. Returns `false` for null, stale or unknown handles.
    ///
    /// Only the block itself is released; blocks it refers to are the
    /// caller's concern (see [`deallocate`](crate::deallocate)).
    pub fn free(&mut self, id: BlockId) -> bool {
        if id.is_null() {
            return false;
        }
        let Some(block) = self.table.remove(id) else {
            tracing::trace!(%id, "free of stale block ignored");
            return false;
        };
        self.stats.blocks_freed += 1;
        self.stats.live_blocks = self.table.len();
        if let Block::Data(buf) = block {
            self.stats.live_bytes -= buf.len();
            if self.recycled.len() < self.config.recycle_limit && buf.capacity() > 0 {
                self.recycled.push(buf);
            }
        }
        true
    }

    /// The block behind `id`.
    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.table.get(id)
    }

    /// Bytes of a data block.
    pub fn bytes(&self, id: BlockId) -> Option<&[u8]> {
        match self.table.get(id)? {
            Block::Data(buf) => Some(buf),
            _ => None,
        }
    }

    /// Mutable bytes of a data block.
    pub fn bytes_mut(&mut self, id: BlockId) -> Option<&mut [u8]> {
        match self.table.get_mut(id)? {
            Block::Data(buf) => Some(buf),
            _ => None,
        }
    }

    /// A list header.
    pub fn list_header(&self, id: BlockId) -> Option<&ListHeader> {
        match self.table.get(id)? {
            Block::List(header) => Some(header),
            _ => None,
        }
    }

    /// A mutable list header.
    pub fn list_header_mut(&mut self, id: BlockId) -> Option<&mut ListHeader> {
        match self.table.get_mut(id)? {
            Block::List(header) => Some(header),
            _ => None,
        }
    }

    /// A list entry.
    pub fn entry(&self, id: BlockId) -> Option<&ListEntry> {
        match self.table.get(id)? {
            Block::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    /// A mutable list entry.
    pub fn entry_mut(&mut self, id: BlockId) -> Option<&mut ListEntry> {
        match self.table.get_mut(id)? {
            Block::Entry(entry) => Some(entry),
            _ => None,
        }
    }

    /// Read the handle stored at `offset` in data block `id`.
    ///
    /// Returns null if the block is gone.
    pub fn read_handle(&self, id: BlockId, offset: usize) -> BlockId {
        self.bytes(id)
            .map_or(BlockId::NULL, |bytes| BlockId::read_from(&bytes[offset..]))
    }

    /// Store `handle` at `offset` in data block `id`.
    pub fn write_handle(
        &mut self,
        id: BlockId,
        offset: usize,
        handle: BlockId,
    ) -> Result<(), AllocError> {
        let bytes = self
            .bytes_mut(id)
            .ok_or(AllocError::InvalidHandle { handle: id })?;
        handle.write_to(&mut bytes[offset..]);
        Ok(())
    }

    fn reserve(&self, bytes: usize) -> Result<(), AllocError> {
        let live = self.table.len();
        if live >= self.config.max_blocks {
            tracing::debug!(live, limit = self.config.max_blocks, "block limit reached");
            return Err(AllocError::CapacityExceeded {
                resource: Resource::Blocks,
                requested: live + 1,
                capacity: self.config.max_blocks,
            });
        }
        let wanted = self.stats.live_bytes.saturating_add(bytes);
        if wanted > self.config.max_bytes {
            tracing::debug!(wanted, limit = self.config.max_bytes, "byte limit reached");
            return Err(AllocError::CapacityExceeded {
                resource: Resource::Bytes,
                requested: bytes,
                capacity: self.config.max_bytes,
            });
        }
        Ok(())
    }

    fn insert(&mut self, block: Block) -> BlockId {
        let id = self.table.insert(block);
        self.stats.blocks_allocated += 1;
        self.stats.live_blocks = self.table.len();
        id
    }
}

/// A zero-filled buffer, or `Exhausted` if the allocator refuses.
fn zeroed(len: usize) -> Result<Vec<u8>, AllocError> {
    let mut buf = Vec::new();
    if buf.try_reserve_exact(len).is_err() {
        tracing::debug!(len, "allocator refused data block");
        return Err(AllocError::Exhausted { requested: len });
    }
    buf.resize(len, 0);
    Ok(buf)
}

impl Default for Store {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}
