//! Linked lists of packets.
//!
//! A list is a header block plus up to two kinds of storage: one dense
//! block of `contiguous_length` packets reserved up front, followed by a
//! doubly linked chain of fragmented entries appended one at a time. Every
//! link is a generation-checked [`BlockId`], so a freed node can never be
//! reached through a stale link.

use gds_core::{contract_violation, PacketDescriptor};

use crate::engine::{allocate, deallocate, fill_cells, release_cells};
use crate::error::AllocError;
use crate::handle::BlockId;
use crate::store::Store;

/// Header of a linked list.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListHeader {
    /// Total number of entries.
    pub length: usize,
    /// Entries served from the contiguous block.
    pub contiguous_length: usize,
    /// The dense block, or null.
    pub contiguous: BlockId,
    /// First fragmented entry, or null.
    pub first: BlockId,
    /// Last fragmented entry, or null.
    pub last: BlockId,
}

impl ListHeader {
    /// Entries held in fragments.
    pub fn fragmented_length(&self) -> usize {
        self.length - self.contiguous_length
    }
}

/// One fragmented list entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ListEntry {
    /// The entry's packet.
    pub data: BlockId,
    /// Previous entry, or null.
    pub prev: BlockId,
    /// Next entry, or null.
    pub next: BlockId,
}

/// Where one list packet lives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PacketLocation {
    /// Data block holding the packet.
    pub block: BlockId,
    /// Byte offset of the packet within the block.
    pub offset: usize,
}

/// Reserve one dense block of `length` packets for an empty list.
///
/// # Panics
///
/// Raises a [`ContractViolation`](gds_core::ContractViolation) if the list
/// already holds entries.
pub fn allocate_contiguous_list(
    store: &mut Store,
    entry: &PacketDescriptor,
    header: BlockId,
    length: usize,
    clear: bool,
    allocate_inner_arrays: bool,
) -> Result<(), AllocError> {
    let current = store
        .list_header(header)
        .ok_or(AllocError::InvalidHandle { handle: header })?
        .length;
    if current != 0 {
        contract_violation(
            "allocate_contiguous_list",
            format!("list {header} already holds {current} entries"),
        );
    }
    if length == 0 {
        return Ok(());
    }
    let bytes = length
        .checked_mul(entry.size())
        .ok_or(AllocError::SizeOverflow {
            count: length,
            size: entry.size(),
        })?;
    let data = store.alloc_bytes(bytes, clear)?;
    if let Err(e) = fill_cells(store, entry, data, length, clear, allocate_inner_arrays) {
        store.free(data);
        return Err(e);
    }
    if let Some(h) = store.list_header_mut(header) {
        h.contiguous = data;
        h.contiguous_length = length;
        h.length = length;
    }
    tracing::trace!(%header, length, "reserved contiguous list block");
    Ok(())
}

/// Append one fragmented entry and return its packet block.
pub fn list_append(
    store: &mut Store,
    entry: &PacketDescriptor,
    header: BlockId,
    clear: bool,
    allocate_inner_arrays: bool,
) -> Result<BlockId, AllocError> {
    let last = store
        .list_header(header)
        .ok_or(AllocError::InvalidHandle { handle: header })?
        .last;
    let data = allocate(store, entry, clear, allocate_inner_arrays)?;
    let node = match store.alloc_entry(ListEntry {
        data,
        prev: last,
        next: BlockId::NULL,
    }) {
        Ok(node) => node,
        Err(e) => {
            deallocate(store, entry, data);
            return Err(e);
        }
    };
    if let Some(prev) = store.entry_mut(last) {
        prev.next = node;
    }
    if let Some(h) = store.list_header_mut(header) {
        if h.first.is_null() {
            h.first = node;
        }
        h.last = node;
        h.length += 1;
    }
    Ok(data)
}

/// Number of entries, or `None` if `header` is not a live list.
pub fn list_len(store: &Store, header: BlockId) -> Option<usize> {
    store.list_header(header).map(|h| h.length)
}

/// Locations of every packet in list order: the contiguous block first,
/// then the fragments.
pub fn list_packets(
    store: &Store,
    entry: &PacketDescriptor,
    header: BlockId,
) -> Vec<PacketLocation> {
    let Some(h) = store.list_header(header) else {
        return Vec::new();
    };
    let size = entry.size();
    let mut out = Vec::with_capacity(h.length);
    out.extend((0..h.contiguous_length).map(|k| PacketLocation {
        block: h.contiguous,
        offset: k * size,
    }));
    let mut node = h.first;
    while let Some(e) = store.entry(node) {
        out.push(PacketLocation {
            block: e.data,
            offset: 0,
        });
        node = e.next;
    }
    out
}

/// Free every entry of the list and reset the header to empty.
///
/// The header block itself stays live.
pub fn list_delete(store: &mut Store, entry: &PacketDescriptor, header: BlockId) {
    let Some(h) = store.list_header(header).copied() else {
        return;
    };
    if store.contains(h.contiguous) {
        release_cells(store, entry, h.contiguous, h.contiguous_length);
        store.free(h.contiguous);
    }
    let mut node = h.first;
    while let Some(e) = store.entry(node).copied() {
        deallocate(store, entry, e.data);
        store.free(node);
        node = e.next;
    }
    if let Some(h) = store.list_header_mut(header) {
        *h = ListHeader::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use gds_core::{AtomicKind, ContractViolation, Value};
    use std::panic::{catch_unwind, AssertUnwindSafe};

    fn sample() -> PacketDescriptor {
        PacketDescriptor::builder()
            .atomic("t", AtomicKind::Double)
            .fstring("label", 4)
            .build()
            .unwrap()
    }

    #[test]
    fn append_links_in_order() {
        let mut store = Store::default();
        let p = PacketDescriptor::single("v", AtomicKind::Int);
        let header = store.alloc_list_header().unwrap();
        let blocks: Vec<BlockId> = (0..3)
            .map(|i| {
                let data = list_append(&mut store, &p, header, true, true).unwrap();
                AtomicKind::Int.write(store.bytes_mut(data).unwrap(), Value::Integer(i));
                data
            })
            .collect();
        assert_eq!(list_len(&store, header), Some(3));
        let locations = list_packets(&store, &p, header);
        let got: Vec<BlockId> = locations.iter().map(|l| l.block).collect();
        assert_eq!(got, blocks);
        let h = *store.list_header(header).unwrap();
        assert!(store.entry(h.first).unwrap().prev.is_null());
        assert!(store.entry(h.last).unwrap().next.is_null());
    }

    #[test]
    fn contiguous_then_fragments() {
        let mut store = Store::default();
        let p = sample();
        let header = store.alloc_list_header().unwrap();
        allocate_contiguous_list(&mut store, &p, header, 4, true, true).unwrap();
        list_append(&mut store, &p, header, true, true).unwrap();
        let h = *store.list_header(header).unwrap();
        assert_eq!(h.length, 5);
        assert_eq!(h.contiguous_length, 4);
        assert_eq!(h.fragmented_length(), 1);
        let locations = list_packets(&store, &p, header);
        assert_eq!(locations.len(), 5);
        assert_eq!(locations[3].offset, 3 * p.size());
        assert_eq!(locations[4].offset, 0);
    }

    #[test]
    fn contiguous_into_non_empty_list_is_a_contract_violation() {
        let mut store = Store::default();
        let p = sample();
        let header = store.alloc_list_header().unwrap();
        list_append(&mut store, &p, header, true, true).unwrap();
        let result = catch_unwind(AssertUnwindSafe(|| {
            allocate_contiguous_list(&mut store, &p, header, 2, true, true)
        }));
        let payload = result.unwrap_err();
        let violation = payload.downcast_ref::<ContractViolation>().unwrap();
        assert_eq!(violation.operation, "allocate_contiguous_list");
    }

    #[test]
    fn delete_frees_everything_but_the_header() {
        let mut store = Store::default();
        let p = sample();
        let header = store.alloc_list_header().unwrap();
        allocate_contiguous_list(&mut store, &p, header, 3, true, true).unwrap();
        for _ in 0..2 {
            list_append(&mut store, &p, header, false, true).unwrap();
        }
        list_delete(&mut store, &p, header);
        assert_eq!(store.live_blocks(), 1);
        assert_eq!(list_len(&store, header), Some(0));
        assert!(list_packets(&store, &p, header).is_empty());
    }

    #[test]
    fn failed_append_leaves_list_untouched() {
        // header + packet + label fits; the entry node does not
        let mut store = Store::new(StoreConfig::new().with_max_blocks(3));
        let p = sample();
        let header = store.alloc_list_header().unwrap();
        assert!(list_append(&mut store, &p, header, true, true).is_err());
        assert_eq!(store.live_blocks(), 1);
        assert_eq!(*store.list_header(header).unwrap(), ListHeader::default());
    }

    #[test]
    fn failed_contiguous_reservation_rolls_back() {
        let mut store = Store::new(StoreConfig::new().with_max_blocks(4));
        let p = sample();
        let header = store.alloc_list_header().unwrap();
        // block + 4 labels needs 5 more blocks
        assert!(allocate_contiguous_list(&mut store, &p, header, 4, true, true).is_err());
        assert_eq!(store.live_blocks(), 1);
        assert_eq!(list_len(&store, header), Some(0));
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn huge_contiguous_reservation_is_refused() {
        let mut store = Store::default();
        let p = PacketDescriptor::single("t", AtomicKind::Double);
        let header = store.alloc_list_header().unwrap();
        assert_eq!(
            allocate_contiguous_list(&mut store, &p, header, usize::MAX / 4, true, true),
            Err(AllocError::SizeOverflow {
                count: usize::MAX / 4,
                size: 8
            })
        );
        assert_eq!(
            allocate_contiguous_list(&mut store, &p, header, 1 << 60, true, true),
            Err(AllocError::Exhausted { requested: 1 << 63 })
        );
        assert_eq!(store.live_blocks(), 1);
        assert_eq!(list_len(&store, header), Some(0));
    }

    #[test]
    fn stale_header_is_rejected() {
        let mut store = Store::default();
        let p = sample();
        let header = store.alloc_list_header().unwrap();
        store.free(header);
        assert_eq!(
            list_append(&mut store, &p, header, true, true),
            Err(AllocError::InvalidHandle { handle: header })
        );
        assert_eq!(list_len(&store, header), None);
    }
}
