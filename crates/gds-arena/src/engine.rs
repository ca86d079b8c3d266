//! Recursive allocation and deallocation of packet trees.
//!
//! Handle slots are always nulled before children are built, even for
//! `clear = false` allocations, so a partially built packet can be
//! released at any point without reading garbage handles.

use gds_core::{ArrayDescriptor, ElementKind, PacketDescriptor};

use crate::error::AllocError;
use crate::handle::BlockId;
use crate::list;
use crate::store::Store;

/// Allocate one packet and everything beneath it.
///
/// For each element: atomics need nothing, fixed strings get a zeroed block
/// of their capacity, variable strings start null, arrays get their data
/// block plus every cell's contents, and lists get an empty header. With
/// `allocate_inner_arrays = false`, a nested array whose cells are purely
/// atomic is left null.
///
/// On failure every block built by this call has been freed again.
pub fn allocate(
    store: &mut Store,
    packet: &PacketDescriptor,
    clear: bool,
    allocate_inner_arrays: bool,
) -> Result<BlockId, AllocError> {
    let block = store.alloc_bytes(packet.size(), clear)?;
    if let Err(e) = fill_packet(store, packet, block, 0, clear, allocate_inner_arrays) {
        store.free(block);
        return Err(e);
    }
    tracing::trace!(%block, bytes = packet.size(), "allocated packet");
    Ok(block)
}

/// Allocate the data block of `array` and the contents of each cell.
///
/// Returns null when `allocate_inner_arrays` is false and the cell packet
/// is atomic-only. On failure every block built by this call has been freed.
pub fn alloc_array(
    store: &mut Store,
    array: &ArrayDescriptor,
    clear: bool,
    allocate_inner_arrays: bool,
) -> Result<BlockId, AllocError> {
    let cell = array.packet();
    if !allocate_inner_arrays && cell.is_atomic_only() {
        return Ok(BlockId::NULL);
    }
    let data = store.alloc_bytes(array.total_bytes(), clear)?;
    if let Err(e) = fill_cells(
        store,
        cell,
        data,
        array.cell_count(),
        clear,
        allocate_inner_arrays,
    ) {
        store.free(data);
        return Err(e);
    }
    Ok(data)
}

/// Free `block` and every block reachable from it.
///
/// Null handles anywhere in the tree are skipped, so partially built trees
/// are released cleanly. A null or stale `block` is a no-op.
pub fn deallocate(store: &mut Store, packet: &PacketDescriptor, block: BlockId) {
    if !store.contains(block) {
        return;
    }
    release_packet(store, packet, block, 0);
    store.free(block);
}

/// Build the contents of `count` packets laid end to end in `data`.
///
/// On failure the packets already built are released; `data` itself is
/// left for the caller.
pub(crate) fn fill_cells(
    store: &mut Store,
    packet: &PacketDescriptor,
    data: BlockId,
    count: usize,
    clear: bool,
    allocate_inner_arrays: bool,
) -> Result<(), AllocError> {
    if packet.is_atomic_only() {
        return Ok(());
    }
    let size = packet.size();
    for cell in 0..count {
        let built = fill_packet(store, packet, data, cell * size, clear, allocate_inner_arrays);
        if let Err(e) = built {
            for done in 0..cell {
                release_packet(store, packet, data, done * size);
            }
            return Err(e);
        }
    }
    Ok(())
}

/// Release the child blocks of `count` packets laid end to end in `data`.
pub(crate) fn release_cells(
    store: &mut Store,
    packet: &PacketDescriptor,
    data: BlockId,
    count: usize,
) {
    if packet.is_atomic_only() {
        return;
    }
    let size = packet.size();
    for cell in 0..count {
        release_packet(store, packet, data, cell * size);
    }
}

/// Build the child blocks of the packet stored at `base` in `block`.
fn fill_packet(
    store: &mut Store,
    packet: &PacketDescriptor,
    block: BlockId,
    base: usize,
    clear: bool,
    allocate_inner_arrays: bool,
) -> Result<(), AllocError> {
    if packet.is_atomic_only() {
        return Ok(());
    }
    for (_, element) in packet.elements() {
        if element.kind().holds_handle() {
            store.write_handle(block, base + element.offset(), BlockId::NULL)?;
        }
    }
    for (name, element) in packet.elements() {
        let kind = element.kind();
        let child = match kind {
            ElementKind::Atomic(_) | ElementKind::VString => continue,
            ElementKind::FString { max_len } => store.alloc_bytes(*max_len, true),
            ElementKind::Array(array) => alloc_array(store, array, clear, allocate_inner_arrays),
            ElementKind::List(_) => store.alloc_list_header(),
        };
        let written = child.and_then(|child| {
            store
                .write_handle(block, base + element.offset(), child)
                .inspect_err(|_| release_element(store, kind, child))
        });
        if let Err(e) = written {
            tracing::debug!(element = name, error = %e, "allocation failed, rolling back packet");
            release_packet(store, packet, block, base);
            return Err(e);
        }
    }
    Ok(())
}

/// Release every child block of the packet at `base` in `block` and null
/// the handles.
pub(crate) fn release_packet(
    store: &mut Store,
    packet: &PacketDescriptor,
    block: BlockId,
    base: usize,
) {
    if packet.is_atomic_only() {
        return;
    }
    for (_, element) in packet.elements() {
        let kind = element.kind();
        if !kind.holds_handle() {
            continue;
        }
        let offset = base + element.offset();
        let child = store.read_handle(block, offset);
        if child.is_null() {
            continue;
        }
        release_element(store, kind, child);
        if let Some(bytes) = store.bytes_mut(block) {
            BlockId::NULL.write_to(&mut bytes[offset..]);
        }
    }
}

fn release_element(store: &mut Store, kind: &ElementKind, child: BlockId) {
    match kind {
        ElementKind::Atomic(_) => {}
        ElementKind::VString | ElementKind::FString { .. } => {
            store.free(child);
        }
        ElementKind::Array(array) => {
            if store.contains(child) {
                release_cells(store, array.packet(), child, array.cell_count());
                store.free(child);
            }
        }
        ElementKind::List(entry) => {
            list::list_delete(store, entry, child);
            store.free(child);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use gds_core::{AtomicKind, Value};

    fn grid(lengths: &[usize], cell: PacketDescriptor) -> ArrayDescriptor {
        let names: Vec<String> = (0..lengths.len()).map(|d| format!("d{d}")).collect();
        let refs: Vec<&str> = names.iter().map(String::as_str).collect();
        ArrayDescriptor::from_shape(&refs, lengths, cell).unwrap()
    }

    fn nested_packet() -> PacketDescriptor {
        let cell = PacketDescriptor::builder()
            .atomic("flux", AtomicKind::Float)
            .fstring("tag", 8)
            .build()
            .unwrap();
        PacketDescriptor::builder()
            .atomic("id", AtomicKind::Int)
            .vstring("name")
            .array("cells", grid(&[2, 3], cell))
            .list("events", PacketDescriptor::single("t", AtomicKind::Double))
            .build()
            .unwrap()
    }

    #[test]
    fn atomic_packet_is_one_block() {
        let mut store = Store::default();
        let p = PacketDescriptor::single("x", AtomicKind::Double);
        let block = allocate(&mut store, &p, true, true).unwrap();
        assert_eq!(store.live_blocks(), 1);
        assert_eq!(store.bytes(block).unwrap().len(), 8);
        deallocate(&mut store, &p, block);
        assert_eq!(store.live_blocks(), 0);
    }

    #[test]
    fn nested_packet_block_count() {
        let mut store = Store::default();
        let p = nested_packet();
        let block = allocate(&mut store, &p, true, true).unwrap();
        // packet + array data + 6 fstrings + list header; vstring stays null
        assert_eq!(store.live_blocks(), 1 + 1 + 6 + 1);
        let name_offset = p.element("name").unwrap().offset();
        assert!(store.read_handle(block, name_offset).is_null());
        deallocate(&mut store, &p, block);
        assert_eq!(store.live_blocks(), 0);
        assert_eq!(store.live_bytes(), 0);
    }

    #[test]
    fn atomic_inner_arrays_can_be_skipped() {
        let mut store = Store::default();
        let inner = grid(&[4], PacketDescriptor::single("v", AtomicKind::Short));
        let p = PacketDescriptor::builder().array("a", inner).build().unwrap();
        let block = allocate(&mut store, &p, true, false).unwrap();
        assert!(store.read_handle(block, 0).is_null());
        assert_eq!(store.live_blocks(), 1);
        deallocate(&mut store, &p, block);

        let block = allocate(&mut store, &p, true, true).unwrap();
        assert!(!store.read_handle(block, 0).is_null());
        assert_eq!(store.live_blocks(), 2);
    }

    #[test]
    fn failure_rolls_back_everything() {
        let p = nested_packet();
        for limit in 0..9 {
            let mut store = Store::new(StoreConfig::new().with_max_blocks(limit));
            let err = allocate(&mut store, &p, true, true).unwrap_err();
            assert!(matches!(err, AllocError::CapacityExceeded { .. }));
            assert_eq!(store.live_blocks(), 0, "leak at limit {limit}");
            assert_eq!(store.live_bytes(), 0);
        }
        let mut store = Store::new(StoreConfig::new().with_max_blocks(9));
        assert!(allocate(&mut store, &p, true, true).is_ok());
    }

    #[test]
    fn rollback_preserves_existing_blocks() {
        let p = nested_packet();
        let mut store = Store::new(StoreConfig::new().with_max_blocks(12));
        let keep = allocate(&mut store, &p, true, true).unwrap();
        let before = store.live_blocks();
        assert!(allocate(&mut store, &p, true, true).is_err());
        assert_eq!(store.live_blocks(), before);
        assert!(store.contains(keep));
    }

    #[test]
    fn uncleared_allocation_never_inherits_stale_handles() {
        let p = nested_packet();
        let mut store = Store::default();
        let first = allocate(&mut store, &p, false, true).unwrap();
        deallocate(&mut store, &p, first);
        // recycled buffers still carry old handle bytes; they must be nulled
        let second = allocate(&mut store, &p, false, true).unwrap();
        let name_offset = p.element("name").unwrap().offset();
        assert!(store.read_handle(second, name_offset).is_null());
        deallocate(&mut store, &p, second);
        assert_eq!(store.live_blocks(), 0);
    }

    #[test]
    fn cleared_cells_read_zero() {
        let mut store = Store::default();
        let array = grid(&[4, 5], PacketDescriptor::single("v", AtomicKind::Float));
        let data = alloc_array(&mut store, &array, true, true).unwrap();
        let bytes = store.bytes(data).unwrap();
        for cell in 0..20 {
            let v = AtomicKind::Float.read(&bytes[cell * 4..]);
            assert_eq!(v, Value::Real(0.0));
        }
    }

    #[test]
    fn deallocate_tolerates_null_and_stale_handles() {
        let mut store = Store::default();
        let p = nested_packet();
        deallocate(&mut store, &p, BlockId::NULL);
        let block = allocate(&mut store, &p, true, true).unwrap();
        deallocate(&mut store, &p, block);
        let freed = store.stats().blocks_freed;
        deallocate(&mut store, &p, block);
        assert_eq!(store.stats().blocks_freed, freed);
    }

    #[cfg(not(miri))]
    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn packet_strategy() -> impl Strategy<Value = PacketDescriptor> {
            let leaf = prop_oneof![
                Just(ElementKind::Atomic(AtomicKind::Int)),
                Just(ElementKind::Atomic(AtomicKind::DComplex)),
                Just(ElementKind::VString),
                (1usize..16).prop_map(|max_len| ElementKind::FString { max_len }),
            ];
            let elements = prop::collection::vec(leaf, 1..4).prop_map(|kinds| {
                kinds
                    .into_iter()
                    .enumerate()
                    .fold(PacketDescriptor::builder(), |b, (i, k)| b.element(format!("e{i}"), k))
                    .build()
                    .unwrap()
            });
            elements.prop_recursive(3, 16, 3, |inner| {
                (inner.clone(), 1usize..4, inner, any::<bool>()).prop_map(
                    |(cell, len, entry, with_list)| {
                        let mut b = PacketDescriptor::builder()
                            .atomic("k", AtomicKind::Long)
                            .array("a", grid(&[len], cell));
                        if with_list {
                            b = b.list("l", entry);
                        }
                        b.build().unwrap()
                    },
                )
            })
        }

        proptest! {
            #[test]
            fn allocate_then_deallocate_frees_exactly_what_was_built(
                p in packet_strategy(),
                clear in any::<bool>(),
                inner in any::<bool>(),
            ) {
                let mut store = Store::default();
                let block = allocate(&mut store, &p, clear, inner).unwrap();
                let built = store.stats().blocks_allocated;
                deallocate(&mut store, &p, block);
                let stats = store.stats();
                prop_assert_eq!(stats.live_blocks, 0);
                prop_assert_eq!(stats.live_bytes, 0);
                prop_assert_eq!(stats.blocks_freed, built);
            }

            #[test]
            fn capacity_failures_never_leak(p in packet_strategy(), limit in 0usize..12) {
                let mut store = Store::new(StoreConfig::new().with_max_blocks(limit));
                if allocate(&mut store, &p, true, true).is_err() {
                    prop_assert_eq!(store.live_blocks(), 0);
                    prop_assert_eq!(store.stats().blocks_allocated, store.stats().blocks_freed);
                }
            }
        }
    }
}
