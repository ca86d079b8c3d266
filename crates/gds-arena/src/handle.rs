//! Slot + generation block handles.
//!
//! A [`BlockId`] packs a slot index (upper 32 bits) and a generation
//! (lower 32 bits). Generations start at 1, so no live handle encodes to
//! `0` and the zero value is free to mean null inside packet bytes.
//! Removing a block bumps its slot's generation, which makes every older
//! handle to that slot resolve to `None`; double-free is a no-op.

use std::fmt;

use gds_core::ElementKind;

const HANDLE_SIZE: usize = ElementKind::HANDLE_SIZE;

/// Handle to one block in a [`Store`](crate::Store).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(u64);

impl BlockId {
    /// The null handle.
    pub const NULL: Self = Self(0);

    /// Whether this is the null handle.
    pub fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Raw encoded value.
    pub fn to_bits(self) -> u64 {
        self.0
    }

    /// Rebuild a handle from its encoded value.
    pub fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Read a handle stored in packet bytes (host byte order).
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than a handle.
    pub fn read_from(bytes: &[u8]) -> Self {
        let mut raw = [0u8; HANDLE_SIZE];
        raw.copy_from_slice(&bytes[..HANDLE_SIZE]);
        Self(u64::from_ne_bytes(raw))
    }

    /// Store this handle into packet bytes (host byte order).
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than a handle.
    pub fn write_to(self, bytes: &mut [u8]) {
        bytes[..HANDLE_SIZE].copy_from_slice(&self.0.to_ne_bytes());
    }

    fn encode(slot: u32, generation: u32) -> Self {
        Self(((slot as u64) << 32) | generation as u64)
    }

    fn decode(self) -> (u32, u32) {
        ((self.0 >> 32) as u32, self.0 as u32)
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return write!(f, "null");
        }
        let (slot, generation) = self.decode();
        write!(f, "{slot}v{generation}")
    }
}

struct Slot<T> {
    generation: u32,
    data: Option<T>,
}

/// A slot + generation table mapping [`BlockId`]s to owned values.
///
/// Reuses slots through a free list.
pub(crate) struct HandleTable<T> {
    slots: Vec<Slot<T>>,
    free_list: Vec<u32>,
    len: usize,
}

impl<T> HandleTable<T> {
    pub(crate) const fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            len: 0,
        }
    }

    /// Number of live values.
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn insert(&mut self, value: T) -> BlockId {
        self.len += 1;
        if let Some(slot_idx) = self.free_list.pop() {
            let slot = &mut self.slots[slot_idx as usize];
            slot.data = Some(value);
            BlockId::encode(slot_idx, slot.generation)
        } else {
            let slot_idx = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                data: Some(value),
            });
            BlockId::encode(slot_idx, 1)
        }
    }

    pub(crate) fn get(&self, id: BlockId) -> Option<&T> {
        let (slot_idx, generation) = id.decode();
        let slot = self.slots.get(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.data.as_ref()
    }

    pub(crate) fn get_mut(&mut self, id: BlockId) -> Option<&mut T> {
        let (slot_idx, generation) = id.decode();
        let slot = self.slots.get_mut(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        slot.data.as_mut()
    }

    /// Remove the value behind `id`.
    ///
    /// A slot whose generation wraps back to 0 is retired rather than
    /// reused, since generation 0 is reserved for null.
    pub(crate) fn remove(&mut self, id: BlockId) -> Option<T> {
        let (slot_idx, generation) = id.decode();
        let slot = self.slots.get_mut(slot_idx as usize)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.data.take()?;
        self.len -= 1;
        slot.generation = slot.generation.wrapping_add(1);
        if slot.generation != 0 {
            self.free_list.push(slot_idx);
        }
        Some(value)
    }

    #[cfg(test)]
    fn force_generation(&mut self, id: BlockId, generation: u32) {
        let (slot_idx, _) = id.decode();
        self.slots[slot_idx as usize].generation = generation;
    }
}
