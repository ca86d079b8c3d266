//! Array descriptors and tiling metadata.

use std::sync::{Arc, OnceLock};

use smallvec::SmallVec;

use crate::dimension::DimensionDescriptor;
use crate::error::DescriptorError;
use crate::index::Index;
use crate::offset::OffsetTable;
use crate::packet::PacketDescriptor;

/// Blocked storage layout for large arrays.
///
/// Each level gives one tile length per dimension. Level 0 partitions the
/// whole array; every further level partitions the tiles of the level
/// above. Tile lengths must divide the enclosing extent exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tiling {
    levels: Vec<SmallVec<[usize; 4]>>,
}

impl Tiling {
    /// Build tiling metadata from per-level tile lengths (outermost level
    /// first, one entry per dimension within each level).
    pub fn new(levels: Vec<Vec<usize>>) -> Self {
        Self {
            levels: levels.into_iter().map(SmallVec::from_vec).collect(),
        }
    }

    /// A single level of tiling.
    pub fn single(tile_lengths: &[usize]) -> Self {
        Self {
            levels: vec![SmallVec::from_slice(tile_lengths)],
        }
    }

    /// Number of tiling levels.
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Tile lengths at `level`, one per dimension.
    pub fn tile_lengths(&self, level: usize) -> &[usize] {
        &self.levels[level]
    }

    fn validate(&self, lengths: &[usize]) -> Result<(), DescriptorError> {
        if self.levels.is_empty() {
            return Err(DescriptorError::InvalidTiling {
                reason: "tiling must have at least one level".into(),
            });
        }
        let mut enclosing: SmallVec<[usize; 4]> = SmallVec::from_slice(lengths);
        for (level, tiles) in self.levels.iter().enumerate() {
            if tiles.len() != lengths.len() {
                return Err(DescriptorError::InvalidTiling {
                    reason: format!(
                        "level {level} has {} tile lengths for {} dimensions",
                        tiles.len(),
                        lengths.len()
                    ),
                });
            }
            for (d, (&tile, &extent)) in tiles.iter().zip(enclosing.iter()).enumerate() {
                if tile == 0 || extent % tile != 0 {
                    return Err(DescriptorError::InvalidTiling {
                        reason: format!(
                            "level {level} tile length {tile} does not divide extent {extent} of dimension {d}"
                        ),
                    });
                }
            }
            enclosing = tiles.clone();
        }
        Ok(())
    }
}

/// An N-dimensional array of packets.
///
/// Dimensions run outer to inner, i.e. most to least significant stride.
/// The byte-offset table is computed lazily on first use and shared by all
/// clones of the descriptor, so cloned views never recompute it.
///
/// # Examples
///
/// ```
/// use gds_core::{ArrayDescriptor, AtomicKind, DimensionDescriptor, PacketDescriptor};
///
/// let array = ArrayDescriptor::new(
///     vec![
///         DimensionDescriptor::indices("y", 4).unwrap(),
///         DimensionDescriptor::indices("x", 5).unwrap(),
///     ],
///     PacketDescriptor::single("v", AtomicKind::Float),
/// )
/// .unwrap();
/// assert_eq!(array.cell_count(), 20);
/// assert_eq!(array.cell_offset(&[2, 3]), Some((2 * 5 + 3) * 4));
/// ```
#[derive(Clone, Debug)]
pub struct ArrayDescriptor {
    dimensions: Vec<DimensionDescriptor>,
    packet: Arc<PacketDescriptor>,
    tiling: Option<Tiling>,
    offsets: Arc<OnceLock<Arc<OffsetTable>>>,
}

impl ArrayDescriptor {
    /// Build an untiled array descriptor.
    pub fn new(
        dimensions: Vec<DimensionDescriptor>,
        packet: impl Into<Arc<PacketDescriptor>>,
    ) -> Result<Self, DescriptorError> {
        if dimensions.is_empty() {
            return Err(DescriptorError::NoDimensions);
        }
        let packet = packet.into();
        if packet.is_empty() {
            return Err(DescriptorError::EmptyPacket);
        }
        let cells = dimensions
            .iter()
            .try_fold(1usize, |n, d| n.checked_mul(d.length()));
        if cells.and_then(|n| n.checked_mul(packet.size())).is_none() {
            return Err(DescriptorError::ArrayTooLarge {
                lengths: dimensions.iter().map(|d| d.length()).collect(),
                cell_size: packet.size(),
            });
        }
        Ok(Self {
            dimensions,
            packet,
            tiling: None,
            offsets: Arc::new(OnceLock::new()),
        })
    }

    /// Build an array of `lengths` indices per dimension, named `names`.
    pub fn from_shape(
        names: &[&str],
        lengths: &[usize],
        packet: impl Into<Arc<PacketDescriptor>>,
    ) -> Result<Self, DescriptorError> {
        if names.len() != lengths.len() {
            return Err(DescriptorError::ShapeMismatch {
                names: names.len(),
                lengths: lengths.len(),
            });
        }
        let dims = names
            .iter()
            .zip(lengths)
            .map(|(name, &len)| DimensionDescriptor::indices(*name, len))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(dims, packet)
    }

    /// Attach tiling metadata. Any previously computed offsets are dropped.
    pub fn with_tiling(mut self, tiling: Tiling) -> Result<Self, DescriptorError> {
        tiling.validate(&self.lengths())?;
        self.tiling = Some(tiling);
        self.offsets = Arc::new(OnceLock::new());
        Ok(self)
    }

    /// Number of dimensions.
    pub fn num_dimensions(&self) -> usize {
        self.dimensions.len()
    }

    /// All dimensions, outermost first.
    pub fn dimensions(&self) -> &[DimensionDescriptor] {
        &self.dimensions
    }

    /// Dimension `d`.
    pub fn dimension(&self, d: usize) -> Option<&DimensionDescriptor> {
        self.dimensions.get(d)
    }

    /// Position of the dimension called `name`.
    pub fn dimension_index(&self, name: &str) -> Option<usize> {
        self.dimensions.iter().position(|d| d.name() == name)
    }

    /// Lengths of every dimension.
    pub fn lengths(&self) -> Index {
        self.dimensions.iter().map(|d| d.length()).collect()
    }

    /// Total number of cells. Construction guarantees this fits in `usize`.
    pub fn cell_count(&self) -> usize {
        self.dimensions.iter().map(|d| d.length()).product()
    }

    /// The per-cell packet layout.
    pub fn packet(&self) -> &PacketDescriptor {
        &self.packet
    }

    /// Shared handle to the per-cell packet layout.
    pub fn packet_arc(&self) -> &Arc<PacketDescriptor> {
        &self.packet
    }

    /// Total bytes of array data.
    pub fn total_bytes(&self) -> usize {
        self.cell_count() * self.packet.size()
    }

    /// Tiling metadata, if any.
    pub fn tiling(&self) -> Option<&Tiling> {
        self.tiling.as_ref()
    }

    /// Whether storage is tiled.
    pub fn is_tiled(&self) -> bool {
        self.tiling.is_some()
    }

    /// The byte-offset table, computed on first call.
    ///
    /// Idempotent: later calls (on this descriptor or any clone) return the
    /// same shared table.
    pub fn offsets(&self) -> &Arc<OffsetTable> {
        self.offsets
            .get_or_init(|| Arc::new(OffsetTable::compute(self)))
    }

    /// Whether the offset table has already been computed.
    pub fn offsets_computed(&self) -> bool {
        self.offsets.get().is_some()
    }

    /// Byte offset of the cell at `index`, or `None` if the tuple has the
    /// wrong rank or runs out of range.
    pub fn cell_offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.dimensions.len() {
            return None;
        }
        if index
            .iter()
            .zip(&self.dimensions)
            .any(|(&i, d)| i >= d.length())
        {
            return None;
        }
        Some(self.offsets().address(index))
    }
}

impl PartialEq for ArrayDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.dimensions == other.dimensions
            && self.packet == other.packet
            && self.tiling == other.tiling
    }
}
