//! The offset engine: per-dimension byte-offset tables.
//!
//! Every table is separable: the byte address of a cell is the sum over
//! dimensions of a per-dimension offset, so
//! `address(i) = Σ_d offset(d, i_d)`. That holds for row-major storage
//! and for tiled storage at any depth, which lets tiled tables be
//! flattened into plain lookup tables and remapped exactly like untiled
//! ones.

use smallvec::SmallVec;

use crate::array::ArrayDescriptor;
use crate::edge::BoundaryMode;
use crate::index::Index;

/// Byte-offset table of an [`ArrayDescriptor`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OffsetTable {
    /// Row-major storage, one lookup table per dimension.
    Direct(DirectOffsets),
    /// Tiled storage, evaluated level by level.
    Tiled(TiledOffsets),
}

impl OffsetTable {
    /// Compute the table for `array`.
    ///
    /// Prefer [`ArrayDescriptor::offsets`], which computes once and shares.
    pub fn compute(array: &ArrayDescriptor) -> Self {
        let lengths = array.lengths();
        let packet = array.packet().size();
        match array.tiling() {
            None => {
                tracing::debug!(dims = lengths.len(), packet, "computing direct offsets");
                Self::Direct(DirectOffsets::row_major(&lengths, packet))
            }
            Some(tiling) => {
                let levels: Vec<&[usize]> =
                    (0..tiling.depth()).map(|l| tiling.tile_lengths(l)).collect();
                tracing::debug!(
                    dims = lengths.len(),
                    depth = levels.len(),
                    packet,
                    "computing tiled offsets"
                );
                Self::Tiled(TiledOffsets::new(&lengths, &levels, packet))
            }
        }
    }

    /// Number of dimensions.
    pub fn num_dimensions(&self) -> usize {
        match self {
            Self::Direct(t) => t.num_dimensions(),
            Self::Tiled(t) => t.num_dimensions(),
        }
    }

    /// Length of dimension `d`.
    pub fn length(&self, d: usize) -> usize {
        match self {
            Self::Direct(t) => t.length(d),
            Self::Tiled(t) => t.length(d),
        }
    }

    /// Whether this table describes tiled storage.
    pub fn is_tiled(&self) -> bool {
        matches!(self, Self::Tiled(_))
    }

    /// Byte offset contributed by index `i` of dimension `d`.
    ///
    /// # Panics
    ///
    /// Panics if `d` or `i` is out of range.
    pub fn offset(&self, d: usize, i: usize) -> usize {
        match self {
            Self::Direct(t) => t.offset(d, i),
            Self::Tiled(t) => t.offset(d, i),
        }
    }

    /// Byte address of the cell at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `index` has the wrong rank or any component is out of range.
    pub fn address(&self, index: &[usize]) -> usize {
        assert_eq!(index.len(), self.num_dimensions(), "index rank mismatch");
        index
            .iter()
            .enumerate()
            .map(|(d, &i)| self.offset(d, i))
            .sum()
    }

    /// Materialise the table into plain per-dimension lookups.
    pub fn flatten(&self) -> DirectOffsets {
        match self {
            Self::Direct(t) => t.clone(),
            Self::Tiled(t) => t.flatten(),
        }
    }
}

/// One lookup table per dimension.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectOffsets {
    tables: Vec<Vec<usize>>,
}

impl DirectOffsets {
    /// Row-major (last dimension fastest) offsets for `lengths` cells of
    /// `packet` bytes each.
    pub fn row_major(lengths: &[usize], packet: usize) -> Self {
        let mut tables = vec![Vec::new(); lengths.len()];
        let mut stride = packet;
        for d in (0..lengths.len()).rev() {
            tables[d] = (0..lengths[d]).map(|i| i * stride).collect();
            stride *= lengths[d];
        }
        Self { tables }
    }

    /// Number of dimensions.
    pub fn num_dimensions(&self) -> usize {
        self.tables.len()
    }

    /// Length of dimension `d`.
    pub fn length(&self, d: usize) -> usize {
        self.tables[d].len()
    }

    /// Byte offset of index `i` along dimension `d`.
    pub fn offset(&self, d: usize, i: usize) -> usize {
        self.tables[d][i]
    }

    /// The lookup table for dimension `d`.
    pub fn table(&self, d: usize) -> &[usize] {
        &self.tables[d]
    }
}

/// Tiled offsets, evaluated in O(depth) per dimension.
///
/// Tiles at each level are laid out row-major over the tile grid of the
/// enclosing extent; cells of an innermost tile are row-major within it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TiledOffsets {
    lengths: Index,
    dims: Vec<TiledDimension>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct TiledDimension {
    // (tile length, byte stride between neighbouring tiles), outer level first.
    levels: SmallVec<[(usize, usize); 4]>,
    inner_stride: usize,
}

impl TiledOffsets {
    /// Build from dimension lengths, per-level tile lengths (outer level
    /// first) and the packet size. Tile lengths must divide their enclosing
    /// extents; [`ArrayDescriptor::with_tiling`] checks that.
    pub fn new(lengths: &[usize], levels: &[&[usize]], packet: usize) -> Self {
        let n = lengths.len();
        let mut dims: Vec<TiledDimension> = (0..n)
            .map(|_| TiledDimension {
                levels: SmallVec::new(),
                inner_stride: 0,
            })
            .collect();

        let mut enclosing: &[usize] = lengths;
        for &tiles in levels {
            let tile_bytes = packet * tiles.iter().product::<usize>();
            // Row-major stride over this level's tile grid.
            let mut grid_stride = 1;
            for d in (0..n).rev() {
                dims[d].levels.push((tiles[d], tile_bytes * grid_stride));
                grid_stride *= enclosing[d] / tiles[d];
            }
            enclosing = tiles;
        }

        let mut stride = packet;
        for d in (0..n).rev() {
            dims[d].inner_stride = stride;
            stride *= enclosing[d];
        }

        Self {
            lengths: SmallVec::from_slice(lengths),
            dims,
        }
    }

    /// Number of dimensions.
    pub fn num_dimensions(&self) -> usize {
        self.lengths.len()
    }

    /// Length of dimension `d`.
    pub fn length(&self, d: usize) -> usize {
        self.lengths[d]
    }

    /// Number of tiling levels.
    pub fn depth(&self) -> usize {
        self.dims.first().map_or(0, |d| d.levels.len())
    }

    /// Byte offset of index `i` along dimension `d`.
    pub fn offset(&self, d: usize, i: usize) -> usize {
        assert!(i < self.lengths[d], "index {i} out of range for dimension {d}");
        let dim = &self.dims[d];
        let mut rest = i;
        let mut offset = 0;
        for &(tile, stride) in &dim.levels {
            offset += (rest / tile) * stride;
            rest %= tile;
        }
        offset + rest * dim.inner_stride
    }

    /// Materialise into plain lookup tables.
    pub fn flatten(&self) -> DirectOffsets {
        let tables = (0..self.num_dimensions())
            .map(|d| (0..self.lengths[d]).map(|i| self.offset(d, i)).collect())
            .collect();
        DirectOffsets { tables }
    }
}

/// An offset table widened by a boundary of `B` indices on each side.
///
/// Valid indices per dimension are `-B..length + B`. Entries inside
/// `0..length` equal the source table; entries outside resolve through a
/// [`BoundaryMode`]. The widened table is owned, so the source table shared
/// by the descriptor is never mutated.
///
/// # Examples
///
/// ```
/// use gds_core::{ArrayDescriptor, AtomicKind, BoundaryMode, PacketDescriptor, RemappedOffsets};
///
/// let array = ArrayDescriptor::from_shape(
///     &["y", "x"],
///     &[3, 4],
///     PacketDescriptor::single("v", AtomicKind::Int),
/// )
/// .unwrap();
/// let torus = RemappedOffsets::new(array.offsets(), 1, BoundaryMode::Wrap);
/// assert_eq!(torus.address(&[-1, -1]), array.cell_offset(&[2, 3]));
/// assert_eq!(torus.address(&[3, 4]), array.cell_offset(&[0, 0]));
/// assert_eq!(torus.address(&[-2, 0]), None);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemappedOffsets {
    boundary: usize,
    mode: BoundaryMode,
    lengths: Index,
    tables: Vec<Vec<usize>>,
}

impl RemappedOffsets {
    /// Widen `source` by `boundary` indices on each side.
    ///
    /// A boundary wider than a dimension is accepted; wrapping repeats and
    /// clamping keeps repeating the edge entry.
    pub fn new(source: &OffsetTable, boundary: usize, mode: BoundaryMode) -> Self {
        let n = source.num_dimensions();
        let b = boundary as isize;
        let mut lengths = Index::with_capacity(n);
        let mut tables = Vec::with_capacity(n);
        for d in 0..n {
            let len = source.length(d);
            lengths.push(len);
            let table = (-b..len as isize + b)
                .map(|i| source.offset(d, mode.resolve(i, len)))
                .collect();
            tables.push(table);
        }
        tracing::debug!(dims = n, boundary, ?mode, "remapped offset table");
        Self {
            boundary,
            mode,
            lengths,
            tables,
        }
    }

    /// Boundary width on each side.
    pub fn boundary(&self) -> usize {
        self.boundary
    }

    /// How out-of-range indices were resolved.
    pub fn mode(&self) -> BoundaryMode {
        self.mode
    }

    /// Number of dimensions.
    pub fn num_dimensions(&self) -> usize {
        self.lengths.len()
    }

    /// Logical (unwidened) length of dimension `d`.
    pub fn length(&self, d: usize) -> usize {
        self.lengths[d]
    }

    /// Byte offset of signed index `i` along dimension `d`, or `None`
    /// outside `-B..length + B`.
    pub fn offset(&self, d: usize, i: isize) -> Option<usize> {
        let slot = i.checked_add(self.boundary as isize)?;
        if slot < 0 {
            return None;
        }
        self.tables.get(d)?.get(slot as usize).copied()
    }

    /// Byte address of the cell at a signed `index`, or `None` if the rank
    /// is wrong or any component falls outside the widened range.
    pub fn address(&self, index: &[isize]) -> Option<usize> {
        if index.len() != self.num_dimensions() {
            return None;
        }
        index
            .iter()
            .enumerate()
            .try_fold(0, |acc, (d, &i)| Some(acc + self.offset(d, i)?))
    }
}
