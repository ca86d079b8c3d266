//! Index tuple aliases.

use smallvec::SmallVec;

/// A cell index tuple, outermost dimension first.
///
/// Uses `SmallVec<[usize; 4]>` to avoid heap allocation for arrays up to
/// four dimensions. Higher ranks spill to the heap transparently.
pub type Index = SmallVec<[usize; 4]>;

/// A signed index tuple for boundary-remapped views, where indices may run
/// into the boundary region on either side of an axis.
pub type SignedIndex = SmallVec<[isize; 4]>;
