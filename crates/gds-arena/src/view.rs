//! Typed views of one array inside a container.

use std::fmt;
use std::sync::Arc;

use gds_core::{
    ArrayDescriptor, AtomicKind, BoundaryMode, ElementKind, Index, OffsetTable, RemappedOffsets,
    Value,
};

use crate::error::ViewError;
use crate::handle::BlockId;
use crate::multi::{Attachment, MultiArray};

#[derive(Clone, Debug)]
enum ViewOffsets {
    Shared(Arc<OffsetTable>),
    Remapped(Arc<RemappedOffsets>),
}

/// A view of one nested array of a [`MultiArray`].
///
/// The view holds its own attachment, so the container stays allocated for
/// as long as the view lives. Views addressed through a boundary-widened
/// offset table accept negative indices and indices past the end.
/// Cloning a view shares the data and adds an attachment.
///
/// # Examples
///
/// ```
/// use gds_arena::easy_array;
/// use gds_core::{AtomicKind, BoundaryMode, Value};
///
/// let container = easy_array("image", &[("y", 3), ("x", 4)], AtomicKind::Float, "flux").unwrap();
/// let view = container.array_view("image", "image").unwrap();
/// view.set(&[2, 3], "flux", Value::Real(7.0)).unwrap();
///
/// let torus = view.remapped(1, BoundaryMode::Wrap);
/// assert_eq!(torus.get(&[-1, -1], "flux").unwrap(), Value::Real(7.0));
/// assert!(view.get(&[-1, -1], "flux").is_err());
/// ```
#[derive(Clone)]
pub struct ArrayView {
    attachment: Attachment,
    name: String,
    array: Arc<ArrayDescriptor>,
    data: BlockId,
    offsets: ViewOffsets,
}

impl ArrayView {
    pub(crate) fn new(
        attachment: Attachment,
        name: String,
        array: Arc<ArrayDescriptor>,
        data: BlockId,
    ) -> Self {
        let offsets = ViewOffsets::Shared(Arc::clone(array.offsets()));
        Self {
            attachment,
            name,
            array,
            data,
            offsets,
        }
    }

    /// Name of the array element this view shows.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The array's descriptor.
    pub fn descriptor(&self) -> &ArrayDescriptor {
        &self.array
    }

    /// The container this view keeps alive.
    pub fn container(&self) -> MultiArray {
        self.attachment.container()
    }

    /// The array's data block.
    pub fn data_block(&self) -> BlockId {
        self.data
    }

    /// Boundary width of a remapped view, `0` otherwise.
    pub fn boundary(&self) -> usize {
        match &self.offsets {
            ViewOffsets::Shared(_) => 0,
            ViewOffsets::Remapped(r) => r.boundary(),
        }
    }

    /// Whether this view addresses through a widened table.
    pub fn is_remapped(&self) -> bool {
        matches!(self.offsets, ViewOffsets::Remapped(_))
    }

    /// A new view of the same data whose indices extend `boundary` past
    /// each edge, resolved by `mode`.
    ///
    /// The descriptor's shared offset table is left untouched.
    pub fn remapped(&self, boundary: usize, mode: BoundaryMode) -> ArrayView {
        let table = RemappedOffsets::new(self.array.offsets(), boundary, mode);
        Self {
            attachment: self.attachment.clone(),
            name: self.name.clone(),
            array: Arc::clone(&self.array),
            data: self.data,
            offsets: ViewOffsets::Remapped(Arc::new(table)),
        }
    }

    /// Byte offset of the cell at `index` within the data block.
    pub fn address(&self, index: &[isize]) -> Option<usize> {
        match &self.offsets {
            ViewOffsets::Remapped(table) => table.address(index),
            ViewOffsets::Shared(table) => {
                if index.len() != table.num_dimensions() {
                    return None;
                }
                let mut unsigned = Index::with_capacity(index.len());
                for (d, &i) in index.iter().enumerate() {
                    let i = usize::try_from(i).ok()?;
                    if i >= table.length(d) {
                        return None;
                    }
                    unsigned.push(i);
                }
                Some(table.address(&unsigned))
            }
        }
    }

    /// Read atomic element `element` of the cell at `index`.
    pub fn get(&self, index: &[isize], element: &str) -> Result<Value, ViewError> {
        let (kind, offset) = self.locate(index, element)?;
        let container = self.attachment.container();
        let data = container.lock();
        let bytes = data.store.bytes(self.data).ok_or_else(|| self.not_allocated())?;
        Ok(kind.read(&bytes[offset..offset + kind.size()]))
    }

    /// Write atomic element `element` of the cell at `index`.
    pub fn set(&self, index: &[isize], element: &str, value: Value) -> Result<(), ViewError> {
        let (kind, offset) = self.locate(index, element)?;
        let container = self.attachment.container();
        let mut data = container.lock();
        let bytes = data
            .store
            .bytes_mut(self.data)
            .ok_or_else(|| self.not_allocated())?;
        kind.write(&mut bytes[offset..offset + kind.size()], value);
        Ok(())
    }

    /// Every value of `element`, in row-major logical index order.
    pub fn values(&self, element: &str) -> Result<Vec<Value>, ViewError> {
        let lengths = self.array.lengths();
        let mut out = Vec::with_capacity(self.array.cell_count());
        let mut index: Vec<isize> = vec![0; lengths.len()];
        for _ in 0..self.array.cell_count() {
            out.push(self.get(&index, element)?);
            for d in (0..lengths.len()).rev() {
                index[d] += 1;
                if (index[d] as usize) < lengths[d] {
                    break;
                }
                index[d] = 0;
            }
        }
        Ok(out)
    }

    fn locate(
        &self,
        index: &[isize],
        element: &str,
    ) -> Result<(AtomicKind, usize), ViewError> {
        let cell = self
            .array
            .packet()
            .element(element)
            .ok_or_else(|| ViewError::UnknownElement {
                name: element.to_string(),
            })?;
        let ElementKind::Atomic(kind) = cell.kind() else {
            return Err(ViewError::NotAtomic {
                name: element.to_string(),
            });
        };
        let address = self.address(index).ok_or_else(|| ViewError::OutOfRange {
            index: index.to_vec(),
        })?;
        Ok((*kind, address + cell.offset()))
    }

    fn not_allocated(&self) -> ViewError {
        ViewError::NotAllocated {
            element: self.name.clone(),
        }
    }
}

impl fmt::Debug for ArrayView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayView")
            .field("name", &self.name)
            .field("lengths", &self.array.lengths())
            .field("data", &self.data)
            .field("boundary", &self.boundary())
            .finish()
    }
}
