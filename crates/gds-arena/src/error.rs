//! Arena error types.

use std::error::Error;
use std::fmt;

use gds_core::DescriptorError;

use crate::handle::BlockId;

/// Which store limit an allocation ran into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resource {
    /// The live-block limit.
    Blocks,
    /// The live-byte limit.
    Bytes,
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blocks => write!(f, "blocks"),
            Self::Bytes => write!(f, "bytes"),
        }
    }
}

/// Errors that can occur while allocating into a store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AllocError {
    /// The store is full.
    CapacityExceeded {
        /// The limit that was hit.
        resource: Resource,
        /// Amount requested (blocks or bytes).
        requested: usize,
        /// Configured limit for that resource.
        capacity: usize,
    },
    /// The system allocator could not provide a block of this size.
    Exhausted {
        /// Bytes requested.
        requested: usize,
    },
    /// `count` items of `size` bytes do not fit in `usize`.
    SizeOverflow {
        /// Number of items.
        count: usize,
        /// Bytes per item.
        size: usize,
    },
    /// A handle passed in does not name a live block of the expected kind.
    InvalidHandle {
        /// The offending handle.
        handle: BlockId,
    },
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded {
                resource,
                requested,
                capacity,
            } => {
                write!(
                    f,
                    "store capacity exceeded: requested {requested} {resource}, capacity {capacity}"
                )
            }
            Self::Exhausted { requested } => {
                write!(f, "out of memory allocating {requested} bytes")
            }
            Self::SizeOverflow { count, size } => {
                write!(f, "{count} items of {size} bytes overflow usize")
            }
            Self::InvalidHandle { handle } => write!(f, "invalid block handle {handle}"),
        }
    }
}

impl Error for AllocError {}

/// Errors from building a descriptor and allocating it in one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildError {
    /// The descriptor was malformed.
    Descriptor(DescriptorError),
    /// Allocation failed.
    Alloc(AllocError),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Descriptor(e) => write!(f, "descriptor error: {e}"),
            Self::Alloc(e) => write!(f, "allocation error: {e}"),
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Descriptor(e) => Some(e),
            Self::Alloc(e) => Some(e),
        }
    }
}

impl From<DescriptorError> for BuildError {
    fn from(e: DescriptorError) -> Self {
        Self::Descriptor(e)
    }
}

impl From<AllocError> for BuildError {
    fn from(e: AllocError) -> Self {
        Self::Alloc(e)
    }
}

/// Errors from looking up or storing a value by element name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NamedValueError {
    /// No element of that name exists in the tree.
    NameNotFound {
        /// The name searched for.
        name: String,
    },
    /// The name occurs more than once, or inside an array of more than one
    /// cell, or inside a list.
    NameNotUnique {
        /// The name searched for.
        name: String,
    },
    /// The element exists but holds a different kind of data
    /// (for example a string where a scalar was expected).
    TypeMismatch {
        /// The name searched for.
        name: String,
        /// What the caller asked for.
        expected: &'static str,
        /// What the element holds.
        found: &'static str,
    },
    /// The element sits below a nested array that was never allocated.
    NotAllocated {
        /// The name searched for.
        name: String,
    },
    /// Storing a string needed a block and the store refused.
    Alloc(AllocError),
}

impl fmt::Display for NamedValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameNotFound { name } => write!(f, "no element named '{name}'"),
            Self::NameNotUnique { name } => {
                write!(f, "element name '{name}' does not identify a unique value")
            }
            Self::TypeMismatch {
                name,
                expected,
                found,
            } => {
                write!(f, "element '{name}' holds {found}, not {expected}")
            }
            Self::NotAllocated { name } => {
                write!(f, "element '{name}' lies in an unallocated array")
            }
            Self::Alloc(e) => write!(f, "{e}"),
        }
    }
}

impl Error for NamedValueError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Alloc(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AllocError> for NamedValueError {
    fn from(e: AllocError) -> Self {
        Self::Alloc(e)
    }
}

/// Errors from array view access.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewError {
    /// The top-level packet or array element does not exist.
    UnknownArray {
        /// Top-level packet name.
        packet: String,
        /// Array element name.
        element: String,
    },
    /// The array was left unallocated (`allocate_inner_arrays = false`).
    NotAllocated {
        /// Array element name.
        element: String,
    },
    /// The cell packet has no element of that name.
    UnknownElement {
        /// The name looked up.
        name: String,
    },
    /// The cell element is not atomic.
    NotAtomic {
        /// The name looked up.
        name: String,
    },
    /// The index tuple has the wrong rank or lies outside the view.
    OutOfRange {
        /// The offending index tuple.
        index: Vec<isize>,
    },
}

impl fmt::Display for ViewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownArray { packet, element } => {
                write!(f, "no array element '{element}' in packet '{packet}'")
            }
            Self::NotAllocated { element } => {
                write!(f, "array element '{element}' is not allocated")
            }
            Self::UnknownElement { name } => write!(f, "no cell element named '{name}'"),
            Self::NotAtomic { name } => write!(f, "cell element '{name}' is not atomic"),
            Self::OutOfRange { index } => write!(f, "index {index:?} is out of range"),
        }
    }
}

impl Error for ViewError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_message_names_the_resource() {
        let err = AllocError::CapacityExceeded {
            resource: Resource::Bytes,
            requested: 80,
            capacity: 64,
        };
        assert_eq!(
            err.to_string(),
            "store capacity exceeded: requested 80 bytes, capacity 64"
        );
    }

    #[test]
    fn build_error_exposes_source() {
        let err = BuildError::from(DescriptorError::NoDimensions);
        assert!(err.source().is_some());
    }
}
