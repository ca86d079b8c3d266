//! Core types for the Generic Data Structure (GDS).
//!
//! This is the leaf crate with zero internal dependencies. It defines the
//! self-describing schema model and the addressing arithmetic used by the
//! rest of the workspace:
//!
//! - [`AtomicKind`] / [`ElementKind`]: the per-element type tags and size table
//! - [`DimensionDescriptor`], [`PacketDescriptor`], [`ArrayDescriptor`]:
//!   the descriptor tree
//! - [`OffsetTable`] / [`RemappedOffsets`]: the offset engine
//! - [`ContractViolation`]: the typed panic payload for programmer errors
//!
//! # Descriptor tree
//!
//! ```text
//! PacketDescriptor
//! ├── "x"      Atomic(Float)
//! ├── "name"   VString
//! ├── "image"  Array(ArrayDescriptor)
//! │            ├── DimensionDescriptor × N
//! │            ├── PacketDescriptor (per cell)
//! │            └── Tiling (optional)
//! └── "events" List(PacketDescriptor)
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod array;
pub mod dimension;
pub mod edge;
pub mod error;
pub mod index;
pub mod kind;
pub mod offset;
pub mod packet;

pub use array::{ArrayDescriptor, Tiling};
pub use dimension::{Coordinates, DimensionDescriptor};
pub use edge::BoundaryMode;
pub use error::{contract_violation, ContractViolation, DescriptorError};
pub use index::{Index, SignedIndex};
pub use kind::{AtomicKind, ElementKind, Value};
pub use offset::{DirectOffsets, OffsetTable, RemappedOffsets, TiledOffsets};
pub use packet::{PacketBuilder, PacketDescriptor, PacketElement};
