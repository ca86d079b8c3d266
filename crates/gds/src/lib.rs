//! GDS: self-describing typed data trees and the channels that move them.
//!
//! This is the top-level facade crate that re-exports the public API from
//! the GDS sub-crates.
//!
//! # Quick start
//!
//! ```rust
//! use gds::prelude::*;
//!
//! // A 3x4 image of floats, zero-filled.
//! let image = easy_array("image", &[("y", 3), ("x", 4)], AtomicKind::Float, "flux").unwrap();
//! let view = image.array_view("image", "image").unwrap();
//! view.set(&[1, 2], "flux", Value::Real(0.5)).unwrap();
//!
//! // Ship the raw cell data through a memory channel.
//! let raw = image.with_store(|store| store.bytes(view.data_block()).unwrap().to_vec());
//! let mut ch = open_memory(None, raw.len());
//! assert_eq!(ch.write(&raw), raw.len());
//! ch.seek(0).unwrap();
//!
//! let mut back = vec![0u8; raw.len()];
//! assert_eq!(ch.read(&mut back), raw.len());
//! let at = view.address(&[1, 2]).unwrap();
//! assert_eq!(AtomicKind::Float.read(&back[at..at + 4]), Value::Real(0.5));
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`types`] | `gds-core` | Element kinds, descriptors, offset tables |
//! | [`arena`] | `gds-arena` | Block store, allocation, containers, views |
//! | [`channel`] | `gds-channel` | Channels, converters, the open-channel registry |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Element kinds, descriptors and addressing (`gds-core`).
///
/// Build schemas with [`types::PacketDescriptor::builder`] and
/// [`types::ArrayDescriptor`]; address cells through
/// [`types::OffsetTable`].
pub use gds_core as types;

/// Block store, allocation engine and containers (`gds-arena`).
///
/// [`arena::MultiArray`] is the reference-counted container;
/// [`arena::ArrayView`] gives typed access to one array inside it.
pub use gds_arena as arena;

/// Byte-stream channels (`gds-channel`).
///
/// Open channels with [`channel::open_file`], [`channel::open_memory`],
/// [`channel::map_disc`] and friends.
pub use gds_channel as channel;

/// Common imports for typical GDS usage.
///
/// ```rust
/// use gds::prelude::*;
/// ```
pub mod prelude {
    // Schema
    pub use gds_core::{
        ArrayDescriptor, AtomicKind, BoundaryMode, DimensionDescriptor, ElementKind,
        PacketDescriptor, Tiling, Value,
    };

    // Errors
    pub use gds_arena::{AllocError, BuildError, NamedValueError, ViewError};
    pub use gds_channel::ChannelError;
    pub use gds_core::{ContractViolation, DescriptorError};

    // Containers
    pub use gds_arena::{easy_array, ArrayView, Attachment, MultiArray, StoreConfig};

    // Channels
    pub use gds_channel::{
        create_pipe, create_sink, map_disc, open_file, open_memory, Channel, ChannelConfig,
        ChannelKind, Converter, Downstream, MapPolicy,
    };
}
