//! Storage and lifetime management for Generic Data Structure trees.
//!
//! Every byte of packet data lives in a [`Store`]: a slot + generation
//! table of blocks addressed by [`BlockId`]. Handle-bearing packet elements
//! (strings, nested arrays, lists) hold a `BlockId` in their 8 packet bytes,
//! with `0` meaning null, so the data graph never holds raw pointers and a
//! stale handle resolves to `None` instead of dangling.
//!
//! # Architecture
//!
//! ```text
//! MultiArray (Arc, attachment count)
//! └── Mutex<ContainerData>
//!     ├── Store (HandleTable<Block>, counters, StoreConfig limits)
//!     │   ├── Block::Data(Vec<u8>)   packets, array cells, strings
//!     │   ├── Block::List(ListHeader)
//!     │   └── Block::Entry(ListEntry)
//!     └── IndexMap<name, (PacketDescriptor, BlockId)>  top-level packets
//! ```
//!
//! # Allocation and rollback
//!
//! [`allocate`] builds a packet and everything beneath it. When any nested
//! allocation fails the blocks already built for the current packet are
//! released before the error is returned, so a failed call leaves the
//! store's live-block count unchanged. [`deallocate`] is its mirror image
//! and tolerates null handles left by partially built trees.
//!
//! # Attachment
//!
//! A [`MultiArray`] is freed when the last [`Attachment`] goes away. Views
//! ([`ArrayView`]) hold their own attachment, so the data outlives every
//! view of it.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod config;
pub mod easy;
pub mod engine;
pub mod error;
pub mod handle;
pub mod list;
pub mod multi;
pub mod named;
pub mod store;
pub mod view;

pub use config::StoreConfig;
pub use easy::{array_descriptor, easy_array};
pub use engine::{alloc_array, allocate, deallocate};
pub use error::{AllocError, BuildError, NamedValueError, Resource, ViewError};
pub use handle::BlockId;
pub use list::{
    allocate_contiguous_list, list_append, list_delete, list_len, list_packets, ListEntry,
    ListHeader, PacketLocation,
};
pub use multi::{Attachment, MultiArray};
pub use named::{get_named_string, get_named_value, put_named_string, put_named_value};
pub use store::{Block, Store, StoreStats};
pub use view::ArrayView;
