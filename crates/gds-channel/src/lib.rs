//! Uniform byte-stream channels for moving Generic Data Structure trees.
//!
//! A [`Channel`] behaves the same whether it sits on a disk file, a memory
//! region, a memory-mapped file, a pipe, a character device or a TCP
//! socket. Every channel tracks independent absolute read and write
//! positions; streaming kinds buffer in both directions and can route their
//! traffic through a stack of [`Converter`]s.
//!
//! # Architecture
//!
//! ```text
//! Channel
//! ├── ReadBuffer / write buffer (block-sized, streaming kinds only)
//! ├── Vec<Box<dyn Converter>>   last pushed runs first
//! │   └── Downstream            the rest of the stack, then the store
//! ├── Vec<Tap>                  fired on every real transfer
//! └── Backend
//!     ├── Disk(File) / Character(File)
//!     ├── Connection(TcpStream) / Dock(TcpListener)
//!     ├── Pipe(PipeEnd)
//!     ├── Memory(Vec<u8>) / Mapped(Mapping)
//!     └── Sink
//! ```
//!
//! # Errors
//!
//! A failing backing store turns a transfer short and leaves a
//! [`ChannelError`] on the channel. Later transfers fail fast with that
//! error until [`Channel::seek`] clears it or the channel is closed.
//! Using an operation on a kind that does not support it (seeking a socket,
//! flushing a dock) is a programmer error and panics with a
//! [`ContractViolation`](gds_core::ContractViolation).
//!
//! # Examples
//!
//! ```
//! use gds_channel::open_memory;
//!
//! let mut ch = open_memory(None, 64);
//! assert_eq!(ch.write(&[7; 40]), 40);
//! assert_eq!(ch.write(&[9; 30]), 24);
//! assert_eq!(ch.tell(), (0, 64));
//! assert!(ch.error().is_some());
//!
//! ch.seek(0).unwrap();
//! let mut head = [0u8; 4];
//! assert_eq!(ch.read(&mut head), 4);
//! assert_eq!(head, [7; 4]);
//! ```

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

mod backend;
pub mod channel;
pub mod config;
pub mod convert;
pub mod error;
pub mod kind;
mod mapped;
pub mod open;
pub mod registry;

pub use channel::{Channel, Direction, TapEvent};
pub use config::ChannelConfig;
pub use convert::{Converter, Downstream};
pub use error::ChannelError;
pub use kind::{ChannelKind, MapPolicy, OpenMode};
pub use open::{
    accept_on_dock, create_pipe, create_sink, map_disc, map_disc_with, open_connection,
    open_connection_with, open_dock, open_file, open_file_with, open_memory,
};
pub use registry::{open_channels, shutdown_report, ShutdownReport};
