//! Test utilities for GDS development.
//!
//! Provides schema fixtures covering every element kind, byte-level
//! converters with known inverses, and a loopback socket pair.

#![forbid(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod converters;

use gds_channel::{accept_on_dock, open_connection, open_dock, Channel, ChannelError};
use gds_core::{ArrayDescriptor, AtomicKind, PacketDescriptor};

pub use converters::{OffsetConverter, XorConverter};

/// An untiled array named `d0`, `d1`, ... over `cell`.
pub fn grid(lengths: &[usize], cell: PacketDescriptor) -> ArrayDescriptor {
    let names: Vec<String> = (0..lengths.len()).map(|d| format!("d{d}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    ArrayDescriptor::from_shape(&refs, lengths, cell).expect("grid fixture is well formed")
}

/// A `ny` x `nx` array of single floats named `flux`.
pub fn float_image(ny: usize, nx: usize) -> ArrayDescriptor {
    ArrayDescriptor::from_shape(
        &["y", "x"],
        &[ny, nx],
        PacketDescriptor::single("flux", AtomicKind::Float),
    )
    .expect("image fixture is well formed")
}

/// A packet using every element kind:
///
/// ```text
/// id      Int
/// name    VString
/// cells   Array 2x3 of { flux: Float, tag: FString(8) }
/// events  List of { t: Double }
/// ```
///
/// Fully allocated it occupies 9 blocks: the packet, the cell data, six
/// tags and the list header. The variable-length name starts null.
pub fn nested_packet() -> PacketDescriptor {
    let cell = PacketDescriptor::builder()
        .atomic("flux", AtomicKind::Float)
        .fstring("tag", 8)
        .build()
        .expect("cell fixture is well formed");
    PacketDescriptor::builder()
        .atomic("id", AtomicKind::Int)
        .vstring("name")
        .array("cells", grid(&[2, 3], cell))
        .list("events", PacketDescriptor::single("t", AtomicKind::Double))
        .build()
        .expect("nested fixture is well formed")
}

/// Blocks [`nested_packet`] occupies when fully allocated.
pub const NESTED_PACKET_BLOCKS: usize = 9;

/// A connected (client, server) pair of connection channels over
/// 127.0.0.1.
pub fn loopback() -> Result<(Channel, Channel), ChannelError> {
    let mut dock = open_dock("127.0.0.1:0")?;
    let port = dock
        .local_addr()
        .map(|a| a.port())
        .expect("dock has a local address");
    let client = open_connection("127.0.0.1", port)?;
    let server = accept_on_dock(&mut dock)?;
    Ok((client, server))
}

/// `len` bytes of a repeating, non-trivial pattern.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + i / 251) as u8).collect()
}
