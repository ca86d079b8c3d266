//! Memory-mapped file regions.
//!
//! The only module in this crate allowed to use `unsafe`: creating a
//! mapping is unsafe because another process may change the file under it.

#![allow(unsafe_code)]

use std::fs::File;
use std::io;

use memmap2::{Mmap, MmapMut, MmapOptions};

/// A mapped file and the access it was opened with.
pub(crate) enum Mapping {
    /// Read-only shared mapping.
    ReadOnly(Mmap),
    /// Writable shared mapping; writes reach the file.
    Shared(MmapMut),
    /// Writable private mapping; writes stay in this process.
    Private(MmapMut),
}

impl Mapping {
    pub(crate) fn map(file: &File, writable: bool, update_on_write: bool) -> io::Result<Self> {
        let mapping = match (writable, update_on_write) {
            // SAFETY: read-only mapping of a file we hold open. Callers of
            // map_disc accept that external modification is visible.
            (false, _) => Self::ReadOnly(unsafe { Mmap::map(file)? }),
            // SAFETY: the file was opened read-write; the mapping lives no
            // longer than the channel that owns both.
            (true, true) => Self::Shared(unsafe { MmapMut::map_mut(file)? }),
            // SAFETY: copy-on-write pages never reach the file.
            (true, false) => Self::Private(unsafe { MmapOptions::new().map_copy(file)? }),
        };
        Ok(mapping)
    }

    pub(crate) fn bytes(&self) -> &[u8] {
        match self {
            Self::ReadOnly(m) => m,
            Self::Shared(m) | Self::Private(m) => m,
        }
    }

    pub(crate) fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Self::ReadOnly(_) => None,
            Self::Shared(m) | Self::Private(m) => Some(m),
        }
    }

    pub(crate) fn is_writable(&self) -> bool {
        !matches!(self, Self::ReadOnly(_))
    }

    pub(crate) fn flush(&self) -> io::Result<()> {
        match self {
            Self::Shared(m) => m.flush(),
            Self::ReadOnly(_) | Self::Private(_) => Ok(()),
        }
    }
}
