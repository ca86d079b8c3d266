//! Backing stores behind a channel.

use std::fs::File;
use std::io::{self, PipeReader, PipeWriter, Read, Write};
use std::net::{TcpListener, TcpStream};

use crate::mapped::Mapping;

/// One end of a pipe.
pub(crate) enum PipeEnd {
    /// A FIFO opened through the filesystem.
    Fifo(File),
    /// Read end of an anonymous pipe.
    Reader(PipeReader),
    /// Write end of an anonymous pipe.
    Writer(PipeWriter),
}

pub(crate) enum Backend {
    Disk(File),
    Character(File),
    Connection(TcpStream),
    Pipe(PipeEnd),
    Dock(TcpListener),
    Memory(Vec<u8>),
    Mapped {
        mapping: Mapping,
        // kept open for the lifetime of the mapping
        _file: File,
    },
    Sink,
    Released,
}

fn unsupported(what: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("{what} is not a byte stream"))
}

impl Backend {
    /// Raw read from a streaming store.
    pub(crate) fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Disk(f) | Self::Character(f) => f.read(buf),
            Self::Connection(s) => s.read(buf),
            Self::Pipe(PipeEnd::Fifo(f)) => f.read(buf),
            Self::Pipe(PipeEnd::Reader(r)) => r.read(buf),
            Self::Pipe(PipeEnd::Writer(_)) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "read from the write end of a pipe",
            )),
            Self::Dock(_) => Err(unsupported("a dock")),
            Self::Memory(_) | Self::Mapped { .. } | Self::Sink => Err(unsupported("a region")),
            Self::Released => Err(io::Error::from(io::ErrorKind::NotConnected)),
        }
    }

    /// Raw write to a streaming store.
    pub(crate) fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Disk(f) | Self::Character(f) => f.write(buf),
            Self::Connection(s) => s.write(buf),
            Self::Pipe(PipeEnd::Fifo(f)) => f.write(buf),
            Self::Pipe(PipeEnd::Writer(w)) => w.write(buf),
            Self::Pipe(PipeEnd::Reader(_)) => Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "write to the read end of a pipe",
            )),
            Self::Dock(_) => Err(unsupported("a dock")),
            Self::Memory(_) | Self::Mapped { .. } | Self::Sink => Err(unsupported("a region")),
            Self::Released => Err(io::Error::from(io::ErrorKind::NotConnected)),
        }
    }

    pub(crate) fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Disk(f) | Self::Character(f) | Self::Pipe(PipeEnd::Fifo(f)) => f.flush(),
            Self::Connection(s) => s.flush(),
            Self::Pipe(PipeEnd::Writer(w)) => w.flush(),
            Self::Mapped { mapping, .. } => mapping.flush(),
            Self::Pipe(PipeEnd::Reader(_))
            | Self::Dock(_)
            | Self::Memory(_)
            | Self::Sink
            | Self::Released => Ok(()),
        }
    }

    /// The region behind a memory or mapped channel.
    pub(crate) fn region(&self) -> Option<&[u8]> {
        match self {
            Self::Memory(v) => Some(v),
            Self::Mapped { mapping, .. } => Some(mapping.bytes()),
            _ => None,
        }
    }

    /// The writable region behind a memory or writable mapped channel.
    pub(crate) fn region_mut(&mut self) -> Option<&mut [u8]> {
        match self {
            Self::Memory(v) => Some(v),
            Self::Mapped { mapping, .. } => mapping.bytes_mut(),
            _ => None,
        }
    }
}
