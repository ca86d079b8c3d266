//! Channel kinds, file open modes and mapping policies.

use std::fmt;
use std::fs::OpenOptions;
use std::str::FromStr;

use crate::error::ChannelError;

/// What a channel is connected to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// A regular file accessed through buffered reads and writes.
    Disk,
    /// A connected TCP socket.
    Connection,
    /// A memory region owned by the channel.
    Memory,
    /// A memory-mapped file.
    MemoryMapped,
    /// A listening socket that accepts connections.
    Dock,
    /// A FIFO or one end of an anonymous pipe.
    NamedPipe,
    /// A character device.
    Character,
    /// Discards writes and reads as end-of-file.
    Sink,
    /// A channel whose backing store has been released.
    Undefined,
}

impl ChannelKind {
    /// Every kind, in registry order.
    pub const ALL: [ChannelKind; 9] = [
        Self::Disk,
        Self::Connection,
        Self::Memory,
        Self::MemoryMapped,
        Self::Dock,
        Self::NamedPipe,
        Self::Character,
        Self::Sink,
        Self::Undefined,
    ];

    /// Lower-case name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Disk => "disk",
            Self::Connection => "connection",
            Self::Memory => "memory",
            Self::MemoryMapped => "mapped",
            Self::Dock => "dock",
            Self::NamedPipe => "pipe",
            Self::Character => "character",
            Self::Sink => "sink",
            Self::Undefined => "undefined",
        }
    }

    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Whether [`Channel::seek`](crate::Channel::seek) is allowed.
    pub fn is_seekable(self) -> bool {
        matches!(self, Self::Disk | Self::Memory | Self::MemoryMapped)
    }

    /// Whether converters may be pushed. The same kinds fire taps.
    pub fn is_streaming(self) -> bool {
        matches!(
            self,
            Self::Disk | Self::Connection | Self::Character | Self::NamedPipe
        )
    }

    /// Natural buffer size when the store does not report one.
    pub(crate) fn default_block_size(self) -> usize {
        if self.is_streaming() {
            4096
        } else {
            0
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How [`open_file`](crate::open_file) opens a path, mirroring the POSIX
/// mode strings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpenMode {
    /// `"r"`: read an existing file.
    Read,
    /// `"w"`: write, creating or truncating.
    Write,
    /// `"a"`: append, creating if needed.
    Append,
    /// `"r+"`: read and write an existing file.
    ReadUpdate,
    /// `"w+"`: read and write, creating or truncating.
    WriteUpdate,
    /// `"a+"`: read anywhere, append writes, creating if needed.
    AppendUpdate,
    /// `"W"`: write, creating if needed, without truncating.
    WriteKeep,
}

impl OpenMode {
    /// The mode string.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Read => "r",
            Self::Write => "w",
            Self::Append => "a",
            Self::ReadUpdate => "r+",
            Self::WriteUpdate => "w+",
            Self::AppendUpdate => "a+",
            Self::WriteKeep => "W",
        }
    }

    /// Whether the channel may be read.
    pub fn readable(self) -> bool {
        matches!(
            self,
            Self::Read | Self::ReadUpdate | Self::WriteUpdate | Self::AppendUpdate
        )
    }

    /// Whether the channel may be written.
    pub fn writable(self) -> bool {
        self != Self::Read
    }

    /// Whether every write lands at the end of the file.
    pub fn appends(self) -> bool {
        matches!(self, Self::Append | Self::AppendUpdate)
    }

    pub(crate) fn options(self) -> OpenOptions {
        let mut options = OpenOptions::new();
        match self {
            Self::Read => options.read(true),
            Self::Write => options.write(true).create(true).truncate(true),
            Self::Append => options.append(true).create(true),
            Self::ReadUpdate => options.read(true).write(true),
            Self::WriteUpdate => options.read(true).write(true).create(true).truncate(true),
            Self::AppendUpdate => options.read(true).append(true).create(true),
            Self::WriteKeep => options.write(true).create(true),
        };
        options
    }
}

impl FromStr for OpenMode {
    type Err = ChannelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mode = match s {
            "r" => Self::Read,
            "w" => Self::Write,
            "a" => Self::Append,
            "r+" => Self::ReadUpdate,
            "w+" => Self::WriteUpdate,
            "a+" => Self::AppendUpdate,
            "W" => Self::WriteKeep,
            _ => {
                return Err(ChannelError::InvalidMode {
                    mode: s.to_string(),
                })
            }
        };
        Ok(mode)
    }
}

/// When [`map_disc`](crate::map_disc) memory-maps a file instead of opening
/// a buffered disk channel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MapPolicy {
    /// Never map.
    Never,
    /// Always map; failing to map is an error.
    Always,
    /// Map when the platform allows it.
    #[default]
    IfAvailable,
    /// Map files on local filesystems.
    IfLocal,
    /// Map local files and large files.
    IfLocalOrLarge,
    /// Map files at least the configured threshold long.
    IfLarge,
}

impl MapPolicy {
    /// Whether a file with these properties should be mapped.
    pub fn wants_map(self, local: bool, large: bool) -> bool {
        match self {
            Self::Never => false,
            Self::Always | Self::IfAvailable => true,
            Self::IfLocal => local,
            Self::IfLocalOrLarge => local || large,
            Self::IfLarge => large,
        }
    }

    /// Whether a failed mapping falls back to a disk channel.
    pub fn falls_back(self) -> bool {
        self != Self::Always
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_strings_round_trip() {
        for s in ["r", "w", "a", "r+", "w+", "a+", "W"] {
            let mode: OpenMode = s.parse().unwrap();
            assert_eq!(mode.as_str(), s);
        }
        assert_eq!(
            "rw".parse::<OpenMode>(),
            Err(ChannelError::InvalidMode { mode: "rw".into() })
        );
    }

    #[test]
    fn access_flags() {
        assert!(OpenMode::Read.readable() && !OpenMode::Read.writable());
        assert!(!OpenMode::Write.readable() && OpenMode::Write.writable());
        assert!(OpenMode::AppendUpdate.readable() && OpenMode::AppendUpdate.appends());
        assert!(!OpenMode::WriteKeep.readable() && !OpenMode::WriteKeep.appends());
    }

    #[test]
    fn kind_capabilities() {
        let seekable: Vec<_> = ChannelKind::ALL.into_iter().filter(|k| k.is_seekable()).collect();
        assert_eq!(
            seekable,
            vec![ChannelKind::Disk, ChannelKind::Memory, ChannelKind::MemoryMapped]
        );
        assert!(ChannelKind::NamedPipe.is_streaming());
        assert!(!ChannelKind::Memory.is_streaming());
        assert_eq!(ChannelKind::Sink.default_block_size(), 0);
        for (i, kind) in ChannelKind::ALL.into_iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn policies() {
        assert!(!MapPolicy::Never.wants_map(true, true));
        assert!(MapPolicy::IfLarge.wants_map(false, true));
        assert!(!MapPolicy::IfLarge.wants_map(true, false));
        assert!(MapPolicy::IfLocalOrLarge.wants_map(true, false));
        assert!(!MapPolicy::Always.falls_back());
        assert!(MapPolicy::IfAvailable.falls_back());
    }
}
