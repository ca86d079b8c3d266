//! Channel error types.

use std::error::Error;
use std::fmt;
use std::io;

/// A backing-store failure recorded on a channel.
///
/// Errors are cloneable because a channel keeps the first one it sees and
/// hands a copy back on every later call until it is cleared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChannelError {
    /// The operating system reported an I/O error.
    Io {
        /// The error's kind.
        kind: io::ErrorKind,
        /// The error's message.
        message: String,
    },
    /// A memory region or mapping has no room for more bytes.
    Exhausted {
        /// Size of the region in bytes.
        capacity: u64,
    },
    /// The channel was opened without write access.
    ReadOnly,
    /// The channel has been closed.
    Closed,
    /// An `open_file` mode string was not recognised.
    InvalidMode {
        /// The rejected mode.
        mode: String,
    },
}

impl ChannelError {
    /// Whether this is a non-blocking store reporting it has no room or
    /// no data right now. Such errors are returned but never stored.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Io { kind: io::ErrorKind::WouldBlock, .. })
    }
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { kind, message } => write!(f, "I/O error ({kind}): {message}"),
            Self::Exhausted { capacity } => {
                write!(f, "channel region of {capacity} bytes is exhausted")
            }
            Self::ReadOnly => write!(f, "channel is not writable"),
            Self::Closed => write!(f, "channel is closed"),
            Self::InvalidMode { mode } => write!(f, "invalid open mode '{mode}'"),
        }
    }
}

impl Error for ChannelError {}

impl From<io::Error> for ChannelError {
    fn from(e: io::Error) -> Self {
        Self::Io {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

impl From<ChannelError> for io::Error {
    fn from(e: ChannelError) -> Self {
        let kind = match &e {
            ChannelError::Io { kind, .. } => *kind,
            ChannelError::Exhausted { .. } => io::ErrorKind::WriteZero,
            ChannelError::ReadOnly => io::ErrorKind::PermissionDenied,
            ChannelError::Closed => io::ErrorKind::NotConnected,
            ChannelError::InvalidMode { .. } => io::ErrorKind::InvalidInput,
        };
        io::Error::new(kind, e)
    }
}
