//! Channel configuration.

/// Tuning knobs applied when a channel is opened.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    /// Size of the read and write buffers, overriding the kind's natural
    /// block size. `Some(0)` disables buffering.
    ///
    /// Default: `None` (filesystem block size for disks, 4096 for sockets,
    /// pipes and character devices).
    pub buffer_size: Option<usize>,

    /// Put connection sockets in non-blocking mode. A read that would block
    /// returns short without recording an error.
    ///
    /// Default: `false`.
    pub nonblocking: bool,

    /// Files at least this many bytes long count as large for the
    /// [`MapPolicy::IfLarge`](crate::MapPolicy::IfLarge) and
    /// [`MapPolicy::IfLocalOrLarge`](crate::MapPolicy::IfLocalOrLarge)
    /// policies.
    ///
    /// Default: 1 MiB.
    pub large_mmap_threshold: u64,
}

impl ChannelConfig {
    /// Default buffer size override.
    pub const DEFAULT_BUFFER_SIZE: Option<usize> = None;

    /// Default socket blocking mode.
    pub const DEFAULT_NONBLOCKING: bool = false;

    /// Default large-file threshold for mapping policies.
    pub const DEFAULT_LARGE_MMAP_THRESHOLD: u64 = 1 << 20;

    /// The default configuration.
    pub fn new() -> Self {
        Self {
            buffer_size: Self::DEFAULT_BUFFER_SIZE,
            nonblocking: Self::DEFAULT_NONBLOCKING,
            large_mmap_threshold: Self::DEFAULT_LARGE_MMAP_THRESHOLD,
        }
    }

    /// Override the buffer size.
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Set socket blocking mode.
    pub fn with_nonblocking(mut self, nonblocking: bool) -> Self {
        self.nonblocking = nonblocking;
        self
    }

    /// Set the large-file threshold.
    pub fn with_large_mmap_threshold(mut self, threshold: u64) -> Self {
        self.large_mmap_threshold = threshold;
        self
    }
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ChannelConfig::default();
        assert_eq!(config.buffer_size, None);
        assert!(!config.nonblocking);
        assert_eq!(config.large_mmap_threshold, 1_048_576);
    }

    #[test]
    fn builders_override() {
        let config = ChannelConfig::new()
            .with_buffer_size(0)
            .with_nonblocking(true)
            .with_large_mmap_threshold(10);
        assert_eq!(config.buffer_size, Some(0));
        assert!(config.nonblocking);
        assert_eq!(config.large_mmap_threshold, 10);
    }
}
