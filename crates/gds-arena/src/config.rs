//! Block store configuration.

/// Limits for a [`Store`](crate::Store).
///
/// Exceeding either bound makes the allocation fail with
/// [`AllocError::CapacityExceeded`](crate::AllocError::CapacityExceeded).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Maximum number of live blocks (data blocks, list headers and list
    /// entries all count).
    ///
    /// Default: `usize::MAX` (unbounded).
    pub max_blocks: usize,

    /// Maximum number of live data bytes across all data blocks.
    ///
    /// Default: `usize::MAX` (unbounded).
    pub max_bytes: usize,

    /// How many freed data buffers are kept for reuse by later
    /// `clear = false` allocations.
    ///
    /// Default: 64. Zero disables recycling.
    pub recycle_limit: usize,
}

impl StoreConfig {
    /// Default block limit.
    pub const DEFAULT_MAX_BLOCKS: usize = usize::MAX;

    /// Default byte limit.
    pub const DEFAULT_MAX_BYTES: usize = usize::MAX;

    /// Default number of recycled buffers retained.
    pub const DEFAULT_RECYCLE_LIMIT: usize = 64;

    /// An unbounded store with the default recycle pool.
    pub fn new() -> Self {
        Self {
            max_blocks: Self::DEFAULT_MAX_BLOCKS,
            max_bytes: Self::DEFAULT_MAX_BYTES,
            recycle_limit: Self::DEFAULT_RECYCLE_LIMIT,
        }
    }

    /// Cap the number of live blocks.
    pub fn with_max_blocks(mut self, max_blocks: usize) -> Self {
        self.max_blocks = max_blocks;
        self
    }

    /// Cap the number of live data bytes.
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    /// Set the recycle pool size.
    pub fn with_recycle_limit(mut self, recycle_limit: usize) -> Self {
        self.recycle_limit = recycle_limit;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_unbounded() {
        let config = StoreConfig::default();
        assert_eq!(config.max_blocks, usize::MAX);
        assert_eq!(config.max_bytes, usize::MAX);
        assert_eq!(config.recycle_limit, StoreConfig::DEFAULT_RECYCLE_LIMIT);
    }

    #[test]
    fn builders_override_limits() {
        let config = StoreConfig::new()
            .with_max_blocks(8)
            .with_max_bytes(1024)
            .with_recycle_limit(0);
        assert_eq!(config.max_blocks, 8);
        assert_eq!(config.max_bytes, 1024);
        assert_eq!(config.recycle_limit, 0);
    }
}
