//! Boundary handling for widened (toroidally remapped) offset tables.

/// How indices outside `[0, length)` resolve in a
/// [`RemappedOffsets`](crate::RemappedOffsets) table.
///
/// # Examples
///
/// ```
/// use gds_core::BoundaryMode;
///
/// assert_eq!(BoundaryMode::Wrap.resolve(-1, 5), 4);
/// assert_eq!(BoundaryMode::Wrap.resolve(7, 5), 2);
/// assert_eq!(BoundaryMode::Clamp.resolve(-3, 5), 0);
/// assert_eq!(BoundaryMode::Clamp.resolve(9, 5), 4);
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BoundaryMode {
    /// Out-of-range index wraps to the opposite side (periodic).
    #[default]
    Wrap,
    /// Out-of-range index repeats the nearest edge entry.
    Clamp,
}

impl BoundaryMode {
    /// Map a signed index onto `[0, length)`.
    ///
    /// `length` must be non-zero; dimension descriptors guarantee it.
    pub fn resolve(self, index: isize, length: usize) -> usize {
        debug_assert!(length > 0);
        let len = length as isize;
        match self {
            Self::Wrap => index.rem_euclid(len) as usize,
            Self::Clamp => index.clamp(0, len - 1) as usize,
        }
    }
}
