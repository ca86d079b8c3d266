//! Dimension descriptors: one named axis of an array.

use std::sync::Arc;

use crate::error::DescriptorError;

/// How a dimension maps indices to world coordinates.
#[derive(Clone, Debug, PartialEq)]
pub enum Coordinates {
    /// Coordinates are a linear function of the index between
    /// `first` and `last`.
    Regular,
    /// One explicit coordinate per index.
    Table(Arc<[f64]>),
}

/// One named axis of an [`ArrayDescriptor`](crate::ArrayDescriptor).
///
/// # Examples
///
/// ```
/// use gds_core::DimensionDescriptor;
///
/// let ra = DimensionDescriptor::regular("ra", 5, 10.0, 14.0).unwrap();
/// assert_eq!(ra.length(), 5);
/// assert_eq!(ra.coordinate(2), Some(12.0));
/// assert_eq!(ra.index_of(13.2), 3);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct DimensionDescriptor {
    name: String,
    length: usize,
    first: f64,
    last: f64,
    coordinates: Coordinates,
}

impl DimensionDescriptor {
    /// A regular axis of `length` indices spanning `first..=last`.
    pub fn regular(
        name: impl Into<String>,
        length: usize,
        first: f64,
        last: f64,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();
        if length == 0 {
            return Err(DescriptorError::EmptyDimension { name });
        }
        if !first.is_finite() {
            return Err(DescriptorError::NonFiniteCoordinate { name, index: 0 });
        }
        if !last.is_finite() {
            return Err(DescriptorError::NonFiniteCoordinate {
                name,
                index: length - 1,
            });
        }
        Ok(Self {
            name,
            length,
            first,
            last,
            coordinates: Coordinates::Regular,
        })
    }

    /// A regular axis whose coordinates equal the indices `0..length`.
    pub fn indices(name: impl Into<String>, length: usize) -> Result<Self, DescriptorError> {
        let last = length.saturating_sub(1) as f64;
        Self::regular(name, length, 0.0, last)
    }

    /// An axis with one explicit coordinate per index.
    pub fn with_coordinates(
        name: impl Into<String>,
        coordinates: Vec<f64>,
    ) -> Result<Self, DescriptorError> {
        let name = name.into();
        if coordinates.is_empty() {
            return Err(DescriptorError::EmptyDimension { name });
        }
        if let Some(index) = coordinates.iter().position(|c| !c.is_finite()) {
            return Err(DescriptorError::NonFiniteCoordinate { name, index });
        }
        let first = coordinates[0];
        let last = coordinates[coordinates.len() - 1];
        Ok(Self {
            name,
            length: coordinates.len(),
            first,
            last,
            coordinates: Coordinates::Table(coordinates.into()),
        })
    }

    /// Axis name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of indices along this axis.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Coordinate of the first index.
    pub fn first(&self) -> f64 {
        self.first
    }

    /// Coordinate of the last index.
    pub fn last(&self) -> f64 {
        self.last
    }

    /// Coordinate mapping.
    pub fn coordinates(&self) -> &Coordinates {
        &self.coordinates
    }

    /// Whether coordinates are a linear function of the index.
    pub fn is_regular(&self) -> bool {
        matches!(self.coordinates, Coordinates::Regular)
    }

    /// World coordinate of index `i`, or `None` if out of range.
    pub fn coordinate(&self, i: usize) -> Option<f64> {
        if i >= self.length {
            return None;
        }
        match &self.coordinates {
            Coordinates::Regular if self.length == 1 => Some(self.first),
            Coordinates::Regular => {
                let step = (self.last - self.first) / (self.length - 1) as f64;
                Some(self.first + step * i as f64)
            }
            Coordinates::Table(table) => Some(table[i]),
        }
    }

    /// Index whose coordinate is nearest to `coordinate`, clamped to the axis.
    pub fn index_of(&self, coordinate: f64) -> usize {
        match &self.coordinates {
            Coordinates::Regular => {
                if self.length == 1 || self.first == self.last {
                    return 0;
                }
                let step = (self.last - self.first) / (self.length - 1) as f64;
                let raw = ((coordinate - self.first) / step).round();
                if raw.is_nan() || raw <= 0.0 {
                    0
                } else {
                    (raw as usize).min(self.length - 1)
                }
            }
            Coordinates::Table(table) => {
                let mut best = 0;
                let mut best_distance = f64::INFINITY;
                for (i, c) in table.iter().enumerate() {
                    let d = (c - coordinate).abs();
                    if d < best_distance {
                        best = i;
                        best_distance = d;
                    }
                }
                best
            }
        }
    }
}
