//! Error types for descriptor construction and the contract-violation panic.
//!
//! Recoverable failures are returned as values ([`DescriptorError`] here,
//! allocation and channel errors in their own crates). Programmer errors are
//! raised through [`contract_violation`], which panics with a typed
//! [`ContractViolation`] payload so callers and tests can tell them apart
//! from ordinary panics.

use std::error::Error;
use std::fmt;

/// Errors arising while building a descriptor tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DescriptorError {
    /// A dimension was declared with zero length.
    EmptyDimension {
        /// Name of the offending dimension.
        name: String,
    },
    /// A coordinate value was NaN or infinite.
    NonFiniteCoordinate {
        /// Name of the offending dimension.
        name: String,
        /// Index of the first bad coordinate.
        index: usize,
    },
    /// Two elements of one packet share a name.
    DuplicateElement {
        /// The repeated element name.
        name: String,
    },
    /// A packet with no elements was used where data is required.
    EmptyPacket,
    /// An array was declared with no dimensions.
    NoDimensions,
    /// Dimension names and lengths disagree in count.
    ShapeMismatch {
        /// Number of names supplied.
        names: usize,
        /// Number of lengths supplied.
        lengths: usize,
    },
    /// Tiling metadata does not fit the array shape.
    InvalidTiling {
        /// What went wrong.
        reason: String,
    },
    /// A type name did not match any known element kind.
    UnknownKind {
        /// The unrecognised type name.
        name: String,
    },
    /// The array's cell count or byte size does not fit in `usize`.
    ArrayTooLarge {
        /// Lengths of every dimension.
        lengths: Vec<usize>,
        /// Bytes per cell.
        cell_size: usize,
    },
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyDimension { name } => {
                write!(f, "dimension '{name}' must have at least one index")
            }
            Self::NonFiniteCoordinate { name, index } => {
                write!(f, "dimension '{name}' has a non-finite coordinate at index {index}")
            }
            Self::DuplicateElement { name } => {
                write!(f, "element name '{name}' appears more than once in a packet")
            }
            Self::EmptyPacket => write!(f, "packet descriptor has no elements"),
            Self::NoDimensions => write!(f, "array descriptor has no dimensions"),
            Self::ShapeMismatch { names, lengths } => {
                write!(f, "{names} dimension names for {lengths} lengths")
            }
            Self::InvalidTiling { reason } => write!(f, "invalid tiling: {reason}"),
            Self::UnknownKind { name } => write!(f, "unknown element type '{name}'"),
            Self::ArrayTooLarge { lengths, cell_size } => {
                write!(f, "array of shape {lengths:?} with {cell_size}-byte cells overflows usize")
            }
        }
    }
}

impl Error for DescriptorError {}

/// Panic payload for a violated API contract.
///
/// Raised for programmer errors such as seeking a connection channel or
/// bulk-allocating into a non-empty list. These are not recoverable
/// conditions and are never returned as `Err`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContractViolation {
    /// The operation whose contract was broken.
    pub operation: &'static str,
    /// Human-readable description of the violation.
    pub detail: String,
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "contract violation in {}: {}", self.operation, self.detail)
    }
}

impl Error for ContractViolation {}

/// Log and raise a [`ContractViolation`].
///
/// The payload is delivered with [`std::panic::panic_any`], so
/// `catch_unwind` callers can downcast it.
#[track_caller]
pub fn contract_violation(operation: &'static str, detail: impl Into<String>) -> ! {
    let violation = ContractViolation {
        operation,
        detail: detail.into(),
    };
    tracing::error!(operation, detail = %violation.detail, "contract violation");
    std::panic::panic_any(violation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    #[test]
    fn contract_violation_payload_downcasts() {
        let result = catch_unwind(AssertUnwindSafe(|| {
            contract_violation("seek", "connection channels cannot seek")
        }));
        let payload = result.unwrap_err();
        let violation = payload.downcast_ref::<ContractViolation>().unwrap();
        assert_eq!(violation.operation, "seek");
        assert!(violation.to_string().contains("cannot seek"));
    }

    #[test]
    fn descriptor_error_messages_name_the_culprit() {
        let err = DescriptorError::DuplicateElement { name: "x".into() };
        assert!(err.to_string().contains("'x'"));
        let err = DescriptorError::EmptyDimension { name: "ra".into() };
        assert!(err.to_string().contains("'ra'"));
    }
}
