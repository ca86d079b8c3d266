//! Shortcuts for the common single-array case.

use gds_core::{ArrayDescriptor, AtomicKind, DescriptorError, DimensionDescriptor, PacketDescriptor};

use crate::config::StoreConfig;
use crate::error::BuildError;
use crate::multi::MultiArray;

/// Build an array descriptor from `(name, length)` pairs, an atomic type
/// name (`"float"`, `"K_DOUBLE"`, ...) and the cell element's name.
pub fn array_descriptor(
    dims: &[(&str, usize)],
    type_name: &str,
    element: &str,
) -> Result<ArrayDescriptor, DescriptorError> {
    let cell = PacketDescriptor::builder().typed(element, type_name).build()?;
    let dimensions = dims
        .iter()
        .map(|&(name, length)| DimensionDescriptor::indices(name, length))
        .collect::<Result<Vec<_>, _>>()?;
    ArrayDescriptor::new(dimensions, cell)
}

/// Build and allocate a container holding one top-level packet `name` with
/// a single array element, also called `name`, whose cells hold one atomic
/// element called `element`.
///
/// Cells are zero-filled.
///
/// # Examples
///
/// ```
/// use gds_arena::easy_array;
/// use gds_core::{AtomicKind, Value};
///
/// let c = easy_array("counts", &[("bin", 8)], AtomicKind::UInt, "n").unwrap();
/// let view = c.array_view("counts", "counts").unwrap();
/// assert_eq!(view.values("n").unwrap(), vec![Value::Unsigned(0); 8]);
/// ```
pub fn easy_array(
    name: &str,
    dims: &[(&str, usize)],
    kind: AtomicKind,
    element: &str,
) -> Result<MultiArray, BuildError> {
    let array = array_descriptor(dims, kind.name(), element)?;
    let packet = PacketDescriptor::builder().array(name, array).build()?;
    let container =
        MultiArray::allocate(StoreConfig::default(), vec![(name.to_string(), packet)], true, true)?;
    Ok(container)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_names_are_parsed() {
        let a = array_descriptor(&[("t", 3)], "K_DCOMPLEX", "z").unwrap();
        assert_eq!(a.packet().size(), 16);
        assert_eq!(a.dimension(0).unwrap().name(), "t");
        assert!(matches!(
            array_descriptor(&[("t", 3)], "quaternion", "z"),
            Err(DescriptorError::UnknownKind { .. })
        ));
    }

    #[test]
    fn bad_shapes_surface_as_descriptor_errors() {
        assert!(matches!(
            easy_array("img", &[], AtomicKind::Float, "v"),
            Err(BuildError::Descriptor(DescriptorError::NoDimensions))
        ));
        assert!(matches!(
            easy_array("img", &[("x", 0)], AtomicKind::Float, "v"),
            Err(BuildError::Descriptor(DescriptorError::EmptyDimension { .. }))
        ));
    }

    #[test]
    fn easy_container_layout() {
        let c = easy_array("img", &[("y", 4), ("x", 5)], AtomicKind::Float, "v").unwrap();
        assert_eq!(c.packet_names(), vec!["img".to_string()]);
        let stats = c.stats();
        assert_eq!(stats.live_blocks, 2);
        assert_eq!(stats.live_bytes, 8 + 20 * 4);
    }
}
