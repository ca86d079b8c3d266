//! Packet descriptors: ordered, uniquely named sequences of typed elements.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::array::ArrayDescriptor;
use crate::error::DescriptorError;
use crate::kind::{AtomicKind, ElementKind};

/// One element of a packet, with its precomputed byte offset.
#[derive(Clone, Debug, PartialEq)]
pub struct PacketElement {
    kind: ElementKind,
    offset: usize,
}

impl PacketElement {
    /// Element type tag.
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// Byte offset of this element from the start of the packet.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Bytes this element occupies in the packet.
    pub fn size(&self) -> usize {
        self.kind.size()
    }
}

/// Describes the layout of one packet.
///
/// Elements are kept in declaration order in an `IndexMap` (not a
/// `HashMap`), so iteration, offsets, and therefore the byte layout are
/// deterministic. A packet's size is the sum of its element sizes; there is
/// no alignment padding.
///
/// # Examples
///
/// ```
/// use gds_core::{AtomicKind, PacketDescriptor};
///
/// let packet = PacketDescriptor::builder()
///     .atomic("x", AtomicKind::Float)
///     .atomic("flux", AtomicKind::Double)
///     .vstring("label")
///     .build()
///     .unwrap();
/// assert_eq!(packet.size(), 4 + 8 + 8);
/// assert_eq!(packet.element("flux").unwrap().offset(), 4);
/// ```
#[derive(Clone, Debug)]
pub struct PacketDescriptor {
    elements: IndexMap<String, PacketElement>,
    size: usize,
}

impl PacketDescriptor {
    /// Start building a packet.
    pub fn builder() -> PacketBuilder {
        PacketBuilder::default()
    }

    /// A packet holding exactly one element.
    pub fn single(name: impl Into<String>, kind: impl Into<ElementKind>) -> Self {
        let mut elements = IndexMap::with_capacity(1);
        let kind = kind.into();
        let size = kind.size();
        elements.insert(name.into(), PacketElement { kind, offset: 0 });
        Self { elements, size }
    }

    /// Total bytes of one packet.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the packet has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Look up an element by name.
    pub fn element(&self, name: &str) -> Option<&PacketElement> {
        self.elements.get(name)
    }

    /// Position of the named element in declaration order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.elements.get_index_of(name)
    }

    /// Element at position `index`, with its name.
    pub fn element_at(&self, index: usize) -> Option<(&str, &PacketElement)> {
        self.elements
            .get_index(index)
            .map(|(name, element)| (name.as_str(), element))
    }

    /// Iterate over `(name, element)` in declaration order.
    pub fn elements(&self) -> impl Iterator<Item = (&str, &PacketElement)> {
        self.elements.iter().map(|(name, element)| (name.as_str(), element))
    }

    /// Whether any element owns a separately allocated block
    /// (string, array or list).
    pub fn holds_handles(&self) -> bool {
        self.elements.values().any(|e| e.kind.holds_handle())
    }

    /// Whether any element nests an array or list.
    pub fn is_recursive(&self) -> bool {
        self.elements.values().any(|e| e.kind.is_recursive())
    }

    /// Whether every element is atomic.
    pub fn is_atomic_only(&self) -> bool {
        !self.holds_handles()
    }
}

impl PartialEq for PacketDescriptor {
    fn eq(&self, other: &Self) -> bool {
        // IndexMap equality ignores order; layout does not.
        self.size == other.size
            && self.elements.len() == other.elements.len()
            && self
                .elements
                .iter()
                .zip(other.elements.iter())
                .all(|(a, b)| a == b)
    }
}

/// Incremental builder for [`PacketDescriptor`].
///
/// Errors (duplicate names) are deferred to [`build`](Self::build) so the
/// builder can be chained.
#[derive(Debug, Default)]
pub struct PacketBuilder {
    elements: IndexMap<String, PacketElement>,
    size: usize,
    error: Option<DescriptorError>,
}

impl PacketBuilder {
    /// Append an element of any kind.
    pub fn element(mut self, name: impl Into<String>, kind: impl Into<ElementKind>) -> Self {
        let name = name.into();
        if self.error.is_some() {
            return self;
        }
        if self.elements.contains_key(&name) {
            self.error = Some(DescriptorError::DuplicateElement { name });
            return self;
        }
        let kind = kind.into();
        let offset = self.size;
        self.size += kind.size();
        self.elements.insert(name, PacketElement { kind, offset });
        self
    }

    /// Append an atomic element.
    pub fn atomic(self, name: impl Into<String>, kind: AtomicKind) -> Self {
        self.element(name, ElementKind::Atomic(kind))
    }

    /// Append an atomic element by type name (`"float"`, `"K_INT"`, ...).
    pub fn typed(mut self, name: impl Into<String>, type_name: &str) -> Self {
        match type_name.parse::<AtomicKind>() {
            Ok(kind) => self.atomic(name, kind),
            Err(e) => {
                self.error.get_or_insert(e);
                self
            }
        }
    }

    /// Append a variable-length string element.
    pub fn vstring(self, name: impl Into<String>) -> Self {
        self.element(name, ElementKind::VString)
    }

    /// Append a fixed-capacity string element.
    pub fn fstring(self, name: impl Into<String>, max_len: usize) -> Self {
        self.element(name, ElementKind::FString { max_len })
    }

    /// Append a nested array element.
    pub fn array(self, name: impl Into<String>, array: ArrayDescriptor) -> Self {
        self.element(name, ElementKind::Array(Arc::new(array)))
    }

    /// Append a linked-list element whose entries follow `entry`.
    pub fn list(self, name: impl Into<String>, entry: PacketDescriptor) -> Self {
        self.element(name, ElementKind::List(Arc::new(entry)))
    }

    /// Finish the packet.
    pub fn build(self) -> Result<PacketDescriptor, DescriptorError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        if self.elements.is_empty() {
            return Err(DescriptorError::EmptyPacket);
        }
        Ok(PacketDescriptor {
            elements: self.elements,
            size: self.size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dimension::DimensionDescriptor;

    #[test]
    fn offsets_are_running_sums() {
        let p = PacketDescriptor::builder()
            .atomic("a", AtomicKind::Char)
            .atomic("b", AtomicKind::DComplex)
            .fstring("c", 16)
            .atomic("d", AtomicKind::Short)
            .build()
            .unwrap();
        let offsets: Vec<_> = p.elements().map(|(_, e)| e.offset()).collect();
        assert_eq!(offsets, vec![0, 1, 17, 25]);
        assert_eq!(p.size(), 27);
    }

    #[test]
    fn duplicate_names_fail_at_build() {
        let err = PacketDescriptor::builder()
            .atomic("x", AtomicKind::Int)
            .atomic("x", AtomicKind::Float)
            .build()
            .unwrap_err();
        assert_eq!(err, DescriptorError::DuplicateElement { name: "x".into() });
    }

    #[test]
    fn empty_packet_is_rejected() {
        assert_eq!(
            PacketDescriptor::builder().build().unwrap_err(),
            DescriptorError::EmptyPacket
        );
    }

    #[test]
    fn typed_parses_type_names() {
        let p = PacketDescriptor::builder()
            .typed("v", "K_USHORT")
            .build()
            .unwrap();
        assert_eq!(
            p.element("v").unwrap().kind(),
            &ElementKind::Atomic(AtomicKind::UShort)
        );
        assert!(PacketDescriptor::builder().typed("v", "bogus").build().is_err());
    }

    #[test]
    fn recursion_flags() {
        let flat = PacketDescriptor::single("x", AtomicKind::Float);
        assert!(flat.is_atomic_only());
        assert!(!flat.is_recursive());

        let dim = DimensionDescriptor::indices("i", 4).unwrap();
        let arr = ArrayDescriptor::new(vec![dim], flat.clone()).unwrap();
        let nested = PacketDescriptor::builder()
            .vstring("name")
            .array("data", arr)
            .build()
            .unwrap();
        assert!(nested.is_recursive());
        assert!(!nested.is_atomic_only());

        let strings = PacketDescriptor::single("s", ElementKind::VString);
        assert!(strings.holds_handles());
        assert!(!strings.is_recursive());
    }

    #[test]
    fn equality_respects_order() {
        let ab = PacketDescriptor::builder()
            .atomic("a", AtomicKind::Int)
            .atomic("b", AtomicKind::Int)
            .build()
            .unwrap();
        let ba = PacketDescriptor::builder()
            .atomic("b", AtomicKind::Int)
            .atomic("a", AtomicKind::Int)
            .build()
            .unwrap();
        assert_ne!(ab, ba);
        assert_eq!(ab, ab.clone());
    }
}
