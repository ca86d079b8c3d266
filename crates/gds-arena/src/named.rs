//! Access to elements by name anywhere in a packet tree.
//!
//! A name identifies a value when it occurs exactly once in the descriptor
//! tree, counting through nested arrays of a single cell. An occurrence
//! inside an array of more than one cell, or inside a list, names many
//! values and makes the lookup ambiguous.

use gds_core::{ElementKind, PacketDescriptor, Value};

use crate::error::NamedValueError;
use crate::handle::BlockId;
use crate::store::Store;

/// Resolved position of a uniquely named element.
struct Located {
    block: BlockId,
    offset: usize,
    kind: ElementKind,
}

/// Read the uniquely named atomic element of the tree rooted at `block`.
pub fn get_named_value(
    store: &Store,
    packet: &PacketDescriptor,
    block: BlockId,
    name: &str,
) -> Result<Value, NamedValueError> {
    get_value_in(store, &[(packet, block)], name)
}

/// Write the uniquely named atomic element of the tree rooted at `block`.
pub fn put_named_value(
    store: &mut Store,
    packet: &PacketDescriptor,
    block: BlockId,
    name: &str,
    value: Value,
) -> Result<(), NamedValueError> {
    put_value_in(store, &[(packet, block)], name, value)
}

/// Read the uniquely named string element of the tree rooted at `block`.
///
/// A null variable-length string reads as empty. Fixed strings end at their
/// first NUL byte. Invalid UTF-8 is replaced.
pub fn get_named_string(
    store: &Store,
    packet: &PacketDescriptor,
    block: BlockId,
    name: &str,
) -> Result<String, NamedValueError> {
    get_string_in(store, &[(packet, block)], name)
}

/// Write the uniquely named string element of the tree rooted at `block`.
///
/// Variable-length strings get a fresh block sized to `value` (null when
/// empty). Fixed strings are truncated to their capacity and zero-padded.
pub fn put_named_string(
    store: &mut Store,
    packet: &PacketDescriptor,
    block: BlockId,
    name: &str,
    value: &str,
) -> Result<(), NamedValueError> {
    put_string_in(store, &[(packet, block)], name, value)
}

pub(crate) fn get_value_in(
    store: &Store,
    roots: &[(&PacketDescriptor, BlockId)],
    name: &str,
) -> Result<Value, NamedValueError> {
    let found = locate(store, roots, name)?;
    let ElementKind::Atomic(kind) = found.kind else {
        return Err(mismatch(name, "scalar", &found.kind));
    };
    let bytes = store
        .bytes(found.block)
        .ok_or_else(|| not_allocated(name))?;
    Ok(kind.read(&bytes[found.offset..found.offset + kind.size()]))
}

pub(crate) fn put_value_in(
    store: &mut Store,
    roots: &[(&PacketDescriptor, BlockId)],
    name: &str,
    value: Value,
) -> Result<(), NamedValueError> {
    let found = locate(store, roots, name)?;
    let ElementKind::Atomic(kind) = found.kind else {
        return Err(mismatch(name, "scalar", &found.kind));
    };
    let bytes = store
        .bytes_mut(found.block)
        .ok_or_else(|| not_allocated(name))?;
    kind.write(&mut bytes[found.offset..found.offset + kind.size()], value);
    Ok(())
}

pub(crate) fn get_string_in(
    store: &Store,
    roots: &[(&PacketDescriptor, BlockId)],
    name: &str,
) -> Result<String, NamedValueError> {
    let found = locate(store, roots, name)?;
    let handle = store.read_handle(found.block, found.offset);
    let bytes = store.bytes(handle).unwrap_or_default();
    match found.kind {
        ElementKind::VString => Ok(String::from_utf8_lossy(bytes).into_owned()),
        ElementKind::FString { .. } => {
            let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
            Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
        }
        ref other => Err(mismatch(name, "string", other)),
    }
}

pub(crate) fn put_string_in(
    store: &mut Store,
    roots: &[(&PacketDescriptor, BlockId)],
    name: &str,
    value: &str,
) -> Result<(), NamedValueError> {
    let found = locate(store, roots, name)?;
    match found.kind {
        ElementKind::VString => {
            let old = store.read_handle(found.block, found.offset);
            let new = if value.is_empty() {
                BlockId::NULL
            } else {
                let block = store.alloc_bytes(value.len(), false)?;
                if let Some(bytes) = store.bytes_mut(block) {
                    bytes.copy_from_slice(value.as_bytes());
                }
                block
            };
            if let Err(e) = store.write_handle(found.block, found.offset, new) {
                store.free(new);
                return Err(e.into());
            }
            store.free(old);
            Ok(())
        }
        ElementKind::FString { max_len } => {
            let mut handle = store.read_handle(found.block, found.offset);
            if !store.contains(handle) {
                handle = store.alloc_bytes(max_len, true)?;
                store.write_handle(found.block, found.offset, handle)?;
            }
            if let Some(bytes) = store.bytes_mut(handle) {
                let n = value.len().min(bytes.len());
                bytes.fill(0);
                bytes[..n].copy_from_slice(&value.as_bytes()[..n]);
            }
            Ok(())
        }
        ref other => Err(mismatch(name, "string", other)),
    }
}

fn locate(
    store: &Store,
    roots: &[(&PacketDescriptor, BlockId)],
    name: &str,
) -> Result<Located, NamedValueError> {
    let mut paths: Vec<(usize, Vec<usize>)> = Vec::new();
    let mut ambiguous = false;
    for (root, (packet, _)) in roots.iter().enumerate() {
        let mut found = Vec::new();
        search(packet, name, &mut Vec::new(), &mut found, &mut ambiguous);
        paths.extend(found.into_iter().map(|path| (root, path)));
    }
    if ambiguous || paths.len() > 1 {
        return Err(NamedValueError::NameNotUnique {
            name: name.to_string(),
        });
    }
    let Some((root, path)) = paths.pop() else {
        return Err(NamedValueError::NameNotFound {
            name: name.to_string(),
        });
    };

    let (mut packet, mut block) = roots[root];
    let mut base = 0;
    let (last, through) = path
        .split_last()
        .ok_or_else(|| NamedValueError::NameNotFound {
            name: name.to_string(),
        })?;
    for &i in through {
        let Some((_, element)) = packet.element_at(i) else {
            return Err(not_allocated(name));
        };
        let ElementKind::Array(array) = element.kind() else {
            return Err(not_allocated(name));
        };
        let data = store.read_handle(block, base + element.offset());
        if data.is_null() {
            return Err(not_allocated(name));
        }
        packet = array.packet();
        block = data;
        base = 0;
    }
    let Some((_, element)) = packet.element_at(*last) else {
        return Err(not_allocated(name));
    };
    Ok(Located {
        block,
        offset: base + element.offset(),
        kind: element.kind().clone(),
    })
}

/// Collect element-index paths to `name`, descending through single-cell
/// arrays. Occurrences under multi-cell arrays or lists set `ambiguous`.
fn search(
    packet: &PacketDescriptor,
    name: &str,
    prefix: &mut Vec<usize>,
    found: &mut Vec<Vec<usize>>,
    ambiguous: &mut bool,
) {
    for (i, (element_name, element)) in packet.elements().enumerate() {
        prefix.push(i);
        if element_name == name {
            found.push(prefix.clone());
        }
        match element.kind() {
            ElementKind::Array(array) if array.cell_count() == 1 => {
                search(array.packet(), name, prefix, found, ambiguous);
            }
            ElementKind::Array(array) => *ambiguous |= mentions(array.packet(), name),
            ElementKind::List(entry) => *ambiguous |= mentions(entry, name),
            _ => {}
        }
        prefix.pop();
    }
}

fn mentions(packet: &PacketDescriptor, name: &str) -> bool {
    packet.elements().any(|(element_name, element)| {
        element_name == name
            || match element.kind() {
                ElementKind::Array(array) => mentions(array.packet(), name),
                ElementKind::List(entry) => mentions(entry, name),
                _ => false,
            }
    })
}

fn mismatch(name: &str, expected: &'static str, found: &ElementKind) -> NamedValueError {
    NamedValueError::TypeMismatch {
        name: name.to_string(),
        expected,
        found: found.type_name(),
    }
}

fn not_allocated(name: &str) -> NamedValueError {
    NamedValueError::NotAllocated {
        name: name.to_string(),
    }
}
