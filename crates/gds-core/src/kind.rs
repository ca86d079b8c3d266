//! Element kinds, the fixed size table, and scalar [`Value`] conversion.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::array::ArrayDescriptor;
use crate::error::DescriptorError;
use crate::packet::PacketDescriptor;

/// Storage width of one scalar component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Component {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

fn bytes_of<const N: usize>(b: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&b[..N]);
    out
}

impl Component {
    fn size(self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    fn read(self, b: &[u8]) -> Value {
        match self {
            Self::I8 => Value::Integer(i8::from_ne_bytes(bytes_of(b)) as i64),
            Self::U8 => Value::Unsigned(b[0] as u64),
            Self::I16 => Value::Integer(i16::from_ne_bytes(bytes_of(b)) as i64),
            Self::U16 => Value::Unsigned(u16::from_ne_bytes(bytes_of(b)) as u64),
            Self::I32 => Value::Integer(i32::from_ne_bytes(bytes_of(b)) as i64),
            Self::U32 => Value::Unsigned(u32::from_ne_bytes(bytes_of(b)) as u64),
            Self::I64 => Value::Integer(i64::from_ne_bytes(bytes_of(b))),
            Self::U64 => Value::Unsigned(u64::from_ne_bytes(bytes_of(b))),
            Self::F32 => Value::Real(f32::from_ne_bytes(bytes_of(b)) as f64),
            Self::F64 => Value::Real(f64::from_ne_bytes(bytes_of(b))),
        }
    }

    fn write(self, b: &mut [u8], v: Value) {
        match self {
            Self::I8 => b[..1].copy_from_slice(&(v.to_i64() as i8).to_ne_bytes()),
            Self::U8 => b[0] = v.to_u64() as u8,
            Self::I16 => b[..2].copy_from_slice(&(v.to_i64() as i16).to_ne_bytes()),
            Self::U16 => b[..2].copy_from_slice(&(v.to_u64() as u16).to_ne_bytes()),
            Self::I32 => b[..4].copy_from_slice(&(v.to_i64() as i32).to_ne_bytes()),
            Self::U32 => b[..4].copy_from_slice(&(v.to_u64() as u32).to_ne_bytes()),
            Self::I64 => b[..8].copy_from_slice(&v.to_i64().to_ne_bytes()),
            Self::U64 => b[..8].copy_from_slice(&v.to_u64().to_ne_bytes()),
            Self::F32 => b[..4].copy_from_slice(&(v.real() as f32).to_ne_bytes()),
            Self::F64 => b[..8].copy_from_slice(&v.real().to_ne_bytes()),
        }
    }
}

/// One of the twenty fixed-size numeric element kinds.
///
/// Complex kinds store a (real, imaginary) pair of the base component,
/// real part first. All scalars are held in host byte order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AtomicKind {
    /// Signed 8-bit integer.
    Char,
    /// Unsigned 8-bit integer.
    UChar,
    /// Signed 16-bit integer.
    Short,
    /// Unsigned 16-bit integer.
    UShort,
    /// Signed 32-bit integer.
    Int,
    /// Unsigned 32-bit integer.
    UInt,
    /// Signed 64-bit integer.
    Long,
    /// Unsigned 64-bit integer.
    ULong,
    /// 32-bit float.
    Float,
    /// 64-bit float.
    Double,
    /// Pair of signed 8-bit integers.
    BComplex,
    /// Pair of unsigned 8-bit integers.
    UBComplex,
    /// Pair of signed 16-bit integers.
    SComplex,
    /// Pair of unsigned 16-bit integers.
    USComplex,
    /// Pair of signed 32-bit integers.
    IComplex,
    /// Pair of unsigned 32-bit integers.
    UIComplex,
    /// Pair of signed 64-bit integers.
    LComplex,
    /// Pair of unsigned 64-bit integers.
    ULComplex,
    /// Pair of 32-bit floats.
    FComplex,
    /// Pair of 64-bit floats.
    DComplex,
}

impl AtomicKind {
    /// Every atomic kind, in declaration order.
    pub const ALL: [AtomicKind; 20] = [
        Self::Char,
        Self::UChar,
        Self::Short,
        Self::UShort,
        Self::Int,
        Self::UInt,
        Self::Long,
        Self::ULong,
        Self::Float,
        Self::Double,
        Self::BComplex,
        Self::UBComplex,
        Self::SComplex,
        Self::USComplex,
        Self::IComplex,
        Self::UIComplex,
        Self::LComplex,
        Self::ULComplex,
        Self::FComplex,
        Self::DComplex,
    ];

    fn component(self) -> Component {
        match self {
            Self::Char | Self::BComplex => Component::I8,
            Self::UChar | Self::UBComplex => Component::U8,
            Self::Short | Self::SComplex => Component::I16,
            Self::UShort | Self::USComplex => Component::U16,
            Self::Int | Self::IComplex => Component::I32,
            Self::UInt | Self::UIComplex => Component::U32,
            Self::Long | Self::LComplex => Component::I64,
            Self::ULong | Self::ULComplex => Component::U64,
            Self::Float | Self::FComplex => Component::F32,
            Self::Double | Self::DComplex => Component::F64,
        }
    }

    /// Whether this kind stores a (real, imaginary) pair.
    pub fn is_complex(self) -> bool {
        matches!(
            self,
            Self::BComplex
                | Self::UBComplex
                | Self::SComplex
                | Self::USComplex
                | Self::IComplex
                | Self::UIComplex
                | Self::LComplex
                | Self::ULComplex
                | Self::FComplex
                | Self::DComplex
        )
    }

    /// Whether the base component is floating point.
    pub fn is_float(self) -> bool {
        matches!(self.component(), Component::F32 | Component::F64)
    }

    /// Whether the base component is a signed type.
    pub fn is_signed(self) -> bool {
        matches!(
            self.component(),
            Component::I8
                | Component::I16
                | Component::I32
                | Component::I64
                | Component::F32
                | Component::F64
        )
    }

    /// Size in bytes of one element of this kind.
    pub fn size(self) -> usize {
        let c = self.component().size();
        if self.is_complex() {
            2 * c
        } else {
            c
        }
    }

    /// Canonical lower-case type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Char => "char",
            Self::UChar => "uchar",
            Self::Short => "short",
            Self::UShort => "ushort",
            Self::Int => "int",
            Self::UInt => "uint",
            Self::Long => "long",
            Self::ULong => "ulong",
            Self::Float => "float",
            Self::Double => "double",
            Self::BComplex => "bcomplex",
            Self::UBComplex => "ubcomplex",
            Self::SComplex => "scomplex",
            Self::USComplex => "uscomplex",
            Self::IComplex => "icomplex",
            Self::UIComplex => "uicomplex",
            Self::LComplex => "lcomplex",
            Self::ULComplex => "ulcomplex",
            Self::FComplex => "fcomplex",
            Self::DComplex => "dcomplex",
        }
    }

    /// Parse a type name.
    ///
    /// Accepts the canonical names, an optional `K_` prefix in any case
    /// (`"K_FLOAT"`), the `byte`/`ubyte` aliases and Rust primitive names
    /// (`"f32"`, `"u16"`, ...).
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let base = lower.strip_prefix("k_").unwrap_or(lower.as_str());
        let kind = match base {
            "char" | "byte" | "i8" => Self::Char,
            "uchar" | "ubyte" | "u8" => Self::UChar,
            "short" | "i16" => Self::Short,
            "ushort" | "u16" => Self::UShort,
            "int" | "i32" => Self::Int,
            "uint" | "u32" => Self::UInt,
            "long" | "i64" => Self::Long,
            "ulong" | "u64" => Self::ULong,
            "float" | "f32" => Self::Float,
            "double" | "f64" => Self::Double,
            _ => return Self::ALL.into_iter().find(|k| k.name() == base),
        };
        Some(kind)
    }

    /// Decode one element from the front of `bytes`.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`size`](Self::size).
    pub fn read(self, bytes: &[u8]) -> Value {
        let c = self.component();
        if self.is_complex() {
            let n = c.size();
            Value::Complex {
                re: c.read(&bytes[..n]).real(),
                im: c.read(&bytes[n..2 * n]).real(),
            }
        } else {
            c.read(bytes)
        }
    }

    /// Encode `value` into the front of `bytes`, converting with `as`-cast
    /// semantics (truncation toward zero, saturation for float → int).
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than [`size`](Self::size).
    pub fn write(self, bytes: &mut [u8], value: Value) {
        let c = self.component();
        if self.is_complex() {
            let n = c.size();
            c.write(&mut bytes[..n], Value::Real(value.real()));
            c.write(&mut bytes[n..2 * n], Value::Real(value.imaginary()));
        } else {
            c.write(bytes, value);
        }
    }
}

impl fmt::Display for AtomicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AtomicKind {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| DescriptorError::UnknownKind { name: s.to_string() })
    }
}

/// A scalar read from, or written to, an atomic element.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    /// A signed integer.
    Integer(i64),
    /// An unsigned integer.
    Unsigned(u64),
    /// A real floating-point number.
    Real(f64),
    /// A complex number.
    Complex {
        /// Real part.
        re: f64,
        /// Imaginary part.
        im: f64,
    },
}

impl Value {
    /// The real part as `f64`.
    pub fn real(&self) -> f64 {
        match *self {
            Self::Integer(i) => i as f64,
            Self::Unsigned(u) => u as f64,
            Self::Real(r) => r,
            Self::Complex { re, .. } => re,
        }
    }

    /// The imaginary part, zero for non-complex values.
    pub fn imaginary(&self) -> f64 {
        match *self {
            Self::Complex { im, .. } => im,
            _ => 0.0,
        }
    }

    /// The value as `i64` (`as`-cast semantics).
    pub fn to_i64(&self) -> i64 {
        match *self {
            Self::Integer(i) => i,
            Self::Unsigned(u) => u as i64,
            Self::Real(r) => r as i64,
            Self::Complex { re, .. } => re as i64,
        }
    }

    /// The value as `u64` (`as`-cast semantics).
    pub fn to_u64(&self) -> u64 {
        match *self {
            Self::Integer(i) => i as u64,
            Self::Unsigned(u) => u,
            Self::Real(r) => r as u64,
            Self::Complex { re, .. } => re as u64,
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Real(v as f64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Integer(v as i64)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Self::Unsigned(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Unsigned(v as u64)
    }
}

/// The type tag of one packet element.
///
/// Every element that is not atomic occupies [`ElementKind::HANDLE_SIZE`]
/// bytes in its packet: a block handle, with `0` meaning "not allocated".
#[derive(Clone, Debug)]
pub enum ElementKind {
    /// A fixed-size numeric scalar.
    Atomic(AtomicKind),
    /// A variable-length string held in its own block.
    VString,
    /// A string with a fixed capacity of `max_len` bytes.
    FString {
        /// Capacity in bytes.
        max_len: usize,
    },
    /// A nested N-dimensional array.
    Array(Arc<ArrayDescriptor>),
    /// A linked list of packets.
    List(Arc<PacketDescriptor>),
}

impl ElementKind {
    /// Size of a block handle stored inside a packet.
    pub const HANDLE_SIZE: usize = 8;

    /// Bytes this element occupies inside its packet.
    pub fn size(&self) -> usize {
        match self {
            Self::Atomic(kind) => kind.size(),
            Self::VString | Self::FString { .. } | Self::Array(_) | Self::List(_) => {
                Self::HANDLE_SIZE
            }
        }
    }

    /// Whether this element nests a descriptor (array or list).
    pub fn is_recursive(&self) -> bool {
        matches!(self, Self::Array(_) | Self::List(_))
    }

    /// Whether the packet bytes for this element hold a block handle.
    pub fn holds_handle(&self) -> bool {
        !matches!(self, Self::Atomic(_))
    }

    /// Short type name for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Atomic(kind) => kind.name(),
            Self::VString => "vstring",
            Self::FString { .. } => "fstring",
            Self::Array(_) => "array",
            Self::List(_) => "list",
        }
    }
}

impl PartialEq for ElementKind {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Atomic(a), Self::Atomic(b)) => a == b,
            (Self::VString, Self::VString) => true,
            (Self::FString { max_len: a }, Self::FString { max_len: b }) => a == b,
            (Self::Array(a), Self::Array(b)) => Arc::ptr_eq(a, b) || **a == **b,
            (Self::List(a), Self::List(b)) => Arc::ptr_eq(a, b) || **a == **b,
            _ => false,
        }
    }
}

impl From<AtomicKind> for ElementKind {
    fn from(kind: AtomicKind) -> Self {
        Self::Atomic(kind)
    }
}
