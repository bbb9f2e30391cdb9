//! Fixed-width codecs for the closed set of primitive types
//!
//! Two ways in:
//! - [`Primitive`] is a sealed trait implemented for exactly the supported
//!   Rust types, so generic reads and writes are resolved at compile time.
//!   Asking for any other type is a compile error.
//! - [`PrimitiveKind`] and [`Value`] form a small dispatch table keyed by a
//!   type tag, for callers that only learn the type at runtime (the CLI).
//!   Unknown tags fail with `UnsupportedType`.
//!
//! All multi-byte values are little-endian. `bool` is one byte (0 or 1 on
//! write, non-zero reads as true). `char` is a 4-byte Unicode scalar value.

use crate::error::{HeapError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Widest encoded primitive in bytes
pub const MAX_WIDTH: usize = 8;

mod sealed {
    pub trait Sealed {}
}

/// A type that can be stored through a handle
pub trait Primitive: sealed::Sealed + Copy + Sized {
    /// Runtime tag of this type
    const KIND: PrimitiveKind;

    /// Encoded width in bytes
    const WIDTH: usize;

    /// Encode into `buf`, which is exactly `WIDTH` bytes long
    fn encode_into(self, buf: &mut [u8]);

    /// Decode from exactly `WIDTH` bytes
    fn decode(buf: &[u8]) -> Result<Self>;
}

fn exact<const N: usize>(buf: &[u8]) -> Result<[u8; N]> {
    buf.try_into().map_err(|_| {
        HeapError::InvalidValue(format!("expected {} bytes, got {}", N, buf.len()))
    })
}

macro_rules! impl_numeric {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Primitive for $ty {
                const KIND: PrimitiveKind = PrimitiveKind::$kind;
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn encode_into(self, buf: &mut [u8]) {
                    buf.copy_from_slice(&self.to_le_bytes());
                }

                fn decode(buf: &[u8]) -> Result<Self> {
                    Ok(<$ty>::from_le_bytes(exact(buf)?))
                }
            }
        )*
    };
}

impl_numeric! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

impl sealed::Sealed for bool {}

impl Primitive for bool {
    const KIND: PrimitiveKind = PrimitiveKind::Bool;
    const WIDTH: usize = 1;

    fn encode_into(self, buf: &mut [u8]) {
        buf[0] = self as u8;
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let [byte] = exact::<1>(buf)?;
        Ok(byte != 0)
    }
}

impl sealed::Sealed for char {}

impl Primitive for char {
    const KIND: PrimitiveKind = PrimitiveKind::Char;
    const WIDTH: usize = 4;

    fn encode_into(self, buf: &mut [u8]) {
        buf.copy_from_slice(&(self as u32).to_le_bytes());
    }

    fn decode(buf: &[u8]) -> Result<Self> {
        let scalar = u32::from_le_bytes(exact(buf)?);
        char::from_u32(scalar).ok_or_else(|| {
            HeapError::InvalidValue(format!("0x{:08x} is not a Unicode scalar value", scalar))
        })
    }
}

/// Runtime tag for one of the supported primitive types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Bool,
    Char,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 12] = [
        PrimitiveKind::I8,
        PrimitiveKind::I16,
        PrimitiveKind::I32,
        PrimitiveKind::I64,
        PrimitiveKind::U8,
        PrimitiveKind::U16,
        PrimitiveKind::U32,
        PrimitiveKind::U64,
        PrimitiveKind::F32,
        PrimitiveKind::F64,
        PrimitiveKind::Bool,
        PrimitiveKind::Char,
    ];

    /// Encoded width in bytes
    pub fn width(self) -> usize {
        match self {
            PrimitiveKind::I8 | PrimitiveKind::U8 | PrimitiveKind::Bool => 1,
            PrimitiveKind::I16 | PrimitiveKind::U16 => 2,
            PrimitiveKind::I32 | PrimitiveKind::U32 | PrimitiveKind::F32 | PrimitiveKind::Char => 4,
            PrimitiveKind::I64 | PrimitiveKind::U64 | PrimitiveKind::F64 => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveKind::I8 => "i8",
            PrimitiveKind::I16 => "i16",
            PrimitiveKind::I32 => "i32",
            PrimitiveKind::I64 => "i64",
            PrimitiveKind::U8 => "u8",
            PrimitiveKind::U16 => "u16",
            PrimitiveKind::U32 => "u32",
            PrimitiveKind::U64 => "u64",
            PrimitiveKind::F32 => "f32",
            PrimitiveKind::F64 => "f64",
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Char => "char",
        }
    }

    /// Parse a textual value of this kind
    pub fn parse_value(self, text: &str) -> Result<Value> {
        fn parse<T: FromStr>(kind: PrimitiveKind, text: &str) -> Result<T> {
            text.trim().parse::<T>().map_err(|_| {
                HeapError::InvalidValue(format!("'{}' is not a valid {}", text, kind.name()))
            })
        }

        Ok(match self {
            PrimitiveKind::I8 => Value::I8(parse(self, text)?),
            PrimitiveKind::I16 => Value::I16(parse(self, text)?),
            PrimitiveKind::I32 => Value::I32(parse(self, text)?),
            PrimitiveKind::I64 => Value::I64(parse(self, text)?),
            PrimitiveKind::U8 => Value::U8(parse(self, text)?),
            PrimitiveKind::U16 => Value::U16(parse(self, text)?),
            PrimitiveKind::U32 => Value::U32(parse(self, text)?),
            PrimitiveKind::U64 => Value::U64(parse(self, text)?),
            PrimitiveKind::F32 => Value::F32(parse(self, text)?),
            PrimitiveKind::F64 => Value::F64(parse(self, text)?),
            PrimitiveKind::Bool => Value::Bool(parse(self, text)?),
            // chars are taken literally, no trimming
            PrimitiveKind::Char => {
                let mut chars = text.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Value::Char(c),
                    _ => {
                        return Err(HeapError::InvalidValue(format!(
                            "'{}' is not a single char",
                            text
                        )))
                    }
                }
            }
        })
    }

    /// Decode bytes of exactly `self.width()` length
    pub fn decode(self, buf: &[u8]) -> Result<Value> {
        Ok(match self {
            PrimitiveKind::I8 => Value::I8(i8::decode(buf)?),
            PrimitiveKind::I16 => Value::I16(i16::decode(buf)?),
            PrimitiveKind::I32 => Value::I32(i32::decode(buf)?),
            PrimitiveKind::I64 => Value::I64(i64::decode(buf)?),
            PrimitiveKind::U8 => Value::U8(u8::decode(buf)?),
            PrimitiveKind::U16 => Value::U16(u16::decode(buf)?),
            PrimitiveKind::U32 => Value::U32(u32::decode(buf)?),
            PrimitiveKind::U64 => Value::U64(u64::decode(buf)?),
            PrimitiveKind::F32 => Value::F32(f32::decode(buf)?),
            PrimitiveKind::F64 => Value::F64(f64::decode(buf)?),
            PrimitiveKind::Bool => Value::Bool(bool::decode(buf)?),
            PrimitiveKind::Char => Value::Char(char::decode(buf)?),
        })
    }
}

impl FromStr for PrimitiveKind {
    type Err = HeapError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "i8" | "sbyte" => Ok(PrimitiveKind::I8),
            "i16" | "short" => Ok(PrimitiveKind::I16),
            "i32" | "int" => Ok(PrimitiveKind::I32),
            "i64" | "long" => Ok(PrimitiveKind::I64),
            "u8" | "byte" => Ok(PrimitiveKind::U8),
            "u16" | "ushort" => Ok(PrimitiveKind::U16),
            "u32" | "uint" => Ok(PrimitiveKind::U32),
            "u64" | "ulong" => Ok(PrimitiveKind::U64),
            "f32" | "float" => Ok(PrimitiveKind::F32),
            "f64" | "double" => Ok(PrimitiveKind::F64),
            "bool" => Ok(PrimitiveKind::Bool),
            "char" => Ok(PrimitiveKind::Char),
            _ => Err(HeapError::UnsupportedType(s.to_string())),
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A dynamically typed primitive value
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Value {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Bool(bool),
    Char(char),
}

impl Value {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Value::I8(_) => PrimitiveKind::I8,
            Value::I16(_) => PrimitiveKind::I16,
            Value::I32(_) => PrimitiveKind::I32,
            Value::I64(_) => PrimitiveKind::I64,
            Value::U8(_) => PrimitiveKind::U8,
            Value::U16(_) => PrimitiveKind::U16,
            Value::U32(_) => PrimitiveKind::U32,
            Value::U64(_) => PrimitiveKind::U64,
            Value::F32(_) => PrimitiveKind::F32,
            Value::F64(_) => PrimitiveKind::F64,
            Value::Bool(_) => PrimitiveKind::Bool,
            Value::Char(_) => PrimitiveKind::Char,
        }
    }

    /// Encode into `buf`, which must be `self.kind().width()` bytes long
    pub fn encode_into(self, buf: &mut [u8]) {
        match self {
            Value::I8(v) => v.encode_into(buf),
            Value::I16(v) => v.encode_into(buf),
            Value::I32(v) => v.encode_into(buf),
            Value::I64(v) => v.encode_into(buf),
            Value::U8(v) => v.encode_into(buf),
            Value::U16(v) => v.encode_into(buf),
            Value::U32(v) => v.encode_into(buf),
            Value::U64(v) => v.encode_into(buf),
            Value::F32(v) => v.encode_into(buf),
            Value::F64(v) => v.encode_into(buf),
            Value::Bool(v) => v.encode_into(buf),
            Value::Char(v) => v.encode_into(buf),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::I8(v) => write!(f, "{}", v),
            Value::I16(v) => write!(f, "{}", v),
            Value::I32(v) => write!(f, "{}", v),
            Value::I64(v) => write!(f, "{}", v),
            Value::U8(v) => write!(f, "{}", v),
            Value::U16(v) => write!(f, "{}", v),
            Value::U32(v) => write!(f, "{}", v),
            Value::U64(v) => write!(f, "{}", v),
            Value::F32(v) => write!(f, "{}", v),
            Value::F64(v) => write!(f, "{}", v),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Char(v) => write!(f, "{}", v),
        }
    }
}
