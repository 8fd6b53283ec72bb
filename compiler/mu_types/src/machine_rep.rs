//! Machine representations.
//!
//! A `MachineRep` is how a value of some type is laid out in raw object
//! storage and on the evaluation stack. Scalars are stored little-endian;
//! every reference type (classes, strings, arrays, interfaces, variants,
//! opaque wrappers) is a `Pointer`, an 8-byte encoded [`ObjectId`] where
//! zero is nil.

use mu_ir::ObjectId;

use crate::{TypeError, Value, VectorValue};

/// Storage representation of a value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MachineRep {
    Void,
    Bool,
    Byte,
    Short,
    Int,
    Int64,
    Float,
    Double,
    Char,
    /// Reference to a heap object.
    Pointer,
    /// `dim` packed `f32` lanes (2..=4).
    Vector(u8),
}

impl MachineRep {
    /// Width in bytes.
    pub const fn size(self) -> usize {
        match self {
            MachineRep::Void => 0,
            MachineRep::Bool | MachineRep::Byte => 1,
            MachineRep::Short => 2,
            MachineRep::Int | MachineRep::Float | MachineRep::Char => 4,
            MachineRep::Int64 | MachineRep::Double | MachineRep::Pointer => 8,
            MachineRep::Vector(dim) => 4 * dim as usize,
        }
    }

    /// Required alignment in bytes (never zero).
    pub const fn align(self) -> usize {
        match self {
            MachineRep::Void | MachineRep::Bool | MachineRep::Byte => 1,
            MachineRep::Short => 2,
            MachineRep::Int | MachineRep::Float | MachineRep::Char | MachineRep::Vector(_) => 4,
            MachineRep::Int64 | MachineRep::Double | MachineRep::Pointer => 8,
        }
    }

    /// Whether values of this representation may hold a traced reference.
    #[inline]
    pub const fn is_pointer(self) -> bool {
        matches!(self, MachineRep::Pointer)
    }

    /// The zero value of this representation.
    pub const fn default_value(self) -> Value {
        match self {
            MachineRep::Void => Value::Void,
            MachineRep::Bool => Value::Bool(false),
            MachineRep::Byte => Value::Byte(0),
            MachineRep::Short => Value::Short(0),
            MachineRep::Int => Value::Int(0),
            MachineRep::Int64 => Value::Int64(0),
            MachineRep::Float => Value::Float(0.0),
            MachineRep::Double => Value::Double(0.0),
            MachineRep::Char => Value::Char('\0'),
            MachineRep::Pointer => Value::Object(None),
            MachineRep::Vector(dim) => Value::Vector(VectorValue::zero(dim)),
        }
    }

    /// Write `value` into the first `size()` bytes of `dst`.
    pub fn store(self, value: Value, dst: &mut [u8]) -> Result<(), TypeError> {
        let size = self.size();
        let Some(dst) = dst.get_mut(..size) else {
            return Err(TypeError::StorageTooSmall {
                needed: size,
                available: dst.len(),
            });
        };
        match (self, value) {
            (MachineRep::Void, Value::Void) => {}
            (MachineRep::Bool, Value::Bool(b)) => dst[0] = u8::from(b),
            (MachineRep::Byte, Value::Byte(b)) => dst[0] = b,
            (MachineRep::Short, Value::Short(v)) => dst.copy_from_slice(&v.to_le_bytes()),
            (MachineRep::Int, Value::Int(v)) => dst.copy_from_slice(&v.to_le_bytes()),
            (MachineRep::Int64, Value::Int64(v)) => dst.copy_from_slice(&v.to_le_bytes()),
            (MachineRep::Float, Value::Float(v)) => dst.copy_from_slice(&v.to_le_bytes()),
            (MachineRep::Double, Value::Double(v)) => dst.copy_from_slice(&v.to_le_bytes()),
            (MachineRep::Char, Value::Char(c)) => dst.copy_from_slice(&u32::from(c).to_le_bytes()),
            (MachineRep::Pointer, Value::Object(obj)) => {
                let bits = obj.map_or(0, ObjectId::to_bits);
                dst.copy_from_slice(&bits.to_le_bytes());
            }
            (MachineRep::Vector(dim), Value::Vector(v)) if v.dim() == dim => {
                for (chunk, lane) in dst.chunks_exact_mut(4).zip(v.lanes()) {
                    chunk.copy_from_slice(&lane.to_le_bytes());
                }
            }
            (rep, value) => return Err(TypeError::RepMismatch { rep, value }),
        }
        Ok(())
    }

    /// Read a value of this representation from the first `size()` bytes of
    /// `src`.
    pub fn load(self, src: &[u8]) -> Result<Value, TypeError> {
        let size = self.size();
        let Some(src) = src.get(..size) else {
            return Err(TypeError::StorageTooSmall {
                needed: size,
                available: src.len(),
            });
        };
        let value = match self {
            MachineRep::Void => Value::Void,
            MachineRep::Bool => Value::Bool(src[0] != 0),
            MachineRep::Byte => Value::Byte(src[0]),
            MachineRep::Short => Value::Short(i16::from_le_bytes([src[0], src[1]])),
            MachineRep::Int => Value::Int(i32::from_le_bytes(word4(src))),
            MachineRep::Int64 => Value::Int64(i64::from_le_bytes(word8(src))),
            MachineRep::Float => Value::Float(f32::from_le_bytes(word4(src))),
            MachineRep::Double => Value::Double(f64::from_le_bytes(word8(src))),
            MachineRep::Char => {
                Value::Char(char::from_u32(u32::from_le_bytes(word4(src))).unwrap_or('\u{FFFD}'))
            }
            MachineRep::Pointer => Value::Object(ObjectId::from_bits(u64::from_le_bytes(word8(src)))),
            MachineRep::Vector(dim) => {
                let mut lanes = [0.0f32; 4];
                for (lane, chunk) in lanes.iter_mut().zip(src.chunks_exact(4)) {
                    *lane = f32::from_le_bytes(word4(chunk));
                }
                Value::Vector(VectorValue::new(dim, lanes))
            }
        };
        Ok(value)
    }
}

#[inline]
fn word4(src: &[u8]) -> [u8; 4] {
    let mut word = [0u8; 4];
    word.copy_from_slice(&src[..4]);
    word
}

#[inline]
fn word8(src: &[u8]) -> [u8; 8] {
    let mut word = [0u8; 8];
    word.copy_from_slice(&src[..8]);
    word
}

/// Round `offset` up to a multiple of `align`.
#[inline]
pub const fn align_up(offset: usize, align: usize) -> usize {
    let align = if align == 0 { 1 } else { align };
    offset.div_ceil(align) * align
}
