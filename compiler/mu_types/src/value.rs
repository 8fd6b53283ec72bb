//! Runtime values.
//!
//! `Value` is the unboxed form of anything that fits a machine
//! representation: it is what sits on a thread's evaluation stack, what a
//! native function receives as an argument, and what a field load yields.
//! Heap objects are referenced by handle; `Object(None)` is nil.

use std::fmt;

use mu_ir::ObjectId;

/// A value with a fixed machine representation.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub enum Value {
    #[default]
    Void,
    Bool(bool),
    Byte(u8),
    Short(i16),
    Int(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Vector(VectorValue),
    /// Reference to a heap object, `None` for nil.
    Object(Option<ObjectId>),
}

impl Value {
    /// The nil reference.
    pub const NIL: Value = Value::Object(None);

    pub fn as_bool(self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_int(self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_int64(self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_float(self) -> Option<f32> {
        match self {
            Value::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_double(self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(v),
            _ => None,
        }
    }

    /// The referenced object, if this is a non-nil reference.
    pub fn as_object(self) -> Option<ObjectId> {
        match self {
            Value::Object(obj) => obj,
            _ => None,
        }
    }

    /// Whether this value is a reference (nil included).
    #[inline]
    pub fn is_reference(self) -> bool {
        matches!(self, Value::Object(_))
    }

    #[inline]
    pub fn is_nil(self) -> bool {
        matches!(self, Value::Object(None))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Void => write!(f, "void"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Byte(v) => write!(f, "{v}"),
            Value::Short(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Double(v) => write!(f, "{v}"),
            Value::Char(c) => write!(f, "{c}"),
            Value::Vector(v) => write!(f, "{v}"),
            Value::Object(None) => write!(f, "nil"),
            Value::Object(Some(id)) => write!(f, "{id:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<ObjectId> for Value {
    fn from(id: ObjectId) -> Self {
        Value::Object(Some(id))
    }
}

/// A `vector float[dim]` value.
///
/// Unused lanes beyond `dim` are always zero so derived equality is lane
/// equality.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VectorValue {
    dim: u8,
    lanes: [f32; 4],
}

impl VectorValue {
    pub fn new(dim: u8, lanes: [f32; 4]) -> Self {
        let dim = dim.min(4);
        let mut masked = [0.0; 4];
        masked[..usize::from(dim)].copy_from_slice(&lanes[..usize::from(dim)]);
        Self { dim, lanes: masked }
    }

    pub const fn zero(dim: u8) -> Self {
        Self {
            dim: if dim > 4 { 4 } else { dim },
            lanes: [0.0; 4],
        }
    }

    #[inline]
    pub const fn dim(&self) -> u8 {
        self.dim
    }

    /// The live lanes.
    pub fn lanes(&self) -> &[f32] {
        &self.lanes[..usize::from(self.dim)]
    }
}

impl fmt::Display for VectorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<")?;
        for (i, lane) in self.lanes().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{lane}")?;
        }
        write!(f, ">")
    }
}
