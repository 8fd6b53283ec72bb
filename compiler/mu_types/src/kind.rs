//! Type descriptions stored in the pool.

use mu_ir::{FunctionId, Name};
use smallvec::SmallVec;

use crate::{MachineRep, TypeId, TypePattern};

/// A type as stored in the pool.
#[derive(Clone, Debug)]
pub struct TypeEntry {
    /// Display name, also the name of the type's symbol.
    pub name: Name,
    pub kind: TypeKind,
}

/// What a type is.
#[derive(Clone, Debug)]
pub enum TypeKind {
    Void,
    /// Scalar with a fixed machine representation (GC-atomic).
    Primitive(MachineRep),
    /// Type of the `nil` literal.
    Nil,
    /// Immutable text object.
    String,
    /// `vector float[dim]`, stored inline like a primitive.
    Vector { element: TypeId, dim: u8 },
    Class(ClassData),
    Interface(InterfaceData),
    Variant(VariantData),
    Function(FunctionSignature),
    /// `T[]`
    DynamicArray { element: TypeId },
    /// `T[len]`
    FixedArray { element: TypeId, len: usize },
    /// Host object wrapper.
    Opaque,
    Pattern(TypePattern),
}

impl TypeKind {
    /// Storage representation of a value of this kind.
    ///
    /// Every heap-allocated kind is referenced through a pointer.
    pub fn machine_rep(&self) -> MachineRep {
        match self {
            TypeKind::Void | TypeKind::Pattern(_) => MachineRep::Void,
            TypeKind::Primitive(rep) => *rep,
            TypeKind::Vector { dim, .. } => MachineRep::Vector(*dim),
            TypeKind::Nil
            | TypeKind::String
            | TypeKind::Class(_)
            | TypeKind::Interface(_)
            | TypeKind::Variant(_)
            | TypeKind::Function(_)
            | TypeKind::DynamicArray { .. }
            | TypeKind::FixedArray { .. }
            | TypeKind::Opaque => MachineRep::Pointer,
        }
    }

    /// Whether values of this kind live in the heap.
    #[inline]
    pub fn is_reference(&self) -> bool {
        self.machine_rep().is_pointer()
    }

    #[inline]
    pub fn is_class(&self) -> bool {
        matches!(self, TypeKind::Class(_))
    }

    #[inline]
    pub fn is_interface(&self) -> bool {
        matches!(self, TypeKind::Interface(_))
    }

    #[inline]
    pub fn is_pattern(&self) -> bool {
        matches!(self, TypeKind::Pattern(_))
    }
}

/// Parameter and return types of a function.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionSignature {
    pub params: SmallVec<[TypeId; 4]>,
    pub ret: TypeId,
}

/// A declared class field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub name: Name,
    pub ty: TypeId,
}

/// A field placed in the instance layout.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct FieldSlot {
    pub name: Name,
    pub ty: TypeId,
    pub offset: usize,
    pub rep: MachineRep,
}

/// Instance layout computed when a class is frozen.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassLayout {
    /// Inherited fields first, then the class's own fields.
    pub fields: Vec<FieldSlot>,
    pub instance_size: usize,
    pub align: usize,
    /// No field holds a traced reference.
    pub gc_atomic: bool,
}

impl ClassLayout {
    /// Field by name, searching inherited fields too.
    pub fn field(&self, name: Name) -> Option<&FieldSlot> {
        // Later (more derived) fields shadow inherited ones.
        self.fields.iter().rev().find(|f| f.name == name)
    }
}

/// A method bound to a class.
///
/// The signature includes the receiver as its first parameter.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Method {
    pub name: Name,
    pub signature: TypeId,
    pub function: FunctionId,
}

/// Class description.
#[derive(Clone, Debug, Default)]
pub struct ClassData {
    pub super_class: Option<TypeId>,
    pub interfaces: Vec<TypeId>,
    pub fields: Vec<Field>,
    pub methods: Vec<Method>,
    /// `Some` once frozen.
    pub layout: Option<ClassLayout>,
}

impl ClassData {
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.layout.is_some()
    }
}

/// An abstract interface method. The signature's first parameter is the
/// interface itself.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct InterfaceMethod {
    pub name: Name,
    pub signature: TypeId,
}

/// Interface description: an ordered list of abstract methods.
#[derive(Clone, Debug, Default)]
pub struct InterfaceData {
    pub methods: Vec<InterfaceMethod>,
}

impl InterfaceData {
    /// Number of functions an implementing class must supply.
    #[inline]
    pub fn num_functions(&self) -> usize {
        self.methods.len()
    }

    /// Position of a method in every vtable for this interface.
    pub fn slot_of(&self, name: Name, signature: TypeId) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| m.name == name && m.signature == signature)
    }
}

/// One alternative of a tagged union.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct VariantTag {
    pub name: Name,
    /// Payload type; `TypeId::VOID` for a bare tag.
    pub payload: TypeId,
}

/// Tagged union description.
#[derive(Clone, Debug, Default)]
pub struct VariantData {
    pub tags: Vec<VariantTag>,
}

impl VariantData {
    pub fn tag_index(&self, name: Name) -> Option<usize> {
        self.tags.iter().position(|t| t.name == name)
    }
}
