//! The type pool.
//!
//! A single arena holding every type known to a context. Builtin types and
//! patterns occupy the fixed indices declared on [`TypeId`]; everything
//! else is appended. Structural types (vectors, arrays, function
//! signatures, type variables) are interned so that structurally equal
//! types share one `TypeId`.
//!
//! # Architecture
//!
//! ```text
//! TypePool
//!     ├── entries      (TypeId -> TypeEntry)
//!     ├── structural   (StructuralKey -> TypeId, dedup)
//!     ├── modifiers    (ModifierId -> TypeModifier, each with a memo cache)
//!     ├── imps         ((class, interface) -> InterfaceImp)
//!     └── journal      (entries edited in place while a snapshot is open)
//! ```
//!
//! # Snapshots
//!
//! Types are appended, so a snapshot is mostly a set of lengths. The only
//! in-place edits are to class and interface entries (members added,
//! layout set at freeze); while a snapshot is open the first such edit to
//! an older entry saves a copy of it, and rollback puts the copies back.

use mu_ir::{ModifierId, Name};
use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::SmallVec;

use crate::{
    ClassData, FunctionSignature, InterfaceData, InterfaceImp, MachineRep, TypeEntry, TypeError,
    TypeId, TypeKind, TypeModifier, TypePattern, VariantData, VariantTag,
};

/// Key under which structural types are deduplicated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
enum StructuralKey {
    Vector(TypeId, u8),
    DynamicArray(TypeId),
    FixedArray(TypeId, usize),
    Function(FunctionSignature),
    Variable(Name),
}

/// Arena of all types in a context.
#[derive(Clone, Debug)]
pub struct TypePool {
    entries: Vec<TypeEntry>,
    structural: FxHashMap<StructuralKey, TypeId>,
    pub(crate) modifiers: Vec<TypeModifier>,
    pub(crate) imps: FxHashMap<(TypeId, TypeId), InterfaceImp>,
    journal: Journal,
}

#[derive(Clone, Debug, Default)]
struct Journal {
    /// Entries below this index are saved before their first edit. `None`
    /// when no snapshot is open.
    floor: Option<usize>,
    saved: Vec<(TypeId, TypeEntry)>,
    logged: FxHashSet<TypeId>,
}

/// A saved pool state that [`TypePool::rollback`] can return to.
///
/// Close it with either [`TypePool::rollback`] or [`TypePool::commit`].
#[derive(Debug, PartialEq, Eq)]
#[must_use]
pub struct PoolSnapshot {
    types: usize,
    modifiers: usize,
    saved: usize,
    outer: Option<usize>,
}

impl TypePool {
    /// Create a pool holding the builtin types and patterns.
    pub fn new() -> Self {
        let builtins: [(&str, TypeKind); TypeId::FIRST_DYNAMIC as usize] = [
            ("void", TypeKind::Void),
            ("bool", TypeKind::Primitive(MachineRep::Bool)),
            ("byte", TypeKind::Primitive(MachineRep::Byte)),
            ("short", TypeKind::Primitive(MachineRep::Short)),
            ("int", TypeKind::Primitive(MachineRep::Int)),
            ("int64", TypeKind::Primitive(MachineRep::Int64)),
            ("float", TypeKind::Primitive(MachineRep::Float)),
            ("double", TypeKind::Primitive(MachineRep::Double)),
            ("char", TypeKind::Primitive(MachineRep::Char)),
            ("string", TypeKind::String),
            ("nil", TypeKind::Nil),
            ("opaque", TypeKind::Opaque),
            ("?", TypeKind::Pattern(TypePattern::Anything)),
            ("?type", TypeKind::Pattern(TypePattern::AnyType)),
            ("...", TypeKind::Pattern(TypePattern::VarArg)),
            ("?class", TypeKind::Pattern(TypePattern::AnyClass)),
            ("?interface", TypeKind::Pattern(TypePattern::AnyInterface)),
            (
                "?class_or_interface",
                TypeKind::Pattern(TypePattern::AnyClassOrInterface),
            ),
            ("?dyn_array", TypeKind::Pattern(TypePattern::AnyDynamicArray)),
            ("?fixed_array", TypeKind::Pattern(TypePattern::AnyFixedArray)),
            ("?function", TypeKind::Pattern(TypePattern::AnyFunction)),
            ("?variant", TypeKind::Pattern(TypePattern::AnyVariant)),
            ("?non_primitive", TypeKind::Pattern(TypePattern::NonPrimitive)),
            ("?bool_rep", TypeKind::Pattern(TypePattern::BoolRep)),
            ("?opaque", TypeKind::Pattern(TypePattern::AnyOpaque)),
        ];

        let entries = builtins
            .into_iter()
            .map(|(name, kind)| TypeEntry {
                name: Name::intern(name),
                kind,
            })
            .collect();

        Self {
            entries,
            structural: FxHashMap::default(),
            modifiers: Vec::new(),
            imps: FxHashMap::default(),
            journal: Journal::default(),
        }
    }

    /// Number of types in the pool.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Look up a type.
    #[inline]
    pub fn get(&self, ty: TypeId) -> Option<&TypeEntry> {
        self.entries.get(ty.index())
    }

    /// Look up a type, failing on an unknown handle.
    pub fn entry(&self, ty: TypeId) -> Result<&TypeEntry, TypeError> {
        self.get(ty).ok_or(TypeError::UnknownType(ty.raw()))
    }

    #[inline]
    pub fn kind(&self, ty: TypeId) -> Option<&TypeKind> {
        self.get(ty).map(|e| &e.kind)
    }

    pub(crate) fn kind_mut(&mut self, ty: TypeId) -> Option<&mut TypeKind> {
        let entry = self.entries.get_mut(ty.index())?;
        let journal = &mut self.journal;
        if journal.floor.is_some_and(|floor| ty.index() < floor) && journal.logged.insert(ty) {
            journal.saved.push((ty, entry.clone()));
        }
        Some(&mut entry.kind)
    }

    /// The type's name, or the empty name for an unknown handle.
    #[inline]
    pub fn name(&self, ty: TypeId) -> Name {
        self.get(ty).map_or(Name::EMPTY, |e| e.name)
    }

    /// Storage representation of a value of type `ty`.
    pub fn machine_rep(&self, ty: TypeId) -> MachineRep {
        self.kind(ty).map_or(MachineRep::Void, TypeKind::machine_rep)
    }

    /// Whether values of `ty` are heap references.
    #[inline]
    pub fn is_reference(&self, ty: TypeId) -> bool {
        self.machine_rep(ty).is_pointer()
    }

    /// Whether `ty` is a bare pattern type (`?`, `'T`, `...`).
    #[inline]
    pub fn is_pattern(&self, ty: TypeId) -> bool {
        self.kind(ty).is_some_and(TypeKind::is_pattern)
    }

    /// The signature of a function type.
    pub fn function_signature(&self, ty: TypeId) -> Option<&FunctionSignature> {
        match self.kind(ty)? {
            TypeKind::Function(sig) => Some(sig),
            _ => None,
        }
    }

    fn push(&mut self, name: Name, kind: TypeKind) -> Result<TypeId, TypeError> {
        let raw = u32::try_from(self.entries.len()).map_err(|_| TypeError::PoolExhausted)?;
        self.entries.push(TypeEntry { name, kind });
        Ok(TypeId::from_raw(raw))
    }

    fn intern_structural(
        &mut self,
        key: StructuralKey,
        make: impl FnOnce(&Self) -> (Name, TypeKind),
    ) -> Result<TypeId, TypeError> {
        if let Some(&ty) = self.structural.get(&key) {
            return Ok(ty);
        }
        let (name, kind) = make(self);
        let ty = self.push(name, kind)?;
        self.structural.insert(key, ty);
        Ok(ty)
    }

    // === Structural Constructors ===

    /// `vector <element>[dim]`.
    pub fn vector(&mut self, element: TypeId, dim: u8) -> Result<TypeId, TypeError> {
        self.intern_structural(StructuralKey::Vector(element, dim), |pool| {
            let name = Name::intern(&format!("vector {}[{dim}]", pool.name(element)));
            (name, TypeKind::Vector { element, dim })
        })
    }

    /// `<element>[]`.
    pub fn dynamic_array(&mut self, element: TypeId) -> Result<TypeId, TypeError> {
        self.intern_structural(StructuralKey::DynamicArray(element), |pool| {
            let name = Name::intern(&format!("{}[]", pool.name(element)));
            (name, TypeKind::DynamicArray { element })
        })
    }

    /// `<element>[len]`.
    pub fn fixed_array(&mut self, element: TypeId, len: usize) -> Result<TypeId, TypeError> {
        self.intern_structural(StructuralKey::FixedArray(element, len), |pool| {
            let name = Name::intern(&format!("{}[{len}]", pool.name(element)));
            (name, TypeKind::FixedArray { element, len })
        })
    }

    /// Function type, written `(ret;p0,p1,...)`.
    pub fn function(&mut self, params: &[TypeId], ret: TypeId) -> Result<TypeId, TypeError> {
        let sig = FunctionSignature {
            params: SmallVec::from_slice(params),
            ret,
        };
        self.intern_structural(StructuralKey::Function(sig.clone()), |pool| {
            let params = sig
                .params
                .iter()
                .map(|&p| pool.name(p).as_str())
                .collect::<Vec<_>>()
                .join(",");
            let name = Name::intern(&format!("({};{params})", pool.name(ret)));
            (name, TypeKind::Function(sig))
        })
    }

    /// Named type variable `'name`.
    pub fn type_variable(&mut self, name: Name) -> Result<TypeId, TypeError> {
        self.intern_structural(StructuralKey::Variable(name), |_| {
            (
                Name::intern(&format!("'{name}")),
                TypeKind::Pattern(TypePattern::Variable(name)),
            )
        })
    }

    // === Nominal Constructors ===

    /// Declare a class. Fields, methods and interfaces are added before
    /// [`TypePool::freeze_class`].
    pub fn add_class(&mut self, name: Name, super_class: Option<TypeId>) -> Result<TypeId, TypeError> {
        self.push(
            name,
            TypeKind::Class(ClassData {
                super_class,
                ..ClassData::default()
            }),
        )
    }

    /// Declare an empty interface.
    pub fn add_interface(&mut self, name: Name) -> Result<TypeId, TypeError> {
        self.push(name, TypeKind::Interface(InterfaceData::default()))
    }

    /// Declare a tagged union.
    pub fn add_variant(&mut self, name: Name, tags: Vec<VariantTag>) -> Result<TypeId, TypeError> {
        self.push(name, TypeKind::Variant(VariantData { tags }))
    }

    /// Declare a named opaque host type.
    pub fn add_opaque(&mut self, name: Name) -> Result<TypeId, TypeError> {
        self.push(name, TypeKind::Opaque)
    }

    /// Register a type modifier.
    pub fn add_modifier(&mut self, modifier: TypeModifier) -> ModifierId {
        let id = ModifierId::from_usize(self.modifiers.len());
        self.modifiers.push(modifier);
        id
    }

    // === Snapshots ===

    /// Open a snapshot of the current state. Snapshots nest.
    pub fn snapshot(&mut self) -> PoolSnapshot {
        let snapshot = PoolSnapshot {
            types: self.entries.len(),
            modifiers: self.modifiers.len(),
            saved: self.journal.saved.len(),
            outer: self.journal.floor,
        };
        self.journal.floor = Some(self.entries.len());
        self.journal.logged.clear();
        snapshot
    }

    /// Keep everything done since `snapshot`.
    pub fn commit(&mut self, snapshot: PoolSnapshot) {
        self.close(&snapshot);
    }

    /// Restore a saved state, discarding every type, modifier, vtable and
    /// class change made since.
    pub fn rollback(&mut self, snapshot: PoolSnapshot) {
        tracing::debug!(
            discarded = self.entries.len().saturating_sub(snapshot.types),
            restored = self.journal.saved.len().saturating_sub(snapshot.saved),
            "rolling back type pool"
        );
        let saved = self.journal.saved.split_off(snapshot.saved.min(self.journal.saved.len()));
        // Newest first, so an entry saved twice ends at its oldest copy.
        for (ty, entry) in saved.into_iter().rev() {
            if let Some(slot) = self.entries.get_mut(ty.index()) {
                *slot = entry;
            }
        }

        let live = snapshot.types;
        self.entries.truncate(live);
        self.modifiers.truncate(snapshot.modifiers);
        self.structural.retain(|_, ty| ty.index() < live);
        for modifier in &mut self.modifiers {
            modifier.forget_from(live);
        }
        let entries = &self.entries;
        self.imps.retain(|&(class, _), _| {
            matches!(
                entries.get(class.index()).map(|e| &e.kind),
                Some(TypeKind::Class(data)) if data.is_frozen()
            )
        });
        self.close(&snapshot);
    }

    fn close(&mut self, snapshot: &PoolSnapshot) {
        self.journal.floor = snapshot.outer;
        self.journal.logged.clear();
        if snapshot.outer.is_none() {
            self.journal.saved.clear();
        }
    }
}

impl Default for TypePool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests;
