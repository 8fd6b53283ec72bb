//! Type modifiers.
//!
//! A modifier is a named transform applied to a base type while a type
//! expression is resolved, e.g. `vector` turning `float` into
//! `vector float[4]`. Results are memoized per base type on the modifier
//! itself, so repeated applications return the same `TypeId` without
//! consulting the structural dedup table.

use mu_ir::{ModifierId, Name};
use rustc_hash::FxHashMap;

use crate::{TypeError, TypeId, TypeKind, TypePool};

/// What a modifier does to its base type.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ModifierKind {
    /// `float` to `vector float[dim]`.
    VectorOf(u8),
    /// `T` to `T[]`.
    DynamicArrayOf,
    /// `T` to `T[len]`.
    FixedArrayOf(usize),
}

/// A named type transform with its memo cache.
#[derive(Clone, Debug)]
pub struct TypeModifier {
    pub name: Name,
    pub kind: ModifierKind,
    cache: FxHashMap<TypeId, TypeId>,
}

impl TypeModifier {
    pub fn new(name: Name, kind: ModifierKind) -> Self {
        Self {
            name,
            kind,
            cache: FxHashMap::default(),
        }
    }

    /// Number of base types transformed so far.
    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Drop memoized results that mention a type at or past `len`.
    pub(crate) fn forget_from(&mut self, len: usize) {
        self.cache
            .retain(|base, result| base.index() < len && result.index() < len);
    }
}

impl TypePool {
    pub fn modifier(&self, id: ModifierId) -> Option<&TypeModifier> {
        self.modifiers.get(id.index())
    }

    /// Apply modifier `id` to `base`.
    pub fn apply_modifier(&mut self, id: ModifierId, base: TypeId) -> Result<TypeId, TypeError> {
        let modifier = self
            .modifiers
            .get(id.index())
            .ok_or(TypeError::UnknownModifier(id.raw()))?;
        if let Some(&ty) = modifier.cache.get(&base) {
            return Ok(ty);
        }
        let kind = modifier.kind;
        let not_applicable = || TypeError::ModifierNotApplicable {
            modifier: modifier.name,
            base: self.name(base),
        };

        let base_kind = self.kind(base).ok_or(TypeError::UnknownType(base.raw()))?;
        let valid = match kind {
            ModifierKind::VectorOf(dim) => base == TypeId::FLOAT && (2..=4).contains(&dim),
            ModifierKind::DynamicArrayOf | ModifierKind::FixedArrayOf(_) => {
                !matches!(base_kind, TypeKind::Void | TypeKind::Nil)
                    && base != TypeId::VARARG
            }
        };
        if !valid {
            return Err(not_applicable());
        }

        let result = match kind {
            ModifierKind::VectorOf(dim) => self.vector(base, dim)?,
            ModifierKind::DynamicArrayOf => self.dynamic_array(base)?,
            ModifierKind::FixedArrayOf(len) => self.fixed_array(base, len)?,
        };
        if let Some(modifier) = self.modifiers.get_mut(id.index()) {
            modifier.cache.insert(base, result);
        }
        Ok(result)
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests;
