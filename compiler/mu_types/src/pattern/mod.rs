//! Type patterns and type matching.
//!
//! Overload resolution asks, for each declared parameter type of a
//! candidate function, whether the actual argument type fits. A concrete
//! parameter type accepts itself, its subclasses, implementing classes (for
//! interfaces) and `nil` (for references). A pattern parameter accepts a
//! structural family of types; type variables additionally record what
//! they matched in [`Bindings`] so the candidate's return type can be
//! instantiated afterwards with [`TypePool::substitute`].
//!
//! An argument whose type is a type variable left unbound (the result of
//! `raise`, declared to return a variable none of its parameters mention)
//! never produces a value, so it fits every parameter and binds nothing.

use mu_ir::Name;
use smallvec::SmallVec;

use crate::{TypeError, TypeId, TypeKind, TypePool};

/// A meta-type matching a family of types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypePattern {
    /// `?`
    Anything,
    /// `?type`: any non-pattern type.
    AnyType,
    /// `...`: absorbs any number of trailing arguments.
    VarArg,
    AnyClass,
    AnyInterface,
    AnyClassOrInterface,
    AnyDynamicArray,
    AnyFixedArray,
    AnyFunction,
    AnyVariant,
    /// Any type with a pointer representation.
    NonPrimitive,
    /// Any type represented as a boolean.
    BoolRep,
    AnyOpaque,
    /// `'T`: binds on first match.
    Variable(Name),
}

/// Outcome of matching an actual type against a declared one.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MatchResult {
    NoMatch,
    Match,
    /// A type variable was already bound to an incompatible type.
    Conflict,
}

impl MatchResult {
    #[inline]
    pub fn is_match(self) -> bool {
        self == MatchResult::Match
    }

    fn from_bool(b: bool) -> Self {
        if b {
            MatchResult::Match
        } else {
            MatchResult::NoMatch
        }
    }
}

/// How closely an argument type fits a parameter type.
///
/// Higher is more specific; overload resolution prefers the candidate
/// whose ranks dominate.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchRank {
    /// Accepted by a pattern.
    Pattern,
    /// Accepted through subclassing, interface implementation or `nil`.
    Converted,
    /// Identical types.
    Exact,
}

/// Type-variable substitutions collected while matching.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Bindings {
    bound: SmallVec<[(Name, TypeId); 4]>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// The type bound to variable `name`.
    pub fn get(&self, name: Name) -> Option<TypeId> {
        self.bound
            .iter()
            .find_map(|&(n, ty)| (n == name).then_some(ty))
    }

    fn bind(&mut self, name: Name, ty: TypeId) {
        self.bound.push((name, ty));
    }

    pub fn len(&self) -> usize {
        self.bound.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bound.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Name, TypeId)> + '_ {
        self.bound.iter().copied()
    }
}

impl TypePool {
    /// Match `actual` against the declared type `formal`.
    pub fn match_type(&self, formal: TypeId, actual: TypeId, bindings: &mut Bindings) -> MatchResult {
        if formal == actual {
            return MatchResult::Match;
        }
        let (Some(formal_kind), Some(actual_kind)) = (self.kind(formal), self.kind(actual)) else {
            return MatchResult::NoMatch;
        };
        if matches!(actual_kind, TypeKind::Pattern(TypePattern::Variable(_))) {
            return MatchResult::Match;
        }
        let nil = matches!(actual_kind, TypeKind::Nil);

        match formal_kind {
            TypeKind::Pattern(pattern) => self.match_pattern(*pattern, actual, actual_kind, bindings),
            TypeKind::Class(_) => MatchResult::from_bool(nil || self.is_a(actual, formal)),
            TypeKind::Interface(_) => MatchResult::from_bool(nil || self.implements(actual, formal)),
            TypeKind::String | TypeKind::Variant(_) | TypeKind::Opaque => {
                MatchResult::from_bool(nil)
            }
            TypeKind::DynamicArray { element } => match actual_kind {
                TypeKind::DynamicArray { element: actual_element } => {
                    self.match_element(*element, *actual_element, bindings)
                }
                _ => MatchResult::from_bool(nil),
            },
            TypeKind::FixedArray { element, len } => match actual_kind {
                TypeKind::FixedArray {
                    element: actual_element,
                    len: actual_len,
                } if len == actual_len => self.match_element(*element, *actual_element, bindings),
                _ => MatchResult::from_bool(nil),
            },
            TypeKind::Function(sig) => match actual_kind {
                TypeKind::Function(actual_sig) if sig.params.len() == actual_sig.params.len() => {
                    let pairs = sig
                        .params
                        .iter()
                        .zip(&actual_sig.params)
                        .chain(std::iter::once((&sig.ret, &actual_sig.ret)));
                    for (&f, &a) in pairs {
                        let result = self.match_element(f, a, bindings);
                        if !result.is_match() {
                            return result;
                        }
                    }
                    MatchResult::Match
                }
                _ => MatchResult::from_bool(nil),
            },
            TypeKind::Void
            | TypeKind::Primitive(_)
            | TypeKind::Nil
            | TypeKind::Vector { .. } => MatchResult::NoMatch,
        }
    }

    /// Component types (array elements, signature parts) are invariant:
    /// they match only when equal or when the declared component is a
    /// pattern.
    fn match_element(&self, formal: TypeId, actual: TypeId, bindings: &mut Bindings) -> MatchResult {
        if formal == actual {
            MatchResult::Match
        } else if self.contains_pattern(formal) {
            self.match_type(formal, actual, bindings)
        } else {
            MatchResult::NoMatch
        }
    }

    fn match_pattern(
        &self,
        pattern: TypePattern,
        actual: TypeId,
        actual_kind: &TypeKind,
        bindings: &mut Bindings,
    ) -> MatchResult {
        let matched = match pattern {
            TypePattern::Anything | TypePattern::VarArg => true,
            TypePattern::AnyType => !actual_kind.is_pattern(),
            TypePattern::AnyClass => actual_kind.is_class(),
            TypePattern::AnyInterface => actual_kind.is_interface(),
            TypePattern::AnyClassOrInterface => actual_kind.is_class() || actual_kind.is_interface(),
            TypePattern::AnyDynamicArray => matches!(actual_kind, TypeKind::DynamicArray { .. }),
            TypePattern::AnyFixedArray => matches!(actual_kind, TypeKind::FixedArray { .. }),
            TypePattern::AnyFunction => matches!(actual_kind, TypeKind::Function(_)),
            TypePattern::AnyVariant => matches!(actual_kind, TypeKind::Variant(_)),
            TypePattern::NonPrimitive => actual_kind.is_reference(),
            TypePattern::BoolRep => actual_kind.machine_rep() == crate::MachineRep::Bool,
            TypePattern::AnyOpaque => matches!(actual_kind, TypeKind::Opaque),
            TypePattern::Variable(name) => {
                if actual_kind.is_pattern() {
                    return MatchResult::NoMatch;
                }
                return match bindings.get(name) {
                    None => {
                        bindings.bind(name, actual);
                        MatchResult::Match
                    }
                    Some(bound) if bound == actual => MatchResult::Match,
                    Some(_) => MatchResult::Conflict,
                };
            }
        };
        MatchResult::from_bool(matched)
    }

    /// Rank how well `actual` fits `formal`, or `None` if it does not.
    pub fn match_rank(
        &self,
        formal: TypeId,
        actual: TypeId,
        bindings: &mut Bindings,
    ) -> Option<MatchRank> {
        if formal == actual {
            return Some(MatchRank::Exact);
        }
        if !self.match_type(formal, actual, bindings).is_match() {
            return None;
        }
        if self.contains_pattern(formal) {
            Some(MatchRank::Pattern)
        } else {
            Some(MatchRank::Converted)
        }
    }

    /// Whether `ty` is a pattern or is built from one (`'T[]`, `(void;?)`).
    pub fn contains_pattern(&self, ty: TypeId) -> bool {
        match self.kind(ty) {
            Some(TypeKind::Pattern(_)) => true,
            Some(TypeKind::DynamicArray { element } | TypeKind::FixedArray { element, .. }) => {
                self.contains_pattern(*element)
            }
            Some(TypeKind::Function(sig)) => {
                self.contains_pattern(sig.ret) || sig.params.iter().any(|&p| self.contains_pattern(p))
            }
            _ => false,
        }
    }

    /// Replace bound type variables in `ty`, interning any new structural
    /// types. Unbound variables are left in place.
    pub fn substitute(&mut self, ty: TypeId, bindings: &Bindings) -> Result<TypeId, TypeError> {
        let Some(kind) = self.kind(ty) else {
            return Ok(ty);
        };
        match kind.clone() {
            TypeKind::Pattern(TypePattern::Variable(name)) => Ok(bindings.get(name).unwrap_or(ty)),
            TypeKind::DynamicArray { element } => {
                let element = self.substitute(element, bindings)?;
                self.dynamic_array(element)
            }
            TypeKind::FixedArray { element, len } => {
                let element = self.substitute(element, bindings)?;
                self.fixed_array(element, len)
            }
            TypeKind::Function(sig) => {
                let params = sig
                    .params
                    .iter()
                    .map(|&p| self.substitute(p, bindings))
                    .collect::<Result<SmallVec<[TypeId; 4]>, _>>()?;
                let ret = self.substitute(sig.ret, bindings)?;
                self.function(&params, ret)
            }
            _ => Ok(ty),
        }
    }
}
