//! Overload resolution.
//!
//! Each viable candidate gets a [`MatchRank`] per argument. A candidate
//! wins only if it is at least as good as every other viable candidate at
//! every argument and strictly better somewhere (or, when all ranks tie,
//! uses fewer defaults and no `...`). If no single candidate wins the call
//! is ambiguous; nothing is picked arbitrarily.

use std::cmp::Ordering;

use mu_ir::{FunctionId, Name, SymbolId};
use mu_types::{Bindings, MatchRank, TypeId, TypePool};
use smallvec::SmallVec;

use crate::{SymbolError, SymbolKind, SymbolTable};

/// The winning candidate of an overload set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selected {
    pub symbol: SymbolId,
    pub function: FunctionId,
    pub signature: TypeId,
    /// Declared parameter count, which may exceed the argument count when
    /// defaults fill the tail.
    pub param_count: usize,
    /// The last parameter is `...`.
    pub variadic: bool,
    pub bindings: Bindings,
}

/// A [`Selected`] candidate with its return type instantiated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Resolved {
    pub symbol: SymbolId,
    pub function: FunctionId,
    pub signature: TypeId,
    /// Return type with pattern variables substituted.
    pub return_type: TypeId,
    pub param_count: usize,
    pub variadic: bool,
    pub bindings: Bindings,
}

struct Viable {
    symbol: SymbolId,
    function: FunctionId,
    signature: TypeId,
    ranks: SmallVec<[MatchRank; 4]>,
    param_count: usize,
    variadic: bool,
    bindings: Bindings,
}

impl Viable {
    /// `Greater` if `self` is a strictly better fit than `other`.
    fn compare(&self, other: &Viable) -> Option<Ordering> {
        let mut better = false;
        let mut worse = false;
        for (a, b) in self.ranks.iter().zip(&other.ranks) {
            match a.cmp(b) {
                Ordering::Greater => better = true,
                Ordering::Less => worse = true,
                Ordering::Equal => {}
            }
        }
        match (better, worse) {
            (true, false) => Some(Ordering::Greater),
            (false, true) => Some(Ordering::Less),
            (true, true) => None,
            (false, false) => {
                // Exact arity beats variadic, then fewer defaulted params.
                let key = |v: &Viable| (v.variadic, v.param_count);
                match key(self).cmp(&key(other)) {
                    Ordering::Less => Some(Ordering::Greater),
                    Ordering::Greater => Some(Ordering::Less),
                    Ordering::Equal => None,
                }
            }
        }
    }
}

impl SymbolTable {
    /// Pick the most specific function among `candidates` for arguments of
    /// type `args`. Only reads the pool, so it may run under a shared lock.
    #[tracing::instrument(level = "debug", skip_all, fields(name = %name))]
    pub fn select_overload(
        &self,
        types: &TypePool,
        name: Name,
        candidates: &[SymbolId],
        args: &[TypeId],
    ) -> Result<Selected, SymbolError> {
        let mut viable: Vec<Viable> = Vec::new();
        let mut saw_function = false;

        for &id in candidates {
            let symbol = self.symbol(id)?;
            let SymbolKind::Function {
                function,
                signature,
                min_args,
            } = symbol.kind
            else {
                continue;
            };
            saw_function = true;
            if let Some(v) = Self::try_candidate(types, id, function, signature, min_args, args) {
                viable.push(v);
            }
        }

        if !saw_function {
            return Err(match candidates.first() {
                Some(&id) => SymbolError::NotAFunction(self.name(id)),
                None => SymbolError::Unresolved(name.as_str().to_owned()),
            });
        }

        let winner = (0..viable.len()).find(|&i| {
            viable
                .iter()
                .enumerate()
                .all(|(j, other)| i == j || viable[i].compare(other) == Some(Ordering::Greater))
        });

        let Some(winner) = winner else {
            if viable.is_empty() {
                let args = args
                    .iter()
                    .map(|&a| types.name(a).as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(SymbolError::NoMatchingOverload { name, args });
            }
            let candidates = viable
                .iter()
                .map(|v| format!("{}{}", self.qualified_name(v.symbol), types.name(v.signature)))
                .collect();
            return Err(SymbolError::Ambiguous { name, candidates });
        };

        let chosen = viable.swap_remove(winner);
        tracing::debug!(
            function = %self.qualified_name(chosen.symbol),
            signature = %types.name(chosen.signature),
            "overload selected"
        );
        Ok(Selected {
            symbol: chosen.symbol,
            function: chosen.function,
            signature: chosen.signature,
            param_count: chosen.param_count,
            variadic: chosen.variadic,
            bindings: chosen.bindings,
        })
    }

    /// [`SymbolTable::select_overload`], then instantiate the winner's
    /// return type from its bindings, interning it if new.
    pub fn resolve_overload(
        &self,
        types: &mut TypePool,
        name: Name,
        candidates: &[SymbolId],
        args: &[TypeId],
    ) -> Result<Resolved, SymbolError> {
        let chosen = self.select_overload(types, name, candidates, args)?;
        let ret = types
            .function_signature(chosen.signature)
            .map_or(TypeId::VOID, |sig| sig.ret);
        let return_type = types.substitute(ret, &chosen.bindings)?;
        Ok(Resolved {
            symbol: chosen.symbol,
            function: chosen.function,
            signature: chosen.signature,
            return_type,
            param_count: chosen.param_count,
            variadic: chosen.variadic,
            bindings: chosen.bindings,
        })
    }

    fn try_candidate(
        types: &TypePool,
        symbol: SymbolId,
        function: FunctionId,
        signature: TypeId,
        min_args: usize,
        args: &[TypeId],
    ) -> Option<Viable> {
        let params = types.function_signature(signature)?.params.clone();
        let variadic = params.last() == Some(&TypeId::VARARG);
        let fixed = if variadic { params.len() - 1 } else { params.len() };

        if args.len() < min_args.min(fixed) || (!variadic && args.len() > fixed) {
            return None;
        }

        let mut bindings = Bindings::new();
        let mut ranks = SmallVec::new();
        for (i, &arg) in args.iter().enumerate() {
            let formal = params.get(i).copied().filter(|_| i < fixed).unwrap_or(TypeId::VARARG);
            ranks.push(types.match_rank(formal, arg, &mut bindings)?);
        }

        Some(Viable {
            symbol,
            function,
            signature,
            ranks,
            param_count: params.len(),
            variadic,
            bindings,
        })
    }
}
