//! The base module, installed into the global scope of every context.
//!
//! Provides symbols for the builtin types and patterns, the `vector` and
//! `array` type modifiers, the `const` parameter modifier, the control
//! flow constructs, primitive operators, and a small string and array
//! library so node trees can do real work without a front end.

mod constructs;
mod operators;

use mu_ir::{Name, ObjectId, SymbolId};
use mu_symbols::SymbolTable;
use mu_types::{MachineRep, ModifierKind, TypeId, TypeKind, TypeModifier, Value};
use smallvec::{smallvec, SmallVec};

use crate::errors::{arity_mismatch, index_out_of_bounds, nil_reference, raised, type_mismatch};
use crate::function::{FunctionAttributes, FunctionBuilder};
use crate::{BindError, ContextState, EvalError, EvalResult, Evaluator};

pub(crate) fn install(state: &mut ContextState) -> Result<(), BindError> {
    let global = SymbolTable::GLOBAL;
    for raw in 0..TypeId::FIRST_DYNAMIC {
        state.add_type_symbol(global, TypeId::from_raw(raw))?;
    }
    state.add_type_modifier(
        global,
        TypeModifier::new(Name::intern("vector"), ModifierKind::VectorOf(4)),
    )?;
    state.add_type_modifier(
        global,
        TypeModifier::new(Name::intern("array"), ModifierKind::DynamicArrayOf),
    )?;
    state.add_parameter_modifier(global, "const")?;

    constructs::install(state, global)?;
    operators::install(state, global)?;
    install_library(state, global)?;

    tracing::debug!(functions = state.functions().len(), "base module installed");
    Ok(())
}

fn install_library(state: &mut ContextState, scope: SymbolId) -> Result<(), BindError> {
    let pure = FunctionAttributes::PURE;
    // Bound by no parameter, so a call's type fits wherever a value is expected.
    let never = state.types_mut().type_variable(Name::intern("Never"))?;

    state.define_function(
        scope,
        FunctionBuilder::new("raise")
            .param("message", TypeId::STRING)
            .returns(never)
            .native(|ev, args| {
                let message = ev.text(arg(args, 0)?)?.to_owned();
                Err(raised(message))
            }),
    )?;

    state.define_function(
        scope,
        FunctionBuilder::new("print")
            .param("text", TypeId::STRING)
            .native(|ev, args| {
                let text = display(ev, arg(args, 0)?)?;
                ev.println(&text);
                Ok(Value::Void)
            }),
    )?;
    state.define_function(
        scope,
        FunctionBuilder::new("print")
            .param("value", TypeId::MATCH_ANYTHING)
            .native(|ev, args| {
                let text = display(ev, arg(args, 0)?)?;
                ev.println(&text);
                Ok(Value::Void)
            }),
    )?;
    state.define_function(
        scope,
        FunctionBuilder::new("to_string")
            .param("value", TypeId::MATCH_ANYTHING)
            .returns(TypeId::STRING)
            .attributes(pure)
            .native(|ev, args| {
                let text = display(ev, arg(args, 0)?)?;
                ev.new_string(text)
            }),
    )?;

    // Strings

    state.define_function(
        scope,
        FunctionBuilder::new("+")
            .param("a", TypeId::STRING)
            .param("b", TypeId::STRING)
            .returns(TypeId::STRING)
            .attributes(FunctionAttributes::OPERATOR | pure)
            .native(|ev, args| {
                let joined = format!("{}{}", ev.text(arg(args, 0)?)?, ev.text(arg(args, 1)?)?);
                ev.new_string(joined)
            }),
    )?;
    for (name, equal) in [("==", true), ("!=", false)] {
        state.define_function(
            scope,
            FunctionBuilder::new(name)
                .param("a", TypeId::STRING)
                .param("b", TypeId::STRING)
                .returns(TypeId::BOOL)
                .attributes(FunctionAttributes::OPERATOR | FunctionAttributes::COMMUTATIVE | pure)
                .native(move |ev, args| {
                    let (a, b) = (arg(args, 0)?, arg(args, 1)?);
                    let same = match (a.as_object(), b.as_object()) {
                        (Some(_), Some(_)) => ev.text(a)? == ev.text(b)?,
                        (x, y) => x == y,
                    };
                    Ok(Value::Bool(same == equal))
                }),
        )?;
        state.define_function(
            scope,
            FunctionBuilder::new(name)
                .param("a", TypeId::MATCH_NON_PRIMITIVE)
                .param("b", TypeId::MATCH_NON_PRIMITIVE)
                .returns(TypeId::BOOL)
                .attributes(FunctionAttributes::OPERATOR | FunctionAttributes::COMMUTATIVE | pure)
                .native(move |_, args| Ok(Value::Bool((arg(args, 0)? == arg(args, 1)?) == equal))),
        )?;
    }
    state.define_function(
        scope,
        FunctionBuilder::new("size")
            .param("text", TypeId::STRING)
            .returns(TypeId::INT)
            .attributes(pure)
            .native(|ev, args| Ok(Value::Int(saturating_int(ev.text(arg(args, 0)?)?.chars().count())))),
    )?;

    // Dynamic arrays

    let t = state.types_mut().type_variable(Name::intern("T"))?;
    let t_array = state.types_mut().dynamic_array(t)?;

    state.define_function(
        scope,
        FunctionBuilder::new("size")
            .param("array", TypeId::MATCH_ANY_DYNAMIC_ARRAY)
            .returns(TypeId::INT)
            .attributes(pure)
            .native(|ev, args| {
                let array = ArrayRef::new(ev, arg(args, 0)?)?;
                Ok(Value::Int(saturating_int(array.len(ev)?)))
            }),
    )?;
    state.define_function(
        scope,
        FunctionBuilder::new("push")
            .param("array", t_array)
            .param("value", t)
            .native(|ev, args| {
                let array = ArrayRef::new(ev, arg(args, 0)?)?;
                // Encoded off to the side so a rejected value leaves the array as it was.
                let mut element: SmallVec<[u8; 16]> = smallvec![0; array.stride];
                array.rep.store(arg(args, 1)?, &mut element)?;
                ev.heap_mut()
                    .elements_mut(array.object)?
                    .extend_from_slice(&element);
                Ok(Value::Void)
            }),
    )?;
    state.define_function(
        scope,
        FunctionBuilder::new("[]")
            .param("array", t_array)
            .param("index", TypeId::INT)
            .returns(t)
            .attributes(FunctionAttributes::OPERATOR)
            .native(|ev, args| {
                let array = ArrayRef::new(ev, arg(args, 0)?)?;
                let offset = array.offset(ev, arg(args, 1)?)?;
                let bytes = ev.heap().elements(array.object)?;
                let src = bytes.get(offset..).unwrap_or_default();
                Ok(array.rep.load(src)?)
            }),
    )?;
    state.define_function(
        scope,
        FunctionBuilder::new("set")
            .param("array", t_array)
            .param("index", TypeId::INT)
            .param("value", t)
            .returns(t)
            .native(|ev, args| {
                let array = ArrayRef::new(ev, arg(args, 0)?)?;
                let offset = array.offset(ev, arg(args, 1)?)?;
                let value = arg(args, 2)?;
                let bytes = ev.heap_mut().elements_mut(array.object)?;
                if let Some(dst) = bytes.get_mut(offset..) {
                    array.rep.store(value, dst)?;
                }
                Ok(value)
            }),
    )?;

    Ok(())
}

/// Argument `index`; arity is checked before a native runs, so a missing
/// argument means the native was called directly with too few.
fn arg(args: &[Value], index: usize) -> EvalResult {
    args.get(index)
        .copied()
        .ok_or_else(|| arity_mismatch("native function", index + 1, args.len()))
}

fn saturating_int(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

/// Text shown by `print` and `to_string`.
fn display(ev: &Evaluator<'_>, value: Value) -> Result<String, EvalError> {
    let Some(object) = value.as_object() else {
        return Ok(value.to_string());
    };
    let ty = ev.heap().type_of(object)?;
    if ty == TypeId::STRING {
        return Ok(ev.text(value)?.to_owned());
    }
    Ok(format!("<{} {}>", ev.types().name(ty), object.index()))
}

/// A live dynamic array and its element layout.
struct ArrayRef {
    object: ObjectId,
    rep: MachineRep,
    stride: usize,
}

impl ArrayRef {
    fn new(ev: &Evaluator<'_>, value: Value) -> Result<Self, EvalError> {
        let object = value
            .as_object()
            .ok_or_else(|| nil_reference("array access"))?;
        let ty = ev.heap().type_of(object)?;
        let types = ev.types();
        let Some(TypeKind::DynamicArray { element }) = types.kind(ty) else {
            return Err(type_mismatch("dynamic array", types.name(ty).as_str()));
        };
        Ok(Self {
            object,
            rep: types.machine_rep(*element),
            stride: types.element_stride(*element).max(1),
        })
    }

    fn len(&self, ev: &Evaluator<'_>) -> Result<usize, EvalError> {
        Ok(ev.heap().elements(self.object)?.len() / self.stride)
    }

    /// Byte offset of element `index`, bounds checked.
    fn offset(&self, ev: &Evaluator<'_>, index: Value) -> Result<usize, EvalError> {
        let index = index
            .as_int()
            .ok_or_else(|| type_mismatch("int", &index.to_string()))?;
        let len = self.len(ev)?;
        match usize::try_from(index) {
            Ok(i) if i < len => Ok(i * self.stride),
            _ => Err(index_out_of_bounds(i64::from(index), len)),
        }
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, reason = "tests use unwrap for brevity")]
mod tests;
