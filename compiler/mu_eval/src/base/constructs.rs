//! Control flow as constructs.
//!
//! | Construct            | Operands                        | Evaluates                          |
//! |----------------------|---------------------------------|------------------------------------|
//! | `if(c, a, b)`, `?:`  | eager, lazy, lazy               | `c` once, then exactly one branch  |
//! | `if(c, a)`           | eager, lazy                     | `a` only when `c` holds            |
//! | `while(c, body)`     | repeated, repeated              | `c` before every pass              |
//! | `&&`, `\|\|`         | eager, lazy                     | right side only when needed        |
//! | `block(...)`         | repeated                        | each operand once, in order        |
//! | `try(body, handler)` | lazy, lazy                      | `handler` when `body` raises       |

use mu_ir::{Name, SymbolId};
use mu_types::{TypeId, Value};

use crate::function::{ConstructBuilder, FunctionAttributes, OperandMode};
use crate::{BindError, ContextState};

pub(super) fn install(state: &mut ContextState, scope: SymbolId) -> Result<(), BindError> {
    let t = state.types_mut().type_variable(Name::intern("T"))?;

    for name in ["if", "?:"] {
        let conditional = ConstructBuilder::new(name)
            .operand("condition", TypeId::BOOL, OperandMode::Eager)
            .operand("then", t, OperandMode::Lazy)
            .operand("else", t, OperandMode::Lazy)
            .returns(t)
            .build(|ops| {
                if ops.eval_bool(0)? {
                    ops.eval(1)
                } else {
                    ops.eval(2)
                }
            });
        state.define_function(scope, conditional)?;
    }

    let when = ConstructBuilder::new("if")
        .operand("condition", TypeId::BOOL, OperandMode::Eager)
        .operand("then", TypeId::MATCH_ANYTHING, OperandMode::Lazy)
        .build(|ops| {
            if ops.eval_bool(0)? {
                ops.eval(1)?;
            }
            Ok(Value::Void)
        });
    state.define_function(scope, when)?;

    let while_loop = ConstructBuilder::new("while")
        .operand("condition", TypeId::BOOL, OperandMode::Repeated)
        .operand("body", TypeId::MATCH_ANYTHING, OperandMode::Repeated)
        .build(|ops| {
            while ops.eval_bool(0)? {
                ops.eval(1)?;
            }
            Ok(Value::Void)
        });
    state.define_function(scope, while_loop)?;

    let and = ConstructBuilder::new("&&")
        .operand("a", TypeId::BOOL, OperandMode::Eager)
        .operand("b", TypeId::BOOL, OperandMode::Lazy)
        .returns(TypeId::BOOL)
        .attributes(FunctionAttributes::OPERATOR)
        .build(|ops| Ok(Value::Bool(ops.eval_bool(0)? && ops.eval_bool(1)?)));
    state.define_function(scope, and)?;

    let or = ConstructBuilder::new("||")
        .operand("a", TypeId::BOOL, OperandMode::Eager)
        .operand("b", TypeId::BOOL, OperandMode::Lazy)
        .returns(TypeId::BOOL)
        .attributes(FunctionAttributes::OPERATOR)
        .build(|ops| Ok(Value::Bool(ops.eval_bool(0)? || ops.eval_bool(1)?)));
    state.define_function(scope, or)?;

    let block = ConstructBuilder::new("block")
        .variadic(OperandMode::Repeated)
        .build(|ops| {
            for i in 0..ops.len() {
                ops.eval(i)?;
            }
            Ok(Value::Void)
        });
    state.define_function(scope, block)?;

    let try_catch = ConstructBuilder::new("try")
        .operand("body", t, OperandMode::Lazy)
        .operand("handler", t, OperandMode::Lazy)
        .returns(t)
        .build(|ops| match ops.eval(0) {
            Err(err) if err.is_catchable() => {
                tracing::debug!(error = %err, "exception caught");
                ops.eval(1)
            }
            result => result,
        });
    state.define_function(scope, try_catch)?;

    Ok(())
}
