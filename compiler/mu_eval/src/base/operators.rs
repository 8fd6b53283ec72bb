//! Primitive operators.
//!
//! Direct enum dispatch: each registered operator function captures its
//! [`BinaryOp`] and forwards to [`evaluate_binary`]. Integer arithmetic
//! wraps; division and remainder by zero raise.

use mu_ir::SymbolId;
use mu_types::{TypeId, Value};

use crate::errors::{arity_mismatch, division_by_zero, modulo_by_zero, type_mismatch};
use crate::function::{FunctionAttributes, FunctionBuilder};
use crate::{BindError, ContextState, EvalResult};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl BinaryOp {
    const ALL: [BinaryOp; 11] = [
        BinaryOp::Add,
        BinaryOp::Sub,
        BinaryOp::Mul,
        BinaryOp::Div,
        BinaryOp::Mod,
        BinaryOp::Eq,
        BinaryOp::NotEq,
        BinaryOp::Lt,
        BinaryOp::LtEq,
        BinaryOp::Gt,
        BinaryOp::GtEq,
    ];

    fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::LtEq => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::GtEq => ">=",
        }
    }

    fn is_comparison(self) -> bool {
        !matches!(
            self,
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod
        )
    }

    fn is_commutative(self) -> bool {
        matches!(
            self,
            BinaryOp::Add | BinaryOp::Mul | BinaryOp::Eq | BinaryOp::NotEq
        )
    }
}

/// Evaluate a binary operator on two primitive values of the same type.
pub(crate) fn evaluate_binary(left: Value, right: Value, op: BinaryOp) -> EvalResult {
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => eval_int_binary(a, b, op),
        (Value::Int64(a), Value::Int64(b)) => eval_int64_binary(a, b, op),
        (Value::Float(a), Value::Float(b)) => eval_real_binary(a, b, op, Value::Float),
        (Value::Double(a), Value::Double(b)) => eval_real_binary(a, b, op, Value::Double),
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::Eq => Ok(Value::Bool(a == b)),
            BinaryOp::NotEq => Ok(Value::Bool(a != b)),
            _ => Err(type_mismatch("number", "bool")),
        },
        _ => Err(type_mismatch(&left.to_string(), &right.to_string())),
    }
}

macro_rules! int_binary {
    ($name:ident, $ty:ty, $wrap:path) => {
        fn $name(a: $ty, b: $ty, op: BinaryOp) -> EvalResult {
            let value = match op {
                BinaryOp::Add => $wrap(a.wrapping_add(b)),
                BinaryOp::Sub => $wrap(a.wrapping_sub(b)),
                BinaryOp::Mul => $wrap(a.wrapping_mul(b)),
                BinaryOp::Div if b == 0 => return Err(division_by_zero()),
                BinaryOp::Div => $wrap(a.wrapping_div(b)),
                BinaryOp::Mod if b == 0 => return Err(modulo_by_zero()),
                BinaryOp::Mod => $wrap(a.wrapping_rem(b)),
                BinaryOp::Eq => Value::Bool(a == b),
                BinaryOp::NotEq => Value::Bool(a != b),
                BinaryOp::Lt => Value::Bool(a < b),
                BinaryOp::LtEq => Value::Bool(a <= b),
                BinaryOp::Gt => Value::Bool(a > b),
                BinaryOp::GtEq => Value::Bool(a >= b),
            };
            Ok(value)
        }
    };
}

int_binary!(eval_int_binary, i32, Value::Int);
int_binary!(eval_int64_binary, i64, Value::Int64);

/// Floating point follows IEEE: division by zero yields an infinity.
fn eval_real_binary<T>(a: T, b: T, op: BinaryOp, wrap: fn(T) -> Value) -> EvalResult
where
    T: Copy
        + PartialOrd
        + std::ops::Add<Output = T>
        + std::ops::Sub<Output = T>
        + std::ops::Mul<Output = T>
        + std::ops::Div<Output = T>
        + std::ops::Rem<Output = T>,
{
    let value = match op {
        BinaryOp::Add => wrap(a + b),
        BinaryOp::Sub => wrap(a - b),
        BinaryOp::Mul => wrap(a * b),
        BinaryOp::Div => wrap(a / b),
        BinaryOp::Mod => wrap(a % b),
        BinaryOp::Eq => Value::Bool(a == b),
        BinaryOp::NotEq => Value::Bool(a != b),
        BinaryOp::Lt => Value::Bool(a < b),
        BinaryOp::LtEq => Value::Bool(a <= b),
        BinaryOp::Gt => Value::Bool(a > b),
        BinaryOp::GtEq => Value::Bool(a >= b),
    };
    Ok(value)
}

fn negate(value: Value) -> EvalResult {
    match value {
        Value::Int(v) => Ok(Value::Int(v.wrapping_neg())),
        Value::Int64(v) => Ok(Value::Int64(v.wrapping_neg())),
        Value::Float(v) => Ok(Value::Float(-v)),
        Value::Double(v) => Ok(Value::Double(-v)),
        other => Err(type_mismatch("number", &other.to_string())),
    }
}

pub(super) fn install(state: &mut ContextState, scope: SymbolId) -> Result<(), BindError> {
    let pure = FunctionAttributes::OPERATOR | FunctionAttributes::PURE;

    for ty in [TypeId::INT, TypeId::INT64, TypeId::FLOAT, TypeId::DOUBLE] {
        for op in BinaryOp::ALL {
            let ret = if op.is_comparison() { TypeId::BOOL } else { ty };
            let mut attributes = pure;
            if op.is_commutative() {
                attributes |= FunctionAttributes::COMMUTATIVE;
            }
            state.define_function(scope, binary(op, ty, ret, attributes))?;
        }

        let neg = FunctionBuilder::new("-")
            .param("a", ty)
            .returns(ty)
            .attributes(pure)
            .native(|_, args| match *args {
                [a] => negate(a),
                _ => Err(arity_mismatch("-", 1, args.len())),
            });
        state.define_function(scope, neg)?;
    }

    for op in [BinaryOp::Eq, BinaryOp::NotEq] {
        let attributes = pure | FunctionAttributes::COMMUTATIVE;
        state.define_function(scope, binary(op, TypeId::BOOL, TypeId::BOOL, attributes))?;
    }
    let not = FunctionBuilder::new("!")
        .param("a", TypeId::BOOL)
        .returns(TypeId::BOOL)
        .attributes(pure)
        .native(|_, args| match *args {
            [Value::Bool(a)] => Ok(Value::Bool(!a)),
            [other] => Err(type_mismatch("bool", &other.to_string())),
            _ => Err(arity_mismatch("!", 1, args.len())),
        });
    state.define_function(scope, not)?;

    Ok(())
}

fn binary(op: BinaryOp, ty: TypeId, ret: TypeId, attributes: FunctionAttributes) -> FunctionBuilder {
    FunctionBuilder::new(op.symbol())
        .param("a", ty)
        .param("b", ty)
        .returns(ret)
        .attributes(attributes)
        .native(move |_, args| match *args {
            [a, b] => evaluate_binary(a, b, op),
            _ => Err(arity_mismatch(op.symbol(), 2, args.len())),
        })
}
