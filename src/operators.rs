//! Operator tables (C2): declarative, ordered overload sets for filter
//! comparators, scalar arithmetic, aggregations and arg-min/max.
//!
//! Grounded on the same "named operation -> fixed set of cases" shape as
//! `prql-compiler/src/semantic/transforms.rs::cast_transform`, but here each
//! case is a typed `(operands -> result)` signature walked in order instead
//! of an AST-shape match, since overload resolution needs to *try* several
//! candidates and fall through on type mismatch rather than dispatch once.

use crate::error::{CheckError, Reason};
use crate::types::{is_assignable, resolve_type_vars, Type, TypeVarScope};

pub struct Signature {
    pub operands: Vec<Type>,
    pub result: Type,
}

impl Signature {
    fn new(operands: Vec<Type>, result: Type) -> Self {
        Signature { operands, result }
    }
}

fn var(name: &str) -> Type {
    Type::Var(name.to_string())
}

fn measure(unit: &str) -> Type {
    Type::Measure(unit.to_string())
}

/// Walks `table` in order; for each signature, opens a fresh type-variable
/// scope and attempts to assign every operand. The first signature whose
/// operands all unify wins; its result type is returned after variable
/// resolution.
pub fn resolve_overload(table: &[Signature], operands: &[Type], coerce: bool) -> Option<Type> {
    'sig: for sig in table {
        if sig.operands.len() != operands.len() {
            continue;
        }
        let mut vars = TypeVarScope::new();
        for (operand, expected) in operands.iter().zip(sig.operands.iter()) {
            if !is_assignable(operand, expected, &mut vars, coerce) {
                continue 'sig;
            }
        }
        return Some(resolve_type_vars(&sig.result, &vars));
    }
    None
}

pub fn binary_comparison_table() -> Vec<Signature> {
    use Type::*;
    vec![
        Signature::new(vec![var("a"), var("a")], Boolean), // == / != / equality family
        Signature::new(vec![Number, Number], Boolean),
        Signature::new(vec![Date, Date], Boolean),
        Signature::new(vec![Time, Time], Boolean),
        Signature::new(vec![Currency, Currency], Boolean),
        Signature::new(vec![measure(""), measure("")], Boolean),
        Signature::new(vec![var("a"), Type::array(var("a"))], Boolean), // in_array: value, array
        Signature::new(vec![Type::array(var("a")), var("a")], Boolean), // contains: array, value
        Signature::new(vec![String, String], Boolean), // starts_with/ends_with/contains/...
        // `prefix_of`/`suffix_of` flip operand order relative to starts_with/ends_with
        // but share the same (String, String) -> Boolean shape, so no extra entry
        // is needed beyond the one above.
    ]
}

/// Comparators for which ordering (not just equality) is meaningful.
pub fn ordering_comparison_table() -> Vec<Signature> {
    use Type::*;
    vec![
        Signature::new(vec![Number, Number], Boolean),
        Signature::new(vec![Date, Date], Boolean),
        Signature::new(vec![Time, Time], Boolean),
        Signature::new(vec![Currency, Currency], Boolean),
        Signature::new(vec![measure(""), measure("")], Boolean),
    ]
}

pub fn arithmetic_table(op: &str) -> Vec<Signature> {
    use Type::*;
    match op {
        "+" => vec![
            Signature::new(vec![Number, Number], Number),
            Signature::new(vec![measure(""), measure("")], measure("")),
            Signature::new(vec![Currency, Currency], Currency),
            Signature::new(vec![Date, measure("ms")], Date),
        ],
        "-" => vec![
            Signature::new(vec![Number, Number], Number),
            Signature::new(vec![measure(""), measure("")], measure("")),
            Signature::new(vec![Currency, Currency], Currency),
            Signature::new(vec![Date, measure("ms")], Date),
            Signature::new(vec![Date, Date], measure("ms")),
        ],
        "*" => vec![
            Signature::new(vec![Number, Number], Number),
            Signature::new(vec![measure(""), Number], measure("")),
            Signature::new(vec![Number, measure("")], measure("")),
            Signature::new(vec![Currency, Number], Currency),
            Signature::new(vec![Number, Currency], Currency),
        ],
        "/" => vec![
            Signature::new(vec![Number, Number], Number),
            Signature::new(vec![measure(""), Number], measure("")),
            Signature::new(vec![Currency, Number], Currency),
        ],
        _ => vec![],
    }
}

/// `count(*) = Number`; `min`/`max` preserve the aggregated field's type;
/// `sum`/`avg` are numeric or dimensioned.
pub fn aggregation_table(op: &str) -> Vec<Signature> {
    use Type::*;
    match op {
        "count" => vec![Signature::new(vec![var("a")], Number)],
        "min" | "max" => vec![Signature::new(vec![var("a")], var("a"))],
        "sum" | "avg" => vec![
            Signature::new(vec![Number], Number),
            Signature::new(vec![measure("")], measure("")),
        ],
        _ => vec![],
    }
}

pub fn is_orderable(ty: &Type) -> bool {
    matches!(
        ty,
        Type::Number | Type::Date | Type::Time | Type::Currency | Type::Measure(_)
    )
}

pub fn resolve_filter_op(op: &str, lhs: &Type, rhs: &Type) -> Result<Type, CheckError> {
    // =~ is explicitly invalid on Entity operands, even though the generic
    // (String, String) overload would otherwise accept it via coercion.
    if op == "=~" && matches!(lhs, Type::Entity(_)) {
        return Err(CheckError::new(Reason::InvalidParameterTypes {
            op: op.to_string(),
        }));
    }

    let table: Vec<Signature> = match op {
        "<" | "<=" | ">" | ">=" => ordering_comparison_table(),
        _ => binary_comparison_table(),
    };

    resolve_overload(&table, &[lhs.clone(), rhs.clone()], true).ok_or_else(|| {
        CheckError::new(Reason::InvalidParameterTypes {
            op: op.to_string(),
        })
    })
}

pub fn resolve_arith_op(op: &str, lhs: &Type, rhs: &Type) -> Result<Type, CheckError> {
    let table = arithmetic_table(op);
    resolve_overload(&table, &[lhs.clone(), rhs.clone()], false).ok_or_else(|| {
        CheckError::new(Reason::InvalidParameterTypes {
            op: op.to_string(),
        })
    })
}

pub fn resolve_aggregation(op: &str, field: &Type) -> Result<Type, CheckError> {
    if op == "count" {
        // count(*) ignores the field type entirely.
        return Ok(Type::Number);
    }
    let table = aggregation_table(op);
    if table.is_empty() {
        return Err(CheckError::new(Reason::InvalidAggregation {
            op: op.to_string(),
        }));
    }
    resolve_overload(&table, &[field.clone()], false).ok_or_else(|| {
        CheckError::new(Reason::InvalidAggregationField {
            field: format!("{op}({field:?})"),
        })
    })
}

pub fn resolve_arg_min_max(
    op: &str,
    field: &Type,
    base: &Type,
    limit: &Type,
) -> Result<(), CheckError> {
    if op != "argmin" && op != "argmax" {
        return Err(CheckError::new(Reason::InvalidOperator { op: op.to_string() }));
    }
    if !is_orderable(field) {
        return Err(CheckError::new(Reason::InvalidArgMinMaxField {
            field: format!("{field:?}"),
        }));
    }
    if !matches!(base, Type::Number) || !matches!(limit, Type::Number) {
        return Err(CheckError::new(Reason::InvalidRange));
    }
    Ok(())
}
