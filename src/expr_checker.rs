//! Expression type-checking (C6): values, filters and scalar expressions.
//!
//! Grounded on `prql-compiler/src/semantic/resolver.rs`'s expression-folding
//! pass — same shape (recurse into subexpressions, attach a resolved type to
//! each node, bail with a located error on the first mismatch) adapted to
//! ThingTalk's filter/scalar grammar instead of PRQL's pipeline exprs.

use crate::ast::{BooleanExpression, Invocation, PrimitiveKind, ScalarExpression, Selector, Value};
use crate::builtin::Classes;
use crate::error::CheckError;
use crate::operators::{resolve_arith_op, resolve_filter_op};
use crate::primitive_checker::bind_input_params;
use crate::resolver::{ensure_invocation_schema, SchemaOracle};
use crate::schema::Schema;
use crate::scope::Scope;
use crate::types::Type;

/// `typeForValue(value, scope)`: resolves a literal directly, a `VarRef`
/// through scope lookup, and `$event`/`$event.x` through the fixed set of
/// event projections.
pub fn type_for_value(value: &Value, scope: &Scope) -> Result<Type, CheckError> {
    if let Some(ty) = value.literal_type() {
        return Ok(ty);
    }
    match value {
        Value::VarRef { name } => scope.get(name),
        Value::Event { name } => {
            if !scope.has_event {
                return Err(CheckError::new(crate::error::Reason::VariableNotInScope {
                    name: "$event".to_string(),
                }));
            }
            Ok(match name.as_deref() {
                Some("type") => Type::Entity("tt:function".to_string()),
                Some("program_id") => Type::Entity("tt:program_id".to_string()),
                _ => Type::String,
            })
        }
        _ => unreachable!("every other Value variant has a literal_type"),
    }
}

/// `typeCheckFilter(filter, schema, scope, oracle)` (spec §4.4, §4.6):
/// recurses through the boolean connectives, checks each atom's operator
/// overload, and resolves+binds an `External` predicate's own invocation
/// schema. An atom's name resolves against `schema`'s own `inReq`/`inOpt`/
/// `out` first — a filter is allowed to name the primitive's own input
/// parameters, not just its outputs — falling back to `scope` only when the
/// primitive's schema doesn't declare that name (e.g. the standalone-filter
/// entry points, or a table/stream schema with no owning primitive).
pub fn type_check_filter(
    filter: &mut BooleanExpression,
    schema: &Schema,
    scope: &Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    use_meta: bool,
) -> Result<(), CheckError> {
    match filter {
        BooleanExpression::True | BooleanExpression::False => Ok(()),
        BooleanExpression::And(clauses) | BooleanExpression::Or(clauses) => {
            for clause in clauses {
                type_check_filter(clause, schema, scope, oracle, classes, use_meta)?;
            }
            Ok(())
        }
        BooleanExpression::Not(inner) => {
            type_check_filter(inner, schema, scope, oracle, classes, use_meta)
        }
        BooleanExpression::Atom {
            name,
            op,
            value,
            resolved_type,
            span,
        } => {
            let field_type = match schema.input_type(name).or_else(|| schema.out.get(name)) {
                Some(ty) => ty.clone(),
                None => scope.get(name).map_err(|e| e.with_span(*span))?,
            };
            let value_type = type_for_value(value, scope).map_err(|e| e.with_span(*span))?;
            resolve_filter_op(op, &field_type, &value_type).map_err(|e| e.with_span(*span))?;
            *resolved_type = Some(field_type);
            Ok(())
        }
        BooleanExpression::External {
            selector,
            channel,
            in_params,
            filter: inner,
            schema: ext_schema,
            span,
        } => {
            if ext_schema.is_none() {
                let mut probe = Invocation {
                    selector: selector.clone(),
                    channel: channel.clone(),
                    in_params: in_params.clone(),
                    schema: None,
                    span: *span,
                };
                ensure_invocation_schema(&mut probe, PrimitiveKind::Query, oracle, classes, use_meta)?;
                *ext_schema = probe.schema;
            }
            let resolved = ext_schema.as_ref().expect("just resolved above").clone();

            bind_input_params(&resolved, in_params, scope).map_err(|e| e.with_span(*span))?;
            type_check_filter(inner, &resolved, scope, oracle, classes, use_meta)
        }
    }
}

/// Also returns the scalar's own resolved type, for the Aggregation/Compute
/// callers that need to publish it as a new output column.
pub fn resolve_scalar_expression(
    expr: &mut ScalarExpression,
    schema: &Schema,
    scope: &Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    use_meta: bool,
) -> Result<Type, CheckError> {
    match expr {
        ScalarExpression::Primary { value, resolved_type } => {
            let ty = type_for_value(value, scope)?;
            *resolved_type = Some(ty.clone());
            Ok(ty)
        }
        ScalarExpression::Derived {
            op,
            operands,
            resolved_type,
        } => {
            if operands.len() != 2 {
                return Err(CheckError::new(crate::error::Reason::NotImplemented {
                    what: format!("{}-ary operator `{op}`", operands.len()),
                }));
            }
            let lhs =
                resolve_scalar_expression(&mut operands[0], schema, scope, oracle, classes, use_meta)?;
            let rhs =
                resolve_scalar_expression(&mut operands[1], schema, scope, oracle, classes, use_meta)?;
            let ty = resolve_arith_op(op, &lhs, &rhs)?;
            *resolved_type = Some(ty.clone());
            Ok(ty)
        }
        ScalarExpression::Boolean { value } => {
            type_check_filter(value, schema, scope, oracle, classes, use_meta)?;
            Ok(Type::Boolean)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::test_oracle::FakeOracle;
    use crate::schema::schema_of;

    #[test]
    fn atom_resolves_field_and_accepts_matching_operand() {
        let mut scope = Scope::new();
        scope.add("temperature", Type::Measure("C".into()));
        let mut filt = BooleanExpression::atom(
            "temperature",
            ">",
            Value::Measure { value: 10.0, unit: "C".into() },
        );
        let oracle = FakeOracle::default();
        let classes = Classes::default();
        type_check_filter(&mut filt, &Schema::new(), &scope, &oracle, &classes, false).unwrap();
        if let BooleanExpression::Atom { resolved_type, .. } = filt {
            assert_eq!(resolved_type, Some(Type::Measure("C".into())));
        } else {
            panic!("expected Atom");
        }
    }

    #[test]
    fn atom_resolves_against_primitive_schema_before_scope() {
        let schema = schema_of(&[("query", Type::String, Some(true))]);
        let scope = Scope::new();
        let mut filt = BooleanExpression::atom("query", "==", Value::String("cats".into()));
        let oracle = FakeOracle::default();
        let classes = Classes::default();
        type_check_filter(&mut filt, &schema, &scope, &oracle, &classes, false).unwrap();
    }

    #[test]
    fn atom_rejects_unknown_field() {
        let scope = Scope::new();
        let mut filt = BooleanExpression::atom("nope", "==", Value::Number(1.0));
        let oracle = FakeOracle::default();
        let classes = Classes::default();
        assert!(
            type_check_filter(&mut filt, &Schema::new(), &scope, &oracle, &classes, false).is_err()
        );
    }

    #[test]
    fn and_or_not_recurse_into_every_clause() {
        let mut scope = Scope::new();
        scope.add("x", Type::Number);
        let mut filt = BooleanExpression::And(vec![
            BooleanExpression::atom("x", "==", Value::Number(1.0)),
            BooleanExpression::Not(Box::new(BooleanExpression::atom(
                "x",
                "==",
                Value::Number(2.0),
            ))),
        ]);
        let oracle = FakeOracle::default();
        let classes = Classes::default();
        type_check_filter(&mut filt, &Schema::new(), &scope, &oracle, &classes, false).unwrap();
    }

    #[test]
    fn event_projection_requires_has_event() {
        let mut scope = Scope::new();
        assert!(type_for_value(&Value::Event { name: None }, &scope).is_err());
        scope.has_event = true;
        assert_eq!(
            type_for_value(&Value::Event { name: None }, &scope).unwrap(),
            Type::String
        );
    }

    #[test]
    fn external_filter_resolves_own_schema_and_checks_inner_filter() {
        let schema = schema_of(&[("humidity", Type::Number, None)]);
        let oracle = FakeOracle::default().with_function("org.example.weather", "get", schema);
        let classes = Classes::default();
        let scope = Scope::new();

        let mut filt = BooleanExpression::External {
            selector: Selector::Device { kind: "org.example.weather".into() },
            channel: "get".into(),
            in_params: vec![],
            filter: Box::new(BooleanExpression::atom(
                "humidity",
                ">",
                Value::Number(50.0),
            )),
            schema: None,
            span: None,
        };
        type_check_filter(&mut filt, &Schema::new(), &scope, &oracle, &classes, false).unwrap();
    }

    #[test]
    fn external_filter_can_reference_own_required_input() {
        let schema = schema_of(&[("query", Type::String, Some(true))]);
        let oracle = FakeOracle::default().with_function("org.example.search", "run", schema);
        let classes = Classes::default();
        let scope = Scope::new();

        let mut filt = BooleanExpression::External {
            selector: Selector::Device { kind: "org.example.search".into() },
            channel: "run".into(),
            in_params: vec![crate::ast::InputParam {
                name: "query".to_string(),
                value: Value::String("cats".to_string()),
                span: None,
            }],
            filter: Box::new(BooleanExpression::atom(
                "query",
                "==",
                Value::String("cats".into()),
            )),
            schema: None,
            span: None,
        };
        type_check_filter(&mut filt, &Schema::new(), &scope, &oracle, &classes, false).unwrap();
    }

    #[test]
    fn derived_arithmetic_resolves_result_type() {
        let scope = Scope::new();
        let oracle = FakeOracle::default();
        let classes = Classes::default();
        let mut expr = ScalarExpression::derived(
            "+",
            vec![
                ScalarExpression::primary(Value::Number(1.0)),
                ScalarExpression::primary(Value::Number(2.0)),
            ],
        );
        let ty =
            resolve_scalar_expression(&mut expr, &Schema::new(), &scope, &oracle, &classes, false)
                .unwrap();
        assert_eq!(ty, Type::Number);
    }
}
