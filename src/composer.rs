//! The composer (C8): recursive descent over `Table`/`Stream` constructors,
//! each case deriving a schema from its children and publishing outputs
//! into the surrounding scope.
//!
//! Grounded on `prql-compiler/src/semantic/resolver.rs`'s `fold_pipeline`,
//! which walks a PRQL pipeline transform-by-transform threading a `Context`
//! the same way this walks Table/Stream nodes threading a `Scope`.

use crate::ast::{BooleanExpression, Invocation, PrimitiveKind, Stream, Table};
use crate::builtin::Classes;
use crate::error::{CheckError, Reason};
use crate::expr_checker::{resolve_scalar_expression, type_check_filter, type_for_value};
use crate::operators::{is_orderable, resolve_aggregation, resolve_arg_min_max};
use crate::primitive_checker::{bind_input_params, push_unsupplied_required, record_lambda_renames};
use crate::resolver::{ensure_invocation_schema, ensure_var_ref_schema, SchemaOracle};
use crate::schema::Schema;
use crate::scope::Scope;
use crate::types::Type;

/// Declaration-bound globals take priority over the oracle's memory tables,
/// since a `let`-bound stream/table shadows a persistent `@`-table of the
/// same name within its scope.
fn resolve_var_ref(
    name: &str,
    scope: &Scope,
    oracle: &dyn SchemaOracle,
    use_meta: bool,
) -> Result<Schema, CheckError> {
    if let Some(schema) = scope.get_global(name) {
        return Ok(schema.clone());
    }
    ensure_var_ref_schema(name, oracle, use_meta)
}

fn check_time_range(base: &crate::ast::Value, delta: &crate::ast::Value, scope: &Scope) -> Result<(), CheckError> {
    let base_ty = type_for_value(base, scope)?;
    let delta_ty = type_for_value(delta, scope)?;
    if !matches!(base_ty, Type::Date) || !matches!(delta_ty, Type::Measure(ref u) if u == "ms") {
        return Err(CheckError::new(Reason::InvalidTimeRange));
    }
    Ok(())
}

fn publish(schema: &Schema, scope: &mut Scope) {
    scope.assign(&schema.out);
}

pub fn compose_table(
    table: &mut Table,
    scope: &mut Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    use_meta: bool,
) -> Result<(), CheckError> {
    match table {
        Table::Invocation { invocation, schema } => {
            compose_invocation(invocation, scope, oracle, classes, use_meta)?;
            *schema = invocation.schema.clone();
        }
        Table::VarRef { name, schema, span } => {
            let resolved = resolve_var_ref(name, scope, oracle, use_meta).map_err(|e| e.with_span(*span))?;
            publish(&resolved, scope);
            *schema = Some(resolved);
        }
        Table::Filter { table, filter, schema } => {
            compose_table(table, scope, oracle, classes, use_meta)?;
            let inner_schema = table.schema().cloned().unwrap_or_default();
            type_check_filter(filter, &inner_schema, scope, oracle, classes, use_meta)?;
            *schema = Some(inner_schema);
        }
        Table::Projection { table, args, schema } => {
            compose_table(table, scope, oracle, classes, use_meta)?;
            let mut s = table.schema().cloned().unwrap_or_default();
            s.resolve_projection(args, scope)?;
            *schema = Some(s);
        }
        Table::Alias { table, name, schema } => {
            compose_table(table, scope, oracle, classes, use_meta)?;
            scope.prefix(name);
            *schema = table.schema().cloned();
        }
        Table::Aggregation { table, field, op, alias, schema } => {
            compose_table(table, scope, oracle, classes, use_meta)?;
            let field_type = if op == "count" {
                Type::Any
            } else {
                scope.get(field)?
            };
            let result_type = resolve_aggregation(op, &field_type)?;

            let mut s = table.schema().cloned().unwrap_or_default();
            s.clean_output(scope);
            let result_name = alias.clone().unwrap_or_else(|| op.clone());
            s.add_output(&result_name, result_type, scope);
            *schema = Some(s);
        }
        Table::ArgMinMax { table, field, op, base, limit, schema } => {
            compose_table(table, scope, oracle, classes, use_meta)?;
            let field_type = scope.get(field)?;
            let base_type = type_for_value(base, scope)?;
            let limit_type = type_for_value(limit, scope)?;
            resolve_arg_min_max(op, &field_type, &base_type, &limit_type)?;
            if !is_orderable(&field_type) {
                return Err(CheckError::new(Reason::InvalidArgMinMaxField { field: field.clone() }));
            }
            *schema = table.schema().cloned();
        }
        Table::Join { lhs, rhs, in_params, schema } => {
            compose_table(lhs, scope, oracle, classes, use_meta)?;
            let lhs_scope = scope.clone();

            // Per spec §4.8, a join always makes `$event` available to the
            // rhs, not just when the lhs chain already had it: the rhs can
            // reference lhs outputs through `$event` regardless of whether a
            // `Monitor` precedes the join.
            let mut rhs_scope = Scope::new();
            rhs_scope.has_event = true;
            compose_table(rhs, &mut rhs_scope, oracle, classes, use_meta)?;

            let lhs_schema = lhs.schema().cloned().unwrap_or_default();
            let mut rhs_schema = rhs.schema().cloned().unwrap_or_default();

            bind_input_params(&rhs_schema, in_params, &lhs_scope)?;
            record_lambda_renames(in_params, scope);
            for param in in_params.iter() {
                rhs_schema.remove_input(&param.name);
            }

            let mut joined = Schema::resolve_join(&lhs_schema, &rhs_schema);

            for name in rhs_scope.locals.keys() {
                if lhs_scope.has(name) {
                    scope.add_conflict(name);
                }
            }
            scope.merge(&rhs_scope);

            let supplied_by_join: std::collections::HashSet<String> =
                in_params.iter().map(|p| p.name.clone()).collect();
            push_unsupplied_required(&joined, &supplied_by_join, scope);
            joined.confirmation = None;
            *schema = Some(joined);
        }
        Table::Window { table, base, delta, schema }
        | Table::TimeSeries { table, base, delta, schema }
        | Table::Sequence { table, base, delta, schema }
        | Table::History { table, base, delta, schema } => {
            compose_table(table, scope, oracle, classes, use_meta)?;
            check_time_range(base, delta, scope)?;
            *schema = table.schema().cloned();
        }
        Table::Compute { table, expr, alias, schema } => {
            compose_table(table, scope, oracle, classes, use_meta)?;
            let mut s = table.schema().cloned().unwrap_or_default();
            let ty = resolve_scalar_expression(expr, &s, scope, oracle, classes, use_meta)?;
            let name = alias.clone().unwrap_or_else(|| "computed".to_string());
            s.add_output(&name, ty, scope);
            *schema = Some(s);
        }
    }
    Ok(())
}

pub fn compose_stream(
    stream: &mut Stream,
    scope: &mut Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    use_meta: bool,
) -> Result<(), CheckError> {
    match stream {
        Stream::Timer { base, interval, schema } => {
            check_time_range(base, interval, scope)?;
            *schema = Some(Schema::new());
        }
        Stream::AtTimer { time, schema } => {
            for t in time.iter() {
                let ty = type_for_value(t, scope)?;
                if !matches!(ty, Type::Time) {
                    return Err(CheckError::new(Reason::InvalidType {
                        name: "time".to_string(),
                        expected: "Time".to_string(),
                        found: format!("{ty:?}"),
                    }));
                }
            }
            *schema = Some(Schema::new());
        }
        Stream::VarRef { name, schema, span } => {
            let resolved = resolve_var_ref(name, scope, oracle, use_meta).map_err(|e| e.with_span(*span))?;
            publish(&resolved, scope);
            *schema = Some(resolved);
        }
        Stream::Monitor { table, args, schema } => {
            compose_table(table, scope, oracle, classes, use_meta)?;
            let mut s = table.schema().cloned().unwrap_or_default();
            if let Some(args) = args {
                s.resolve_projection(args, scope)?;
            }
            scope.has_event = true;
            *schema = Some(s);
        }
        Stream::EdgeFilter { stream, filter, schema } => {
            compose_stream(stream, scope, oracle, classes, use_meta)?;
            let inner_schema = stream.schema().cloned().unwrap_or_default();
            type_check_filter(filter, &inner_schema, scope, oracle, classes, use_meta)?;
            *schema = Some(inner_schema);
        }
        Stream::EdgeNew { stream, schema } => {
            compose_stream(stream, scope, oracle, classes, use_meta)?;
            *schema = stream.schema().cloned();
        }
        Stream::Filter { stream, filter, schema } => {
            compose_stream(stream, scope, oracle, classes, use_meta)?;
            let inner_schema = stream.schema().cloned().unwrap_or_default();
            type_check_filter(filter, &inner_schema, scope, oracle, classes, use_meta)?;
            *schema = Some(inner_schema);
        }
        Stream::Projection { stream, args, schema } => {
            compose_stream(stream, scope, oracle, classes, use_meta)?;
            let mut s = stream.schema().cloned().unwrap_or_default();
            s.resolve_projection(args, scope)?;
            *schema = Some(s);
        }
        Stream::Alias { stream, name, schema } => {
            compose_stream(stream, scope, oracle, classes, use_meta)?;
            scope.prefix(name);
            *schema = stream.schema().cloned();
        }
        Stream::Join { stream, table, in_params, schema } => {
            compose_stream(stream, scope, oracle, classes, use_meta)?;
            let lhs_scope = scope.clone();

            // See the matching note in `Table::Join`: the rhs always gets
            // `$event`, unconditionally.
            let mut rhs_scope = Scope::new();
            rhs_scope.has_event = true;
            compose_table(table, &mut rhs_scope, oracle, classes, use_meta)?;

            let lhs_schema = stream.schema().cloned().unwrap_or_default();
            let mut rhs_schema = table.schema().cloned().unwrap_or_default();

            bind_input_params(&rhs_schema, in_params, &lhs_scope)?;
            record_lambda_renames(in_params, scope);
            for param in in_params.iter() {
                rhs_schema.remove_input(&param.name);
            }

            let mut joined = Schema::resolve_join(&lhs_schema, &rhs_schema);

            for name in rhs_scope.locals.keys() {
                if lhs_scope.has(name) {
                    scope.add_conflict(name);
                }
            }
            scope.merge(&rhs_scope);

            let supplied_by_join: std::collections::HashSet<String> =
                in_params.iter().map(|p| p.name.clone()).collect();
            push_unsupplied_required(&joined, &supplied_by_join, scope);
            joined.confirmation = None;
            *schema = Some(joined);
        }
    }
    Ok(())
}

/// Resolves an invocation's schema, binds its input parameters, and lifts
/// any unsupplied required input into `scope` for the declaration to
/// collect later. Shared by `Table::Invocation` and the Rule action path
/// (the latter passes `PrimitiveKind::Action`).
pub fn compose_invocation(
    invocation: &mut Invocation,
    scope: &mut Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    use_meta: bool,
) -> Result<(), CheckError> {
    ensure_invocation_schema(invocation, PrimitiveKind::Query, oracle, classes, use_meta)?;
    let resolved = invocation.schema.clone().expect("just resolved above");

    bind_input_params(&resolved, &mut invocation.in_params, scope)?;
    record_lambda_renames(&invocation.in_params, scope);

    let supplied: std::collections::HashSet<String> =
        invocation.in_params.iter().map(|p| p.name.clone()).collect();
    push_unsupplied_required(&resolved, &supplied, scope);

    publish(&resolved, scope);
    Ok(())
}

/// Same as `compose_invocation` but for an action (Rule's action list,
/// or a declaration of kind `action`): no outputs to publish.
pub fn compose_action_invocation(
    invocation: &mut Invocation,
    scope: &mut Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    use_meta: bool,
) -> Result<(), CheckError> {
    ensure_invocation_schema(invocation, PrimitiveKind::Action, oracle, classes, use_meta)?;
    let resolved = invocation.schema.clone().expect("just resolved above");

    bind_input_params(&resolved, &mut invocation.in_params, scope)?;
    record_lambda_renames(&invocation.in_params, scope);

    let supplied: std::collections::HashSet<String> =
        invocation.in_params.iter().map(|p| p.name.clone()).collect();
    push_unsupplied_required(&resolved, &supplied, scope);

    Ok(())
}

/// Every `Invocation` reachable from a table, in no particular order.
/// Used by `program_checker::check_rule` to find the owning primitive of a
/// required input still pending after composition (spec §4.9).
pub fn table_invocations_mut(table: &mut Table) -> Vec<&mut Invocation> {
    match table {
        Table::Invocation { invocation, .. } => vec![invocation],
        Table::VarRef { .. } => vec![],
        Table::Filter { table, .. }
        | Table::Projection { table, .. }
        | Table::Alias { table, .. }
        | Table::Aggregation { table, .. }
        | Table::ArgMinMax { table, .. }
        | Table::Window { table, .. }
        | Table::TimeSeries { table, .. }
        | Table::Sequence { table, .. }
        | Table::History { table, .. }
        | Table::Compute { table, .. } => table_invocations_mut(table),
        Table::Join { lhs, rhs, .. } => {
            let mut found = table_invocations_mut(lhs);
            found.extend(table_invocations_mut(rhs));
            found
        }
    }
}

/// Stream analogue of `table_invocations_mut`.
pub fn stream_invocations_mut(stream: &mut Stream) -> Vec<&mut Invocation> {
    match stream {
        Stream::Timer { .. } | Stream::AtTimer { .. } | Stream::VarRef { .. } => vec![],
        Stream::Monitor { table, .. } => table_invocations_mut(table),
        Stream::EdgeFilter { stream, .. }
        | Stream::EdgeNew { stream, .. }
        | Stream::Filter { stream, .. }
        | Stream::Projection { stream, .. }
        | Stream::Alias { stream, .. } => stream_invocations_mut(stream),
        Stream::Join { stream, table, .. } => {
            let mut found = stream_invocations_mut(stream);
            found.extend(table_invocations_mut(table));
            found
        }
    }
}
