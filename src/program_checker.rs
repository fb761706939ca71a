//! Program/Declaration/Rule/Policy checking (C9): the top-level driver that
//! threads a single `Scope` across a program's declarations (in order, so
//! later declarations and rules can reference earlier ones) and then checks
//! each rule and permission policy against the accumulated globals.
//!
//! Grounded on `prql-compiler/src/semantic/mod.rs::resolve`, which drives a
//! module's statements in declaration order through the same
//! accumulate-then-check shape.

use std::collections::HashSet;

use crate::ast::{
    Declaration, DeclarationValue, InputParam, Invocation, PermissionFunction, Policy, Program,
    Rule, Selector, StreamOrTable, Value,
};
use crate::builtin::Classes;
use crate::composer::{
    compose_action_invocation, compose_stream, compose_table, stream_invocations_mut,
    table_invocations_mut,
};
use crate::error::{CheckError, Reason};
use crate::expr_checker::{type_check_filter, type_for_value};
use crate::resolver::{AllowedKind, SchemaOracle};
use crate::schema::Schema;
use crate::scope::Scope;

fn check_principal(value: &Value) -> Result<(), CheckError> {
    let scope = Scope::new();
    let ty = type_for_value(value, &scope)?;
    match ty {
        crate::types::Type::Entity(kind) if kind == "tt:contact" || kind == "tt:username" => Ok(()),
        other => Err(CheckError::new(Reason::InvalidPrincipal {
            found: format!("{other:?}"),
        })),
    }
}

pub fn check_program(
    program: &mut Program,
    oracle: &dyn SchemaOracle,
    use_meta: bool,
) -> Result<(), CheckError> {
    let classes = Classes::from_defs(&program.classes);

    if let Some(principal) = &program.principal {
        check_principal(principal)?;
    }

    let mut scope = Scope::new();
    for decl in program.declarations.iter_mut() {
        check_declaration(decl, &mut scope, oracle, &classes, use_meta)?;
    }

    for rule in program.rules.iter_mut() {
        let mut rule_scope = scope.clone();
        rule_scope.clean(None);
        check_rule(rule, &mut rule_scope, oracle, &classes, use_meta)?;
    }

    Ok(())
}

fn check_declaration(
    decl: &mut Declaration,
    scope: &mut Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    use_meta: bool,
) -> Result<(), CheckError> {
    let mut body_scope = Scope::new();
    for (name, schema) in &scope.globals {
        let _ = body_scope.add_global(name, schema.clone());
    }
    body_scope.init_lambda_args(&decl.args);

    let mut schema = match &mut decl.value {
        DeclarationValue::Table(table) => {
            compose_table(table, &mut body_scope, oracle, classes, use_meta)?;
            table.schema().cloned().unwrap_or_default()
        }
        DeclarationValue::Stream(stream) => {
            compose_stream(stream, &mut body_scope, oracle, classes, use_meta)?;
            stream.schema().cloned().unwrap_or_default()
        }
        DeclarationValue::Action(invocation) => {
            compose_action_invocation(invocation, &mut body_scope, oracle, classes, use_meta)?;
            invocation.schema.clone().unwrap_or_default()
        }
    };

    // Every lambda parameter becomes a required input of the declaration's
    // exported schema: calling it means supplying these.
    for (name, ty) in &decl.args {
        if !schema.is_input(name) {
            schema.add_input(name, ty.clone(), true);
        }
    }
    // Any other required input the body never satisfied (not one of the
    // lambda args, not supplied by an `in_param`) is lifted the same way:
    // the declaration itself now requires it from its own callers.
    for (name, ty) in &body_scope.in_req {
        if !schema.is_input(name) {
            schema.add_input(name, ty.clone(), true);
        }
    }

    let arg_names: Vec<String> = decl.args.iter().map(|(n, _)| n.clone()).collect();
    body_scope.clean(Some(&arg_names));

    scope.add_global(&decl.name, schema)?;
    Ok(())
}

/// For every primitive in the rule still carrying one of `pending`'s
/// required inputs unsupplied, appends `Undefined(remote=true)` to that
/// primitive's own `in_params` (spec §4.9). A name in `pending` that a join
/// already cancelled via parameter passing never reaches the primitive that
/// declared it, since `resolve_join` removes it from the merged schema
/// before `push_unsupplied_required` runs — so this only touches primitives
/// that genuinely still need the slot filled at runtime.
fn fill_unsupplied_required_as_undefined(rule: &mut Rule, pending: &HashSet<String>) {
    let mut invocations: Vec<&mut Invocation> = match &mut rule.stream_or_table {
        Some(StreamOrTable::Stream(stream)) => stream_invocations_mut(stream),
        Some(StreamOrTable::Table(table)) => table_invocations_mut(table),
        None => Vec::new(),
    };
    invocations.extend(rule.actions.iter_mut());

    for invocation in invocations {
        let Some(schema) = invocation.schema.clone() else { continue };
        let supplied: HashSet<String> =
            invocation.in_params.iter().map(|p| p.name.clone()).collect();
        for name in schema.in_req.keys() {
            if pending.contains(name) && !supplied.contains(name.as_str()) {
                invocation.in_params.push(InputParam {
                    name: name.clone(),
                    value: Value::Undefined { remote: true },
                    span: None,
                });
            }
        }
    }
}

pub(crate) fn check_rule(
    rule: &mut Rule,
    scope: &mut Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    use_meta: bool,
) -> Result<(), CheckError> {
    match &mut rule.stream_or_table {
        Some(StreamOrTable::Stream(stream)) => {
            compose_stream(stream, scope, oracle, classes, use_meta)?;
        }
        Some(StreamOrTable::Table(table)) => {
            compose_table(table, scope, oracle, classes, use_meta)?;
        }
        None => {
            let only_notify = rule.actions.len() == 1
                && matches!(rule.actions[0].selector, Selector::Builtin)
                && rule.actions[0].channel == "notify";
            if only_notify {
                return Err(CheckError::new(Reason::NoGetFunction));
            }
        }
    }

    for action in rule.actions.iter_mut() {
        compose_action_invocation(action, scope, oracle, classes, use_meta)?;
    }

    // Any input still pending here is accepted as a runtime slot: the
    // primitive that declared it gets an explicit `Undefined(remote=true)`
    // input param, which downstream slot-filling resolves later.
    let pending: HashSet<String> = scope.in_req.keys().cloned().collect();
    if !pending.is_empty() {
        for name in &pending {
            log::debug!("rule leaves `{name}` as a runtime-filled slot");
        }
        fill_unsupplied_required_as_undefined(rule, &pending);
    }
    scope.in_req.clear();

    Ok(())
}

pub fn check_policy(
    policy: &mut Policy,
    oracle: &dyn SchemaOracle,
    use_meta: bool,
) -> Result<(), CheckError> {
    let classes = Classes::default();

    if let Some(principal) = &policy.principal {
        check_principal(principal)?;
    }

    // Query and action share one scope (spec §4.9 Policy flow): the query's
    // outputs are published into it, `hasEvent` is then raised, and only
    // after that is the action checked — so an action filter can reference
    // a field the query resolved, or `$event` for it.
    let mut scope = Scope::new();
    scope.add("source", crate::types::Type::Entity("tt:contact".to_string()));

    check_permission_function(
        &mut policy.query,
        AllowedKind::Queries,
        oracle,
        &classes,
        use_meta,
        &mut scope,
    )?;
    scope.has_event = true;
    check_permission_function(
        &mut policy.action,
        AllowedKind::Actions,
        oracle,
        &classes,
        use_meta,
        &mut scope,
    )?;
    Ok(())
}

fn check_permission_function(
    pf: &mut PermissionFunction,
    kind: AllowedKind,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    use_meta: bool,
    scope: &mut Scope,
) -> Result<(), CheckError> {
    let schema = if pf.kind != "*" {
        let schema = oracle.allowed_schema_for(&pf.kind, kind)?;
        for (name, ty) in schema.args.iter().zip(schema.types.iter()) {
            scope.add(name, ty.clone());
        }
        pf.schema = Some(schema.clone());
        schema
    } else {
        Schema::default()
    };

    type_check_filter(&mut pf.filter, &schema, scope, oracle, classes, use_meta)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// The names a declaration's body left unresolved inputs for — used to
    /// assert the lifting behavior without reaching into `Scope` internals.
    fn schema_required_names(schema: &Schema) -> HashSet<String> {
        schema.in_req.keys().cloned().collect()
    }
    use crate::ast::invocation::{InputParam, Invocation};
    use crate::ast::table::Table;
    use crate::ast::{BooleanExpression, DeclarationKind};
    use crate::resolver::test_oracle::FakeOracle;
    use crate::schema::{schema_of, Schema};
    use crate::types::Type;
    use std::collections::HashSet;

    fn invocation_table(kind: &str, channel: &str) -> Table {
        Table::Invocation {
            invocation: Invocation::new(Selector::Device { kind: kind.to_string() }, channel),
            schema: None,
        }
    }

    #[test]
    fn declaration_lifts_lambda_args_as_required_inputs() {
        let schema = schema_of(&[
            ("query", Type::String, Some(true)),
            ("result", Type::String, None),
        ]);
        let oracle = FakeOracle::default().with_function("org.example.search", "lookup", schema);
        let mut invocation = invocation_table("org.example.search", "lookup");
        if let Table::Invocation { invocation: inv, .. } = &mut invocation {
            inv.in_params.push(InputParam {
                name: "query".to_string(),
                value: Value::VarRef { name: "q".to_string() },
                span: None,
            });
        }

        let mut decl = Declaration {
            name: "mySearch".to_string(),
            kind: DeclarationKind::Table,
            args: vec![("q".to_string(), Type::String)],
            value: DeclarationValue::Table(invocation),
        };

        let mut scope = Scope::new();
        let classes = Classes::default();
        check_declaration(&mut decl, &mut scope, &oracle, &classes, false).unwrap();

        let bound = scope.get_global("mySearch").unwrap();
        assert!(schema_required_names(bound).contains("q"));
    }

    #[test]
    fn rule_without_stream_and_only_notify_action_is_rejected() {
        let mut rule = Rule {
            stream_or_table: None,
            actions: vec![Invocation::new(Selector::Builtin, "notify")],
        };
        let oracle = FakeOracle::default();
        let classes = Classes::default();
        let mut scope = Scope::new();
        assert!(check_rule(&mut rule, &mut scope, &oracle, &classes, false).is_err());
    }

    #[test]
    fn rule_with_table_source_and_notify_action_succeeds() {
        let schema = schema_of(&[("temperature", Type::Measure("C".into()), None)]);
        let oracle = FakeOracle::default().with_function("org.example.weather", "current", schema);
        let classes = Classes::default();
        let mut scope = Scope::new();
        let mut rule = Rule {
            stream_or_table: Some(StreamOrTable::Table(invocation_table(
                "org.example.weather",
                "current",
            ))),
            actions: vec![Invocation::new(Selector::Builtin, "notify")],
        };
        check_rule(&mut rule, &mut scope, &oracle, &classes, false).unwrap();
    }

    #[test]
    fn rule_fills_unsupplied_required_action_input_with_remote_undefined() {
        let schema = schema_of(&[("message", Type::String, Some(true))]);
        let oracle = FakeOracle::default().with_function("org.example.messaging", "send", schema);
        let classes = Classes::default();
        let mut scope = Scope::new();
        let mut rule = Rule {
            stream_or_table: None,
            actions: vec![Invocation::new(
                Selector::Device { kind: "org.example.messaging".to_string() },
                "send",
            )],
        };

        check_rule(&mut rule, &mut scope, &oracle, &classes, false).unwrap();

        let filled = rule.actions[0]
            .in_params
            .iter()
            .find(|p| p.name == "message")
            .expect("message should have been filled as a runtime slot");
        assert!(matches!(filled.value, Value::Undefined { remote: true }));
        assert!(scope.in_req.is_empty());
    }

    #[test]
    fn policy_checks_principal_and_both_permission_functions() {
        let query_schema = schema_of(&[("file_name", Type::String, Some(true))]);
        let oracle = FakeOracle::default();
        oracle
            .permissions
            .lock()
            .unwrap()
            .insert("org.example.files.search".to_string(), query_schema);
        let mut policy = Policy {
            principal: Some(Value::Entity {
                kind: "tt:contact".to_string(),
                value: "bob".to_string(),
            }),
            query: PermissionFunction {
                kind: "org.example.files.search".to_string(),
                filter: BooleanExpression::atom("file_name", "=~", Value::String("report".into())),
                schema: None,
                span: None,
            },
            action: PermissionFunction {
                kind: "*".to_string(),
                filter: BooleanExpression::True,
                schema: None,
                span: None,
            },
        };
        check_policy(&mut policy, &oracle, false).unwrap();
        assert!(policy.query.schema.is_some());
        assert!(policy.action.schema.is_none());
    }

    #[test]
    fn policy_action_filter_can_reference_query_output_and_event() {
        let query_schema = schema_of(&[
            ("file_name", Type::String, Some(true)),
            ("note", Type::String, None),
        ]);
        let oracle = FakeOracle::default();
        oracle
            .permissions
            .lock()
            .unwrap()
            .insert("org.example.files.search".to_string(), query_schema);
        let mut policy = Policy {
            principal: None,
            query: PermissionFunction {
                kind: "org.example.files.search".to_string(),
                filter: BooleanExpression::True,
                schema: None,
                span: None,
            },
            action: PermissionFunction {
                kind: "*".to_string(),
                filter: BooleanExpression::atom("note", "==", Value::Event { name: None }),
                schema: None,
                span: None,
            },
        };
        check_policy(&mut policy, &oracle, false).unwrap();
    }

    #[test]
    fn invalid_principal_is_rejected() {
        let mut policy = Policy {
            principal: Some(Value::Number(42.0)),
            query: PermissionFunction {
                kind: "*".to_string(),
                filter: BooleanExpression::True,
                schema: None,
                span: None,
            },
            action: PermissionFunction {
                kind: "*".to_string(),
                filter: BooleanExpression::True,
                schema: None,
                span: None,
            },
        };
        let oracle = FakeOracle::default();
        assert!(check_policy(&mut policy, &oracle, false).is_err());
    }
}
