//! End-to-end scenarios against the public API, one per seed case.
//!
//! These exercise the full pipeline (resolver -> composer -> expression
//! checker) the way a caller outside the crate would: build an AST by hand,
//! supply a schema oracle, call one of the `type_check_*` entry points.

use std::collections::HashMap;
use std::sync::Mutex;

use thingtalk_typecheck::{
    AllowedKind, BooleanExpression, CheckError, CheckOptions, Classes, Declaration,
    DeclarationKind, DeclarationValue, InputParam, Invocation, PrimitiveKind, Program,
    Reason, Rule, Schema, SchemaOracle, Scope, Selector, Stream, StreamOrTable, Table, Type,
    Value,
};

#[derive(Default)]
struct FixtureOracle {
    functions: Mutex<HashMap<String, Schema>>,
}

impl FixtureOracle {
    fn with(self, kind: &str, channel: &str, schema: Schema) -> Self {
        self.functions
            .lock()
            .unwrap()
            .insert(format!("{kind}.{channel}"), schema);
        self
    }
}

impl SchemaOracle for FixtureOracle {
    fn schema_for_selector(
        &self,
        kind: &str,
        channel: &str,
        _primitive_kind: PrimitiveKind,
        _use_meta: bool,
        _classes: &Classes,
    ) -> Result<Schema, CheckError> {
        self.functions
            .lock()
            .unwrap()
            .get(&format!("{kind}.{channel}"))
            .cloned()
            .ok_or_else(|| {
                CheckError::new(Reason::UnknownFunction {
                    kind: kind.to_string(),
                    channel: channel.to_string(),
                })
            })
    }

    fn memory_schema(&self, _name: &str, _use_meta: bool) -> Result<Option<Schema>, CheckError> {
        Ok(None)
    }

    fn allowed_schema_for(&self, permission: &str, _kind: AllowedKind) -> Result<Schema, CheckError> {
        Err(CheckError::new(Reason::Simple(format!("no such permission {permission}"))))
    }
}

fn schema(fields: &[(&str, Type, Option<bool>)]) -> Schema {
    let mut s = Schema::new();
    let mut scope = Scope::new();
    for (name, ty, req) in fields {
        match req {
            Some(required) => s.add_input(name, ty.clone(), *required),
            None => s.add_output(name, ty.clone(), &mut scope),
        }
    }
    s
}

fn device_invocation(kind: &str, channel: &str, params: Vec<InputParam>) -> Invocation {
    Invocation::new(Selector::Device { kind: kind.to_string() }, channel).with_in_params(params)
}

fn invocation_table(invocation: Invocation) -> Table {
    Table::Invocation { invocation, schema: None }
}

fn param(name: &str, value: Value) -> InputParam {
    InputParam { name: name.to_string(), value, span: None }
}

/// 1. `now => @com.twitter.post(status="hi")`: required `status:String` is
/// bound, the action-only rule succeeds with no outstanding required input.
#[test]
fn immediate_action_with_bound_required_input_succeeds() {
    let post_schema = schema(&[("status", Type::String, Some(true))]);
    let oracle = FixtureOracle::default().with("com.twitter", "post", post_schema);

    let mut rule = Rule {
        stream_or_table: None,
        actions: vec![device_invocation(
            "com.twitter",
            "post",
            vec![param("status", Value::String("hi".to_string()))],
        )],
    };

    thingtalk_typecheck::type_check_rule(&mut rule, &oracle, &Classes::default(), CheckOptions::default())
        .unwrap();
}

/// 2. `monitor @org.thingpedia.weather.current(location=...) => notify`:
/// the monitored table's schema survives onto the stream, and `hasEvent`
/// becomes available for the rest of the rule.
#[test]
fn monitor_table_schema_propagates_to_stream_and_sets_has_event() {
    let weather_schema = schema(&[
        ("location", Type::Location, Some(true)),
        ("temperature", Type::Measure("C".to_string()), None),
    ]);
    let oracle = FixtureOracle::default().with("org.thingpedia.weather", "current", weather_schema);

    let mut stream = Stream::Monitor {
        table: Box::new(invocation_table(device_invocation(
            "org.thingpedia.weather",
            "current",
            vec![param("location", Value::Location { lat: 37.0, lon: -122.0 })],
        ))),
        args: None,
        schema: None,
    };

    let mut scope = Scope::new();
    thingtalk_typecheck::type_check_stream(
        &mut stream,
        &mut scope,
        &oracle,
        &Classes::default(),
        CheckOptions::default(),
    )
    .unwrap();

    assert!(scope.has_event);
    assert!(stream.schema().unwrap().out.contains_key("temperature"));
}

/// 3. A join with explicit parameter passing cancels the passed-through
/// required input from the joined schema.
#[test]
fn join_with_parameter_passing_cancels_passed_input() {
    let lhs_schema = schema(&[("temperature", Type::Measure("C".to_string()), None)]);
    let rhs_schema = schema(&[
        ("temperature", Type::Measure("C".to_string()), Some(true)),
        ("advice", Type::String, None),
    ]);
    let oracle = FixtureOracle::default()
        .with("a.b", "get", lhs_schema)
        .with("c.d", "get", rhs_schema);

    let mut table = Table::Join {
        lhs: Box::new(invocation_table(device_invocation("a.b", "get", vec![]))),
        rhs: Box::new(invocation_table(device_invocation("c.d", "get", vec![]))),
        in_params: vec![param("temperature", Value::VarRef { name: "temperature".to_string() })],
        schema: None,
    };

    let mut scope = Scope::new();
    thingtalk_typecheck::type_check_table(
        &mut table,
        &mut scope,
        &oracle,
        &Classes::default(),
        CheckOptions::default(),
    )
    .unwrap();

    let joined = table.schema().unwrap();
    assert!(!joined.is_input("temperature"));
    assert!(joined.out.contains_key("advice"));
}

/// 4. `aggregate count of (@com.bing.web_search())` shrinks the output to a
/// single `count:Number` field.
#[test]
fn aggregate_count_shrinks_output_to_single_number_field() {
    let search_schema = schema(&[
        ("title", Type::String, None),
        ("url", Type::Entity("tt:url".to_string()), None),
    ]);
    let oracle = FixtureOracle::default().with("com.bing", "web_search", search_schema);

    let mut table = Table::Aggregation {
        table: Box::new(invocation_table(device_invocation("com.bing", "web_search", vec![]))),
        field: "title".to_string(),
        op: "count".to_string(),
        alias: None,
        schema: None,
    };

    let mut scope = Scope::new();
    thingtalk_typecheck::type_check_table(
        &mut table,
        &mut scope,
        &oracle,
        &Classes::default(),
        CheckOptions::default(),
    )
    .unwrap();

    let result = table.schema().unwrap();
    assert_eq!(result.out.keys().collect::<Vec<_>>(), vec!["count"]);
}

/// 5. `@com.twitter.post(status=$event)` with no stream/table in the rule:
/// `$event` needs `hasEvent`, which nothing set, so it fails.
#[test]
fn event_reference_without_has_event_fails() {
    let post_schema = schema(&[("status", Type::String, Some(true))]);
    let oracle = FixtureOracle::default().with("com.twitter", "post", post_schema);

    let mut rule = Rule {
        stream_or_table: None,
        actions: vec![device_invocation(
            "com.twitter",
            "post",
            vec![param("status", Value::Event { name: None })],
        )],
    };

    let err = thingtalk_typecheck::type_check_rule(
        &mut rule,
        &oracle,
        &Classes::default(),
        CheckOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err.reason, Reason::VariableNotInScope { .. }));
}

/// 6. `=~` against an `Entity` LHS fails even though coerce-to-string would
/// otherwise allow it.
#[test]
fn substring_match_rejects_entity_lhs() {
    let mut scope = Scope::new();
    scope.add("p", Type::Entity("tt:username".to_string()));

    let mut filter = BooleanExpression::atom("p", "=~", Value::String("foo".to_string()));
    let oracle = FixtureOracle::default();

    let err = thingtalk_typecheck::type_check_filter(
        &mut filter,
        &Schema::new(),
        &scope,
        &oracle,
        &Classes::default(),
        CheckOptions::default(),
    )
    .unwrap_err();
    assert!(matches!(err.reason, Reason::InvalidParameterTypes { .. }));
}

/// A declaration's lambda parameters become required inputs of the schema
/// it is bound to, so later references to the declared name can be invoked
/// with fresh arguments.
#[test]
fn declaration_with_lambda_arg_round_trips_through_program() {
    let search_schema = schema(&[
        ("query", Type::String, Some(true)),
        ("result", Type::String, None),
    ]);
    let oracle = FixtureOracle::default().with("org.example.search", "lookup", search_schema);

    let mut invocation = device_invocation(
        "org.example.search",
        "lookup",
        vec![param("query", Value::VarRef { name: "q".to_string() })],
    );
    invocation.in_params[0].value = Value::VarRef { name: "q".to_string() };

    let mut program = Program {
        classes: vec![],
        declarations: vec![Declaration {
            name: "mySearch".to_string(),
            kind: DeclarationKind::Table,
            args: vec![("q".to_string(), Type::String)],
            value: DeclarationValue::Table(invocation_table(invocation)),
        }],
        rules: vec![Rule {
            stream_or_table: Some(StreamOrTable::Table(Table::VarRef {
                name: "mySearch".to_string(),
                span: None,
                schema: None,
            })),
            actions: vec![Invocation::new(Selector::Builtin, "notify")],
        }],
        principal: None,
    };

    thingtalk_typecheck::type_check_program(&mut program, &oracle, CheckOptions::default()).unwrap();
}
