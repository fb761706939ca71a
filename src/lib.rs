//! Static semantic analysis for ThingTalk: schema resolution, lexical
//! scoping and type checking for streams, tables and actions.
//!
//! The pipeline is a thin sequence of stages, in the spirit of
//! `prql-compiler`'s top-level `compile` (parse -> resolve -> lower ->
//! codegen): resolve each primitive's schema against a [`SchemaOracle`],
//! compose schemas bottom-up through the Table/Stream tree, and check
//! filters/parameters against the result at each step. Parsing and code
//! generation are out of scope — callers hand in an already-parsed AST and
//! get back either `Ok(())` with the AST's schema fields filled in, or the
//! first [`error::CheckError`] encountered.

mod ast;
mod builtin;
mod composer;
pub mod error;
mod expr_checker;
mod operators;
mod primitive_checker;
mod program_checker;
mod resolver;
mod schema;
mod scope;
mod types;

pub use ast::{
    BooleanExpression, ClassDef, Declaration, DeclarationKind, DeclarationValue, InputParam,
    Invocation, PermissionFunction, PrimitiveKind, Policy, Program, Rule, ScalarExpression,
    Selector, Stream, StreamOrTable, Table, Value,
};
pub use builtin::Classes;
pub use error::{CheckError, Reason, Span};
pub use resolver::{AllowedKind, SchemaOracle};
pub use schema::Schema;
pub use scope::Scope;
pub use types::Type;

/// Options threaded through every check entry point.
///
/// Grounded on `prql-compiler`'s `Options` struct (`target`/`format`/
/// `signature_comment` flags threaded through `compile`): a small,
/// `Copy`-able bag of toggles rather than a parameter per function.
#[derive(Debug, Clone, Copy, Default)]
pub struct CheckOptions {
    /// Resolve schemas from Thingpedia's natural-language metadata branch
    /// instead of the machine-only one (affects the oracle, not the checker
    /// itself — threaded through so it reaches every `ensure_schema` call).
    pub use_meta: bool,
}

/// Checks a whole program: validates the principal (if any), then checks
/// declarations in order followed by rules, against a single accumulated
/// scope of declaration-bound globals.
pub fn type_check_program(
    program: &mut Program,
    oracle: &dyn SchemaOracle,
    options: CheckOptions,
) -> Result<(), CheckError> {
    program_checker::check_program(program, oracle, options.use_meta)
}

/// Checks a standalone permission policy (principal + query + action).
pub fn type_check_permission_rule(
    policy: &mut Policy,
    oracle: &dyn SchemaOracle,
    options: CheckOptions,
) -> Result<(), CheckError> {
    program_checker::check_policy(policy, oracle, options.use_meta)
}

/// Resolves and binds a single invocation's input parameters, as used when
/// checking one query/action primitive outside of a full program (e.g. an
/// IDE hovering over a single statement).
pub fn type_check_input(
    invocation: &mut Invocation,
    primitive_kind: PrimitiveKind,
    scope: &Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    options: CheckOptions,
) -> Result<(), CheckError> {
    resolver::ensure_invocation_schema(invocation, primitive_kind, oracle, classes, options.use_meta)?;
    let resolved = invocation.schema.clone().expect("just resolved above");
    primitive_checker::bind_input_params(&resolved, &mut invocation.in_params, scope)
}

/// Returns the output schema an invocation publishes, resolving it first if
/// necessary.
pub fn type_check_output(
    invocation: &mut Invocation,
    primitive_kind: PrimitiveKind,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    options: CheckOptions,
) -> Result<Schema, CheckError> {
    resolver::ensure_invocation_schema(invocation, primitive_kind, oracle, classes, options.use_meta)?;
    Ok(invocation.schema.clone().expect("just resolved above"))
}

/// Checks a standalone table, mutating its schema fields in place.
pub fn type_check_table(
    table: &mut Table,
    scope: &mut Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    options: CheckOptions,
) -> Result<(), CheckError> {
    composer::compose_table(table, scope, oracle, classes, options.use_meta)
}

/// Checks a standalone stream, mutating its schema fields in place.
pub fn type_check_stream(
    stream: &mut Stream,
    scope: &mut Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    options: CheckOptions,
) -> Result<(), CheckError> {
    composer::compose_stream(stream, scope, oracle, classes, options.use_meta)
}

/// Checks a standalone rule (a stream/table source plus a list of actions)
/// against a fresh scope. Delegates to the same `check_rule` the full
/// program pipeline uses, so a pending required input is filled in with
/// `Undefined(remote=true)` on its owning primitive here too, rather than
/// silently dropped the way this wrapper used to.
pub fn type_check_rule(
    rule: &mut Rule,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    options: CheckOptions,
) -> Result<(), CheckError> {
    let mut scope = Scope::new();
    program_checker::check_rule(rule, &mut scope, oracle, classes, options.use_meta)
}

/// Checks a standalone boolean filter expression against `schema`'s own
/// input/output fields first, falling back to `scope`.
pub fn type_check_filter(
    filter: &mut BooleanExpression,
    schema: &Schema,
    scope: &Scope,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    options: CheckOptions,
) -> Result<(), CheckError> {
    expr_checker::type_check_filter(filter, schema, scope, oracle, classes, options.use_meta)
}
