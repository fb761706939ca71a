//! The schema resolver (C5): fills a primitive's schema from the oracle, or
//! from the fixed built-in action table. The only suspending step in the
//! original; here a plain (blocking) trait method, the sanctioned
//! synchronous rendition from spec §9 ("a synchronous checker
//! parameterized over a pre-populated schema cache").

use crate::ast::{Invocation, PrimitiveKind, Selector};
use crate::builtin::{builtin_action_schema, Classes};
use crate::error::{CheckError, Reason};
use crate::schema::Schema;

/// What kind of permission-rule function a schema is being fetched for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllowedKind {
    Queries,
    Actions,
}

/// The schema oracle (spec §6): a thin, injected interface over Thingpedia
/// and the user's memory tables, kept swappable so the checker stays
/// deterministic under test. Implementations are expected to be safe for
/// concurrent reads and to cache internally (spec §5).
pub trait SchemaOracle: Send + Sync {
    fn schema_for_selector(
        &self,
        kind: &str,
        channel: &str,
        primitive_kind: PrimitiveKind,
        use_meta: bool,
        classes: &Classes,
    ) -> Result<Schema, CheckError>;

    /// `None` means "no such memory table" (caller raises `UnknownMemoryTable`).
    fn memory_schema(&self, name: &str, use_meta: bool) -> Result<Option<Schema>, CheckError>;

    fn allowed_schema_for(&self, permission: &str, kind: AllowedKind) -> Result<Schema, CheckError>;
}

/// `ensureSchema(primitive, primitiveKind)`.
///
/// Honors a class alias substitution before dispatching to the oracle, and
/// short-circuits for built-in actions and already-resolved invocations.
pub fn ensure_invocation_schema(
    invocation: &mut Invocation,
    primitive_kind: PrimitiveKind,
    oracle: &dyn SchemaOracle,
    classes: &Classes,
    use_meta: bool,
) -> Result<(), CheckError> {
    if invocation.schema.is_some() {
        return Ok(());
    }

    let schema = match &invocation.selector {
        Selector::Builtin => {
            if primitive_kind != PrimitiveKind::Action {
                return Err(CheckError::new(Reason::UnknownFunction {
                    kind: "builtin".to_string(),
                    channel: invocation.channel.clone(),
                })
                .with_span(invocation.span));
            }
            builtin_action_schema(&invocation.channel).ok_or_else(|| {
                CheckError::new(Reason::InvalidBuiltinAction {
                    channel: invocation.channel.clone(),
                })
                .with_span(invocation.span)
            })?
        }
        Selector::Device { kind } => {
            log::debug!("resolving schema for {kind}.{}", invocation.channel);
            let effective_kind = classes.effective_kind(kind);
            oracle
                .schema_for_selector(
                    effective_kind,
                    &invocation.channel,
                    primitive_kind,
                    use_meta,
                    classes,
                )
                .map_err(|e| e.with_span(invocation.span))?
        }
    };

    invocation.schema = Some(schema);
    Ok(())
}

/// `memorySchema(name)` lookup for a `VarRef` table/stream.
pub fn ensure_var_ref_schema(
    name: &str,
    oracle: &dyn SchemaOracle,
    use_meta: bool,
) -> Result<Schema, CheckError> {
    log::debug!("resolving memory schema for {name}");
    oracle
        .memory_schema(name, use_meta)?
        .ok_or_else(|| CheckError::new(Reason::UnknownMemoryTable { name: name.to_string() }))
}
