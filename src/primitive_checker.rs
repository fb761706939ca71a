//! Input-parameter binding (C7): matching a primitive's supplied
//! `in_params` against its schema, the `tt:username` contact-identifier
//! coercion, and lifting unsupplied required inputs into scope for the
//! enclosing declaration to pick up.
//!
//! Grounded on `prql-compiler/src/semantic/resolver.rs`'s argument-binding
//! code for function calls (match supplied args against a declared
//! signature, coerce where the language allows it, error on the rest).

use std::collections::HashSet;

use crate::ast::InputParam;
use crate::error::{CheckError, Reason, WithErrorInfo};
use crate::expr_checker::type_for_value;
use crate::schema::Schema;
use crate::scope::Scope;
use crate::types::{is_assignable, Type, TypeVarScope};

/// A bare `tt:username` value is accepted wherever a contact identifier is
/// expected: the end-user-facing syntax for "message @user" only ever
/// produces `tt:username`, but Thingpedia functions declare their contact
/// slots as `tt:phone_number` or `tt:email_address`. Per spec §4.7 the value
/// is retagged to `tt:contact_name`, not to the slot's own kind — the slot
/// still needs a runtime contact resolution, which is exactly what the
/// `tt:contact_name` kind signals to downstream slot-fillers.
fn retag_for_contact_slot(value_type: Type, expected: &Type) -> Type {
    match (&value_type, expected) {
        (Type::Entity(k), Type::Entity(e))
            if k == "tt:username" && (e == "tt:phone_number" || e == "tt:email_address") =>
        {
            Type::Entity("tt:contact_name".to_string())
        }
        _ => value_type,
    }
}

/// `tt:contact_name` is the one case where a retagged value is allowed into
/// a contact slot despite `isAssignable`'s rule that entities never cross
/// kinds (spec §4.1) — the retag above produces it precisely so this slot
/// can still be filled.
fn is_contact_slot_match(value_type: &Type, expected: &Type) -> bool {
    matches!(
        (value_type, expected),
        (Type::Entity(k), Type::Entity(e))
            if k == "tt:contact_name" && (e == "tt:phone_number" || e == "tt:email_address")
    )
}

/// `bindInputParams(schema, params, scope)`: validates each supplied
/// parameter names a real input, rejects duplicates, type-checks the value
/// against the declared input type (with coercion), and records lambda-arg
/// renames for parameters bound to a declaration's own parameters.
pub fn bind_input_params(
    schema: &Schema,
    params: &mut [InputParam],
    scope: &Scope,
) -> Result<(), CheckError> {
    let mut seen = HashSet::new();

    for param in params.iter_mut() {
        if !seen.insert(param.name.clone()) {
            return Err(CheckError::new(Reason::DuplicateInputParam {
                name: param.name.clone(),
            })
            .with_span(param.span));
        }

        let expected = schema.input_type(&param.name).cloned().ok_or_else(|| {
            CheckError::new(Reason::InvalidInputParameter {
                name: param.name.clone(),
            })
            .with_span(param.span)
        })?;

        let value_type = type_for_value(&param.value, scope).with_span(param.span)?;
        let value_type = retag_for_contact_slot(value_type, &expected);

        let mut vars = TypeVarScope::new();
        if !is_contact_slot_match(&value_type, &expected)
            && !is_assignable(&value_type, &expected, &mut vars, true)
        {
            return Err(CheckError::new(Reason::InvalidType {
                name: param.name.clone(),
                expected: format!("{expected:?}"),
                found: format!("{value_type:?}"),
            })
            .with_span(param.span));
        }

        if let Some(lambda_name) = param.value.as_var_ref() {
            log::trace!("checking lambda arg {lambda_name} -> {}", param.name);
        }
    }

    Ok(())
}

/// After binding, records lambda-argument renames for `scope`: a parameter
/// value that is itself a declaration lambda argument is remembered as
/// surfacing under the primitive's own field name, so the declaration's
/// schema can later be renamed to the call site's actual names.
pub fn record_lambda_renames(params: &[InputParam], scope: &mut Scope) {
    for param in params {
        if let Some(lambda_name) = param.value.as_var_ref() {
            if scope.is_lambda_arg(lambda_name) {
                scope.update_lambda_args(lambda_name, &param.name);
            }
        }
    }
}

/// `pushInReq(schema, supplied, scope)`: every required input not covered
/// by `supplied` becomes a pending requirement on `scope`, to be lifted
/// into the enclosing declaration's own signature (spec §4.9).
pub fn push_unsupplied_required(schema: &Schema, supplied: &HashSet<String>, scope: &mut Scope) {
    for (name, ty) in &schema.in_req {
        if !supplied.contains(name) {
            scope.in_req.insert(name.clone(), ty.clone());
        }
    }
}
