//! The type lattice (C1): primitive/array/tuple/measure/entity/enum/function
//! types, and assignability with type-variable unification.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A ThingTalk type. Type variables (`'a`, `'b`, ...) only ever appear
/// inside operator overload signatures (see `operators.rs`); by the time a
/// `Type` is attached to an AST node or a `Schema` entry, it is fully
/// resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Type {
    Boolean,
    Number,
    String,
    Date,
    Time,
    Location,
    Currency,
    Any,

    /// A dimensioned quantity. An empty unit means "any compatible unit",
    /// resolved through the `_unit` type variable during assignability.
    Measure(String),

    /// A branded string with an ontology key, e.g. `tt:username`.
    Entity(String),

    Enum(Vec<String>),

    Array(Box<Type>),
    Tuple(Vec<Type>),

    /// A first-class function type, for declarations bound as globals.
    FunctionDef(Box<crate::schema::Schema>),

    /// A type variable, valid only inside an operator signature.
    Var(String),
}

impl Type {
    pub fn array(elem: Type) -> Type {
        Type::Array(Box::new(elem))
    }

    pub fn is_var(&self) -> bool {
        matches!(self, Type::Var(_))
    }

    /// The unit of a `Measure`, if this type is one.
    pub fn measure_unit(&self) -> Option<&str> {
        match self {
            Type::Measure(u) => Some(u.as_str()),
            _ => None,
        }
    }
}

/// Bindings accumulated while attempting a single overload / assignability
/// check. A fresh scope is opened per overload attempt (see `operators.rs`)
/// so that a failed attempt never leaks bindings into the next one.
#[derive(Debug, Default, Clone)]
pub struct TypeVarScope {
    vars: HashMap<String, Type>,
    /// Binding for the special `_unit` variable used by bare (empty-string)
    /// `Measure` units.
    unit: Option<String>,
}

impl TypeVarScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.vars.get(name)
    }

    pub fn bind(&mut self, name: &str, ty: Type) {
        self.vars.insert(name.to_string(), ty);
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn bind_unit(&mut self, unit: String) {
        self.unit = Some(unit);
    }
}

/// `isAssignable(src, dst, typeVarScope, coerce)` from spec §4.1.
///
/// - Identical primitive kinds match.
/// - `Any` on either side matches anything.
/// - `Measure` unifies units through `typeVarScope`'s `_unit` slot when
///   `dst`'s unit is empty; otherwise units must match exactly.
/// - `Entity` only matches on identical kind — never cross-entity, even
///   under `coerce`.
/// - Arrays/tuples recurse componentwise.
/// - An unbound type variable in `dst` binds to `src`; a bound one must
///   equal `src` (after recursive resolution).
/// - With `coerce` set, anything is assignable to `String`.
pub fn is_assignable(src: &Type, dst: &Type, vars: &mut TypeVarScope, coerce: bool) -> bool {
    match (src, dst) {
        (_, Type::Any) | (Type::Any, _) => true,

        (_, Type::Var(name)) => match vars.get(name).cloned() {
            Some(bound) => is_assignable(src, &bound, vars, coerce),
            None => {
                vars.bind(name, src.clone());
                true
            }
        },
        (Type::Var(name), _) => match vars.get(name).cloned() {
            Some(bound) => is_assignable(&bound, dst, vars, coerce),
            None => {
                vars.bind(name, dst.clone());
                true
            }
        },

        (Type::Measure(u_src), Type::Measure(u_dst)) => {
            if u_dst.is_empty() {
                match vars.unit() {
                    Some(bound) => bound == u_src,
                    None => {
                        vars.bind_unit(u_src.clone());
                        true
                    }
                }
            } else {
                u_src == u_dst
            }
        }

        (Type::Entity(k_src), Type::Entity(k_dst)) => k_src == k_dst,

        (Type::Array(a), Type::Array(b)) => is_assignable(a, b, vars, coerce),
        (Type::Tuple(a), Type::Tuple(b)) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| is_assignable(x, y, vars, coerce))
        }

        (a, b) if a == b => true,

        (_, Type::String) if coerce => true,

        _ => false,
    }
}

/// `resolveTypeVars(t, typeVarScope)`: substitutes bound variables and the
/// `_unit` measure slot.
pub fn resolve_type_vars(ty: &Type, vars: &TypeVarScope) -> Type {
    match ty {
        Type::Var(name) => vars.get(name).cloned().unwrap_or_else(|| ty.clone()),
        Type::Measure(u) if u.is_empty() => {
            Type::Measure(vars.unit().unwrap_or_default().to_string())
        }
        Type::Array(elem) => Type::array(resolve_type_vars(elem, vars)),
        Type::Tuple(elems) => Type::Tuple(elems.iter().map(|e| resolve_type_vars(e, vars)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitives_match_by_kind() {
        let mut vars = TypeVarScope::new();
        assert!(is_assignable(&Type::Number, &Type::Number, &mut vars, false));
        assert!(!is_assignable(&Type::Number, &Type::String, &mut vars, false));
    }

    #[test]
    fn any_matches_either_side() {
        let mut vars = TypeVarScope::new();
        assert!(is_assignable(&Type::Number, &Type::Any, &mut vars, false));
        assert!(is_assignable(&Type::Any, &Type::Number, &mut vars, false));
    }

    #[test]
    fn measure_unifies_bare_unit_once() {
        let mut vars = TypeVarScope::new();
        assert!(is_assignable(
            &Type::Measure("C".into()),
            &Type::Measure("".into()),
            &mut vars,
            false
        ));
        assert_eq!(vars.unit(), Some("C"));
        // A second operand with a different concrete unit now fails.
        assert!(!is_assignable(
            &Type::Measure("F".into()),
            &Type::Measure("".into()),
            &mut vars,
            false
        ));
    }

    #[test]
    fn measure_requires_exact_match_when_dst_has_unit() {
        let mut vars = TypeVarScope::new();
        assert!(is_assignable(
            &Type::Measure("C".into()),
            &Type::Measure("C".into()),
            &mut vars,
            false
        ));
        assert!(!is_assignable(
            &Type::Measure("C".into()),
            &Type::Measure("F".into()),
            &mut vars,
            false
        ));
    }

    #[test]
    fn entities_never_cross_kind_even_with_coerce() {
        let mut vars = TypeVarScope::new();
        assert!(!is_assignable(
            &Type::Entity("tt:username".into()),
            &Type::Entity("tt:phone_number".into()),
            &mut vars,
            true
        ));
    }

    #[test]
    fn coerce_widens_to_string() {
        let mut vars = TypeVarScope::new();
        assert!(is_assignable(&Type::Number, &Type::String, &mut vars, true));
        assert!(!is_assignable(&Type::Number, &Type::String, &mut vars, false));
    }

    #[test]
    fn arrays_recurse_componentwise() {
        let mut vars = TypeVarScope::new();
        assert!(is_assignable(
            &Type::array(Type::Number),
            &Type::array(Type::Number),
            &mut vars,
            false
        ));
        assert!(!is_assignable(
            &Type::array(Type::Number),
            &Type::array(Type::String),
            &mut vars,
            false
        ));
    }

    #[test]
    fn type_var_binds_on_first_use_then_requires_consistency() {
        let mut vars = TypeVarScope::new();
        assert!(is_assignable(&Type::Number, &Type::Var("a".into()), &mut vars, false));
        assert!(is_assignable(&Type::Number, &Type::Var("a".into()), &mut vars, false));
        assert!(!is_assignable(&Type::String, &Type::Var("a".into()), &mut vars, false));
    }
}
