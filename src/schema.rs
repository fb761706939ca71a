//! The schema model (C3): a Thingpedia function's structured signature, and
//! the mutation helpers the composer uses to reflect projection,
//! aggregation and join.

use std::collections::HashMap;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::error::{CheckError, Reason};
use crate::scope::Scope;
use crate::types::Type;

/// Structured signature of a Thingpedia function.
///
/// Invariants (checked by `Schema::check_invariants` in tests, and upheld
/// by every mutator in this file):
/// - inputs precede outputs in `args`
/// - `in_req`, `in_opt`, `out` partition `args`
/// - `index` is a bijection onto `0..args.len()`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub args: Vec<String>,
    pub types: Vec<Type>,
    pub index: HashMap<String, usize>,

    pub in_req: HashMap<String, Type>,
    pub in_opt: HashMap<String, Type>,
    pub out: HashMap<String, Type>,

    /// Per-argument natural-language canonical, kept alongside for
    /// downstream describers; unused by the checker itself.
    pub argcanonicals: Vec<String>,
    pub confirmation: Option<String>,
}

impl Schema {
    pub fn new() -> Self {
        Schema::default()
    }

    pub fn num_inputs(&self) -> usize {
        self.in_req.len() + self.in_opt.len()
    }

    pub fn is_input(&self, name: &str) -> bool {
        self.in_req.contains_key(name) || self.in_opt.contains_key(name)
    }

    pub fn input_type(&self, name: &str) -> Option<&Type> {
        self.in_req.get(name).or_else(|| self.in_opt.get(name))
    }

    pub fn is_required_input(&self, name: &str) -> bool {
        self.in_req.contains_key(name)
    }

    /// `addInput(schema, name, type, required)`: insert `name` at the input
    /// boundary, shifting existing outputs' indices by one.
    pub fn add_input(&mut self, name: &str, ty: Type, required: bool) {
        let boundary = self.num_inputs();

        self.args.insert(boundary, name.to_string());
        self.types.insert(boundary, ty.clone());
        self.argcanonicals.insert(boundary, name.to_string());

        for (_, idx) in self.index.iter_mut() {
            if *idx >= boundary {
                *idx += 1;
            }
        }
        self.index.insert(name.to_string(), boundary);

        if required {
            self.in_req.insert(name.to_string(), ty);
        } else {
            self.in_opt.insert(name.to_string(), ty);
        }
    }

    /// `addOutput(schema, name, type, scope)`: append to `args`, register
    /// as an output, and publish into `scope`.
    pub fn add_output(&mut self, name: &str, ty: Type, scope: &mut Scope) {
        let idx = self.args.len();
        self.args.push(name.to_string());
        self.types.push(ty.clone());
        self.argcanonicals.push(name.to_string());
        self.index.insert(name.to_string(), idx);
        self.out.insert(name.to_string(), ty.clone());

        scope.add(name, ty);
    }

    /// `cleanOutput(schema, scope)`: truncate `args`/`types` to the input
    /// prefix and purge the output names from `scope`.
    pub fn clean_output(&mut self, scope: &mut Scope) {
        let boundary = self.num_inputs();
        self.args.truncate(boundary);
        self.types.truncate(boundary);
        self.argcanonicals.truncate(boundary);
        self.index.retain(|_, idx| *idx < boundary);

        for name in self.out.keys() {
            scope.remove(name);
        }
        self.out.clear();
    }

    /// `resolveProjection(args, schema, scope)`: validate every projected
    /// name exists, then reorder `args`/`types`/`index` to match and drop
    /// the rest of the outputs from scope.
    pub fn resolve_projection(
        &mut self,
        projected: &[String],
        scope: &mut Scope,
    ) -> Result<(), CheckError> {
        for name in projected {
            if !self.args.contains(name) {
                return Err(CheckError::new(Reason::InvalidFieldName {
                    name: name.clone(),
                }));
            }
        }

        let boundary = self.num_inputs();
        let inputs: Vec<String> = self.args[..boundary].to_vec();

        let dropped: Vec<String> = self.out.keys()
            .filter(|k| !projected.contains(k))
            .cloned()
            .collect();
        for name in dropped {
            scope.remove(&name);
            self.out.remove(&name);
        }

        let mut new_args = inputs;
        new_args.extend(projected.iter().cloned());

        let old_types: HashMap<String, Type> = self
            .args
            .iter()
            .cloned()
            .zip(self.types.iter().cloned())
            .collect();
        let old_canon: HashMap<String, String> = self
            .args
            .iter()
            .cloned()
            .zip(self.argcanonicals.iter().cloned())
            .collect();

        self.types = new_args.iter().map(|a| old_types[a].clone()).collect();
        self.argcanonicals = new_args
            .iter()
            .map(|a| old_canon.get(a).cloned().unwrap_or_else(|| a.clone()))
            .collect();
        self.index = new_args
            .iter()
            .enumerate()
            .map(|(i, a)| (a.clone(), i))
            .collect();
        self.args = new_args;

        Ok(())
    }

    /// `resolveJoin(out, lhs, rhs)`: concatenate signatures, merging
    /// required/optional inputs but dropping from the merged set any rhs
    /// input already supplied as an lhs input (those are the
    /// parameter-passing targets, cancelled by the join).
    pub fn resolve_join(lhs: &Schema, rhs: &Schema) -> Schema {
        // rhs inputs already required/optional on lhs by the same name are
        // fully cancelled: they do not get a second arg slot.
        let cancelled: Vec<String> = rhs
            .in_req
            .keys()
            .chain(rhs.in_opt.keys())
            .filter(|name| lhs.is_input(name))
            .cloned()
            .collect();

        let mut args = lhs.args.clone();
        let mut types = lhs.types.clone();
        let mut argcanonicals = lhs.argcanonicals.clone();

        for (i, name) in rhs.args.iter().enumerate() {
            if cancelled.contains(name) {
                continue;
            }
            args.push(name.clone());
            types.push(rhs.types[i].clone());
            argcanonicals.push(rhs.argcanonicals[i].clone());
        }

        let index: HashMap<String, usize> = args
            .iter()
            .enumerate()
            .map(|(i, a)| (a.clone(), i))
            .collect();

        let mut in_req = lhs.in_req.clone();
        let mut in_opt = lhs.in_opt.clone();
        for (name, ty) in &rhs.in_req {
            if !cancelled.contains(name) {
                in_req.insert(name.clone(), ty.clone());
            }
        }
        for (name, ty) in &rhs.in_opt {
            if !cancelled.contains(name) {
                in_opt.insert(name.clone(), ty.clone());
            }
        }

        let mut out = lhs.out.clone();
        out.extend(rhs.out.iter().map(|(k, v)| (k.clone(), v.clone())));

        Schema {
            args,
            types,
            index,
            in_req,
            in_opt,
            out,
            argcanonicals,
            confirmation: None,
        }
    }

    /// Removes an input arg entirely (not just from `in_req`/`in_opt`, but
    /// from `args`/`types`/`argcanonicals`/`index` too), re-indexing the
    /// remaining args to preserve the bijection. Used by the join composer
    /// (C8) once a required input has been fully supplied by an explicit
    /// parameter-passing `in_param`, so it no longer appears on the joined
    /// primitive's schema for downstream consumers.
    pub fn remove_input(&mut self, name: &str) {
        if let Some(pos) = self.args.iter().position(|a| a == name) {
            self.args.remove(pos);
            self.types.remove(pos);
            self.argcanonicals.remove(pos);
        }
        self.in_req.remove(name);
        self.in_opt.remove(name);
        self.index = self
            .args
            .iter()
            .enumerate()
            .map(|(i, a)| (a.clone(), i))
            .collect();
    }

    #[cfg(test)]
    pub fn check_invariants(&self) {
        let boundary = self.in_req.len() + self.in_opt.len();
        assert!(self.args.len() >= boundary);
        for (i, name) in self.args.iter().enumerate() {
            assert_eq!(self.index.get(name), Some(&i), "index mismatch for {name}");
            if i < boundary {
                assert!(self.is_input(name), "{name} should be an input");
            } else {
                assert!(self.out.contains_key(name), "{name} should be an output");
            }
        }
        let partition_size = self.in_req.len() + self.in_opt.len() + self.out.len();
        assert_eq!(partition_size, self.args.len());
    }
}

/// Construct a test-friendly schema from `(name, type, required-input?)`
/// triples, with the convention that a `None` required-flag means output.
#[cfg(test)]
pub fn schema_of(fields: &[(&str, Type, Option<bool>)]) -> Schema {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_input_shifts_existing_outputs() {
        let mut scope = Scope::new();
        let mut s = Schema::new();
        s.add_output("count", Type::Number, &mut scope);
        s.add_input("status", Type::String, true);

        assert_eq!(s.args, vec!["status".to_string(), "count".to_string()]);
        assert_eq!(s.index["status"], 0);
        assert_eq!(s.index["count"], 1);
        s.check_invariants();
    }

    #[test]
    fn clean_output_truncates_to_inputs() {
        let mut scope = Scope::new();
        let mut s = Schema::new();
        s.add_input("status", Type::String, true);
        s.add_output("id", Type::Number, &mut scope);
        s.clean_output(&mut scope);

        assert_eq!(s.args, vec!["status".to_string()]);
        assert!(s.out.is_empty());
        assert!(!scope.has("id"));
        s.check_invariants();
    }

    #[test]
    fn resolve_projection_reorders_and_drops() {
        let mut scope = Scope::new();
        let mut s = Schema::new();
        s.add_output("a", Type::Number, &mut scope);
        s.add_output("b", Type::String, &mut scope);
        s.add_output("c", Type::Boolean, &mut scope);

        s.resolve_projection(&["c".to_string(), "a".to_string()], &mut scope)
            .unwrap();

        assert_eq!(s.out.keys().sorted().collect::<Vec<_>>(), vec!["a", "c"]);
        assert!(!scope.has("b"));
        s.check_invariants();
    }

    #[test]
    fn resolve_projection_rejects_unknown_field() {
        let mut scope = Scope::new();
        let mut s = Schema::new();
        s.add_output("a", Type::Number, &mut scope);
        assert!(s
            .resolve_projection(&["nope".to_string()], &mut scope)
            .is_err());
    }

    #[test]
    fn resolve_join_concatenates_outputs() {
        let mut scope = Scope::new();
        let mut lhs = Schema::new();
        lhs.add_output("temperature", Type::Measure("C".into()), &mut scope);

        let mut rhs = Schema::new();
        rhs.add_input("temperature", Type::Measure("C".into()), true);
        rhs.add_output("humidity", Type::Number, &mut scope);

        let joined = Schema::resolve_join(&lhs, &rhs);

        // resolveJoin only cancels an rhs input whose *name* collides with
        // one of lhs's own declared inputs; here lhs has no input named
        // `temperature` (it's an output), so the requirement survives this
        // step — it is the join composer's explicit parameter-passing pass
        // (tested in composer.rs) that cancels it using the `on` clause.
        assert!(joined.in_req.contains_key("temperature"));
        assert!(joined.out.contains_key("temperature"));
        assert!(joined.out.contains_key("humidity"));
    }

    #[test]
    fn resolve_join_drops_rhs_input_shared_by_name_with_lhs_input() {
        let mut lhs = Schema::new();
        lhs.add_input("location", Type::Location, true);

        let mut rhs = Schema::new();
        rhs.add_input("location", Type::Location, true);

        let joined = Schema::resolve_join(&lhs, &rhs);

        // Only one `location` requirement remains, contributed by lhs.
        assert!(joined.in_req.contains_key("location"));
        assert_eq!(joined.args.iter().filter(|a| *a == "location").count(), 1);
    }

    #[test]
    fn default_schema_snapshot() {
        insta::assert_debug_snapshot!(Schema::new(), @r###"
        Schema {
            args: [],
            types: [],
            index: {},
            in_req: {},
            in_opt: {},
            out: {},
            argcanonicals: [],
            confirmation: None,
        }
        "###);
    }

    #[test]
    fn remove_input_drops_arg_and_reindexes() {
        let mut s = Schema::new();
        s.add_input("a", Type::Number, true);
        s.add_input("b", Type::String, true);
        s.remove_input("a");

        assert!(!s.is_input("a"));
        assert_eq!(s.args, vec!["b".to_string()]);
        assert_eq!(s.index["b"], 0);
        s.check_invariants();
    }
}
