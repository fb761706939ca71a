//! The lexical environment (C4) threaded through composition: globals
//! (declarations bound as first-class schemas), locals (parameters and
//! projected outputs), name conflicts raised by join, pending required
//! inputs awaiting supply, and the lambda-argument rename map.
//!
//! Modeled on `prql-compiler`'s `Module` (nested-namespace lookup), flattened
//! to ThingTalk's single global/local split since Thingpedia functions don't
//! nest namespaces the way PRQL modules do.

use std::collections::{HashMap, HashSet};

use crate::error::{CheckError, Reason};
use crate::schema::Schema;
use crate::types::Type;

#[derive(Debug, Clone, Default)]
pub struct Scope {
    pub(crate) globals: HashMap<String, Schema>,
    pub(crate) locals: HashMap<String, Type>,
    pub(crate) conflicts: HashSet<String>,
    pub has_event: bool,

    /// Required inputs seen but not yet supplied at the current composition
    /// point; lifted into the enclosing schema at the next boundary (see
    /// `primitive_checker::push_in_req`).
    pub in_req: HashMap<String, Type>,

    /// For each lambda parameter name, the aliases it has been bound to at
    /// call sites (collected so the declaration's schema can be renamed to
    /// match the call site afterward).
    pub lambda_args: HashMap<String, Vec<String>>,
}

impl Scope {
    pub fn new() -> Self {
        Scope::default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    pub fn has_global(&self, name: &str) -> bool {
        self.globals.contains_key(name)
    }

    /// `get`: throws `FieldConflict` if the name was made ambiguous by a
    /// join, else looks it up among locals.
    pub fn get(&self, name: &str) -> Result<Type, CheckError> {
        if self.conflicts.contains(name) {
            return Err(CheckError::new(Reason::FieldConflict {
                name: name.to_string(),
            }));
        }
        self.locals
            .get(name)
            .cloned()
            .ok_or_else(|| CheckError::new(Reason::VariableNotInScope { name: name.to_string() }))
    }

    pub fn get_global(&self, name: &str) -> Option<&Schema> {
        self.globals.get(name)
    }

    pub fn add(&mut self, name: &str, ty: Type) {
        self.locals.insert(name.to_string(), ty);
    }

    /// `addGlobal`: throws `FieldRedefinition` on redefinition.
    pub fn add_global(&mut self, name: &str, schema: Schema) -> Result<(), CheckError> {
        if self.globals.contains_key(name) {
            return Err(CheckError::new(Reason::FieldRedefinition {
                name: name.to_string(),
            }));
        }
        self.globals.insert(name.to_string(), schema);
        Ok(())
    }

    pub fn add_conflict(&mut self, name: &str) {
        self.conflicts.insert(name.to_string());
    }

    /// Removes a local and, per the resolved Open Question (spec §9), also
    /// clears any matching conflict entry (the original leaves this as a
    /// likely-dead `delete` on a set, which is a no-op).
    pub fn remove(&mut self, name: &str) {
        self.locals.remove(name);
        self.conflicts.remove(name);
    }

    /// `assign(map)`: routes table/stream entries to globals as empty
    /// schemas, function-def entries to globals as themselves, and
    /// everything else to locals.
    pub fn assign(&mut self, outputs: &HashMap<String, Type>) {
        for (name, ty) in outputs {
            match ty {
                Type::FunctionDef(schema) => {
                    let _ = self.add_global(name, (**schema).clone());
                }
                _ => self.add(name, ty.clone()),
            }
        }
    }

    /// `clean(args?)`: resets locals and the event flag; if `args` is given,
    /// also strips those names from globals (used when leaving a
    /// declaration's lambda scope).
    pub fn clean(&mut self, args: Option<&[String]>) {
        self.locals.clear();
        self.conflicts.clear();
        self.has_event = false;
        self.in_req.clear();
        if let Some(args) = args {
            for name in args {
                self.globals.remove(name);
            }
        }
    }

    /// `prefix(p)`: renames every local `k` to `p.k`, used by `Alias` so
    /// sibling references must qualify with the alias.
    pub fn prefix(&mut self, prefix: &str) {
        let renamed: HashMap<String, Type> = self
            .locals
            .drain()
            .map(|(k, v)| (format!("{prefix}.{k}"), v))
            .collect();
        self.locals = renamed;
    }

    /// `merge(other)`: copies `other`'s globals and locals into `self`.
    ///
    /// Per the resolved Open Question (spec §9), `other`'s globals are
    /// merged as globals (not routed through `add`, which the original
    /// appears to do by mistake).
    pub fn merge(&mut self, other: &Scope) {
        for (name, schema) in &other.globals {
            self.globals.entry(name.clone()).or_insert_with(|| schema.clone());
        }
        for (name, ty) in &other.locals {
            self.locals.insert(name.clone(), ty.clone());
        }
        self.has_event = self.has_event || other.has_event;
        for name in &other.conflicts {
            self.conflicts.insert(name.clone());
        }
    }

    /// `initLambdaArgs(args)`: adds a declaration's parameters as locals and
    /// seeds the lambda-args map.
    pub fn init_lambda_args(&mut self, args: &[(String, Type)]) {
        for (name, ty) in args {
            self.add(name, ty.clone());
            self.lambda_args.entry(name.clone()).or_default();
        }
    }

    pub fn is_lambda_arg(&self, name: &str) -> bool {
        self.lambda_args.contains_key(name)
    }

    /// `updateLambdaArgs`: records that the lambda parameter `lambda_name`
    /// was bound via the call-site name `actual_name`.
    pub fn update_lambda_args(&mut self, lambda_name: &str, actual_name: &str) {
        self.lambda_args
            .entry(lambda_name.to_string())
            .or_default()
            .push(actual_name.to_string());
    }
}
