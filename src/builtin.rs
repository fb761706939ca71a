//! Built-in action schemas and the classes map (spec §6).

use std::collections::HashMap;

use crate::ast::ClassDef;
use crate::schema::Schema;

/// `notify`, `return`, `save` — each with no inputs and no outputs.
pub fn builtin_action_schema(channel: &str) -> Option<Schema> {
    match channel {
        "notify" | "return" | "save" => Some(Schema::new()),
        _ => None,
    }
}

/// `kind -> { extends: kind, ... }`.
#[derive(Debug, Default, Clone)]
pub struct Classes {
    extends: HashMap<String, String>,
}

impl Classes {
    pub fn from_defs(defs: &[ClassDef]) -> Self {
        let mut extends = HashMap::new();
        for def in defs {
            if let Some(parent) = &def.extends {
                extends.insert(def.kind.clone(), parent.clone());
            }
        }
        Classes { extends }
    }

    /// Substitutes `extends` for `kind` if `kind` is a known class alias.
    pub fn effective_kind<'a>(&'a self, kind: &'a str) -> &'a str {
        self.extends.get(kind).map(|s| s.as_str()).unwrap_or(kind)
    }
}
