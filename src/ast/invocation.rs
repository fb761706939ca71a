//! `Invocation`, `Selector` and `InputParam` (spec §3).

use serde::{Deserialize, Serialize};

use crate::ast::value::Value;
use crate::error::Span;
use crate::schema::Schema;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selector {
    Device { kind: String },
    Builtin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputParam {
    pub name: String,
    pub value: Value,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Query,
    Action,
    Trigger,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invocation {
    pub selector: Selector,
    pub channel: String,
    pub in_params: Vec<InputParam>,

    /// Filled in by the schema resolver (C5) on first encounter.
    #[serde(skip)]
    pub schema: Option<Schema>,

    pub span: Option<Span>,
}

impl Invocation {
    pub fn new(selector: Selector, channel: &str) -> Self {
        Invocation {
            selector,
            channel: channel.to_string(),
            in_params: Vec::new(),
            schema: None,
            span: None,
        }
    }

    pub fn with_in_params(mut self, params: Vec<InputParam>) -> Self {
        self.in_params = params;
        self
    }
}
