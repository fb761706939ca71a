//! `Program`, `Declaration`, `Rule`, `Policy` (spec §3, §4.9).

use serde::{Deserialize, Serialize};

use crate::ast::invocation::Invocation;
use crate::ast::stream::Stream;
use crate::ast::table::Table;
use crate::ast::value::Value;
use crate::ast::BooleanExpression;
use crate::error::Span;
use crate::schema::Schema;
use crate::types::Type;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassDef {
    pub kind: String,
    pub extends: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamOrTable {
    Stream(Stream),
    Table(Table),
}

impl StreamOrTable {
    pub fn schema(&self) -> Option<&Schema> {
        match self {
            StreamOrTable::Stream(s) => s.schema(),
            StreamOrTable::Table(t) => t.schema(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeclarationValue {
    Stream(Stream),
    Table(Table),
    Action(Invocation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclarationKind {
    Stream,
    Table,
    Action,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Declaration {
    pub name: String,
    pub kind: DeclarationKind,
    /// Lambda parameters, declared before the body is checked.
    pub args: Vec<(String, Type)>,
    pub value: DeclarationValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rule {
    pub stream_or_table: Option<StreamOrTable>,
    pub actions: Vec<Invocation>,
}

/// One side (query or action) of a permission rule: a Thingpedia kind plus
/// the filter that restricts which invocations of it are allowed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionFunction {
    pub kind: String,
    pub filter: BooleanExpression,
    #[serde(skip)]
    pub schema: Option<Schema>,
    pub span: Option<Span>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub principal: Option<Value>,
    pub query: PermissionFunction,
    pub action: PermissionFunction,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    pub classes: Vec<ClassDef>,
    pub declarations: Vec<Declaration>,
    pub rules: Vec<Rule>,
    pub principal: Option<Value>,
}
