//! Abstract syntax tree (spec §3): the node categories the checker
//! consumes. The surface parser that produces these trees, and the
//! pretty-printer/describer that consume them afterward, are out of scope
//! (spec §1) — only the shapes live here.

pub mod expr;
pub mod invocation;
pub mod program;
pub mod stream;
pub mod table;
pub mod value;

pub use expr::{BooleanExpression, ScalarExpression};
pub use invocation::{InputParam, Invocation, PrimitiveKind, Selector};
pub use program::{
    ClassDef, Declaration, DeclarationKind, DeclarationValue, PermissionFunction, Policy, Program,
    Rule, StreamOrTable,
};
pub use stream::Stream;
pub use table::Table;
pub use value::Value;
