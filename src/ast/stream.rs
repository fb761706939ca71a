//! Stream constructors (spec §3, §4.8).

use serde::{Deserialize, Serialize};

use crate::ast::invocation::InputParam;
use crate::ast::table::Table;
use crate::ast::value::Value;
use crate::ast::BooleanExpression;
use crate::error::Span;
use crate::schema::Schema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stream {
    Timer {
        base: Value,
        interval: Value,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    AtTimer {
        time: Vec<Value>,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    VarRef {
        name: String,
        span: Option<Span>,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Monitor {
        table: Box<Table>,
        args: Option<Vec<String>>,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    EdgeFilter {
        stream: Box<Stream>,
        filter: BooleanExpression,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    EdgeNew {
        stream: Box<Stream>,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Filter {
        stream: Box<Stream>,
        filter: BooleanExpression,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Projection {
        stream: Box<Stream>,
        args: Vec<String>,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Alias {
        stream: Box<Stream>,
        name: String,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Join {
        stream: Box<Stream>,
        table: Box<Table>,
        in_params: Vec<InputParam>,
        #[serde(skip)]
        schema: Option<Schema>,
    },
}

impl Stream {
    pub fn schema(&self) -> Option<&Schema> {
        match self {
            Stream::Timer { schema, .. }
            | Stream::AtTimer { schema, .. }
            | Stream::VarRef { schema, .. }
            | Stream::Monitor { schema, .. }
            | Stream::EdgeFilter { schema, .. }
            | Stream::EdgeNew { schema, .. }
            | Stream::Filter { schema, .. }
            | Stream::Projection { schema, .. }
            | Stream::Alias { schema, .. }
            | Stream::Join { schema, .. } => schema.as_ref(),
        }
    }

    pub fn set_schema(&mut self, new_schema: Schema) {
        let slot = match self {
            Stream::Timer { schema, .. }
            | Stream::AtTimer { schema, .. }
            | Stream::VarRef { schema, .. }
            | Stream::Monitor { schema, .. }
            | Stream::EdgeFilter { schema, .. }
            | Stream::EdgeNew { schema, .. }
            | Stream::Filter { schema, .. }
            | Stream::Projection { schema, .. }
            | Stream::Alias { schema, .. }
            | Stream::Join { schema, .. } => schema,
        };
        *slot = Some(new_schema);
    }
}
