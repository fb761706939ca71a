//! Table constructors (spec §3, §4.8): the recursive structure the
//! composer (C8) walks over.

use serde::{Deserialize, Serialize};

use crate::ast::invocation::{InputParam, Invocation};
use crate::ast::value::Value;
use crate::ast::BooleanExpression;
use crate::error::Span;
use crate::schema::Schema;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Table {
    Invocation {
        invocation: Invocation,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    VarRef {
        name: String,
        span: Option<Span>,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Filter {
        table: Box<Table>,
        filter: BooleanExpression,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Projection {
        table: Box<Table>,
        args: Vec<String>,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Alias {
        table: Box<Table>,
        name: String,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Aggregation {
        table: Box<Table>,
        field: String,
        op: String,
        alias: Option<String>,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    ArgMinMax {
        table: Box<Table>,
        field: String,
        op: String,
        base: Value,
        limit: Value,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Join {
        lhs: Box<Table>,
        rhs: Box<Table>,
        in_params: Vec<InputParam>,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Window {
        table: Box<Table>,
        base: Value,
        delta: Value,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    TimeSeries {
        table: Box<Table>,
        base: Value,
        delta: Value,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Sequence {
        table: Box<Table>,
        base: Value,
        delta: Value,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    History {
        table: Box<Table>,
        base: Value,
        delta: Value,
        #[serde(skip)]
        schema: Option<Schema>,
    },
    Compute {
        table: Box<Table>,
        expr: crate::ast::expr::ScalarExpression,
        alias: Option<String>,
        #[serde(skip)]
        schema: Option<Schema>,
    },
}

impl Table {
    pub fn schema(&self) -> Option<&Schema> {
        match self {
            Table::Invocation { schema, .. }
            | Table::VarRef { schema, .. }
            | Table::Filter { schema, .. }
            | Table::Projection { schema, .. }
            | Table::Alias { schema, .. }
            | Table::Aggregation { schema, .. }
            | Table::ArgMinMax { schema, .. }
            | Table::Join { schema, .. }
            | Table::Window { schema, .. }
            | Table::TimeSeries { schema, .. }
            | Table::Sequence { schema, .. }
            | Table::History { schema, .. }
            | Table::Compute { schema, .. } => schema.as_ref(),
        }
    }

    pub fn set_schema(&mut self, new_schema: Schema) {
        let slot = match self {
            Table::Invocation { schema, .. }
            | Table::VarRef { schema, .. }
            | Table::Filter { schema, .. }
            | Table::Projection { schema, .. }
            | Table::Alias { schema, .. }
            | Table::Aggregation { schema, .. }
            | Table::ArgMinMax { schema, .. }
            | Table::Join { schema, .. }
            | Table::Window { schema, .. }
            | Table::TimeSeries { schema, .. }
            | Table::Sequence { schema, .. }
            | Table::History { schema, .. }
            | Table::Compute { schema, .. } => schema,
        };
        *slot = Some(new_schema);
    }
}
