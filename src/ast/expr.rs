//! `BooleanExpression` and `ScalarExpression` (spec §3): filters and
//! computed columns.

use serde::{Deserialize, Serialize};

use crate::ast::invocation::{InputParam, Selector};
use crate::error::Span;
use crate::schema::Schema;
use crate::types::Type;

use super::value::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BooleanExpression {
    True,
    False,
    And(Vec<BooleanExpression>),
    Or(Vec<BooleanExpression>),
    Not(Box<BooleanExpression>),
    Atom {
        name: String,
        op: String,
        value: Value,
        #[serde(skip)]
        resolved_type: Option<Type>,
        span: Option<Span>,
    },
    External {
        selector: Selector,
        channel: String,
        in_params: Vec<InputParam>,
        filter: Box<BooleanExpression>,
        #[serde(skip)]
        schema: Option<Schema>,
        span: Option<Span>,
    },
}

impl BooleanExpression {
    pub fn atom(name: &str, op: &str, value: Value) -> Self {
        BooleanExpression::Atom {
            name: name.to_string(),
            op: op.to_string(),
            value,
            resolved_type: None,
            span: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarExpression {
    Primary {
        value: Value,
        #[serde(skip)]
        resolved_type: Option<Type>,
    },
    Derived {
        op: String,
        operands: Vec<ScalarExpression>,
        #[serde(skip)]
        resolved_type: Option<Type>,
    },
    Boolean {
        value: Box<BooleanExpression>,
    },
}

impl ScalarExpression {
    pub fn primary(value: Value) -> Self {
        ScalarExpression::Primary {
            value,
            resolved_type: None,
        }
    }

    pub fn derived(op: &str, operands: Vec<ScalarExpression>) -> Self {
        ScalarExpression::Derived {
            op: op.to_string(),
            operands,
            resolved_type: None,
        }
    }

    pub fn resolved_type(&self) -> Option<&Type> {
        match self {
            ScalarExpression::Primary { resolved_type, .. } => resolved_type.as_ref(),
            ScalarExpression::Derived { resolved_type, .. } => resolved_type.as_ref(),
            ScalarExpression::Boolean { .. } => None,
        }
    }
}
