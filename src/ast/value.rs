//! `Value` (spec §3): the literal/reference forms a filter or input
//! parameter can bind to.

use serde::{Deserialize, Serialize};

use crate::types::Type;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(f64),
    String(String),
    Boolean(bool),
    Date(String),
    Time(String),
    Location { lat: f64, lon: f64 },
    Currency { value: f64, code: String },
    Entity { kind: String, value: String },
    Enum(String),
    Measure { value: f64, unit: String },
    Array(Vec<Value>),
    VarRef { name: String },
    /// `$event` or `$event.kind`; `name` is `None` for the bare `$event`.
    Event { name: Option<String> },
    Undefined { remote: bool },
    CompoundMeasure(Vec<Value>),
}

impl Value {
    /// The declared type of a self-describing literal. `VarRef`/`Event`
    /// resolve through `typeForValue` instead (they need scope access).
    pub fn literal_type(&self) -> Option<Type> {
        match self {
            Value::Number(_) => Some(Type::Number),
            Value::String(_) => Some(Type::String),
            Value::Boolean(_) => Some(Type::Boolean),
            Value::Date(_) => Some(Type::Date),
            Value::Time(_) => Some(Type::Time),
            Value::Location { .. } => Some(Type::Location),
            Value::Currency { .. } => Some(Type::Currency),
            Value::Entity { kind, .. } => Some(Type::Entity(kind.clone())),
            Value::Enum(choice) => Some(Type::Enum(vec![choice.clone()])),
            Value::Measure { unit, .. } => Some(Type::Measure(unit.clone())),
            Value::CompoundMeasure(_) => Some(Type::Measure(String::new())),
            Value::Array(items) => {
                let elem = items.first().and_then(Value::literal_type).unwrap_or(Type::Any);
                Some(Type::array(elem))
            }
            Value::Undefined { .. } => Some(Type::Any),
            Value::VarRef { .. } | Value::Event { .. } => None,
        }
    }

    pub fn as_var_ref(&self) -> Option<&str> {
        match self {
            Value::VarRef { name } => Some(name),
            _ => None,
        }
    }
}
