use std::fmt::{self, Debug, Display, Formatter};
use std::ops::{Add, Range};

use ariadne::{Config, Label, Report, ReportKind, Source};
use serde::{Deserialize, Serialize};

pub use anyhow::Result;

/// Byte-offset span into the source the AST was parsed from.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Debug for Span {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "span-chars-{}-{}", self.start, self.end)
    }
}

impl From<Span> for Range<usize> {
    fn from(s: Span) -> Self {
        s.start..s.end
    }
}

impl Add<Span> for Span {
    type Output = Span;

    fn add(self, rhs: Span) -> Span {
        Span {
            start: self.start.min(rhs.start),
            end: self.end.max(rhs.end),
        }
    }
}

/// One variant per error kind in spec §7.
#[derive(Debug, Clone)]
pub enum Reason {
    InvalidPrincipal {
        found: String,
    },
    UnknownMemoryTable {
        name: String,
    },
    InvalidBuiltinAction {
        channel: String,
    },
    UnknownFunction {
        kind: String,
        channel: String,
    },
    VariableNotInScope {
        name: String,
    },
    FieldConflict {
        name: String,
    },
    InvalidFieldName {
        name: String,
    },
    FieldRedefinition {
        name: String,
    },
    InvalidInputParameter {
        name: String,
    },
    DuplicateInputParam {
        name: String,
    },
    InvalidType {
        name: String,
        expected: String,
        found: String,
    },
    InvalidOperator {
        op: String,
    },
    InvalidParameterTypes {
        op: String,
    },
    InvalidAggregationField {
        field: String,
    },
    InvalidAggregation {
        op: String,
    },
    InvalidArgMinMaxField {
        field: String,
    },
    InvalidRange,
    InvalidTimeRange,
    NotImplemented {
        what: String,
    },
    NoGetFunction,
    Simple(String),
}

impl Reason {
    fn message(&self) -> String {
        match self {
            Reason::InvalidPrincipal { found } => {
                format!("principal must be tt:contact or tt:username, found {found}")
            }
            Reason::UnknownMemoryTable { name } => format!("unknown memory table `{name}`"),
            Reason::InvalidBuiltinAction { channel } => {
                format!("`{channel}` is not a valid built-in action")
            }
            Reason::UnknownFunction { kind, channel } => {
                format!("unknown function {kind}.{channel}")
            }
            Reason::VariableNotInScope { name } => format!("variable `{name}` is not in scope"),
            Reason::FieldConflict { name } => {
                format!("`{name}` is ambiguous after a join, qualify it")
            }
            Reason::InvalidFieldName { name } => format!("no such field `{name}`"),
            Reason::FieldRedefinition { name } => format!("`{name}` is already defined"),
            Reason::InvalidInputParameter { name } => {
                format!("`{name}` is not an input parameter of this function")
            }
            Reason::DuplicateInputParam { name } => {
                format!("input parameter `{name}` is supplied more than once")
            }
            Reason::InvalidType {
                name,
                expected,
                found,
            } => format!("`{name}` expects {expected}, found {found}"),
            Reason::InvalidOperator { op } => format!("invalid operator `{op}`"),
            Reason::InvalidParameterTypes { op } => {
                format!("no overload of `{op}` matches these operand types")
            }
            Reason::InvalidAggregationField { field } => {
                format!("`{field}` cannot be aggregated")
            }
            Reason::InvalidAggregation { op } => format!("invalid aggregation `{op}`"),
            Reason::InvalidArgMinMaxField { field } => {
                format!("`{field}` is not an orderable field")
            }
            Reason::InvalidRange => "invalid range: base and limit must be Number".to_string(),
            Reason::InvalidTimeRange => {
                "invalid time range: base must be Date and delta must be Measure(ms)".to_string()
            }
            Reason::NotImplemented { what } => format!("not implemented: {what}"),
            Reason::NoGetFunction => {
                "a rule whose only action is notify needs a stream or table".to_string()
            }
            Reason::Simple(s) => s.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CheckError {
    pub span: Option<Span>,
    pub reason: Reason,
    pub help: Option<String>,
}

impl CheckError {
    pub fn new(reason: Reason) -> Self {
        CheckError {
            span: None,
            reason,
            help: None,
        }
    }

    pub fn with_span(mut self, span: Option<Span>) -> Self {
        self.span = span;
        self
    }

    pub fn with_help<S: Into<String>>(mut self, help: S) -> Self {
        self.help = Some(help.into());
        self
    }

    /// Render as an annotated snippet if both a span and the original source
    /// are available, else fall back to a plain message.
    pub fn compose(&self, source_id: &str, source: &str) -> String {
        let Some(span) = self.span else {
            return self.reason.message();
        };
        let range: Range<usize> = span.into();
        if range.end > source.len() {
            return self.reason.message();
        }

        let config = Config::default().with_color(false);
        let mut report = Report::build(ReportKind::Error, source_id, range.start)
            .with_config(config)
            .with_message(self.reason.message())
            .with_label(Label::new((source_id, range)).with_message(self.reason.message()));
        if let Some(help) = &self.help {
            report.set_help(help);
        }

        let mut out = Vec::new();
        let cache = (source_id, Source::from(source));
        if report.finish().write(cache, &mut out).is_ok() {
            if let Ok(s) = String::from_utf8(out) {
                return s;
            }
        }
        self.reason.message()
    }
}

impl Display for CheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reason.message())?;
        if let Some(help) = &self.help {
            write!(f, " (help: {help})")?;
        }
        Ok(())
    }
}

impl std::error::Error for CheckError {}

pub trait WithErrorInfo<T> {
    fn with_help<S: Into<String>>(self, help: S) -> Result<T, CheckError>;
    fn with_span(self, span: Option<Span>) -> Result<T, CheckError>;
}

impl<T> WithErrorInfo<T> for Result<T, CheckError> {
    fn with_help<S: Into<String>>(self, help: S) -> Result<T, CheckError> {
        self.map_err(|e| e.with_help(help))
    }

    fn with_span(self, span: Option<Span>) -> Result<T, CheckError> {
        self.map_err(|e| e.with_span(span))
    }
}
