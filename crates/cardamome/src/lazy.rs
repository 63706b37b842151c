//! Lazily resolved action parameters and data paths
//!
//! An [`ActionParameter`] is either a constant or an expression. Expression
//! parameters are not evaluated when an action is created; each call to
//! [`ActionParameter::resolve`] evaluates the source again against the
//! context it is given, so an action that re-reads a parameter inside a
//! loop sees the values of the current iteration.
//!
//! ```text
//! items[0].name
//!   ↓ root variable `items`
//! DataPath { root: "items", segments: [Index(0), Field("name")] }
//!   ↓ resolve against the context
//! concrete value
//! ```

use crate::context::Context;
use crate::convert::TargetType;
use crate::error::{ExpressionError, Result};
use crate::render::Engine;
use crate::value::Value;
use std::fmt;

/// A parameter value as written in the template
#[derive(Debug, Clone, PartialEq)]
pub enum ActionParameter {
    Constant(Value),
    Expression {
        /// `None` selects the engine's default dialect
        dialect: Option<String>,
        source: String,
    },
}

impl ActionParameter {
    pub fn constant(value: impl Into<Value>) -> Self {
        ActionParameter::Constant(value.into())
    }

    /// An expression in the engine's default dialect
    pub fn expression(source: impl Into<String>) -> Self {
        ActionParameter::Expression {
            dialect: None,
            source: source.into(),
        }
    }

    pub fn expression_in(dialect: impl Into<String>, source: impl Into<String>) -> Self {
        ActionParameter::Expression {
            dialect: Some(dialect.into()),
            source: source.into(),
        }
    }

    pub fn is_constant(&self) -> bool {
        matches!(self, ActionParameter::Constant(_))
    }

    /// Evaluate (for expressions) and convert to `target`
    pub fn resolve(&self, engine: &Engine, context: &Context<'_>, target: &TargetType) -> Result<Value> {
        let value = match self {
            ActionParameter::Constant(value) => value.clone(),
            ActionParameter::Expression { dialect, source } => {
                engine.evaluate(dialect.as_deref(), source, context)?
            }
        };
        engine.convert(value, target)
    }
}

impl fmt::Display for ActionParameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionParameter::Constant(value) => write!(f, "{value}"),
            ActionParameter::Expression {
                dialect: Some(dialect),
                source,
            } => write!(f, "{dialect}:{{{source}}}"),
            ActionParameter::Expression { source, .. } => write!(f, "{{{source}}}"),
        }
    }
}

/// One step below a path's root
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    Field(String),
    Index(usize),
}

/// A variable (or implicit object) followed by field and index accesses
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DataPath {
    pub root: String,
    pub segments: Vec<Segment>,
}

impl DataPath {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            segments: Vec::new(),
        }
    }

    /// Create a new path by appending a segment.
    pub fn push(&self, segment: Segment) -> Self {
        let mut path = self.clone();
        path.segments.push(segment);
        path
    }

    /// Walk the segments starting from the root's value
    pub fn navigate(&self, root: &Value) -> Result<Value, ExpressionError> {
        let mut current = root;
        for segment in &self.segments {
            current = step(current, segment)?;
        }
        Ok(current.clone())
    }
}

fn step<'v>(value: &'v Value, segment: &Segment) -> Result<&'v Value, ExpressionError> {
    let found = match (value, segment) {
        (Value::Map(map), Segment::Field(field)) => map.get_str(field),
        (Value::List(items) | Value::Array(items), Segment::Index(index)) => items.get(*index),
        _ => None,
    };
    found.ok_or_else(|| ExpressionError::UnknownField {
        base_type: value.type_key().to_string(),
        field: match segment {
            Segment::Field(field) => field.clone(),
            Segment::Index(index) => format!("[{index}]"),
        },
        known_fields: match value {
            Value::Map(map) => map.keys().map(Value::render_to_string).collect(),
            Value::List(items) | Value::Array(items) => {
                vec![format!("[0..{}]", items.len())]
            }
            _ => Vec::new(),
        },
    })
}

impl fmt::Display for DataPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.root)?;
        for segment in &self.segments {
            match segment {
                Segment::Field(field) => write!(f, ".{field}")?,
                Segment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        Ok(())
    }
}
