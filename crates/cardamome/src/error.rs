//! Error types for rendering, conversion and action invocation
//!
//! Every failure is a structured value so callers can match on the
//! category, and every category is a miette [`Diagnostic`] with a code
//! and, where there is something useful to say, a help line.

use crate::convert::{TargetType, TypeKey};
use miette::Diagnostic;
use thiserror::Error;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// All engine errors
#[derive(Error, Debug, Diagnostic)]
pub enum EngineError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Parameter(#[from] ParameterError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Conversion(#[from] ConversionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Writer(#[from] WriterError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Contribution(#[from] ContributionError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Expression(#[from] ExpressionError),

    /// Nested includes went deeper than the configured limit
    #[error("Template nesting exceeded {limit} levels")]
    #[diagnostic(
        code(cardamome::include_depth),
        help("Check for templates that include each other")
    )]
    IncludeDepth { limit: usize },

    /// An action reported a failure of its own
    #[error("{message}")]
    #[diagnostic(code(cardamome::action))]
    Action { message: String },

    /// Location annotation added once, by the innermost element that failed
    #[error("{template}:{line}: {cause}")]
    #[diagnostic(code(cardamome::located))]
    Located {
        template: String,
        line: u32,
        #[source]
        cause: Box<EngineError>,
    },
}

impl EngineError {
    pub fn action(message: impl Into<String>) -> Self {
        EngineError::Action {
            message: message.into(),
        }
    }

    /// Strip location annotations
    pub fn root(&self) -> &EngineError {
        match self {
            EngineError::Located { cause, .. } => cause.root(),
            other => other,
        }
    }

    pub fn is_located(&self) -> bool {
        matches!(self, EngineError::Located { .. })
    }

    /// Annotate with a template location unless an inner element already did
    pub fn located(self, template: &str, line: u32) -> Self {
        if self.is_located() {
            return self;
        }
        EngineError::Located {
            template: template.to_string(),
            line,
            cause: Box::new(self),
        }
    }
}

/// Parameter binding failures, raised before an action executes
#[derive(Error, Debug, Diagnostic)]
pub enum ParameterError {
    #[error("Action `{action}` requires parameter `{name}`")]
    #[diagnostic(code(cardamome::parameter::missing))]
    Missing { action: String, name: String },

    #[error("Action `{action}` does not accept parameter `{name}`")]
    #[diagnostic(
        code(cardamome::parameter::unknown),
        help("Accepted parameters: {}", accepted.join(", "))
    )]
    Unknown {
        action: String,
        name: String,
        accepted: Vec<String>,
    },

    #[error("Parameter `{name}` of `{action}` has the wrong type")]
    #[diagnostic(code(cardamome::parameter::wrong_type))]
    WrongType {
        action: String,
        name: String,
        #[source]
        cause: ConversionError,
    },
}

/// Variable, scope and implicit object lookups
#[derive(Error, Debug, Diagnostic)]
pub enum ContextError {
    #[error("Variable `{name}` is not defined")]
    #[diagnostic(
        code(cardamome::context::variable_not_found),
        help("Available variables: {}", available.join(", "))
    )]
    VariableNotFound { name: String, available: Vec<String> },

    #[error("Scope `{name}` does not exist")]
    #[diagnostic(code(cardamome::context::scope_not_found))]
    ScopeNotFound { name: String },

    #[error("Scope `{name}` already exists")]
    #[diagnostic(
        code(cardamome::context::duplicate_scope),
        help("Request a unique scope to have the name disambiguated")
    )]
    DuplicateScope { name: String },

    #[error("The template scope cannot be removed")]
    #[diagnostic(code(cardamome::context::template_scope_required))]
    TemplateScopeRequired,

    #[error("Implicit object `{name}` is not available")]
    #[diagnostic(code(cardamome::context::implicit_object_not_found))]
    ImplicitObjectNotFound { name: String },

    #[error("Fragment `{name}` is not defined")]
    #[diagnostic(code(cardamome::context::fragment_not_found))]
    FragmentNotFound { name: String },
}

/// Name lookups against the engine's registries
#[derive(Error, Debug, Diagnostic)]
pub enum ResolutionError {
    #[error("Unknown library `{library}`")]
    #[diagnostic(code(cardamome::resolution::library))]
    UnknownLibrary { library: String },

    #[error("Library `{library}` has no action `{name}`")]
    #[diagnostic(
        code(cardamome::resolution::action),
        help("Available actions: {}", available.join(", "))
    )]
    UnknownAction {
        library: String,
        name: String,
        available: Vec<String>,
    },

    #[error("Library `{library}` has no contribution `{name}`")]
    #[diagnostic(code(cardamome::resolution::contribution))]
    UnknownContribution { library: String, name: String },

    #[error("Library `{library}` has no function `{name}`")]
    #[diagnostic(code(cardamome::resolution::function))]
    UnknownFunction { library: String, name: String },

    #[error("Unknown expression dialect `{dialect}`")]
    #[diagnostic(code(cardamome::resolution::dialect))]
    UnknownDialect { dialect: String },

    #[error("Template `{name}` could not be loaded")]
    #[diagnostic(code(cardamome::resolution::template))]
    UnknownTemplate { name: String },
}

/// Converter registry failures
#[derive(Error, Debug, Diagnostic, Clone, PartialEq)]
pub enum ConversionError {
    #[error("No converter from `{source_type}` to `{target}`")]
    #[diagnostic(code(cardamome::conversion::no_converter))]
    NoConverter {
        source_type: TypeKey,
        target: TargetType,
    },

    #[error("Cannot convert `{source_type}` to `{target}`: {reason}")]
    #[diagnostic(code(cardamome::conversion::failed))]
    Failed {
        source_type: TypeKey,
        target: TargetType,
        reason: String,
    },

    #[error("Converters {} are equally close for `{source_type}` to `{target}`", .candidates.join(", "))]
    #[diagnostic(
        code(cardamome::conversion::ambiguous),
        help("Register a converter with a closer source type, or disable strict conversions")
    )]
    Ambiguous {
        source_type: TypeKey,
        target: TargetType,
        candidates: Vec<String>,
    },
}

impl ConversionError {
    pub fn failed(source_type: TypeKey, target: &TargetType, reason: impl Into<String>) -> Self {
        ConversionError::Failed {
            source_type,
            target: target.clone(),
            reason: reason.into(),
        }
    }
}

/// Writer failures
#[derive(Error, Debug, Diagnostic)]
pub enum WriterError {
    #[error("Write to a closed writer")]
    #[diagnostic(code(cardamome::writer::closed))]
    Closed,

    #[error("Writer does not support `{operation}`")]
    #[diagnostic(code(cardamome::writer::unsupported))]
    Unsupported { operation: &'static str },

    #[error("I/O error")]
    #[diagnostic(code(cardamome::writer::io))]
    Io(#[from] std::io::Error),
}

/// A contribution refused the action it was attached to
#[derive(Error, Debug, Diagnostic)]
pub enum ContributionError {
    #[error("Contribution `{contribution}` cannot be applied to `{action}`: {reason}")]
    #[diagnostic(code(cardamome::contribution::unsupported))]
    Unsupported {
        contribution: String,
        action: String,
        reason: String,
    },
}

/// Expression evaluation failures
#[derive(Error, Debug, Diagnostic)]
pub enum ExpressionError {
    #[error("Invalid expression `{expression}` at offset {offset}: {message}")]
    #[diagnostic(code(cardamome::expression::syntax))]
    Syntax {
        expression: String,
        offset: usize,
        message: String,
    },

    #[error("Type `{base_type}` has no field `{field}`")]
    #[diagnostic(
        code(cardamome::expression::unknown_field),
        help("Available fields: {}", known_fields.join(", "))
    )]
    UnknownField {
        base_type: String,
        field: String,
        known_fields: Vec<String>,
    },

    #[error("Function `{function}` failed: {message}")]
    #[diagnostic(code(cardamome::expression::function))]
    Function { function: String, message: String },
}
