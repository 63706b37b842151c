//! cardamome - a template execution engine
//!
//! Templates arrive already parsed, as a tree of text, expression and
//! action elements. The engine walks that tree against a layered
//! variable [`Context`], writing into a [`Writer`]:
//!
//! - Variables live in named scopes, searched in priority order and then
//!   through the parent context chain
//! - Actions come from [`Library`] registrations, validated against a
//!   declarative [`ParameterContract`] before they run
//! - Contributions attached to an action register interceptors that wrap
//!   its execution (trim the output, repeat it, catch its failure)
//! - Values are converted between types on demand by a
//!   [`ConverterRegistry`] that picks the closest converter in a
//!   registered type hierarchy
//!
//! # Example
//!
//! ```
//! use cardamome::{ActionElement, ActionParameter, Context, Engine, Template, TemplateElement};
//!
//! let engine = Engine::builder().build();
//! let template = Template::builder("hello")
//!     .text("Hello, ")
//!     .expression("name")
//!     .action(
//!         ActionElement::new("core", "for-each")
//!             .with_param("items", ActionParameter::constant("[!, ?]"))
//!             .with_param("var", ActionParameter::constant("mark"))
//!             .with_children(vec![TemplateElement::expression("mark")]),
//!     )
//!     .build();
//!
//! let mut ctx = Context::new();
//! ctx.set_variable("name", "World");
//! assert_eq!(engine.render_to_string(&template, &mut ctx)?, "Hello, World!?");
//! # Ok::<(), cardamome::EngineError>(())
//! ```

pub mod action;
pub mod ast;
pub mod builtin;
mod config;
mod context;
pub mod convert;
mod error;
pub mod eval;
mod lazy;
pub mod logging;
mod render;
mod value;
pub mod writer;

pub use action::{
    Action, ActionContext, Contribution, Interceptor, InterceptorRegistry, Library, Next,
    ParameterContract, PendingInvocation, Phase,
};
pub use ast::{ActionElement, Body, ContributionDescriptor, Template, TemplateElement};
pub use config::EngineConfig;
pub use context::{Context, Scope, TemplateState, TEMPLATE_SCOPE, TEMPLATE_STATE};
pub use convert::{Converter, ConverterRegistry, TargetType, TypeDef, TypeKey};
pub use error::{
    ContextError, ContributionError, ConversionError, EngineError, ExpressionError,
    ParameterError, ResolutionError, Result, WriterError,
};
pub use eval::{ExpressionDialect, PathDialect};
pub use lazy::{ActionParameter, DataPath, Segment};
pub use render::{Engine, EngineBuilder, InMemoryLoader, TemplateLoader};
pub use value::{EnumValue, ObjectValue, Value, ValueMap};
pub use writer::{StringWriter, Writer};
