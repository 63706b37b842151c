//! Template execution
//!
//! The [`Engine`] owns every registry (libraries, dialects, converters)
//! and the template loader. It is assembled once by an [`EngineBuilder`]
//! and is read-only afterwards, so one engine can render many templates
//! from many threads. Contexts and writers belong to a single execution.

use crate::action::{
    bind_one, ActionContext, ActionInit, ContributionInit, InterceptorRegistry, Library, Next,
    PendingInvocation, Phase,
};
use crate::ast::{ActionElement, Template, TemplateElement};
use crate::builtin;
use crate::config::EngineConfig;
use crate::context::Context;
use crate::convert::{Converter, ConverterRegistry, TargetType, TypeDef, TypeKey};
use crate::error::{ResolutionError, Result};
use crate::eval::{ExpressionDialect, PathDialect, DEFAULT_DIALECT};
use crate::value::Value;
use crate::writer::{StringWriter, Writer};
use indexmap::IndexMap;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, debug_span, trace};

/// Reported for failures in a context that never learned its template's name
const ANONYMOUS_TEMPLATE: &str = "<anonymous>";

/// Source of templates for `include` and [`Engine::render_named`]
pub trait TemplateLoader: Send + Sync {
    fn load(&self, name: &str) -> Option<Arc<Template>>;
}

/// A loader over templates built in memory
#[derive(Debug, Default)]
pub struct InMemoryLoader {
    templates: HashMap<String, Arc<Template>>,
}

impl InMemoryLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a template under its own name
    pub fn add(&mut self, template: Template) {
        self.templates.insert(template.name.clone(), Arc::new(template));
    }

    pub fn with(mut self, template: Template) -> Self {
        self.add(template);
        self
    }
}

impl TemplateLoader for InMemoryLoader {
    fn load(&self, name: &str) -> Option<Arc<Template>> {
        self.templates.get(name).cloned()
    }
}

/// Executes templates
pub struct Engine {
    libraries: IndexMap<String, Library>,
    dialects: IndexMap<String, Box<dyn ExpressionDialect>>,
    converters: ConverterRegistry,
    loader: Option<Box<dyn TemplateLoader>>,
    config: EngineConfig,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Render `template` into `writer`
    pub fn render(
        &self,
        template: &Template,
        context: &mut Context<'_>,
        writer: &mut dyn Writer,
    ) -> Result<()> {
        let span = debug_span!("render", template = %template.name);
        let _guard = span.enter();

        context.template_state_mut().template_name = Some(template.name.clone());
        self.render_elements(&template.elements, context, writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn render_to_string(&self, template: &Template, context: &mut Context<'_>) -> Result<String> {
        let mut out = StringWriter::new();
        self.render(template, context, &mut out)?;
        Ok(out.into_string())
    }

    /// Load a template through the configured loader and render it
    pub fn render_named(
        &self,
        name: &str,
        context: &mut Context<'_>,
        writer: &mut dyn Writer,
    ) -> Result<()> {
        let template = self.load_template(name)?;
        self.render(&template, context, writer)
    }

    /// Execute elements in document order.
    ///
    /// A failure is annotated with the template name and the line of the
    /// element it came from, unless a nested element already did so.
    pub fn render_elements(
        &self,
        elements: &[TemplateElement],
        context: &mut Context<'_>,
        writer: &mut dyn Writer,
    ) -> Result<()> {
        for element in elements {
            let result: Result<()> = match element {
                TemplateElement::Text(text) => writer.write_str(&text.text).map_err(Into::into),
                TemplateElement::Expression(expr) => self
                    .evaluate(expr.dialect.as_deref(), &expr.source, context)
                    .and_then(|value| self.convert(value, &TargetType::Any))
                    .and_then(|value| Ok(writer.write(&value)?)),
                TemplateElement::Action(action) => self.invoke_action(action, context, writer),
            };
            if let Err(err) = result {
                let template = context.template_name().unwrap_or(ANONYMOUS_TEMPLATE);
                return Err(err.located(template, element.line()));
            }
        }
        Ok(())
    }

    /// Run one action element through creation, contribution and execution
    pub fn invoke_action(
        &self,
        element: &ActionElement,
        context: &mut Context<'_>,
        writer: &mut dyn Writer,
    ) -> Result<()> {
        let span = debug_span!(
            "action",
            library = %element.library,
            action = %element.name,
            line = element.line
        );
        let _guard = span.enter();

        trace!(phase = ?Phase::Creation);
        let qualified = element.qualified_name();
        let definition = self.library(&element.library)?.action_definition(&element.name)?;
        let parameters = definition
            .contract
            .bind(&qualified, &element.parameters, &self.converters)?;
        let action = definition.create(ActionInit {
            library: element.library.clone(),
            name: element.name.clone(),
            parameters,
            body: element.children.clone(),
            line: element.line,
        })?;

        trace!(phase = ?Phase::Contribution, count = element.contributions.len());
        let mut interceptors = InterceptorRegistry::new();
        let pending = PendingInvocation {
            engine: self,
            context: &*context,
            element,
        };
        for descriptor in &element.contributions {
            let definition = self
                .library(&descriptor.library)?
                .contribution_definition(&descriptor.name)?;
            let parameter = bind_one(
                &qualified,
                &definition.parameter,
                &descriptor.parameter,
                &self.converters,
            )?;
            let contribution = definition.create(ContributionInit {
                library: descriptor.library.clone(),
                name: descriptor.name.clone(),
                parameter,
            })?;
            contribution.contribute(&pending, &mut interceptors)?;
        }

        let idle = interceptors.len() - interceptors.count(Phase::Execution);
        if idle > 0 {
            debug!(idle, "interceptors registered outside the execution phase do not run");
        }
        trace!(phase = ?Phase::Execution, interceptors = interceptors.len() - idle);
        let chain = interceptors.into_chain(Phase::Execution);
        let mut ac = ActionContext::new(self, context, writer, element, action.as_ref());
        Next::new(&chain).proceed(&mut ac)?;
        ac.set_phase(Phase::Completion);
        trace!(phase = ?ac.phase());
        Ok(())
    }

    /// Convert through the engine's converter registry
    pub fn convert(&self, value: Value, target: &TargetType) -> Result<Value> {
        Ok(self.converters.convert(value, target)?)
    }

    /// Evaluate expression source; `None` selects the default dialect
    pub fn evaluate(&self, dialect: Option<&str>, source: &str, context: &Context<'_>) -> Result<Value> {
        let id = dialect.unwrap_or(&self.config.default_dialect);
        let dialect = self
            .dialects
            .get(id)
            .ok_or_else(|| ResolutionError::UnknownDialect {
                dialect: id.to_string(),
            })?;
        dialect.evaluate(source, context, self)
    }

    /// Call a library function; arguments are converted to its signature
    pub fn call_function(&self, library: &str, name: &str, args: &[Value]) -> Result<Value> {
        self.library(library)?
            .function_definition(name)?
            .call(name, args, &self.converters)
    }

    pub fn library(&self, id: &str) -> Result<&Library, ResolutionError> {
        self.libraries
            .get(id)
            .ok_or_else(|| ResolutionError::UnknownLibrary {
                library: id.to_string(),
            })
    }

    pub fn library_ids(&self) -> impl Iterator<Item = &str> {
        self.libraries.keys().map(String::as_str)
    }

    pub fn load_template(&self, name: &str) -> Result<Arc<Template>> {
        self.loader
            .as_ref()
            .and_then(|loader| loader.load(name))
            .ok_or_else(|| {
                ResolutionError::UnknownTemplate {
                    name: name.to_string(),
                }
                .into()
            })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn converters(&self) -> &ConverterRegistry {
        &self.converters
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("libraries", &self.libraries.keys().collect::<Vec<_>>())
            .field("dialects", &self.dialects.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Collects registrations, then freezes them into an [`Engine`]
pub struct EngineBuilder {
    libraries: IndexMap<String, Library>,
    dialects: IndexMap<String, Box<dyn ExpressionDialect>>,
    converters: ConverterRegistry,
    loader: Option<Box<dyn TemplateLoader>>,
    config: EngineConfig,
}

impl EngineBuilder {
    fn new() -> Self {
        let mut dialects: IndexMap<String, Box<dyn ExpressionDialect>> = IndexMap::new();
        dialects.insert(DEFAULT_DIALECT.to_string(), Box::new(PathDialect));
        Self {
            libraries: IndexMap::new(),
            dialects,
            converters: ConverterRegistry::with_defaults(),
            loader: None,
            config: EngineConfig::default(),
        }
    }

    /// Register a library under its id, replacing any earlier one
    pub fn library(mut self, library: Library) -> Self {
        self.libraries.insert(library.id().to_string(), library);
        self
    }

    pub fn dialect(mut self, id: impl Into<String>, dialect: impl ExpressionDialect + 'static) -> Self {
        self.dialects.insert(id.into(), Box::new(dialect));
        self
    }

    /// Add a converter after the built-in ones
    pub fn converter(mut self, converter: impl Converter + 'static) -> Self {
        self.converters.register(converter);
        self
    }

    pub fn register_type(mut self, key: TypeKey, def: TypeDef) -> Self {
        self.converters.register_type(key, def);
        self
    }

    pub fn register_enum<I, S>(mut self, key: TypeKey, constants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.converters.register_enum(key, constants);
        self
    }

    pub fn loader(mut self, loader: impl TemplateLoader + 'static) -> Self {
        self.loader = Some(Box::new(loader));
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(mut self) -> Engine {
        if self.config.core_library {
            self.libraries
                .entry(builtin::CORE_LIBRARY.to_string())
                .or_insert_with(builtin::library);
        }
        self.converters.set_strict(self.config.strict_conversions);

        debug!(
            libraries = self.libraries.len(),
            dialects = self.dialects.len(),
            default_dialect = %self.config.default_dialect,
            "built engine"
        );
        Engine {
            libraries: self.libraries,
            dialects: self.dialects,
            converters: self.converters,
            loader: self.loader,
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{Action, Contribution, Interceptor, ParameterContract};
    use crate::ast::ContributionDescriptor;
    use crate::error::{ContributionError, EngineError, ParameterError};
    use crate::lazy::ActionParameter;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Greet {
        name: crate::action::BoundParameters,
    }

    impl Action for Greet {
        fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
            let name = ac.required_param(&self.name, "name")?;
            ac.write_str("hello ")?;
            ac.write(&name)
        }
    }

    struct Brackets;

    impl Interceptor for Brackets {
        fn intercept(&self, ac: &mut ActionContext<'_, '_>, next: Next<'_>) -> Result<()> {
            ac.write_str("[")?;
            next.proceed(ac)?;
            ac.write_str("]")
        }
    }

    struct Bracketing;

    impl Contribution for Bracketing {
        fn contribute(&self, pending: &PendingInvocation<'_>, interceptors: &mut InterceptorRegistry) -> Result<()> {
            if pending.action_name() == "shy" {
                return Err(pending.unsupported("brackets", "shy actions stay bare").into());
            }
            interceptors.register(Phase::Execution, Brackets);
            Ok(())
        }
    }

    /// Registers its interceptor for a phase that has no chain
    struct LateBrackets;

    impl Contribution for LateBrackets {
        fn contribute(&self, _pending: &PendingInvocation<'_>, interceptors: &mut InterceptorRegistry) -> Result<()> {
            interceptors.register(Phase::Completion, Brackets);
            Ok(())
        }
    }

    fn engine() -> Engine {
        let library = Library::new("demo")
            .action(
                "greet",
                ParameterContract::new().required("name", TargetType::STRING),
                |init| Ok(Greet { name: init.parameters }),
            )
            .action("shy", ParameterContract::new(), |_| Ok(Greet { name: Default::default() }))
            .contribution("brackets", TargetType::BOOL, |_| Ok(Bracketing))
            .contribution("late", TargetType::BOOL, |_| Ok(LateBrackets));
        Engine::builder().library(library).build()
    }

    fn greet(name: ActionParameter) -> ActionElement {
        ActionElement::new("demo", "greet").with_param("name", name)
    }

    #[test]
    fn test_text_expressions_and_actions() {
        let engine = engine();
        let template = Template::builder("page")
            .text("<p>")
            .expression("who")
            .text("</p>")
            .action(greet(ActionParameter::expression("who")))
            .build();
        let mut ctx = Context::new();
        ctx.set_variable("who", "world");
        assert_eq!(
            engine.render_to_string(&template, &mut ctx).unwrap(),
            "<p>world</p>hello world"
        );
    }

    #[test]
    fn test_contributions_wrap_execution() {
        let engine = engine();
        let element = greet(ActionParameter::constant("x"))
            .with_contribution(ContributionDescriptor::new("demo", "brackets", ActionParameter::constant(true)))
            .with_contribution(ContributionDescriptor::new("demo", "brackets", ActionParameter::constant("true")));
        let template = Template::new("t", vec![element.into()]);
        assert_eq!(
            engine.render_to_string(&template, &mut Context::new()).unwrap(),
            "[[hello x]]"
        );
    }

    #[test]
    fn test_interceptors_outside_execution_are_logged_not_run() {
        use std::sync::Mutex;
        use tracing::field::{Field, Visit};
        use tracing_subscriber::layer::{Context as LayerContext, Layer, SubscriberExt};

        struct Messages(Arc<Mutex<Vec<String>>>);

        struct Message<'a>(&'a mut String);

        impl Visit for Message<'_> {
            fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    *self.0 = format!("{value:?}");
                }
            }
        }

        impl<S: tracing::Subscriber> Layer<S> for Messages {
            fn on_event(&self, event: &tracing::Event<'_>, _ctx: LayerContext<'_, S>) {
                let mut message = String::new();
                event.record(&mut Message(&mut message));
                self.0.lock().unwrap().push(message);
            }
        }

        let seen = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(Messages(seen.clone()));
        let engine = engine();
        let element = greet(ActionParameter::constant("x"))
            .with_contribution(ContributionDescriptor::new("demo", "late", ActionParameter::constant(true)));
        let template = Template::new("t", vec![element.into()]);
        let out = tracing::subscriber::with_default(subscriber, || {
            engine.render_to_string(&template, &mut Context::new()).unwrap()
        });
        assert_eq!(out, "hello x");
        assert!(seen
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.contains("outside the execution phase")));
    }

    #[test]
    fn test_contribution_rejection_aborts_before_output() {
        let engine = engine();
        let element = ActionElement::new("demo", "shy")
            .with_contribution(ContributionDescriptor::new("demo", "brackets", ActionParameter::constant(true)));
        let template = Template::builder("t").text("before").action(element).build();
        let mut out = StringWriter::new();
        let err = engine.render(&template, &mut Context::new(), &mut out).unwrap_err();
        assert!(matches!(
            err.root(),
            EngineError::Contribution(ContributionError::Unsupported { .. })
        ));
        assert_eq!(out.as_str(), "before");
    }

    #[test]
    fn test_resolution_and_parameter_errors_are_located() {
        let engine = engine();
        let template = Template::builder("page")
            .text("a\nb\n")
            .action(ActionElement::new("demo", "greet"))
            .build();
        let err = engine.render_to_string(&template, &mut Context::new()).unwrap_err();
        assert!(err.to_string().starts_with("page:3: "));
        assert!(matches!(
            err.root(),
            EngineError::Parameter(ParameterError::Missing { name, .. }) if name == "name"
        ));

        let template = Template::new("page", vec![ActionElement::new("nope", "x").into()]);
        let err = engine.render_to_string(&template, &mut Context::new()).unwrap_err();
        assert!(matches!(
            err.root(),
            EngineError::Resolution(ResolutionError::UnknownLibrary { .. })
        ));
    }

    #[test]
    fn test_expression_parameters_are_reevaluated() {
        struct Twice {
            params: crate::action::BoundParameters,
        }

        impl Action for Twice {
            fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
                let first = ac.required_param(&self.params, "v")?;
                ac.context_mut().set_variable("n", 2i64);
                let second = ac.required_param(&self.params, "v")?;
                ac.write(&first)?;
                ac.write(&second)
            }
        }

        let library = Library::new("demo").action(
            "twice",
            ParameterContract::new().required("v", TargetType::Any),
            |init| Ok(Twice { params: init.parameters }),
        );
        let engine = Engine::builder().library(library).build();
        let template = Template::new(
            "t",
            vec![ActionElement::new("demo", "twice")
                .with_param("v", ActionParameter::expression("n"))
                .into()],
        );
        let mut ctx = Context::new();
        ctx.set_variable("n", 1i64);
        assert_eq!(engine.render_to_string(&template, &mut ctx).unwrap(), "12");
    }

    #[test]
    fn test_unknown_dialect() {
        let engine = engine();
        let template = Template::builder("t").expression_in("ognl", "x").build();
        let err = engine.render_to_string(&template, &mut Context::new()).unwrap_err();
        assert!(matches!(
            err.root(),
            EngineError::Resolution(ResolutionError::UnknownDialect { dialect }) if dialect == "ognl"
        ));
    }

    #[test]
    fn test_custom_dialect() {
        struct Counting(AtomicUsize);

        impl ExpressionDialect for Counting {
            fn evaluate(&self, source: &str, _context: &Context<'_>, _engine: &Engine) -> Result<Value> {
                let n = self.0.fetch_add(1, Ordering::Relaxed);
                Ok(Value::from(format!("{source}#{n}")))
            }
        }

        let engine = Engine::builder()
            .dialect("count", Counting(AtomicUsize::new(0)))
            .config(EngineConfig::new().default_dialect("count"))
            .build();
        let template = Template::builder("t").expression("a").expression("b").build();
        assert_eq!(
            engine.render_to_string(&template, &mut Context::new()).unwrap(),
            "a#0b#1"
        );
    }

    #[test]
    fn test_named_templates() {
        let loader = InMemoryLoader::new().with(Template::builder("hello").text("hi").build());
        let engine = Engine::builder().loader(loader).build();
        let mut out = StringWriter::new();
        engine.render_named("hello", &mut Context::new(), &mut out).unwrap();
        assert_eq!(out.as_str(), "hi");
        assert!(matches!(
            engine.render_named("missing", &mut Context::new(), &mut out),
            Err(EngineError::Resolution(ResolutionError::UnknownTemplate { .. }))
        ));
    }

    #[test]
    fn test_core_library_is_optional() {
        assert!(Engine::builder().build().library("core").is_ok());
        let bare = Engine::builder()
            .config(EngineConfig::new().core_library(false))
            .build();
        assert!(bare.library("core").is_err());
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Engine>();
    }
}
