//! Actions and the invocation pipeline around them
//!
//! Each invocation moves through four phases:
//!
//! ```text
//! Creation      library lookup, parameter binding, factory
//!     ↓
//! Contribution  each contribution registers interceptors (or rejects the action)
//!     ↓
//! Execution     interceptor → interceptor → … → Action::execute
//!     ↓
//! Completion
//! ```
//!
//! Interceptors receive a [`Next`] handle over the rest of the chain and
//! decide whether, and how many times, to proceed.

mod contract;
mod contribution;
mod library;

pub use contract::{BoundParameter, BoundParameters, ParameterContract, ParameterSpec};
pub use contribution::{Contribution, InterceptorRegistry, PendingInvocation};
pub use library::{
    ActionDefinition, ActionFactory, ActionInit, ContributionDefinition, ContributionFactory,
    ContributionInit, Function, FunctionDefinition, Library,
};

pub(crate) use contract::bind_one;

use crate::ast::{ActionElement, Body, TemplateElement};
use crate::context::Context;
use crate::convert::TargetType;
use crate::error::{EngineError, ParameterError, Result};
use crate::render::Engine;
use crate::value::Value;
use crate::writer::Writer;

/// Where an invocation is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Creation,
    Contribution,
    Execution,
    Completion,
}

/// A single action instance, created per invocation
pub trait Action {
    fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()>;
}

/// One link of the execution chain
pub trait Interceptor {
    fn intercept(&self, ac: &mut ActionContext<'_, '_>, next: Next<'_>) -> Result<()>;
}

/// The rest of the chain after the current interceptor
#[derive(Clone, Copy)]
pub struct Next<'c> {
    rest: &'c [Box<dyn Interceptor>],
}

impl<'c> Next<'c> {
    pub(crate) fn new(chain: &'c [Box<dyn Interceptor>]) -> Self {
        Self { rest: chain }
    }

    /// Run the remaining interceptors and then the action
    pub fn proceed(self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
        match self.rest.split_first() {
            Some((head, rest)) => head.intercept(ac, Next { rest }),
            None => {
                let action = ac.action;
                action.execute(ac)
            }
        }
    }

    /// Interceptors left before the action
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }
}

/// Everything an executing action (or interceptor) works with
pub struct ActionContext<'a, 'p> {
    engine: &'a Engine,
    context: &'a mut Context<'p>,
    writer: &'a mut dyn Writer,
    element: &'a ActionElement,
    action: &'a dyn Action,
    phase: Phase,
}

impl<'a, 'p> ActionContext<'a, 'p> {
    pub(crate) fn new(
        engine: &'a Engine,
        context: &'a mut Context<'p>,
        writer: &'a mut dyn Writer,
        element: &'a ActionElement,
        action: &'a dyn Action,
    ) -> Self {
        Self {
            engine,
            context,
            writer,
            element,
            action,
            phase: Phase::Execution,
        }
    }

    pub fn engine(&self) -> &'a Engine {
        self.engine
    }

    pub fn context(&self) -> &Context<'p> {
        self.context
    }

    pub fn context_mut(&mut self) -> &mut Context<'p> {
        self.context
    }

    pub fn writer(&mut self) -> &mut dyn Writer {
        &mut *self.writer
    }

    pub fn element(&self) -> &'a ActionElement {
        self.element
    }

    pub fn body(&self) -> &'a Body {
        &self.element.children
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    pub fn write(&mut self, value: &Value) -> Result<()> {
        Ok(self.writer.write(value)?)
    }

    pub fn write_str(&mut self, text: &str) -> Result<()> {
        Ok(self.writer.write_str(text)?)
    }

    /// Run `scope` with `writer` in place of the current writer.
    ///
    /// The substitute only exists inside `scope`, so the original writer
    /// is back in place however `scope` ends.
    pub fn with_writer<R>(
        &mut self,
        writer: &mut dyn Writer,
        scope: impl FnOnce(&mut ActionContext<'_, 'p>) -> R,
    ) -> R {
        let mut scoped = ActionContext {
            engine: self.engine,
            context: &mut *self.context,
            writer,
            element: self.element,
            action: self.action,
            phase: self.phase,
        };
        scope(&mut scoped)
    }

    /// Execute the element's children with the current context and writer
    pub fn invoke_body(&mut self) -> Result<()> {
        let element = self.element;
        self.engine
            .render_elements(&element.children, self.context, &mut *self.writer)
    }

    /// Execute the element's children against another context and writer
    pub fn invoke_body_in(&self, context: &mut Context<'_>, writer: &mut dyn Writer) -> Result<()> {
        self.engine
            .render_elements(&self.element.children, context, writer)
    }

    /// Execute `elements` in a fresh subcontext of the current one.
    ///
    /// `setup` runs on the subcontext first. Fails once nesting passes the
    /// engine's configured depth limit.
    pub fn render_isolated(
        &mut self,
        elements: &[TemplateElement],
        setup: impl FnOnce(&mut Context<'_>) -> Result<()>,
    ) -> Result<()> {
        let limit = self.engine.config().max_depth;
        let mut sub = self.context.create_subcontext();
        if sub.depth() > limit {
            return Err(EngineError::IncludeDepth { limit });
        }
        setup(&mut sub)?;
        self.engine.render_elements(elements, &mut sub, &mut *self.writer)
    }

    /// Resolve a bound parameter, `None` when the element did not give it
    pub fn param(&self, parameters: &BoundParameters, name: &str) -> Result<Option<Value>> {
        parameters.value(name, self.engine, self.context)
    }

    /// Resolve a parameter that must be present and non-null
    pub fn required_param(&self, parameters: &BoundParameters, name: &str) -> Result<Value> {
        match self.param(parameters, name)? {
            Some(value) if !value.is_null() => Ok(value),
            _ => Err(ParameterError::Missing {
                action: self.element.qualified_name(),
                name: name.to_string(),
            }
            .into()),
        }
    }

    pub fn convert(&self, value: Value, target: &TargetType) -> Result<Value> {
        self.engine.convert(value, target)
    }

    /// Evaluate expression source in the engine's default dialect
    pub fn evaluate(&self, source: &str) -> Result<Value> {
        self.engine.evaluate(None, source, self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::StringWriter;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Emit(&'static str);

    impl Action for Emit {
        fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
            ac.write_str(self.0)
        }
    }

    struct Fail;

    impl Action for Fail {
        fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
            ac.write_str("partial")?;
            Err(EngineError::action("boom"))
        }
    }

    /// Swaps in its own writer around the rest of the chain
    struct Capture(Rc<RefCell<String>>);

    impl Interceptor for Capture {
        fn intercept(&self, ac: &mut ActionContext<'_, '_>, next: Next<'_>) -> Result<()> {
            let mut captured = StringWriter::new();
            let result = ac.with_writer(&mut captured, |ac| next.proceed(ac));
            self.0.borrow_mut().push_str(captured.as_str());
            result
        }
    }

    struct Wrap(&'static str);

    impl Interceptor for Wrap {
        fn intercept(&self, ac: &mut ActionContext<'_, '_>, next: Next<'_>) -> Result<()> {
            ac.write_str("<")?;
            ac.write_str(self.0)?;
            next.proceed(ac)?;
            ac.write_str(">")
        }
    }

    fn run(
        action: &dyn Action,
        chain: Vec<Box<dyn Interceptor>>,
        out: &mut StringWriter,
    ) -> Result<()> {
        let engine = Engine::builder().build();
        let mut context = Context::new();
        let element = ActionElement::new("test", "action");
        let mut ac = ActionContext::new(&engine, &mut context, out, &element, action);
        Next::new(&chain).proceed(&mut ac)
    }

    #[test]
    fn test_chain_order_wraps_the_action() {
        let mut out = StringWriter::new();
        let chain: Vec<Box<dyn Interceptor>> = vec![Box::new(Wrap("a")), Box::new(Wrap("b"))];
        run(&Emit("x"), chain, &mut out).unwrap();
        assert_eq!(out.as_str(), "<a<bx>>");
    }

    #[test]
    fn test_writer_restored_after_success() {
        let captured = Rc::new(RefCell::new(String::new()));
        let mut out = StringWriter::new();
        let chain: Vec<Box<dyn Interceptor>> =
            vec![Box::new(Wrap("outer")), Box::new(Capture(captured.clone())), Box::new(Wrap("inner"))];
        run(&Emit("x"), chain, &mut out).unwrap();
        assert_eq!(captured.borrow().as_str(), "<innerx>");
        assert_eq!(out.as_str(), "<outer>");
    }

    #[test]
    fn test_writer_restored_after_failure() {
        struct Recover;

        impl Interceptor for Recover {
            fn intercept(&self, ac: &mut ActionContext<'_, '_>, next: Next<'_>) -> Result<()> {
                let result = next.proceed(ac);
                ac.write_str(if result.is_err() { "[recovered]" } else { "[ok]" })
            }
        }

        let captured = Rc::new(RefCell::new(String::new()));
        let mut out = StringWriter::new();
        let chain: Vec<Box<dyn Interceptor>> =
            vec![Box::new(Recover), Box::new(Capture(captured.clone()))];
        run(&Fail, chain, &mut out).unwrap();
        assert_eq!(captured.borrow().as_str(), "partial");
        assert_eq!(out.as_str(), "[recovered]");
    }

    #[test]
    fn test_interceptor_may_skip_or_repeat() {
        struct Times(usize);

        impl Interceptor for Times {
            fn intercept(&self, ac: &mut ActionContext<'_, '_>, next: Next<'_>) -> Result<()> {
                for _ in 0..self.0 {
                    next.proceed(ac)?;
                }
                Ok(())
            }
        }

        let mut out = StringWriter::new();
        run(&Emit("x"), vec![Box::new(Times(3))], &mut out).unwrap();
        assert_eq!(out.as_str(), "xxx");

        let mut out = StringWriter::new();
        run(&Emit("x"), vec![Box::new(Times(0))], &mut out).unwrap();
        assert_eq!(out.as_str(), "");
    }
}
