//! Structural actions

use crate::action::{Action, ActionContext, ActionInit, BoundParameters};
use crate::error::Result;
use crate::value::{Value, ValueMap};
use tracing::{debug, trace};

/// Name requested for the scope each loop runs in
const LOOP_SCOPE: &str = "loop";

/// Variable holding the loop status when no `status` name is given
const DEFAULT_STATUS: &str = "loop";

/// Resolve every undeclared parameter against the current context
fn resolve_extras(ac: &ActionContext<'_, '_>, params: &BoundParameters) -> Result<Vec<(String, Value)>> {
    params
        .extras()
        .map(|(name, parameter)| {
            Ok((
                name.to_string(),
                parameter.resolve(ac.engine(), ac.context())?,
            ))
        })
        .collect()
}

/// Runs its body when `test` is truthy
pub struct If {
    params: BoundParameters,
}

impl If {
    pub fn new(init: ActionInit) -> Result<Self> {
        Ok(Self {
            params: init.parameters,
        })
    }
}

impl Action for If {
    fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
        let test = ac.param(&self.params, "test")?.unwrap_or_default();
        if test.is_truthy() {
            ac.invoke_body()?;
        }
        Ok(())
    }
}

/// Runs its body once per item, in a scope of its own
pub struct ForEach {
    params: BoundParameters,
}

impl ForEach {
    pub fn new(init: ActionInit) -> Result<Self> {
        Ok(Self {
            params: init.parameters,
        })
    }

    fn iterate(
        &self,
        ac: &mut ActionContext<'_, '_>,
        scope: &str,
        items: &[Value],
        var: &str,
        status: &str,
    ) -> Result<()> {
        let length = items.len();
        for (index0, item) in items.iter().enumerate() {
            let mut loop_status = ValueMap::new();
            loop_status.insert("index", Value::U64((index0 + 1) as u64));
            loop_status.insert("index0", Value::U64(index0 as u64));
            loop_status.insert("first", index0 == 0);
            loop_status.insert("last", index0 + 1 == length);
            loop_status.insert("length", Value::U64(length as u64));

            let context = ac.context_mut();
            context.set_variable_in(scope, var, item.clone())?;
            context.set_variable_in(scope, status, Value::Map(loop_status))?;
            ac.invoke_body()?;
        }
        Ok(())
    }
}

impl Action for ForEach {
    fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
        let items = ac.param(&self.params, "items")?.unwrap_or_default();
        let var = ac.required_param(&self.params, "var")?.render_to_string();
        let status = match ac.param(&self.params, "status")? {
            Some(Value::String(name)) => name,
            _ => DEFAULT_STATUS.to_string(),
        };
        let items = items.as_slice().unwrap_or_default();

        let scope = ac.context_mut().add_scope(LOOP_SCOPE, true)?;
        trace!(%scope, items = items.len(), "entering loop");
        let result = self.iterate(ac, &scope, items, &var, &status);
        ac.context_mut().remove_scope(&scope)?;
        result
    }
}

/// Assigns a variable, in the current scope or a named one
pub struct Set {
    params: BoundParameters,
}

impl Set {
    pub fn new(init: ActionInit) -> Result<Self> {
        Ok(Self {
            params: init.parameters,
        })
    }
}

impl Action for Set {
    fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
        let name = ac.required_param(&self.params, "name")?.render_to_string();
        let value = ac.param(&self.params, "value")?.unwrap_or_default();
        match ac.param(&self.params, "scope")? {
            Some(Value::String(scope)) => {
                ac.context_mut().set_variable_in(&scope, name, value)?;
            }
            _ => {
                ac.context_mut().set_variable(name, value);
            }
        }
        Ok(())
    }
}

/// Writes a value
pub struct Out {
    params: BoundParameters,
}

impl Out {
    pub fn new(init: ActionInit) -> Result<Self> {
        Ok(Self {
            params: init.parameters,
        })
    }
}

impl Action for Out {
    fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
        let value = ac.param(&self.params, "value")?.unwrap_or_default();
        ac.write(&value)
    }
}

/// Stores its body as a named fragment without running it
pub struct Fragment {
    params: BoundParameters,
}

impl Fragment {
    pub fn new(init: ActionInit) -> Result<Self> {
        Ok(Self {
            params: init.parameters,
        })
    }
}

impl Action for Fragment {
    fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
        let name = ac.required_param(&self.params, "name")?.render_to_string();
        let body = ac.body().clone();
        debug!(fragment = %name, elements = body.len(), "defined fragment");
        ac.context_mut()
            .template_state_mut()
            .fragments
            .insert(name, body);
        Ok(())
    }
}

/// Runs a fragment in a subcontext, with any extra parameters bound in it
pub struct Call {
    params: BoundParameters,
}

impl Call {
    pub fn new(init: ActionInit) -> Result<Self> {
        Ok(Self {
            params: init.parameters,
        })
    }
}

impl Action for Call {
    fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
        let name = ac.required_param(&self.params, "name")?.render_to_string();
        let body = ac.context().find_fragment(&name)?.clone();
        let bindings = resolve_extras(ac, &self.params)?;
        ac.render_isolated(&body, |sub| {
            for (name, value) in bindings {
                sub.set_variable(name, value);
            }
            Ok(())
        })
    }
}

/// Renders another template in a subcontext
pub struct Include {
    params: BoundParameters,
}

impl Include {
    pub fn new(init: ActionInit) -> Result<Self> {
        Ok(Self {
            params: init.parameters,
        })
    }
}

impl Action for Include {
    fn execute(&self, ac: &mut ActionContext<'_, '_>) -> Result<()> {
        let name = ac.required_param(&self.params, "template")?.render_to_string();
        let template = ac.engine().load_template(&name)?;
        let bindings = resolve_extras(ac, &self.params)?;
        debug!(template = %name, "including");
        ac.render_isolated(&template.elements, |sub| {
            sub.template_state_mut().template_name = Some(template.name.clone());
            for (name, value) in bindings {
                sub.set_variable(name, value);
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{ActionElement, Template, TemplateElement};
    use crate::context::Context;
    use crate::error::{ContextError, EngineError};
    use crate::lazy::ActionParameter;
    use crate::render::{Engine, InMemoryLoader};
    use crate::value::Value;

    fn core(name: &str) -> ActionElement {
        ActionElement::new("core", name)
    }

    fn render(engine: &Engine, elements: Vec<TemplateElement>, ctx: &mut Context<'_>) -> String {
        engine
            .render_to_string(&Template::new("test", elements), ctx)
            .unwrap()
    }

    #[test]
    fn test_if_uses_truthiness() {
        let engine = Engine::builder().build();
        let element = |test: &str| -> TemplateElement {
            core("if")
                .with_param("test", ActionParameter::expression(test))
                .with_children(vec![TemplateElement::text("yes")])
                .into()
        };
        let mut ctx = Context::new();
        ctx.set_variable("items", Value::List(vec![Value::I64(1)]));
        ctx.set_variable("empty", "");
        assert_eq!(render(&engine, vec![element("items")], &mut ctx), "yes");
        assert_eq!(render(&engine, vec![element("empty")], &mut ctx), "");
        assert_eq!(render(&engine, vec![element("not(empty)")], &mut ctx), "yes");
    }

    #[test]
    fn test_for_each_binds_items_and_status() {
        let engine = Engine::builder().build();
        let element = core("for-each")
            .with_param("items", ActionParameter::constant("[a, b, c]"))
            .with_param("var", ActionParameter::constant("item"))
            .with_children(vec![
                TemplateElement::expression("loop.index"),
                TemplateElement::expression("item"),
                core("if")
                    .with_param("test", ActionParameter::expression("not(loop.last)"))
                    .with_children(vec![TemplateElement::text(",")])
                    .into(),
            ]);
        let mut ctx = Context::new();
        assert_eq!(render(&engine, vec![element.into()], &mut ctx), "1a,2b,3c");
        assert!(!ctx.has_variable("item"));
        assert_eq!(ctx.scope_names().collect::<Vec<_>>(), ["template"]);
    }

    #[test]
    fn test_nested_loops_get_their_own_scopes() {
        let engine = Engine::builder().build();
        let inner = core("for-each")
            .with_param("items", ActionParameter::constant("[1, 2]"))
            .with_param("var", ActionParameter::constant("y"))
            .with_param("status", ActionParameter::constant("inner"))
            .with_children(vec![
                TemplateElement::expression("x"),
                TemplateElement::expression("y"),
                TemplateElement::expression("loop.index"),
                TemplateElement::text(" "),
            ]);
        let outer = core("for-each")
            .with_param("items", ActionParameter::constant("[a, b]"))
            .with_param("var", ActionParameter::constant("x"))
            .with_children(vec![inner.into()]);
        assert_eq!(
            render(&engine, vec![outer.into()], &mut Context::new()),
            "a11 a21 b12 b22 "
        );
    }

    #[test]
    fn test_loop_scope_removed_after_failure() {
        let engine = Engine::builder().build();
        let element = core("for-each")
            .with_param("items", ActionParameter::constant("[1]"))
            .with_param("var", ActionParameter::constant("i"))
            .with_children(vec![TemplateElement::expression("missing")]);
        let mut ctx = Context::new();
        let err = engine
            .render_to_string(&Template::new("t", vec![element.into()]), &mut ctx)
            .unwrap_err();
        assert!(matches!(
            err.root(),
            EngineError::Context(ContextError::VariableNotFound { .. })
        ));
        assert_eq!(ctx.scope_names().collect::<Vec<_>>(), ["template"]);
    }

    #[test]
    fn test_set_and_out() {
        let engine = Engine::builder().build();
        let mut ctx = Context::new();
        let out = render(
            &engine,
            vec![
                core("set")
                    .with_param("name", ActionParameter::constant("greeting"))
                    .with_param("value", ActionParameter::expression("upper('hi')"))
                    .into(),
                core("out")
                    .with_param("value", ActionParameter::expression("greeting"))
                    .into(),
            ],
            &mut ctx,
        );
        assert_eq!(out, "HI");
        assert_eq!(ctx.find_variable("greeting").unwrap(), &Value::from("HI"));
    }

    #[test]
    fn test_set_into_unknown_scope_fails() {
        let engine = Engine::builder().build();
        let element = core("set")
            .with_param("name", ActionParameter::constant("x"))
            .with_param("value", ActionParameter::constant(1i64))
            .with_param("scope", ActionParameter::constant("session"));
        let err = engine
            .render_to_string(&Template::new("t", vec![element.into()]), &mut Context::new())
            .unwrap_err();
        assert!(matches!(
            err.root(),
            EngineError::Context(ContextError::ScopeNotFound { .. })
        ));
    }

    #[test]
    fn test_fragments_are_called_with_parameters() {
        let engine = Engine::builder().build();
        let fragment = core("fragment")
            .with_param("name", ActionParameter::constant("badge"))
            .with_children(vec![
                TemplateElement::text("<"),
                TemplateElement::expression("label"),
                TemplateElement::text(">"),
            ]);
        let call = core("call")
            .with_param("name", ActionParameter::constant("badge"))
            .with_param("label", ActionParameter::expression("user"));
        let mut ctx = Context::new();
        ctx.set_variable("user", "ada");
        let out = render(&engine, vec![fragment.into(), call.into()], &mut ctx);
        assert_eq!(out, "<ada>");
        assert!(!ctx.has_variable("label"));
        assert!(ctx.template_state().fragments.contains_key("badge"));
    }

    #[test]
    fn test_calling_an_undefined_fragment() {
        let engine = Engine::builder().build();
        let call = core("call").with_param("name", ActionParameter::constant("nope"));
        let err = engine
            .render_to_string(&Template::new("t", vec![call.into()]), &mut Context::new())
            .unwrap_err();
        assert!(matches!(
            err.root(),
            EngineError::Context(ContextError::FragmentNotFound { .. })
        ));
    }

    #[test]
    fn test_include_renders_in_a_subcontext() {
        let partial = Template::builder("partial")
            .text("[")
            .expression("title")
            .expression("templateState.name")
            .text("]")
            .action(
                core("set")
                    .with_param("name", ActionParameter::constant("leaked"))
                    .with_param("value", ActionParameter::constant(true)),
            )
            .build();
        let engine = Engine::builder()
            .loader(InMemoryLoader::new().with(partial))
            .build();
        let include = core("include")
            .with_param("template", ActionParameter::constant("partial"))
            .with_param("title", ActionParameter::constant("T:"));
        let mut ctx = Context::new();
        assert_eq!(render(&engine, vec![include.into()], &mut ctx), "[T:partial]");
        assert!(!ctx.has_variable("leaked"));
    }
}
