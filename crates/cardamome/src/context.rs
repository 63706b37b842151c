//! Variable scopes and execution contexts
//!
//! A [`Context`] holds an ordered list of named [`Scope`]s (the first one
//! wins lookups), implicit objects, per-template bookkeeping, and an
//! optional borrowed parent. Lookups that miss locally continue up the
//! parent chain; writes never do.

use crate::ast::Body;
use crate::error::ContextError;
use crate::value::{Value, ValueMap};
use indexmap::IndexMap;

type Result<T, E = ContextError> = std::result::Result<T, E>;

/// Name of the scope every context starts with
pub const TEMPLATE_SCOPE: &str = "template";

/// Implicit object exposing the [`TemplateState`]
pub const TEMPLATE_STATE: &str = "templateState";

const SCOPE_SUFFIX: &str = "Scope";

/// A named set of variables
#[derive(Debug, Clone, Default)]
pub struct Scope {
    name: String,
    vars: IndexMap<String, Value>,
}

impl Scope {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vars: IndexMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Result<&Value> {
        self.vars
            .get(name)
            .ok_or_else(|| ContextError::VariableNotFound {
                name: name.to_string(),
                available: self.names().map(str::to_string).collect(),
            })
    }

    /// Set a variable, returning the value it replaced
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.vars.insert(name.into(), value.into())
    }

    pub fn remove(&mut self, name: &str) -> Result<Value> {
        self.vars
            .shift_remove(name)
            .ok_or_else(|| ContextError::VariableNotFound {
                name: name.to_string(),
                available: self.names().map(str::to_string).collect(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Variable names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// The scope as a map value
    pub fn to_value(&self) -> Value {
        Value::Map(
            self.vars
                .iter()
                .map(|(k, v)| (Value::from(k.as_str()), v.clone()))
                .collect(),
        )
    }
}

/// Bookkeeping for the template being executed
#[derive(Debug, Clone, Default)]
pub struct TemplateState {
    pub template_name: Option<String>,
    /// Author-defined fragments, by name
    pub fragments: IndexMap<String, Body>,
    /// Free-form attributes
    pub attributes: IndexMap<String, Value>,
}

impl TemplateState {
    pub fn new(template_name: impl Into<String>) -> Self {
        Self {
            template_name: Some(template_name.into()),
            ..Self::default()
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = ValueMap::new();
        map.insert("name", self.template_name.clone());
        map.insert(
            "fragments",
            Value::List(self.fragments.keys().map(|k| Value::from(k.as_str())).collect()),
        );
        map.insert(
            "attributes",
            Value::Map(
                self.attributes
                    .iter()
                    .map(|(k, v)| (Value::from(k.as_str()), v.clone()))
                    .collect(),
            ),
        );
        Value::Map(map)
    }
}

/// Execution context
#[derive(Debug)]
pub struct Context<'p> {
    /// Highest priority first; always holds the template scope
    scopes: Vec<Scope>,
    parent: Option<&'p Context<'p>>,
    implicit: IndexMap<String, Value>,
    state: TemplateState,
    depth: usize,
}

impl Context<'static> {
    /// A root context with an empty template scope
    pub fn new() -> Self {
        Self::with_parent(None, 0)
    }
}

impl Default for Context<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'p> Context<'p> {
    fn with_parent(parent: Option<&'p Context<'p>>, depth: usize) -> Self {
        Self {
            scopes: vec![Scope::new(TEMPLATE_SCOPE)],
            parent,
            implicit: IndexMap::new(),
            state: TemplateState::default(),
            depth,
        }
    }

    /// A child with fresh scopes and state that falls back to `self` on lookups
    pub fn create_subcontext(&self) -> Context<'_> {
        Context::with_parent(Some(self), self.depth + 1)
    }

    pub fn parent(&self) -> Option<&'p Context<'p>> {
        self.parent
    }

    /// Nesting depth: 0 for a root context
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Look a variable up by priority, then through the parent chain
    pub fn find_variable(&self, name: &str) -> Result<&Value> {
        let mut current = Some(self);
        while let Some(context) = current {
            if let Some(value) = context.scopes.iter().find_map(|scope| scope.vars.get(name)) {
                return Ok(value);
            }
            current = context.parent;
        }
        Err(ContextError::VariableNotFound {
            name: name.to_string(),
            available: self.variable_names(),
        })
    }

    pub fn has_variable(&self, name: &str) -> bool {
        self.find_variable(name).is_ok()
    }

    /// Set in the highest-priority scope of this context
    pub fn set_variable(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.scopes[0].set(name, value)
    }

    pub fn set_variable_in(
        &mut self,
        scope: &str,
        name: impl Into<String>,
        value: impl Into<Value>,
    ) -> Result<Option<Value>> {
        Ok(self.scope_mut(scope)?.set(name, value))
    }

    /// Remove from the first scope of this context that holds `name`
    pub fn remove_variable(&mut self, name: &str) -> Result<Value> {
        match self.scopes.iter_mut().find(|scope| scope.contains(name)) {
            Some(scope) => scope.remove(name),
            None => Err(ContextError::VariableNotFound {
                name: name.to_string(),
                available: self.local_variable_names(),
            }),
        }
    }

    pub fn remove_variable_in(&mut self, scope: &str, name: &str) -> Result<Value> {
        self.scope_mut(scope)?.remove(name)
    }

    /// All visible names, deduplicated, in lookup order
    pub fn variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let mut current = Some(self);
        while let Some(context) = current {
            for name in context.scopes.iter().flat_map(Scope::names) {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_string());
                }
            }
            current = context.parent;
        }
        names
    }

    fn local_variable_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for name in self.scopes.iter().flat_map(Scope::names) {
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names
    }

    /// Add a scope with the highest priority and return its actual name.
    ///
    /// A `unique` request for a taken name gets a numeric suffix
    /// (`loop_2`, `loop_3`, ...); otherwise a taken name is an error.
    pub fn add_scope(&mut self, name: &str, unique: bool) -> Result<String> {
        let mut actual = name.to_string();
        if self.scope(name).is_some() {
            if !unique {
                return Err(ContextError::DuplicateScope {
                    name: name.to_string(),
                });
            }
            actual = (2..)
                .map(|n| format!("{name}_{n}"))
                .find(|candidate| self.scope(candidate).is_none())
                .unwrap_or_default();
        }
        self.scopes.insert(0, Scope::new(actual.clone()));
        Ok(actual)
    }

    pub fn remove_scope(&mut self, name: &str) -> Result<Scope> {
        if name == TEMPLATE_SCOPE {
            return Err(ContextError::TemplateScopeRequired);
        }
        let index = self
            .scopes
            .iter()
            .position(|scope| scope.name == name)
            .ok_or_else(|| ContextError::ScopeNotFound {
                name: name.to_string(),
            })?;
        Ok(self.scopes.remove(index))
    }

    pub fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.iter().find(|scope| scope.name == name)
    }

    pub fn scope_mut(&mut self, name: &str) -> Result<&mut Scope> {
        self.scopes
            .iter_mut()
            .find(|scope| scope.name == name)
            .ok_or_else(|| ContextError::ScopeNotFound {
                name: name.to_string(),
            })
    }

    /// Scope names, highest priority first
    pub fn scope_names(&self) -> impl Iterator<Item = &str> {
        self.scopes.iter().map(Scope::name)
    }

    pub fn set_implicit_object(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.implicit.insert(name.into(), value.into());
    }

    /// Own implicit objects, then scope views, then the template state,
    /// then the same lookups on each ancestor
    pub fn find_implicit_object(&self, name: &str) -> Result<Value> {
        let mut current = Some(self);
        while let Some(context) = current {
            if let Some(value) = context.local_implicit_object(name) {
                return Ok(value);
            }
            current = context.parent;
        }
        Err(ContextError::ImplicitObjectNotFound {
            name: name.to_string(),
        })
    }

    fn local_implicit_object(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.implicit.get(name) {
            return Some(value.clone());
        }
        if let Some(scope_name) = name.strip_suffix(SCOPE_SUFFIX) {
            if let Some(scope) = self.scope(scope_name) {
                return Some(scope.to_value());
            }
        }
        (name == TEMPLATE_STATE).then(|| self.state.to_value())
    }

    pub fn template_state(&self) -> &TemplateState {
        &self.state
    }

    pub fn template_state_mut(&mut self) -> &mut TemplateState {
        &mut self.state
    }

    /// Name of the template executing here, or in the nearest ancestor that has one
    pub fn template_name(&self) -> Option<&str> {
        let mut current = Some(self);
        while let Some(context) = current {
            if let Some(name) = &context.state.template_name {
                return Some(name);
            }
            current = context.parent;
        }
        None
    }

    /// A fragment defined here or in any ancestor
    pub fn find_fragment(&self, name: &str) -> Result<&Body> {
        let mut current = Some(self);
        while let Some(context) = current {
            if let Some(body) = context.state.fragments.get(name) {
                return Ok(body);
            }
            current = context.parent;
        }
        Err(ContextError::FragmentNotFound {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_find() {
        let mut ctx = Context::new();
        ctx.set_variable("x", 1i64);
        assert_eq!(ctx.find_variable("x").unwrap(), &Value::I64(1));
    }

    #[test]
    fn test_scope_priority() {
        let mut ctx = Context::new();
        ctx.set_variable("x", "template");
        ctx.add_scope("local", false).unwrap();
        ctx.set_variable_in("local", "x", "local").unwrap();
        assert_eq!(ctx.find_variable("x").unwrap(), &Value::from("local"));

        ctx.remove_scope("local").unwrap();
        assert_eq!(ctx.find_variable("x").unwrap(), &Value::from("template"));
    }

    #[test]
    fn test_set_targets_highest_priority_scope() {
        let mut ctx = Context::new();
        ctx.add_scope("inner", false).unwrap();
        ctx.set_variable("y", true);
        assert!(ctx.scope("inner").unwrap().contains("y"));
        assert!(!ctx.scope(TEMPLATE_SCOPE).unwrap().contains("y"));
    }

    #[test]
    fn test_parent_fallback_is_one_directional() {
        let mut parent = Context::new();
        parent.set_variable("shared", 1i64);
        {
            let mut child = parent.create_subcontext();
            assert_eq!(child.depth(), 1);
            assert_eq!(child.find_variable("shared").unwrap(), &Value::I64(1));

            child.set_variable("shared", 2i64);
            child.set_variable("own", 3i64);
            assert_eq!(child.find_variable("shared").unwrap(), &Value::I64(2));
            assert_eq!(child.variable_names(), ["shared", "own"]);
        }
        assert_eq!(parent.find_variable("shared").unwrap(), &Value::I64(1));
        assert!(matches!(
            parent.find_variable("own"),
            Err(ContextError::VariableNotFound { .. })
        ));
    }

    #[test]
    fn test_missing_variable_lists_available_names() {
        let mut ctx = Context::new();
        ctx.set_variable("alpha", 1i64);
        match ctx.find_variable("beta") {
            Err(ContextError::VariableNotFound { name, available }) => {
                assert_eq!(name, "beta");
                assert_eq!(available, ["alpha"]);
            }
            other => panic!("expected not found, got {other:?}"),
        }
        assert!(ctx.remove_variable("beta").is_err());
    }

    #[test]
    fn test_unique_scopes_are_disambiguated() {
        let mut ctx = Context::new();
        assert_eq!(ctx.add_scope("loop", true).unwrap(), "loop");
        assert_eq!(ctx.add_scope("loop", true).unwrap(), "loop_2");
        assert_eq!(ctx.add_scope("loop", true).unwrap(), "loop_3");
        assert!(matches!(
            ctx.add_scope("loop", false),
            Err(ContextError::DuplicateScope { .. })
        ));
        let names: Vec<&str> = ctx.scope_names().collect();
        assert_eq!(names, ["loop_3", "loop_2", "loop", TEMPLATE_SCOPE]);
    }

    #[test]
    fn test_template_scope_is_permanent() {
        let mut ctx = Context::new();
        assert!(matches!(
            ctx.remove_scope(TEMPLATE_SCOPE),
            Err(ContextError::TemplateScopeRequired)
        ));
        assert!(matches!(
            ctx.remove_scope("nope"),
            Err(ContextError::ScopeNotFound { .. })
        ));
    }

    #[test]
    fn test_implicit_objects() {
        let mut parent = Context::new();
        parent.set_implicit_object("request", "GET /");
        parent.template_state_mut().attributes.insert("lang".into(), Value::from("fr"));

        let mut child = parent.create_subcontext();
        child.set_variable("v", 1i64);

        assert_eq!(child.find_implicit_object("request").unwrap(), Value::from("GET /"));
        let scope_view = child.find_implicit_object("templateScope").unwrap();
        assert_eq!(scope_view.as_map().unwrap().get_str("v"), Some(&Value::I64(1)));

        let state = child.find_implicit_object(TEMPLATE_STATE).unwrap();
        assert!(state.as_map().unwrap().get_str("attributes").unwrap().as_map().unwrap().is_empty());
        assert!(matches!(
            child.find_implicit_object("session"),
            Err(ContextError::ImplicitObjectNotFound { .. })
        ));
    }

    #[test]
    fn test_template_name_falls_back_to_ancestors() {
        let mut root = Context::new();
        assert_eq!(root.template_name(), None);
        root.template_state_mut().template_name = Some("page".into());
        let mut child = root.create_subcontext();
        assert_eq!(child.template_name(), Some("page"));
        *child.template_state_mut() = TemplateState::new("partial");
        assert_eq!(child.template_name(), Some("partial"));
    }

    #[test]
    fn test_fragments_resolve_through_ancestors() {
        let mut parent = Context::new();
        parent
            .template_state_mut()
            .fragments
            .insert("header".into(), Body::default());
        let child = parent.create_subcontext();
        assert!(child.find_fragment("header").is_ok());
        assert!(matches!(
            child.find_fragment("footer"),
            Err(ContextError::FragmentNotFound { .. })
        ));
    }
}
