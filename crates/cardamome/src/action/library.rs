//! Libraries: named collections of actions, contributions and functions

use super::contract::{BoundParameter, BoundParameters, ParameterContract, ParameterSpec};
use super::{Action, Contribution};
use crate::ast::Body;
use crate::convert::{ConverterRegistry, TargetType};
use crate::error::{ExpressionError, ResolutionError, Result};
use crate::value::Value;
use indexmap::IndexMap;

/// Everything a factory needs to create an action instance
#[derive(Debug)]
pub struct ActionInit {
    pub library: String,
    pub name: String,
    pub parameters: BoundParameters,
    /// The element's children, for the action to invoke as it sees fit
    pub body: Body,
    pub line: u32,
}

/// Everything a factory needs to create a contribution
#[derive(Debug)]
pub struct ContributionInit {
    pub library: String,
    pub name: String,
    pub parameter: BoundParameter,
}

pub type ActionFactory = Box<dyn Fn(ActionInit) -> Result<Box<dyn Action>> + Send + Sync>;

pub type ContributionFactory =
    Box<dyn Fn(ContributionInit) -> Result<Box<dyn Contribution>> + Send + Sync>;

/// A function callable from expressions. Arguments arrive converted.
pub type Function = Box<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

pub struct ActionDefinition {
    pub contract: ParameterContract,
    factory: ActionFactory,
}

impl ActionDefinition {
    pub fn create(&self, init: ActionInit) -> Result<Box<dyn Action>> {
        (self.factory)(init)
    }
}

pub struct ContributionDefinition {
    /// The single parameter every contribution carries
    pub parameter: ParameterSpec,
    factory: ContributionFactory,
}

impl ContributionDefinition {
    pub fn create(&self, init: ContributionInit) -> Result<Box<dyn Contribution>> {
        (self.factory)(init)
    }
}

/// Positional signature plus an optional type for any further arguments
pub struct FunctionDefinition {
    pub params: Vec<TargetType>,
    pub rest: Option<TargetType>,
    function: Function,
}

impl FunctionDefinition {
    /// Check arity, convert the arguments, then call
    pub fn call(&self, name: &str, args: &[Value], converters: &ConverterRegistry) -> Result<Value> {
        let arity_ok = match &self.rest {
            Some(_) => args.len() >= self.params.len(),
            None => args.len() == self.params.len(),
        };
        if !arity_ok {
            return Err(ExpressionError::Function {
                function: name.to_string(),
                message: format!(
                    "expected {}{} arguments, got {}",
                    if self.rest.is_some() { "at least " } else { "" },
                    self.params.len(),
                    args.len()
                ),
            }
            .into());
        }

        let converted = args
            .iter()
            .enumerate()
            .map(|(i, arg)| match self.params.get(i).or(self.rest.as_ref()) {
                Some(ty) => converters.convert(arg.clone(), ty),
                None => Ok(arg.clone()),
            })
            .collect::<Result<Vec<_>, _>>()?;
        (self.function)(&converted)
    }
}

/// A named set of definitions
pub struct Library {
    id: String,
    actions: IndexMap<String, ActionDefinition>,
    contributions: IndexMap<String, ContributionDefinition>,
    functions: IndexMap<String, FunctionDefinition>,
}

impl Library {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            actions: IndexMap::new(),
            contributions: IndexMap::new(),
            functions: IndexMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Register an action
    pub fn action<A, F>(mut self, name: impl Into<String>, contract: ParameterContract, factory: F) -> Self
    where
        A: Action + 'static,
        F: Fn(ActionInit) -> Result<A> + Send + Sync + 'static,
    {
        self.actions.insert(
            name.into(),
            ActionDefinition {
                contract,
                factory: Box::new(move |init| Ok(Box::new(factory(init)?) as Box<dyn Action>)),
            },
        );
        self
    }

    /// Register a contribution taking one parameter of type `ty`
    pub fn contribution<C, F>(mut self, name: impl Into<String>, ty: TargetType, factory: F) -> Self
    where
        C: Contribution + 'static,
        F: Fn(ContributionInit) -> Result<C> + Send + Sync + 'static,
    {
        let name = name.into();
        self.contributions.insert(
            name.clone(),
            ContributionDefinition {
                parameter: ParameterSpec::required(name, ty),
                factory: Box::new(move |init| Ok(Box::new(factory(init)?) as Box<dyn Contribution>)),
            },
        );
        self
    }

    /// Register a function with a fixed positional signature
    pub fn function<F>(mut self, name: impl Into<String>, params: Vec<TargetType>, function: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(
            name.into(),
            FunctionDefinition {
                params,
                rest: None,
                function: Box::new(function),
            },
        );
        self
    }

    /// Register a function taking any number of trailing `rest` arguments
    pub fn variadic_function<F>(
        mut self,
        name: impl Into<String>,
        params: Vec<TargetType>,
        rest: TargetType,
        function: F,
    ) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.functions.insert(
            name.into(),
            FunctionDefinition {
                params,
                rest: Some(rest),
                function: Box::new(function),
            },
        );
        self
    }

    pub fn action_definition(&self, name: &str) -> Result<&ActionDefinition, ResolutionError> {
        self.actions
            .get(name)
            .ok_or_else(|| ResolutionError::UnknownAction {
                library: self.id.clone(),
                name: name.to_string(),
                available: self.action_names().map(str::to_string).collect(),
            })
    }

    pub fn contribution_definition(
        &self,
        name: &str,
    ) -> Result<&ContributionDefinition, ResolutionError> {
        self.contributions
            .get(name)
            .ok_or_else(|| ResolutionError::UnknownContribution {
                library: self.id.clone(),
                name: name.to_string(),
            })
    }

    pub fn function_definition(&self, name: &str) -> Result<&FunctionDefinition, ResolutionError> {
        self.functions
            .get(name)
            .ok_or_else(|| ResolutionError::UnknownFunction {
                library: self.id.clone(),
                name: name.to_string(),
            })
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn contribution_names(&self) -> impl Iterator<Item = &str> {
        self.contributions.keys().map(String::as_str)
    }

    pub fn function_names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }
}

impl std::fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for ContributionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContributionDefinition")
            .field("parameter", &self.parameter)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for FunctionDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionDefinition")
            .field("params", &self.params)
            .field("rest", &self.rest)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("id", &self.id)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .field("contributions", &self.contributions.keys().collect::<Vec<_>>())
            .field("functions", &format!("<{} functions>", self.functions.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::ActionContext;

    struct Noop;

    impl Action for Noop {
        fn execute(&self, _ac: &mut ActionContext<'_, '_>) -> Result<()> {
            Ok(())
        }
    }

    fn library() -> Library {
        Library::new("test")
            .action("noop", ParameterContract::new(), |_init| Ok(Noop))
            .function("twice", vec![TargetType::I64], |args| {
                Ok(Value::I64(args[0].as_i64().unwrap_or_default() * 2))
            })
            .variadic_function("count", vec![], TargetType::Any, |args| {
                Ok(Value::I64(args.len() as i64))
            })
    }

    #[test]
    fn test_lookup() {
        let lib = library();
        let noop = lib.action_definition("noop").unwrap();
        assert!(format!("{noop:?}").starts_with("ActionDefinition { contract:"));
        match lib.action_definition("loud") {
            Err(ResolutionError::UnknownAction { available, .. }) => {
                assert_eq!(available, ["noop"]);
            }
            other => panic!("expected unknown action, got {other:?}"),
        }
        assert!(matches!(
            lib.contribution_definition("trim"),
            Err(ResolutionError::UnknownContribution { .. })
        ));
    }

    #[test]
    fn test_function_arguments_are_converted() {
        let lib = library();
        let converters = ConverterRegistry::with_defaults();
        let twice = lib.function_definition("twice").unwrap();
        assert_eq!(
            twice.call("twice", &[Value::from("21")], &converters).unwrap(),
            Value::I64(42)
        );
        assert!(twice.call("twice", &[], &converters).is_err());

        let count = lib.function_definition("count").unwrap();
        assert_eq!(
            count
                .call("count", &[Value::Null, Value::Bool(true)], &converters)
                .unwrap(),
            Value::I64(2)
        );
    }
}
