//! Declarative parameter contracts and their bound parameters

use crate::context::Context;
use crate::convert::{ConverterRegistry, TargetType};
use crate::error::{ParameterError, Result};
use crate::lazy::ActionParameter;
use crate::render::Engine;
use crate::value::Value;
use indexmap::IndexMap;

/// One declared parameter
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub ty: TargetType,
    pub required: bool,
}

impl ParameterSpec {
    pub fn required(name: impl Into<String>, ty: TargetType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, ty: TargetType) -> Self {
        Self {
            name: name.into(),
            ty,
            required: false,
        }
    }
}

/// The parameters an action accepts
#[derive(Debug, Clone, Default)]
pub struct ParameterContract {
    specs: Vec<ParameterSpec>,
    accepts_extra: bool,
}

impl ParameterContract {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: impl Into<String>, ty: TargetType) -> Self {
        self.specs.push(ParameterSpec::required(name, ty));
        self
    }

    pub fn optional(mut self, name: impl Into<String>, ty: TargetType) -> Self {
        self.specs.push(ParameterSpec::optional(name, ty));
        self
    }

    /// Accept undeclared parameters, passed through untyped
    pub fn accept_extra(mut self) -> Self {
        self.accepts_extra = true;
        self
    }

    pub fn specs(&self) -> &[ParameterSpec] {
        &self.specs
    }

    pub fn spec(&self, name: &str) -> Option<&ParameterSpec> {
        self.specs.iter().find(|spec| spec.name == name)
    }

    pub fn accepts_extra(&self) -> bool {
        self.accepts_extra
    }

    /// Validate an element's parameters.
    ///
    /// Constants are converted to their declared type now; expressions
    /// stay lazy and are converted each time they are resolved.
    pub fn bind(
        &self,
        action: &str,
        parameters: &IndexMap<String, ActionParameter>,
        converters: &ConverterRegistry,
    ) -> Result<BoundParameters, ParameterError> {
        let mut bound = BoundParameters::default();

        for (name, parameter) in parameters {
            match self.spec(name) {
                Some(spec) => {
                    let parameter = bind_one(action, spec, parameter, converters)?;
                    bound.declared.insert(name.clone(), parameter);
                }
                None if self.accepts_extra => {
                    bound.extras.insert(
                        name.clone(),
                        BoundParameter {
                            parameter: parameter.clone(),
                            ty: TargetType::Any,
                        },
                    );
                }
                None => {
                    return Err(ParameterError::Unknown {
                        action: action.to_string(),
                        name: name.clone(),
                        accepted: self.specs.iter().map(|spec| spec.name.clone()).collect(),
                    });
                }
            }
        }

        if let Some(missing) = self
            .specs
            .iter()
            .find(|spec| spec.required && !bound.declared.contains_key(&spec.name))
        {
            return Err(ParameterError::Missing {
                action: action.to_string(),
                name: missing.name.clone(),
            });
        }

        Ok(bound)
    }
}

/// Bind a single parameter against its declaration
pub(crate) fn bind_one(
    action: &str,
    spec: &ParameterSpec,
    parameter: &ActionParameter,
    converters: &ConverterRegistry,
) -> Result<BoundParameter, ParameterError> {
    let parameter = match parameter {
        ActionParameter::Constant(value) => {
            let value = converters.convert(value.clone(), &spec.ty).map_err(|cause| {
                ParameterError::WrongType {
                    action: action.to_string(),
                    name: spec.name.clone(),
                    cause,
                }
            })?;
            ActionParameter::Constant(value)
        }
        expression => expression.clone(),
    };
    Ok(BoundParameter {
        parameter,
        ty: spec.ty.clone(),
    })
}

/// A validated parameter and the type it resolves to
#[derive(Debug, Clone)]
pub struct BoundParameter {
    pub parameter: ActionParameter,
    pub ty: TargetType,
}

impl BoundParameter {
    pub fn resolve(&self, engine: &Engine, context: &Context<'_>) -> Result<Value> {
        self.parameter.resolve(engine, context, &self.ty)
    }
}

/// The result of binding an element's parameters
#[derive(Debug, Clone, Default)]
pub struct BoundParameters {
    declared: IndexMap<String, BoundParameter>,
    extras: IndexMap<String, BoundParameter>,
}

impl BoundParameters {
    pub fn get(&self, name: &str) -> Option<&BoundParameter> {
        self.declared.get(name).or_else(|| self.extras.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Resolve a parameter, `None` when the element did not give it
    pub fn value(&self, name: &str, engine: &Engine, context: &Context<'_>) -> Result<Option<Value>> {
        self.get(name)
            .map(|parameter| parameter.resolve(engine, context))
            .transpose()
    }

    /// Undeclared parameters, in template order
    pub fn extras(&self) -> impl Iterator<Item = (&str, &BoundParameter)> {
        self.extras.iter().map(|(name, parameter)| (name.as_str(), parameter))
    }
}
