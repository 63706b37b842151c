//! Contributions and the interceptors they register

use super::contract::BoundParameter;
use super::{Interceptor, Phase};
use crate::ast::ActionElement;
use crate::context::Context;
use crate::error::{ContributionError, Result};
use crate::render::Engine;
use crate::value::Value;
use tracing::trace;

/// Decorates action invocations by registering interceptors
pub trait Contribution {
    /// Inspect the pending invocation and register interceptors, or reject it
    fn contribute(
        &self,
        pending: &PendingInvocation<'_>,
        interceptors: &mut InterceptorRegistry,
    ) -> Result<()>;
}

/// An action that has been created but not yet executed
pub struct PendingInvocation<'a> {
    pub engine: &'a Engine,
    pub context: &'a Context<'a>,
    pub element: &'a ActionElement,
}

impl PendingInvocation<'_> {
    pub fn library(&self) -> &str {
        &self.element.library
    }

    pub fn action_name(&self) -> &str {
        &self.element.name
    }

    pub fn is_action(&self, library: &str, name: &str) -> bool {
        self.element.library == library && self.element.name == name
    }

    /// Resolve a contribution's parameter against the invocation's context
    pub fn resolve(&self, parameter: &BoundParameter) -> Result<Value> {
        parameter.resolve(self.engine, self.context)
    }

    /// Refuse this action
    pub fn unsupported(&self, contribution: &str, reason: impl Into<String>) -> ContributionError {
        ContributionError::Unsupported {
            contribution: contribution.to_string(),
            action: self.element.qualified_name(),
            reason: reason.into(),
        }
    }
}

/// Interceptors collected for one invocation, tagged by phase
#[derive(Default)]
pub struct InterceptorRegistry {
    entries: Vec<(Phase, Box<dyn Interceptor>)>,
}

impl InterceptorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, phase: Phase, interceptor: impl Interceptor + 'static) {
        trace!(?phase, position = self.entries.len(), "registered interceptor");
        self.entries.push((phase, Box::new(interceptor)));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many interceptors were registered for `phase`
    pub fn count(&self, phase: Phase) -> usize {
        self.entries.iter().filter(|(tagged, _)| *tagged == phase).count()
    }

    /// The interceptors for `phase`, in registration order
    pub fn into_chain(self, phase: Phase) -> Vec<Box<dyn Interceptor>> {
        self.entries
            .into_iter()
            .filter(|(tagged, _)| *tagged == phase)
            .map(|(_, interceptor)| interceptor)
            .collect()
    }
}
