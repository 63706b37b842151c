//! The template element tree
//!
//! A template is parsed once and executed many times, possibly from
//! several threads at once. Every element carries the source line it
//! came from so failures can be reported against the template.

use crate::lazy::ActionParameter;
use indexmap::IndexMap;
use std::ops::Deref;
use std::sync::Arc;

/// A complete parsed template
#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub elements: Body,
}

impl Template {
    pub fn new(name: impl Into<String>, elements: impl Into<Body>) -> Self {
        Self {
            name: name.into(),
            elements: elements.into(),
        }
    }

    pub fn builder(name: impl Into<String>) -> TemplateBuilder {
        TemplateBuilder {
            name: name.into(),
            elements: Vec::new(),
            line: 1,
        }
    }
}

/// A shared, immutable sequence of elements
#[derive(Debug, Clone, Default)]
pub struct Body(Arc<[TemplateElement]>);

impl Body {
    pub fn new(elements: Vec<TemplateElement>) -> Self {
        Self(elements.into())
    }
}

impl Deref for Body {
    type Target = [TemplateElement];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<TemplateElement>> for Body {
    fn from(elements: Vec<TemplateElement>) -> Self {
        Self::new(elements)
    }
}

impl FromIterator<TemplateElement> for Body {
    fn from_iter<I: IntoIterator<Item = TemplateElement>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A node in the template tree
#[derive(Debug, Clone)]
pub enum TemplateElement {
    /// Literal text, written verbatim
    Text(TextElement),
    /// An expression whose value is written
    Expression(ExpressionElement),
    /// An action invocation; its children are the action's body
    Action(ActionElement),
}

impl TemplateElement {
    pub fn text(text: impl Into<String>) -> Self {
        TemplateElement::Text(TextElement {
            text: text.into(),
            line: 0,
        })
    }

    /// An expression in the engine's default dialect
    pub fn expression(source: impl Into<String>) -> Self {
        TemplateElement::Expression(ExpressionElement {
            source: source.into(),
            dialect: None,
            line: 0,
        })
    }

    pub fn line(&self) -> u32 {
        match self {
            TemplateElement::Text(e) => e.line,
            TemplateElement::Expression(e) => e.line,
            TemplateElement::Action(e) => e.line,
        }
    }

    pub fn at_line(mut self, line: u32) -> Self {
        match &mut self {
            TemplateElement::Text(e) => e.line = line,
            TemplateElement::Expression(e) => e.line = line,
            TemplateElement::Action(e) => e.line = line,
        }
        self
    }
}

impl From<ActionElement> for TemplateElement {
    fn from(action: ActionElement) -> Self {
        TemplateElement::Action(action)
    }
}

#[derive(Debug, Clone)]
pub struct TextElement {
    pub text: String,
    pub line: u32,
}

#[derive(Debug, Clone)]
pub struct ExpressionElement {
    pub source: String,
    /// `None` selects the engine's default dialect
    pub dialect: Option<String>,
    pub line: u32,
}

/// An action invocation
#[derive(Debug, Clone)]
pub struct ActionElement {
    pub library: String,
    pub name: String,
    pub parameters: IndexMap<String, ActionParameter>,
    /// Applied in order
    pub contributions: Vec<ContributionDescriptor>,
    pub children: Body,
    pub line: u32,
}

impl ActionElement {
    pub fn new(library: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            library: library.into(),
            name: name.into(),
            parameters: IndexMap::new(),
            contributions: Vec::new(),
            children: Body::default(),
            line: 0,
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, parameter: ActionParameter) -> Self {
        self.parameters.insert(name.into(), parameter);
        self
    }

    pub fn with_contribution(mut self, contribution: ContributionDescriptor) -> Self {
        self.contributions.push(contribution);
        self
    }

    pub fn with_children(mut self, children: impl Into<Body>) -> Self {
        self.children = children.into();
        self
    }

    pub fn at_line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    /// `library:name`, for diagnostics
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.library, self.name)
    }
}

/// A contribution attached to an action element
#[derive(Debug, Clone)]
pub struct ContributionDescriptor {
    pub library: String,
    pub name: String,
    pub parameter: ActionParameter,
}

impl ContributionDescriptor {
    pub fn new(
        library: impl Into<String>,
        name: impl Into<String>,
        parameter: ActionParameter,
    ) -> Self {
        Self {
            library: library.into(),
            name: name.into(),
            parameter,
        }
    }
}

/// Builds a template the way a parser would, tracking line numbers
#[derive(Debug)]
pub struct TemplateBuilder {
    name: String,
    elements: Vec<TemplateElement>,
    line: u32,
}

impl TemplateBuilder {
    /// Move to `line` for the elements that follow
    pub fn line(mut self, line: u32) -> Self {
        self.line = line;
        self
    }

    /// Literal text; the line advances past its newlines
    pub fn text(mut self, text: impl Into<String>) -> Self {
        let text = text.into();
        let newlines = text.matches('\n').count() as u32;
        self.elements.push(TemplateElement::Text(TextElement {
            text,
            line: self.line,
        }));
        self.line += newlines;
        self
    }

    pub fn expression(self, source: impl Into<String>) -> Self {
        self.push_expression(source.into(), None)
    }

    pub fn expression_in(self, dialect: impl Into<String>, source: impl Into<String>) -> Self {
        self.push_expression(source.into(), Some(dialect.into()))
    }

    fn push_expression(mut self, source: String, dialect: Option<String>) -> Self {
        self.elements.push(TemplateElement::Expression(ExpressionElement {
            source,
            dialect,
            line: self.line,
        }));
        self
    }

    /// An action; one without a line of its own is placed on the current line
    pub fn action(mut self, mut action: ActionElement) -> Self {
        if action.line == 0 {
            action.line = self.line;
        }
        self.elements.push(TemplateElement::Action(action));
        self
    }

    pub fn build(self) -> Template {
        Template::new(self.name, self.elements)
    }
}
