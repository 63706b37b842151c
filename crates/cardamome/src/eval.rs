//! Expression dialects
//!
//! The engine evaluates expression source text through a pluggable
//! [`ExpressionDialect`], looked up by id. The built-in [`PathDialect`]
//! (id `path`) understands literals, variable paths and function calls:
//!
//! ```text
//! user.name            variable, then fields
//! items[0]             list index
//! templateState.name   implicit object
//! 'quoted' 42 1.5 true null
//! core:upper(user.name)
//! length(items)        unqualified calls use the `core` library
//! ```

use crate::context::Context;
use crate::error::{ContextError, EngineError, ExpressionError, Result};
use crate::lazy::{DataPath, Segment};
use crate::render::Engine;
use crate::value::Value;
use num_bigint::BigInt;
use std::str::FromStr;

/// Id of the built-in dialect
pub const DEFAULT_DIALECT: &str = "path";

/// Library used for calls written without one
pub const DEFAULT_FUNCTION_LIBRARY: &str = "core";

/// Evaluates expression source against a context
pub trait ExpressionDialect: Send + Sync {
    fn evaluate(&self, source: &str, context: &Context<'_>, engine: &Engine) -> Result<Value>;
}

/// Parsed form of a path-dialect expression
#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Path(DataPath),
    Call {
        library: String,
        name: String,
        args: Vec<Expr>,
    },
}

/// Literals, variable paths and function calls
#[derive(Debug, Default, Clone, Copy)]
pub struct PathDialect;

impl ExpressionDialect for PathDialect {
    fn evaluate(&self, source: &str, context: &Context<'_>, engine: &Engine) -> Result<Value> {
        let expr = Parser::new(source).parse()?;
        eval(&expr, context, engine)
    }
}

fn eval(expr: &Expr, context: &Context<'_>, engine: &Engine) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path(path) => eval_path(path, context),
        Expr::Call {
            library,
            name,
            args,
        } => {
            let args = args
                .iter()
                .map(|arg| eval(arg, context, engine))
                .collect::<Result<Vec<_>>>()?;
            engine.call_function(library, name, &args)
        }
    }
}

/// Variables shadow implicit objects of the same name
fn eval_path(path: &DataPath, context: &Context<'_>) -> Result<Value> {
    let root = match context.find_variable(&path.root) {
        Ok(value) => value.clone(),
        Err(not_found) => match context.find_implicit_object(&path.root) {
            Ok(value) => value,
            Err(ContextError::ImplicitObjectNotFound { .. }) => return Err(not_found.into()),
            Err(other) => return Err(other.into()),
        },
    };
    path.navigate(&root).map_err(EngineError::from)
}

struct Parser<'s> {
    source: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(source: &'s str) -> Self {
        Self { source, pos: 0 }
    }

    fn parse(mut self) -> Result<Expr, ExpressionError> {
        let expr = self.expr()?;
        self.skip_ws();
        if self.pos < self.source.len() {
            return Err(self.error("unexpected trailing input"));
        }
        Ok(expr)
    }

    fn error(&self, message: impl Into<String>) -> ExpressionError {
        ExpressionError::Syntax {
            expression: self.source.to_string(),
            offset: self.pos,
            message: message.into(),
        }
    }

    fn rest(&self) -> &'s str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), ExpressionError> {
        self.skip_ws();
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{expected}`")))
        }
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expr(&mut self) -> Result<Expr, ExpressionError> {
        self.skip_ws();
        match self.peek() {
            None => Err(self.error("empty expression")),
            Some('\'' | '"') => self.string().map(|s| Expr::Literal(Value::String(s))),
            Some(c) if c.is_ascii_digit() || c == '-' => self.number(),
            Some(c) if is_ident_start(c) => self.word(),
            Some(c) => Err(self.error(format!("unexpected `{c}`"))),
        }
    }

    fn string(&mut self) -> Result<String, ExpressionError> {
        let quote = self.bump().ok_or_else(|| self.error("expected a string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => return Err(self.error("unterminated string")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<Expr, ExpressionError> {
        let start = self.pos;
        self.eat('-');
        let mut float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == '.' && !float && self.rest()[1..].starts_with(|d: char| d.is_ascii_digit()) {
                float = true;
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.source[start..self.pos];
        let value = if float {
            f64::from_str(text).ok().map(Value::F64)
        } else {
            i64::from_str(text)
                .map(Value::I64)
                .ok()
                .or_else(|| BigInt::from_str(text).ok().map(Value::BigInt))
        };
        value
            .map(Expr::Literal)
            .ok_or_else(|| self.error(format!("invalid number `{text}`")))
    }

    fn ident(&mut self) -> Result<&'s str, ExpressionError> {
        let start = self.pos;
        match self.peek() {
            Some(c) if is_ident_start(c) => {
                self.bump();
            }
            _ => return Err(self.error("expected a name")),
        }
        while self.peek().is_some_and(is_ident_char) {
            self.bump();
        }
        Ok(&self.source[start..self.pos])
    }

    /// A keyword literal, a call or a path
    fn word(&mut self) -> Result<Expr, ExpressionError> {
        let first = self.ident()?;

        if self.peek() == Some(':') {
            self.bump();
            let name = self.ident()?;
            return self.call(first, name);
        }
        if self.rest().trim_start().starts_with('(') {
            return self.call(DEFAULT_FUNCTION_LIBRARY, first);
        }

        match first {
            "true" => return Ok(Expr::Literal(Value::Bool(true))),
            "false" => return Ok(Expr::Literal(Value::Bool(false))),
            "null" => return Ok(Expr::Literal(Value::Null)),
            _ => {}
        }

        let mut path = DataPath::new(first);
        loop {
            if self.eat('.') {
                path.segments.push(Segment::Field(self.ident()?.to_string()));
            } else if self.eat('[') {
                self.skip_ws();
                let segment = match self.peek() {
                    Some('\'' | '"') => Segment::Field(self.string()?),
                    _ => Segment::Index(self.index()?),
                };
                self.expect(']')?;
                path.segments.push(segment);
            } else {
                return Ok(Expr::Path(path));
            }
        }
    }

    fn index(&mut self) -> Result<usize, ExpressionError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        self.source[start..self.pos]
            .parse()
            .map_err(|_| self.error("expected an index"))
    }

    fn call(&mut self, library: &str, name: &str) -> Result<Expr, ExpressionError> {
        self.expect('(')?;
        let mut args = Vec::new();
        self.skip_ws();
        if !self.eat(')') {
            loop {
                args.push(self.expr()?);
                self.skip_ws();
                if self.eat(')') {
                    break;
                }
                self.expect(',')?;
            }
        }
        Ok(Expr::Call {
            library: library.to_string(),
            name: name.to_string(),
            args,
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ValueMap;

    fn parse(source: &str) -> Result<Expr, ExpressionError> {
        Parser::new(source).parse()
    }

    fn path(root: &str, segments: Vec<Segment>) -> Expr {
        Expr::Path(DataPath {
            root: root.to_string(),
            segments,
        })
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse("42").unwrap(), Expr::Literal(Value::I64(42)));
        assert_eq!(parse("-1.5").unwrap(), Expr::Literal(Value::F64(-1.5)));
        assert_eq!(parse(" 'a\\'b' ").unwrap(), Expr::Literal(Value::from("a'b")));
        assert_eq!(parse("\"x\"").unwrap(), Expr::Literal(Value::from("x")));
        assert_eq!(parse("true").unwrap(), Expr::Literal(Value::Bool(true)));
        assert_eq!(parse("null").unwrap(), Expr::Literal(Value::Null));
        assert!(matches!(
            parse("123456789012345678901234567890").unwrap(),
            Expr::Literal(Value::BigInt(_))
        ));
    }

    #[test]
    fn test_parse_paths() {
        assert_eq!(
            parse("user.address[1]['zip code']").unwrap(),
            path(
                "user",
                vec![
                    Segment::Field("address".into()),
                    Segment::Index(1),
                    Segment::Field("zip code".into()),
                ]
            )
        );
    }

    #[test]
    fn test_parse_calls() {
        assert_eq!(
            parse("core:concat(a, 'b', 1)").unwrap(),
            Expr::Call {
                library: "core".into(),
                name: "concat".into(),
                args: vec![
                    path("a", vec![]),
                    Expr::Literal(Value::from("b")),
                    Expr::Literal(Value::I64(1)),
                ],
            }
        );
        assert_eq!(
            parse("length ( items )").unwrap(),
            Expr::Call {
                library: DEFAULT_FUNCTION_LIBRARY.into(),
                name: "length".into(),
                args: vec![path("items", vec![])],
            }
        );
    }

    #[test]
    fn test_syntax_errors() {
        for source in ["", "a.", "a[", "a[x]", "'open", "f(a", "a b", "#"] {
            assert!(
                matches!(parse(source), Err(ExpressionError::Syntax { .. })),
                "`{source}` should not parse"
            );
        }
    }

    #[test]
    fn test_evaluate_against_context() {
        let engine = Engine::builder().build();
        let mut ctx = Context::new();
        let mut user = ValueMap::new();
        user.insert("name", "ada");
        ctx.set_variable("user", Value::Map(user));

        let dialect = PathDialect;
        assert_eq!(
            dialect.evaluate("user.name", &ctx, &engine).unwrap(),
            Value::from("ada")
        );
        assert_eq!(
            dialect.evaluate("upper(user.name)", &ctx, &engine).unwrap(),
            Value::from("ADA")
        );
        assert!(matches!(
            dialect.evaluate("user.age", &ctx, &engine),
            Err(EngineError::Expression(ExpressionError::UnknownField { .. }))
        ));
        assert!(matches!(
            dialect.evaluate("nobody", &ctx, &engine),
            Err(EngineError::Context(ContextError::VariableNotFound { .. }))
        ));
    }

    #[test]
    fn test_implicit_objects_back_paths() {
        let engine = Engine::builder().build();
        let mut ctx = Context::new();
        ctx.set_variable("x", 1i64);
        assert_eq!(
            PathDialect.evaluate("templateScope.x", &ctx, &engine).unwrap(),
            Value::I64(1)
        );
    }
}
