use std::fmt;

use crate::{
    bridge::{ForeignBridge, ForeignHandle, ForeignKind},
    builtins,
    environment::{Environment, EnvironmentRef},
    runtime::Interpreter,
};

/// Signature shared by every builtin. An `Err` carries the message of the
/// `Value::Error` handed back to the caller.
pub type BuiltinFn = fn(&Interpreter, &EnvironmentRef, Vec<Value>) -> Result<Value, String>;

#[derive(Clone)]
pub enum Value {
    Error(String),
    Integer(i64),
    Float(f64),
    Symbol(String),
    String(String),
    Builtin(Builtin),
    Lambda(Lambda),
    Foreign(ForeignHandle),
    SExpr(Vec<Value>),
    QExpr(Vec<Value>),
}

impl Value {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error(message.into())
    }

    pub fn int(value: i64) -> Self {
        Self::Integer(value)
    }

    pub fn float(value: f64) -> Self {
        Self::Float(value)
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Self::Symbol(name.into())
    }

    pub fn string(text: impl Into<String>) -> Self {
        Self::String(text.into())
    }

    pub fn sexpr(cells: Vec<Value>) -> Self {
        Self::SExpr(cells)
    }

    pub fn qexpr(cells: Vec<Value>) -> Self {
        Self::QExpr(cells)
    }

    /// The empty S-expression, returned by builtins evaluated for effect.
    pub fn unit() -> Self {
        Self::SExpr(Vec::new())
    }

    pub fn bool(value: bool) -> Self {
        Self::Integer(i64::from(value))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Error(_) => "Error",
            Value::Integer(_) => "Number",
            Value::Float(_) => "Floating",
            Value::Symbol(_) => "Symbol",
            Value::String(_) => "String",
            Value::Builtin(_) | Value::Lambda(_) => "Function",
            Value::Foreign(handle) => handle.kind.type_name(),
            Value::SExpr(_) => "S-Expression",
            Value::QExpr(_) => "Q-Expression",
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Renders foreign handles through `bridge` instead of the generic
    /// `<object #id>` form.
    pub fn display_with<'a>(&'a self, bridge: &'a dyn ForeignBridge) -> Rendered<'a> {
        Rendered {
            value: self,
            bridge: Some(bridge),
        }
    }
}

/// Widens an `Integer` paired with a `Float` to `Float`. Any other pair is
/// returned untouched.
pub fn promote(left: Value, right: Value) -> (Value, Value) {
    match (left, right) {
        (Value::Integer(a), Value::Float(b)) => (Value::Float(a as f64), Value::Float(b)),
        (Value::Float(a), Value::Integer(b)) => (Value::Float(a), Value::Float(b as f64)),
        pair => pair,
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Error(a), Value::Error(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => a == b,
            (Value::Foreign(a), Value::Foreign(b)) => a == b,
            (Value::SExpr(a), Value::SExpr(b)) => a == b,
            (Value::QExpr(a), Value::QExpr(b)) => a == b,
            _ => false,
        }
    }
}

#[derive(Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub callback: BuiltinFn,
}

impl Builtin {
    pub fn call(&self, interpreter: &Interpreter, env: &EnvironmentRef, args: Vec<Value>) -> Value {
        (self.callback)(interpreter, env, args).unwrap_or_else(Value::Error)
    }
}

/// Identity is the catalog entry: names bound to the same primitive compare
/// equal, everything else does not.
impl PartialEq for Builtin {
    fn eq(&self, other: &Self) -> bool {
        builtins::canonical_name(self.name) == builtins::canonical_name(other.name)
    }
}

pub struct Lambda {
    pub formals: Vec<String>,
    pub body: Vec<Value>,
    pub closure: EnvironmentRef,
}

impl Lambda {
    /// Builds a lambda with a fresh, empty closure frame.
    pub fn new(formals: Vec<String>, body: Vec<Value>) -> Self {
        Self {
            formals,
            body,
            closure: Environment::new(),
        }
    }
}

impl Clone for Lambda {
    /// Copies get their own closure frame so binding arguments into one copy
    /// never shows through another.
    fn clone(&self) -> Self {
        Self {
            formals: self.formals.clone(),
            body: self.body.clone(),
            closure: Environment::snapshot(&self.closure),
        }
    }
}

impl PartialEq for Lambda {
    fn eq(&self, other: &Self) -> bool {
        self.formals == other.formals && self.body == other.body
    }
}

pub struct Rendered<'a> {
    value: &'a Value,
    bridge: Option<&'a dyn ForeignBridge>,
}

impl Rendered<'_> {
    fn nested<'b>(&'b self, value: &'b Value) -> Rendered<'b> {
        Rendered {
            value,
            bridge: self.bridge,
        }
    }

    fn write_cells(
        &self,
        f: &mut fmt::Formatter<'_>,
        cells: &[Value],
        open: char,
        close: char,
    ) -> fmt::Result {
        write!(f, "{open}")?;
        for (idx, cell) in cells.iter().enumerate() {
            if idx > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", self.nested(cell))?;
        }
        write!(f, "{close}")
    }
}

impl fmt::Display for Rendered<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value {
            Value::Error(message) => write!(f, "Error: {message}"),
            Value::Integer(n) => write!(f, "{n}"),
            Value::Float(n) => write!(f, "{n:.6}"),
            Value::Symbol(name) => write!(f, "{name}"),
            Value::String(text) => write!(f, "\"{}\"", escape(text)),
            Value::Builtin(_) => write!(f, "<builtin>"),
            Value::Lambda(lambda) => {
                write!(f, "(\\ {{{}}} ", lambda.formals.join(" "))?;
                self.write_cells(f, &lambda.body, '{', '}')?;
                write!(f, ")")
            }
            Value::Foreign(handle) => match self.bridge {
                Some(bridge) => write!(f, "{}", bridge.describe(*handle)),
                None => match handle.kind {
                    ForeignKind::Object => write!(f, "<object #{}>", handle.id),
                    ForeignKind::Method => write!(f, "<method #{}>", handle.id),
                },
            },
            Value::SExpr(cells) => self.write_cells(f, cells, '(', ')'),
            Value::QExpr(cells) => self.write_cells(f, cells, '{', '}'),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        Rendered {
            value: self,
            bridge: None,
        }
        .fmt(f)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Error(message) => f.debug_tuple("Error").field(message).finish(),
            Value::Integer(n) => f.debug_tuple("Integer").field(n).finish(),
            Value::Float(n) => f.debug_tuple("Float").field(n).finish(),
            Value::Symbol(name) => f.debug_tuple("Symbol").field(name).finish(),
            Value::String(text) => f.debug_tuple("String").field(text).finish(),
            Value::Builtin(builtin) => f.debug_tuple("Builtin").field(&builtin.name).finish(),
            Value::Lambda(lambda) => f
                .debug_struct("Lambda")
                .field("formals", &lambda.formals)
                .field("body", &lambda.body)
                .finish_non_exhaustive(),
            Value::Foreign(handle) => f.debug_tuple("Foreign").field(handle).finish(),
            Value::SExpr(cells) => f.debug_tuple("SExpr").field(cells).finish(),
            Value::QExpr(cells) => f.debug_tuple("QExpr").field(cells).finish(),
        }
    }
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\0' => escaped.push_str("\\0"),
            other => escaped.push(other),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lambda() -> Value {
        let lambda = Lambda::new(
            vec!["x".into()],
            vec![Value::symbol("+"), Value::symbol("x"), Value::int(1)],
        );
        lambda.closure.borrow_mut().define("captured", Value::int(7));
        Value::Lambda(lambda)
    }

    fn unit_callback(_: &Interpreter, _: &EnvironmentRef, _: Vec<Value>) -> Result<Value, String> {
        Ok(Value::unit())
    }

    fn sample_builtin(name: &'static str) -> Value {
        Value::Builtin(Builtin {
            name,
            callback: unit_callback,
        })
    }

    #[test]
    fn clone_equals_original_for_every_variant() {
        let values = vec![
            Value::error("boom"),
            sample_builtin("list"),
            Value::Foreign(ForeignHandle::method(1)),
            Value::int(3),
            Value::float(2.5),
            Value::symbol("x"),
            Value::string("text"),
            sample_lambda(),
            Value::Foreign(ForeignHandle::object(4)),
            Value::sexpr(vec![Value::int(1), Value::qexpr(vec![Value::symbol("y")])]),
            Value::qexpr(vec![]),
        ];
        for value in values {
            let copy = value.clone();
            assert_eq!(copy, value);
            let expected = copy.clone();
            drop(value);
            assert_eq!(copy, expected);
        }
    }

    #[test]
    fn lambda_clone_gets_its_own_closure() {
        let original = sample_lambda();
        let copy = original.clone();
        let (Value::Lambda(original), Value::Lambda(copy)) = (original, copy) else {
            panic!("expected lambdas");
        };
        assert!(!std::rc::Rc::ptr_eq(&original.closure, &copy.closure));
        copy.closure.borrow_mut().define("captured", Value::int(8));
        assert_eq!(
            Environment::lookup(&original.closure, "captured"),
            Value::int(7)
        );
    }

    #[test]
    fn lambda_equality_ignores_closure() {
        let a = sample_lambda();
        let b = match sample_lambda() {
            Value::Lambda(lambda) => {
                lambda.closure.borrow_mut().define("captured", Value::int(99));
                Value::Lambda(lambda)
            }
            other => other,
        };
        assert_eq!(a, b);
    }

    #[test]
    fn builtins_compare_by_catalog_entry() {
        assert_eq!(sample_builtin("member"), sample_builtin("."));
        assert_ne!(sample_builtin("head"), sample_builtin("tail"));
    }

    #[test]
    fn different_variants_never_equal() {
        assert_ne!(Value::int(1), Value::float(1.0));
        assert_ne!(Value::symbol("a"), Value::string("a"));
        assert_ne!(Value::sexpr(vec![]), Value::qexpr(vec![]));
        assert_ne!(
            Value::Foreign(ForeignHandle::object(1)),
            Value::Foreign(ForeignHandle::method(1))
        );
    }

    #[test]
    fn promotion_only_widens_mixed_pairs() {
        assert_eq!(
            promote(Value::int(2), Value::float(1.5)),
            (Value::float(2.0), Value::float(1.5))
        );
        assert_eq!(
            promote(Value::float(1.5), Value::int(2)),
            (Value::float(1.5), Value::float(2.0))
        );
        assert_eq!(
            promote(Value::int(2), Value::int(3)),
            (Value::int(2), Value::int(3))
        );
    }

    #[test]
    fn display_matches_reader_syntax() {
        let value = Value::sexpr(vec![
            Value::int(-4),
            Value::float(1.5),
            Value::string("a\"b"),
            Value::qexpr(vec![Value::symbol("x")]),
        ]);
        assert_eq!(value.to_string(), r#"(-4 1.500000 "a\"b" {x})"#);
        assert_eq!(Value::error("nope").to_string(), "Error: nope");
        assert_eq!(sample_lambda().to_string(), "(\\ {x} {+ x 1})");
        assert_eq!(
            Value::Foreign(ForeignHandle::object(9)).to_string(),
            "<object #9>"
        );
    }
}
