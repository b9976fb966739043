use std::{
    cell::{RefCell, RefMut},
    collections::VecDeque,
    fs,
    path::Path,
    rc::Rc,
};

use crate::{
    bridge::{DetachedBridge, ForeignBridge},
    builtins,
    diagnostics::{Diagnostic, DiagnosticKind, Result, SprigError},
    environment::{Environment, EnvironmentRef},
    parser,
    value::{Lambda, Value},
};

const VARIADIC_MARKER: &str = "&";

/// Outcome of loading a script form by form.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LoadSummary {
    pub forms: usize,
    pub errors: Vec<String>,
}

pub struct Interpreter {
    env: EnvironmentRef,
    bridge: RefCell<Box<dyn ForeignBridge>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_bridge(DetachedBridge)
    }

    pub fn with_bridge(bridge: impl ForeignBridge + 'static) -> Self {
        let env = Environment::new();
        builtins::install(&env);
        for (name, handle) in bridge.globals() {
            tracing::debug!(%name, ?handle, "installing host global");
            env.borrow_mut().define(name, Value::Foreign(handle));
        }
        Self {
            env,
            bridge: RefCell::new(Box::new(bridge)),
        }
    }

    pub fn global_env(&self) -> &EnvironmentRef {
        &self.env
    }

    /// Reads `source` and evaluates all of its forms as one S-expression in
    /// the root environment, the way a shell line is evaluated.
    pub fn eval_source(&self, source: &str) -> Result<Value> {
        let forms = parser::parse_program(source).map_err(SprigError::from)?;
        Ok(self.eval(&self.env, Value::SExpr(forms)))
    }

    /// Evaluates each top-level form of `source` on its own. Error values are
    /// printed and collected; they never stop the remaining forms.
    pub fn load_source(&self, env: &EnvironmentRef, source: &str) -> Result<LoadSummary> {
        let forms = parser::parse_program(source).map_err(SprigError::from)?;
        let mut summary = LoadSummary::default();
        for form in forms {
            summary.forms += 1;
            if let Value::Error(message) = self.eval(env, form) {
                println!("Error: {message}");
                summary.errors.push(message);
            }
        }
        tracing::debug!(
            forms = summary.forms,
            errors = summary.errors.len(),
            "source loaded"
        );
        Ok(summary)
    }

    pub fn load_file(&self, env: &EnvironmentRef, path: &Path) -> Result<LoadSummary> {
        tracing::debug!(path = %path.display(), "loading file");
        let source = fs::read_to_string(path).map_err(|err| {
            let mut diagnostic = Diagnostic::new(
                DiagnosticKind::Runtime,
                format!("cannot read `{}`: {err}", path.display()),
            );
            if let Some(code) = err.raw_os_error() {
                diagnostic = diagnostic.with_note(format!("os error code: {code}"));
            }
            SprigError::from(diagnostic)
        })?;
        self.load_source(env, &source)
    }

    pub fn eval(&self, env: &EnvironmentRef, value: Value) -> Value {
        match value {
            Value::Symbol(name) => Environment::lookup(env, &name),
            Value::SExpr(cells) => self.eval_sexpr(env, cells),
            other => other,
        }
    }

    fn eval_sexpr(&self, env: &EnvironmentRef, cells: Vec<Value>) -> Value {
        let mut cells: Vec<Value> = cells.into_iter().map(|cell| self.eval(env, cell)).collect();

        if let Some(idx) = cells.iter().position(Value::is_error) {
            return cells.swap_remove(idx);
        }
        if cells.len() <= 1 {
            return cells.pop().unwrap_or_else(Value::unit);
        }

        let args = cells.split_off(1);
        match cells.pop() {
            Some(callee @ (Value::Builtin(_) | Value::Lambda(_))) => self.apply(env, callee, args),
            Some(other) => Value::error(format!(
                "S-Expression starts with incorrect type. Got {}, Expected Function.",
                other.type_name()
            )),
            None => Value::unit(),
        }
    }

    /// Calls `callee` with already evaluated `args`. `env` is the call site.
    pub fn apply(&self, env: &EnvironmentRef, callee: Value, args: Vec<Value>) -> Value {
        match callee {
            Value::Builtin(builtin) => {
                tracing::trace!(name = builtin.name, argc = args.len(), "builtin call");
                builtin.call(self, env, args)
            }
            Value::Lambda(lambda) => self.call_lambda(env, lambda, args),
            other => Value::error(format!(
                "Cannot apply {}. Expected Function.",
                other.type_name()
            )),
        }
    }

    fn call_lambda(&self, env: &EnvironmentRef, lambda: Lambda, args: Vec<Value>) -> Value {
        let Lambda {
            formals,
            body,
            closure,
        } = lambda;
        let given = args.len();
        let total = formals.len();
        let mut formals: VecDeque<String> = formals.into();
        let mut args: VecDeque<Value> = args.into();

        while !args.is_empty() {
            let Some(formal) = formals.pop_front() else {
                return Value::error(format!(
                    "Function passed too many arguments. Got {given}, Expected {total}."
                ));
            };
            if formal == VARIADIC_MARKER {
                let Some(rest) = single_trailing_formal(&mut formals) else {
                    return malformed_variadic();
                };
                closure
                    .borrow_mut()
                    .define(rest, Value::QExpr(args.drain(..).collect()));
                break;
            }
            if let Some(arg) = args.pop_front() {
                closure.borrow_mut().define(formal, arg);
            }
        }

        if formals.front().map(String::as_str) == Some(VARIADIC_MARKER) {
            formals.pop_front();
            let Some(rest) = single_trailing_formal(&mut formals) else {
                return malformed_variadic();
            };
            closure.borrow_mut().define(rest, Value::QExpr(Vec::new()));
        }

        if formals.is_empty() {
            closure.borrow_mut().set_parent(Rc::clone(env));
            return self.eval(&closure, Value::SExpr(body));
        }

        tracing::trace!(remaining = formals.len(), "partial application");
        Value::Lambda(Lambda {
            formals: formals.into(),
            body,
            closure,
        })
    }

    /// Prints `value` with foreign handles described by the bridge.
    pub fn render(&self, value: &Value) -> String {
        let bridge = self.bridge.borrow();
        value.display_with(&**bridge).to_string()
    }

    pub(crate) fn bridge_mut(&self) -> RefMut<'_, Box<dyn ForeignBridge>> {
        self.bridge.borrow_mut()
    }
}

fn single_trailing_formal(formals: &mut VecDeque<String>) -> Option<String> {
    if formals.len() == 1 {
        formals.pop_front()
    } else {
        None
    }
}

fn malformed_variadic() -> Value {
    Value::error("Function format invalid. Symbol '&' not followed by single symbol.")
}
