use std::{
    io::{self, Write},
    path::Path,
};

use crate::{
    bridge::{marshal_args, ForeignHandle, ForeignKind},
    environment::{Environment, EnvironmentRef},
    runtime::Interpreter,
    value::{promote, Builtin, BuiltinFn, Lambda, Value},
};

type BuiltinResult = Result<Value, String>;

const CATALOG: &[(&str, BuiltinFn)] = &[
    ("list", list),
    ("head", head),
    ("tail", tail),
    ("eval", eval),
    ("join", join),
    ("\\", lambda),
    ("def", def),
    ("=", put),
    ("+", add),
    ("-", sub),
    ("*", mul),
    ("/", div),
    ("if", if_),
    ("==", eq),
    ("!=", ne),
    (">", gt),
    ("<", lt),
    (">=", ge),
    ("<=", le),
    ("load", load),
    ("error", error),
    ("print", print),
    ("exit", exit),
    ("new", new),
    ("member", member),
    (".", member),
    ("invoke", invoke),
];

/// Catalog names bound to the same primitive as another entry.
const ALIASES: &[(&str, &str)] = &[(".", "member")];

pub(crate) fn canonical_name(name: &str) -> &str {
    ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map_or(name, |&(_, target)| target)
}

/// Binds every primitive into `env`, which is expected to be the root.
pub fn install(env: &EnvironmentRef) {
    let mut scope = env.borrow_mut();
    for &(name, callback) in CATALOG {
        scope.define(name, Value::Builtin(Builtin { name, callback }));
    }
}

fn take<const N: usize>(name: &str, args: Vec<Value>) -> Result<[Value; N], String> {
    args.try_into().map_err(|args: Vec<Value>| {
        format!(
            "Function '{name}' passed incorrect number of arguments. Got {}, Expected {N}.",
            args.len()
        )
    })
}

fn ensure_at_least(name: &str, args: &[Value], min: usize, usage: &str) -> Result<(), String> {
    if args.len() < min {
        return Err(format!(
            "Function '{name}' needs at least {min} argument(s): {usage}. Got {}.",
            args.len()
        ));
    }
    Ok(())
}

fn incorrect_type(name: &str, index: usize, found: &Value, expected: &str) -> String {
    format!(
        "Function '{name}' passed incorrect type for argument {index}. Got {}, Expected {expected}.",
        found.type_name()
    )
}

fn expect_qexpr(name: &str, index: usize, value: Value) -> Result<Vec<Value>, String> {
    match value {
        Value::QExpr(cells) => Ok(cells),
        other => Err(incorrect_type(name, index, &other, "Q-Expression")),
    }
}

fn expect_string(name: &str, index: usize, value: Value) -> Result<String, String> {
    match value {
        Value::String(text) => Ok(text),
        other => Err(incorrect_type(name, index, &other, "String")),
    }
}

fn expect_integer(name: &str, index: usize, value: &Value) -> Result<i64, String> {
    match value {
        Value::Integer(n) => Ok(*n),
        other => Err(incorrect_type(name, index, other, "Number")),
    }
}

fn expect_handle(
    name: &str,
    index: usize,
    value: &Value,
    kind: ForeignKind,
) -> Result<ForeignHandle, String> {
    match value {
        Value::Foreign(handle) if handle.kind == kind => Ok(*handle),
        other => Err(incorrect_type(name, index, other, kind.type_name())),
    }
}

fn expect_symbols(name: &str, cells: Vec<Value>) -> Result<Vec<String>, String> {
    cells
        .into_iter()
        .map(|cell| match cell {
            Value::Symbol(symbol) => Ok(symbol),
            other => Err(format!(
                "Function '{name}' cannot define non-symbol. Got {}, Expected Symbol.",
                other.type_name()
            )),
        })
        .collect()
}

fn list(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    Ok(Value::QExpr(args))
}

fn head(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    let [target] = take("head", args)?;
    let mut cells = expect_qexpr("head", 0, target)?;
    if cells.is_empty() {
        return Err("Function 'head' passed {}!".into());
    }
    cells.truncate(1);
    Ok(Value::QExpr(cells))
}

fn tail(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    let [target] = take("tail", args)?;
    let mut cells = expect_qexpr("tail", 0, target)?;
    if cells.is_empty() {
        return Err("Function 'tail' passed {}!".into());
    }
    cells.remove(0);
    Ok(Value::QExpr(cells))
}

fn eval(interpreter: &Interpreter, env: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    let [target] = take("eval", args)?;
    let cells = expect_qexpr("eval", 0, target)?;
    Ok(interpreter.eval(env, Value::SExpr(cells)))
}

fn join(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    let mut joined = Vec::new();
    for (index, arg) in args.into_iter().enumerate() {
        joined.extend(expect_qexpr("join", index, arg)?);
    }
    Ok(Value::QExpr(joined))
}

fn lambda(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    let [formals, body] = take("\\", args)?;
    let formals = expect_qexpr("\\", 0, formals)?;
    let body = expect_qexpr("\\", 1, body)?;
    let formals = expect_symbols("\\", formals)?;
    Ok(Value::Lambda(Lambda::new(formals, body)))
}

#[derive(Clone, Copy)]
enum Scope {
    Global,
    Local,
}

fn bind(env: &EnvironmentRef, name: &str, scope: Scope, args: Vec<Value>) -> BuiltinResult {
    let mut args = args.into_iter();
    let Some(first) = args.next() else {
        return Err(format!(
            "Function '{name}' passed incorrect number of arguments. Got 0, Expected at least 1."
        ));
    };
    let symbols = expect_symbols(name, expect_qexpr(name, 0, first)?)?;
    let values: Vec<Value> = args.collect();
    if symbols.len() != values.len() {
        return Err(format!(
            "Function '{name}' passed too many arguments for symbols. Got {}, Expected {}.",
            symbols.len(),
            values.len()
        ));
    }
    for (symbol, value) in symbols.into_iter().zip(values) {
        match scope {
            Scope::Global => {
                tracing::debug!(%symbol, "global definition");
                Environment::define_global(env, symbol, value);
            }
            Scope::Local => env.borrow_mut().define(symbol, value),
        }
    }
    Ok(Value::unit())
}

fn def(_: &Interpreter, env: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    bind(env, "def", Scope::Global, args)
}

fn put(_: &Interpreter, env: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    bind(env, "=", Scope::Local, args)
}

#[derive(Clone, Copy)]
enum Arith {
    Add,
    Sub,
    Mul,
    Div,
}

impl Arith {
    fn symbol(self) -> &'static str {
        match self {
            Arith::Add => "+",
            Arith::Sub => "-",
            Arith::Mul => "*",
            Arith::Div => "/",
        }
    }

    fn integers(self, a: i64, b: i64) -> BuiltinResult {
        match self {
            Arith::Add => Ok(Value::int(a.wrapping_add(b))),
            Arith::Sub => Ok(Value::int(a.wrapping_sub(b))),
            Arith::Mul => Ok(Value::int(a.wrapping_mul(b))),
            Arith::Div if b == 0 => Err("Division By Zero!".into()),
            Arith::Div => Ok(Value::int(a.wrapping_div(b))),
        }
    }

    fn floats(self, a: f64, b: f64) -> BuiltinResult {
        match self {
            Arith::Add => Ok(Value::float(a + b)),
            Arith::Sub => Ok(Value::float(a - b)),
            Arith::Mul => Ok(Value::float(a * b)),
            Arith::Div if b == 0.0 => Err("Division By Zero!".into()),
            Arith::Div => Ok(Value::float(a / b)),
        }
    }
}

fn ensure_numeric(name: &str, args: &[Value]) -> Result<(), String> {
    match args.iter().position(|arg| !arg.is_numeric()) {
        Some(index) => Err(incorrect_type(name, index, &args[index], "Number")),
        None => Ok(()),
    }
}

fn arithmetic(op: Arith, args: Vec<Value>) -> BuiltinResult {
    let name = op.symbol();
    ensure_numeric(name, &args)?;
    let mut args = args.into_iter();
    let Some(mut acc) = args.next() else {
        return Err(format!(
            "Function '{name}' passed incorrect number of arguments. Got 0, Expected at least 1."
        ));
    };

    if matches!(op, Arith::Sub) && args.len() == 0 {
        return Ok(match acc {
            Value::Integer(n) => Value::int(n.wrapping_neg()),
            Value::Float(n) => Value::float(-n),
            other => other,
        });
    }

    for next in args {
        acc = match promote(acc, next) {
            (Value::Integer(a), Value::Integer(b)) => op.integers(a, b)?,
            (Value::Float(a), Value::Float(b)) => op.floats(a, b)?,
            (left, _) => return Err(incorrect_type(name, 0, &left, "Number")),
        };
    }
    Ok(acc)
}

fn add(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    arithmetic(Arith::Add, args)
}

fn sub(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    arithmetic(Arith::Sub, args)
}

fn mul(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    arithmetic(Arith::Mul, args)
}

fn div(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    arithmetic(Arith::Div, args)
}

fn ordering(
    name: &str,
    args: Vec<Value>,
    integers: fn(&i64, &i64) -> bool,
    floats: fn(&f64, &f64) -> bool,
) -> BuiltinResult {
    let pair: [Value; 2] = take(name, args)?;
    ensure_numeric(name, &pair)?;
    let [left, right] = pair;
    let holds = match promote(left, right) {
        (Value::Integer(a), Value::Integer(b)) => integers(&a, &b),
        (Value::Float(a), Value::Float(b)) => floats(&a, &b),
        (left, _) => return Err(incorrect_type(name, 0, &left, "Number")),
    };
    Ok(Value::bool(holds))
}

fn gt(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    ordering(">", args, i64::gt, f64::gt)
}

fn lt(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    ordering("<", args, i64::lt, f64::lt)
}

fn ge(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    ordering(">=", args, i64::ge, f64::ge)
}

fn le(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    ordering("<=", args, i64::le, f64::le)
}

fn equality(name: &str, args: Vec<Value>) -> Result<bool, String> {
    let [left, right] = take(name, args)?;
    let (left, right) = promote(left, right);
    Ok(left == right)
}

fn eq(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    equality("==", args).map(Value::bool)
}

fn ne(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    equality("!=", args).map(|equal| Value::bool(!equal))
}

fn if_(interpreter: &Interpreter, env: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    let [condition, then_branch, else_branch] = take("if", args)?;
    let condition = expect_integer("if", 0, &condition)?;
    let then_branch = expect_qexpr("if", 1, then_branch)?;
    let else_branch = expect_qexpr("if", 2, else_branch)?;
    let chosen = if condition != 0 { then_branch } else { else_branch };
    Ok(interpreter.eval(env, Value::SExpr(chosen)))
}

fn load(interpreter: &Interpreter, env: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    let [path] = take("load", args)?;
    let path = expect_string("load", 0, path)?;
    interpreter
        .load_file(env, Path::new(&path))
        .map(|_| Value::unit())
        .map_err(|err| format!("Could not load Library {err}"))
}

fn error(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    let [message] = take("error", args)?;
    let message = expect_string("error", 0, message)?;
    Ok(Value::Error(message))
}

fn print(interpreter: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    let mut line = String::new();
    for arg in &args {
        line.push_str(&interpreter.render(arg));
        line.push(' ');
    }
    println!("{line}");
    Ok(Value::unit())
}

fn exit(_: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    let [code] = take("exit", args)?;
    let code = expect_integer("exit", 0, &code)?;
    tracing::debug!(code, "exit requested");
    io::stdout().flush().ok();
    std::process::exit(i32::try_from(code).unwrap_or(i32::MAX))
}

fn new(interpreter: &Interpreter, _: &EnvironmentRef, mut args: Vec<Value>) -> BuiltinResult {
    ensure_at_least("new", &args, 1, "<class name>")?;
    let rest = args.split_off(1);
    let [class_name] = take("new", args)?;
    let class_name = expect_string("new", 0, class_name)?;
    let textual = marshal_args(&rest)?;
    let handle = interpreter.bridge_mut().construct(&class_name, &textual)?;
    Ok(Value::Foreign(handle))
}

fn member(interpreter: &Interpreter, _: &EnvironmentRef, mut args: Vec<Value>) -> BuiltinResult {
    ensure_at_least("member", &args, 2, "<member name> and <object>")?;
    let rest = args.split_off(2);
    let [member_name, target] = take("member", args)?;
    let member_name = expect_string("member", 0, member_name)?;
    let target = expect_handle("member", 1, &target, ForeignKind::Object)?;
    let textual = marshal_args(&rest)?;
    interpreter
        .bridge_mut()
        .invoke_member(target, &member_name, &textual)?;
    Ok(Value::QExpr(Vec::new()))
}

fn invoke(interpreter: &Interpreter, _: &EnvironmentRef, args: Vec<Value>) -> BuiltinResult {
    let [callable, target] = take("invoke", args)?;
    let callable = expect_handle("invoke", 0, &callable, ForeignKind::Method)?;
    let target = expect_handle("invoke", 1, &target, ForeignKind::Object)?;
    interpreter.bridge_mut().invoke_callable(callable, target)?;
    Ok(Value::QExpr(Vec::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> Value {
        Interpreter::new()
            .eval_source(source)
            .expect("source parses")
    }

    /// Applies a catalog entry to `args` without going through the reader,
    /// which would unwrap a lone builtin instead of calling it.
    fn call(name: &str, args: Vec<Value>) -> Value {
        let interpreter = Interpreter::new();
        let env = interpreter.global_env();
        let builtin = Environment::lookup(env, name);
        assert!(matches!(builtin, Value::Builtin(_)), "{name} is a builtin");
        interpreter.apply(env, builtin, args)
    }

    #[test]
    fn catalog_names_are_unique() {
        let mut names: Vec<&str> = CATALOG.iter().map(|(name, _)| *name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), CATALOG.len());
    }

    #[test]
    fn member_aliases_share_identity() {
        assert_eq!(run("== member ."), Value::int(1));
        assert_eq!(run("== head tail"), Value::int(0));
    }

    #[test]
    fn unary_minus_negates() {
        assert_eq!(run("- 5"), Value::int(-5));
        assert_eq!(run("- 2.5"), Value::float(-2.5));
    }

    #[test]
    fn arithmetic_folds_left() {
        assert_eq!(run("- 10 3 2"), Value::int(5));
        assert_eq!(run("/ 20 2 5"), Value::int(2));
        assert_eq!(run("* 2 3 4"), Value::int(24));
    }

    #[test]
    fn integer_overflow_wraps() {
        assert_eq!(run("+ 9223372036854775807 1"), Value::int(i64::MIN));
    }

    #[test]
    fn arithmetic_rejects_non_numbers() {
        assert_eq!(
            run("+ 1 \"two\""),
            Value::error("Function '+' passed incorrect type for argument 1. Got String, Expected Number.")
        );
    }

    #[test]
    fn ordering_reports_arity() {
        assert_eq!(
            run("> 1 2 3"),
            Value::error("Function '>' passed incorrect number of arguments. Got 3, Expected 2.")
        );
        assert_eq!(run(">= 2 2.0"), Value::int(1));
        assert_eq!(run("< 1.5 1"), Value::int(0));
    }

    #[test]
    fn type_errors_name_the_offending_argument() {
        assert_eq!(
            run("if 1 {1} 2"),
            Value::error("Function 'if' passed incorrect type for argument 2. Got Number, Expected Q-Expression.")
        );
    }

    #[test]
    fn lambda_requires_symbol_formals() {
        assert_eq!(
            run("\\ {x 1} {x}"),
            Value::error("Function '\\' cannot define non-symbol. Got Number, Expected Symbol.")
        );
    }

    #[test]
    fn def_checks_symbol_and_value_counts() {
        assert_eq!(
            run("def {a b} 1"),
            Value::error("Function 'def' passed too many arguments for symbols. Got 2, Expected 1.")
        );
    }

    #[test]
    fn lone_builtin_is_returned_uncalled() {
        assert!(matches!(run("join"), Value::Builtin(_)));
        assert!(matches!(run("new"), Value::Builtin(_)));
    }

    #[test]
    fn join_with_no_lists_is_empty() {
        assert_eq!(call("join", vec![]), Value::qexpr(vec![]));
        assert_eq!(run("join {} {}"), Value::qexpr(vec![]));
    }

    #[test]
    fn arithmetic_without_operands_is_an_arity_error() {
        assert_eq!(
            call("+", vec![]),
            Value::error("Function '+' passed incorrect number of arguments. Got 0, Expected at least 1.")
        );
    }

    #[test]
    fn error_builtin_requires_string() {
        assert_eq!(run("error \"bad\""), Value::error("bad"));
        assert_eq!(
            run("error 1"),
            Value::error("Function 'error' passed incorrect type for argument 0. Got Number, Expected String.")
        );
    }

    #[test]
    fn host_builtins_without_host_report_errors() {
        assert!(run("new \"Canvas\"").is_error());
        assert_eq!(
            run("member \"Draw\" 1"),
            Value::error("Function 'member' passed incorrect type for argument 1. Got Number, Expected Object.")
        );
        assert_eq!(
            call("new", vec![]),
            Value::error("Function 'new' needs at least 1 argument(s): <class name>. Got 0.")
        );
    }

    #[test]
    fn canonical_names_resolve_aliases() {
        assert_eq!(canonical_name("."), "member");
        assert_eq!(canonical_name("member"), "member");
        assert_eq!(canonical_name("head"), "head");
    }
}
