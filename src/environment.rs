use std::{cell::RefCell, fmt, rc::Rc};

use indexmap::IndexMap;

use crate::value::Value;

pub type EnvironmentRef = Rc<RefCell<Environment>>;

/// One frame of bindings. Child frames share their parent through an `Rc`,
/// so a frame lives as long as any closure or call still refers to it.
#[derive(Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Value>,
}

impl Environment {
    pub fn new() -> EnvironmentRef {
        Rc::new(RefCell::new(Self::default()))
    }

    #[cfg(test)]
    pub(crate) fn with_parent(parent: EnvironmentRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    /// New frame holding copies of `env`'s bindings and the same parent.
    pub fn snapshot(env: &EnvironmentRef) -> EnvironmentRef {
        let frame = env.borrow();
        Rc::new(RefCell::new(Self {
            parent: frame.parent.clone(),
            bindings: frame.bindings.clone(),
        }))
    }

    /// Insert or overwrite `name` in this frame only.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    pub fn set_parent(&mut self, parent: EnvironmentRef) {
        self.parent = Some(parent);
    }

    #[cfg(test)]
    pub(crate) fn parent(&self) -> Option<EnvironmentRef> {
        self.parent.clone()
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn root(env: &EnvironmentRef) -> EnvironmentRef {
        let mut current = Rc::clone(env);
        loop {
            let parent = current.borrow().parent.clone();
            match parent {
                Some(parent) => current = parent,
                None => return current,
            }
        }
    }

    /// Define `name` in the outermost ancestor of `env`.
    pub fn define_global(env: &EnvironmentRef, name: impl Into<String>, value: Value) {
        Environment::root(env).borrow_mut().define(name, value);
    }

    /// Resolves `name` walking outwards. A name unbound all the way to the
    /// root is bound there to a string of itself, and that string returned.
    pub fn lookup(env: &EnvironmentRef, name: &str) -> Value {
        let mut current = Rc::clone(env);
        loop {
            let parent = {
                let frame = current.borrow();
                if let Some(value) = frame.bindings.get(name) {
                    return value.clone();
                }
                frame.parent.clone()
            };
            match parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        tracing::trace!(name, "unbound symbol becomes a string literal");
        let fallback = Value::string(name);
        current.borrow_mut().define(name, fallback.clone());
        fallback
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("bindings", &self.bindings.keys().collect::<Vec<_>>())
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_to_parent() {
        let root = Environment::new();
        root.borrow_mut().define("x", Value::int(1));
        let child = Environment::with_parent(Rc::clone(&root));
        assert_eq!(Environment::lookup(&child, "x"), Value::int(1));
    }

    #[test]
    fn local_definition_shadows_without_touching_parent() {
        let root = Environment::new();
        root.borrow_mut().define("x", Value::int(1));
        let child = Environment::with_parent(Rc::clone(&root));
        child.borrow_mut().define("x", Value::int(2));
        assert_eq!(Environment::lookup(&child, "x"), Value::int(2));
        assert_eq!(Environment::lookup(&root, "x"), Value::int(1));
    }

    #[test]
    fn global_definition_lands_in_root() {
        let root = Environment::new();
        let middle = Environment::with_parent(Rc::clone(&root));
        let leaf = Environment::with_parent(Rc::clone(&middle));
        Environment::define_global(&leaf, "g", Value::int(5));
        assert!(root.borrow().contains("g"));
        assert!(!leaf.borrow().contains("g"));
        assert!(!middle.borrow().contains("g"));
    }

    #[test]
    fn unbound_symbol_defines_string_in_root() {
        let root = Environment::new();
        let child = Environment::with_parent(Rc::clone(&root));
        assert_eq!(Environment::lookup(&child, "hello"), Value::string("hello"));
        assert!(root.borrow().contains("hello"));
        assert!(!child.borrow().contains("hello"));
    }

    #[test]
    fn snapshot_copies_bindings_and_keeps_parent() {
        let root = Environment::new();
        let frame = Environment::with_parent(Rc::clone(&root));
        frame.borrow_mut().define("a", Value::int(1));
        let copy = Environment::snapshot(&frame);
        copy.borrow_mut().define("a", Value::int(2));
        assert_eq!(Environment::lookup(&frame, "a"), Value::int(1));
        let parent = copy.borrow().parent().expect("parent is kept");
        assert!(Rc::ptr_eq(&parent, &root));
    }
}
