//! The seam between the evaluator and a host object system.
//!
//! The evaluator only ever holds [`ForeignHandle`]s and hands them back to a
//! [`ForeignBridge`]; it never looks behind the id.

use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForeignKind {
    /// A host-owned object.
    Object,
    /// A host-owned callable that can be invoked against an object.
    Method,
}

impl ForeignKind {
    pub fn type_name(self) -> &'static str {
        match self {
            ForeignKind::Object => "Object",
            ForeignKind::Method => "Method",
        }
    }
}

/// Opaque reference to something the host owns. Equality is identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForeignHandle {
    pub kind: ForeignKind,
    pub id: u64,
}

impl ForeignHandle {
    pub const fn object(id: u64) -> Self {
        Self {
            kind: ForeignKind::Object,
            id,
        }
    }

    pub const fn method(id: u64) -> Self {
        Self {
            kind: ForeignKind::Method,
            id,
        }
    }
}

pub trait ForeignBridge {
    /// Build an instance of `class_name` from literal argument texts.
    fn construct(&mut self, class_name: &str, args: &[String]) -> Result<ForeignHandle, String>;

    fn invoke_member(
        &mut self,
        target: ForeignHandle,
        member: &str,
        args: &[String],
    ) -> Result<(), String>;

    /// Printable form of a handle.
    fn describe(&self, handle: ForeignHandle) -> String;

    fn invoke_callable(
        &mut self,
        callable: ForeignHandle,
        target: ForeignHandle,
    ) -> Result<(), String> {
        let _ = (callable, target);
        Err("host does not expose callable handles".into())
    }

    /// Handles bound by name in the root environment at startup.
    fn globals(&self) -> Vec<(String, ForeignHandle)> {
        Vec::new()
    }
}

/// Literal text of each argument as the host expects it: integers in
/// decimal, floats in six-decimal fixed form, strings double-quoted.
pub fn marshal_args(args: &[Value]) -> Result<Vec<String>, String> {
    args.iter()
        .map(|arg| match arg {
            Value::Integer(n) => Ok(n.to_string()),
            Value::Float(n) => Ok(format!("{n:.6}")),
            Value::String(text) => Ok(format!("\"{text}\"")),
            other => Err(format!(
                "Cannot use {} as a host argument.",
                other.type_name()
            )),
        })
        .collect()
}

/// Bridge for runs without any host object system.
#[derive(Debug, Default, Clone, Copy)]
pub struct DetachedBridge;

impl ForeignBridge for DetachedBridge {
    fn construct(&mut self, class_name: &str, _args: &[String]) -> Result<ForeignHandle, String> {
        Err(format!(
            "Constructor not found for {class_name}: no host object system attached"
        ))
    }

    fn invoke_member(
        &mut self,
        _target: ForeignHandle,
        member: &str,
        _args: &[String],
    ) -> Result<(), String> {
        Err(format!(
            "Cannot execute {member}: no host object system attached"
        ))
    }

    fn describe(&self, handle: ForeignHandle) -> String {
        format!("<detached {} #{}>", handle.kind.type_name(), handle.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostObject {
    pub class_name: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberCall {
    pub target: ForeignHandle,
    pub class_name: String,
    pub member: String,
    pub args: Vec<String>,
}

#[derive(Debug, Default)]
struct RecordingState {
    next_id: u64,
    classes: Option<Vec<String>>,
    objects: IndexMap<u64, HostObject>,
    methods: IndexMap<u64, String>,
    globals: Vec<(String, ForeignHandle)>,
    calls: Vec<MemberCall>,
    echo: bool,
}

impl RecordingState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-process host: keeps a table of constructed objects and a log of every
/// member invocation. Clones share the same state, so a caller can keep one
/// clone for inspection after handing another to an interpreter.
#[derive(Debug, Clone, Default)]
pub struct RecordingBridge {
    state: Rc<RefCell<RecordingState>>,
}

impl RecordingBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only allow construction of the listed classes.
    pub fn with_classes<I, S>(self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.borrow_mut().classes = Some(classes.into_iter().map(Into::into).collect());
        self
    }

    /// Print each invocation to stdout as it happens.
    pub fn with_echo(self, echo: bool) -> Self {
        self.state.borrow_mut().echo = echo;
        self
    }

    pub fn with_global_object(self, name: impl Into<String>, class_name: impl Into<String>) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let id = state.allocate();
            state.objects.insert(
                id,
                HostObject {
                    class_name: class_name.into(),
                    args: Vec::new(),
                },
            );
            state.globals.push((name.into(), ForeignHandle::object(id)));
        }
        self
    }

    /// Registers a callable that, when invoked on an object, calls `member`
    /// on it with no arguments.
    pub fn with_global_method(self, name: impl Into<String>, member: impl Into<String>) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let id = state.allocate();
            state.methods.insert(id, member.into());
            state.globals.push((name.into(), ForeignHandle::method(id)));
        }
        self
    }

    pub fn objects(&self) -> Vec<(ForeignHandle, HostObject)> {
        self.state
            .borrow()
            .objects
            .iter()
            .map(|(id, object)| (ForeignHandle::object(*id), object.clone()))
            .collect()
    }

    pub fn calls(&self) -> Vec<MemberCall> {
        self.state.borrow().calls.clone()
    }

    fn record(&self, target: ForeignHandle, member: &str, args: &[String]) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        let class_name = match state.objects.get(&target.id) {
            Some(object) if target.kind == ForeignKind::Object => object.class_name.clone(),
            _ => return Err(format!("Unknown object #{}", target.id)),
        };
        tracing::debug!(%class_name, member, ?args, id = target.id, "host member call");
        if state.echo {
            println!(
                "Executing {member}({}) in object #{} of class {class_name}",
                args.join(", "),
                target.id
            );
        }
        state.calls.push(MemberCall {
            target,
            class_name,
            member: member.to_string(),
            args: args.to_vec(),
        });
        Ok(())
    }
}

impl ForeignBridge for RecordingBridge {
    fn construct(&mut self, class_name: &str, args: &[String]) -> Result<ForeignHandle, String> {
        let mut state = self.state.borrow_mut();
        if let Some(classes) = &state.classes {
            if !classes.iter().any(|known| known == class_name) {
                return Err(format!("Constructor not found for {class_name}"));
            }
        }
        let id = state.allocate();
        tracing::debug!(class_name, ?args, id, "host object constructed");
        state.objects.insert(
            id,
            HostObject {
                class_name: class_name.to_string(),
                args: args.to_vec(),
            },
        );
        Ok(ForeignHandle::object(id))
    }

    fn invoke_member(
        &mut self,
        target: ForeignHandle,
        member: &str,
        args: &[String],
    ) -> Result<(), String> {
        self.record(target, member, args)
    }

    fn invoke_callable(
        &mut self,
        callable: ForeignHandle,
        target: ForeignHandle,
    ) -> Result<(), String> {
        let member = self
            .state
            .borrow()
            .methods
            .get(&callable.id)
            .cloned()
            .ok_or_else(|| format!("Unknown method #{}", callable.id))?;
        self.record(target, &member, &[])
    }

    fn describe(&self, handle: ForeignHandle) -> String {
        let state = self.state.borrow();
        match handle.kind {
            ForeignKind::Object => match state.objects.get(&handle.id) {
                Some(object) => format!(
                    "<object #{} {}({})>",
                    handle.id,
                    object.class_name,
                    object.args.join(", ")
                ),
                None => format!("<object #{}>", handle.id),
            },
            ForeignKind::Method => match state.methods.get(&handle.id) {
                Some(member) => format!("<method {member}>"),
                None => format!("<method #{}>", handle.id),
            },
        }
    }

    fn globals(&self) -> Vec<(String, ForeignHandle)> {
        self.state.borrow().globals.clone()
    }
}
