//! The runtime state native functions run against.
//!
//! # Design
//! `State` stands in for the host runtime: it owns the handle registry, the
//! registered module functions and one method table per handle type. Method
//! calls are resolved through the receiver's type tag, the way a host
//! resolves them through a metatable. Every native call runs under
//! `catch_unwind`, so a panic comes back as `ScriptError::Panic` instead of
//! unwinding into the host.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::ScriptError;
use crate::handles::{HandleRegistry, LookupError, UserData};
use crate::types::{Handle, MultiValue, Table, Value};

/// A native function callable from scripts.
pub type NativeFn = fn(&mut State, &[Value]) -> Result<MultiValue, ScriptError>;

/// A named set of functions plus per-type method tables.
pub struct Module {
    pub functions: &'static [(&'static str, NativeFn)],
    pub methods: &'static [(&'static str, &'static [(&'static str, NativeFn)])],
}

#[derive(Default)]
pub struct State {
    handles: HandleRegistry,
    functions: HashMap<&'static str, NativeFn>,
    methods: HashMap<&'static str, HashMap<&'static str, NativeFn>>,
}

impl State {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a module's functions and methods callable.
    pub fn register(&mut self, module: &Module) {
        for &(name, f) in module.functions {
            self.functions.insert(name, f);
        }
        for &(type_name, methods) in module.methods {
            let table = self.methods.entry(type_name).or_default();
            for &(name, f) in methods {
                table.insert(name, f);
            }
        }
    }

    pub fn handles(&self) -> &HandleRegistry {
        &self.handles
    }

    /// Wrap a native object in a new handle value.
    pub fn create_userdata<T: UserData>(&mut self, value: T) -> Value {
        Value::Handle(self.handles.insert(value))
    }

    /// Release the object behind a handle value, as the host does when it
    /// collects the handle. Returns false for non-handles and stale handles.
    pub fn release(&mut self, value: &Value) -> bool {
        value
            .as_handle()
            .is_some_and(|handle| self.handles.release(handle))
    }

    /// The native object behind argument `n`, checked against `T`.
    pub fn check_userdata<T: UserData>(&self, args: &Args<'_>, n: usize) -> Result<&T, ScriptError> {
        let handle = args.check_handle::<T>(n)?;
        self.handles
            .get::<T>(handle)
            .map_err(|e| args.error(n, lookup_message::<T>(e)))
    }

    pub fn check_userdata_mut<T: UserData>(
        &mut self,
        args: &Args<'_>,
        n: usize,
    ) -> Result<&mut T, ScriptError> {
        let handle = args.check_handle::<T>(n)?;
        self.handles
            .get_mut::<T>(handle)
            .map_err(|e| args.error(n, lookup_message::<T>(e)))
    }

    /// Call a registered module function by name.
    pub fn call(&mut self, name: &str, args: &[Value]) -> Result<MultiValue, ScriptError> {
        let (name, f) = self
            .functions
            .get_key_value(name)
            .map(|(name, f)| (*name, *f))
            .ok_or_else(|| ScriptError::UnknownFunction(name.to_string()))?;
        self.protected(name, f, args)
    }

    /// Call `receiver:name(args...)`; the receiver is passed as argument 1.
    pub fn call_method(
        &mut self,
        receiver: &Value,
        name: &str,
        args: &[Value],
    ) -> Result<MultiValue, ScriptError> {
        let handle = receiver
            .as_handle()
            .ok_or(ScriptError::NotIndexable(receiver.type_name()))?;
        let type_name = self
            .handles
            .type_name(handle)
            .ok_or(ScriptError::NotIndexable("released userdata"))?;
        let f = self
            .methods
            .get(type_name)
            .and_then(|methods| methods.get(name))
            .copied()
            .ok_or_else(|| ScriptError::UnknownFunction(format!("{type_name}:{name}")))?;

        let mut full = Vec::with_capacity(args.len() + 1);
        full.push(receiver.clone());
        full.extend_from_slice(args);
        self.protected(name, f, &full)
    }

    fn protected(&mut self, name: &str, f: NativeFn, args: &[Value]) -> Result<MultiValue, ScriptError> {
        catch_unwind(AssertUnwindSafe(|| f(self, args))).unwrap_or_else(|payload| {
            Err(ScriptError::Panic {
                function: name.to_string(),
                message: panic_message(payload.as_ref()),
            })
        })
    }
}

fn lookup_message<T: UserData>(err: LookupError) -> String {
    match err {
        LookupError::Released => format!("{} expected, got released handle", T::DESCRIPTION),
        LookupError::WrongType { found } => format!("{} expected, got {found}", T::DESCRIPTION),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Positional arguments of one native call, 1-based like the host.
pub struct Args<'a> {
    function: &'static str,
    values: &'a [Value],
}

impl<'a> Args<'a> {
    pub fn new(function: &'static str, values: &'a [Value]) -> Self {
        Self { function, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Argument `n`, or `None` past the end.
    pub fn get(&self, n: usize) -> Option<&'a Value> {
        n.checked_sub(1).and_then(|i| self.values.get(i))
    }

    pub fn error(&self, n: usize, message: impl Into<String>) -> ScriptError {
        ScriptError::Argument {
            position: n,
            function: self.function,
            message: message.into(),
        }
    }

    /// Any value, `nil` included; only a missing argument fails.
    pub fn check_any(&self, n: usize) -> Result<&'a Value, ScriptError> {
        self.get(n).ok_or_else(|| self.error(n, "value expected"))
    }

    /// A string, or a number converted to its string form.
    pub fn check_bytes(&self, n: usize) -> Result<Vec<u8>, ScriptError> {
        match self.get(n) {
            Some(Value::String(bytes)) => Ok(bytes.clone()),
            Some(v @ (Value::Integer(_) | Value::Number(_))) => Ok(v.to_script_string().into_bytes()),
            other => Err(self.type_error(n, "string", other)),
        }
    }

    pub fn check_string(&self, n: usize) -> Result<String, ScriptError> {
        self.check_bytes(n)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Like `check_bytes`, but a missing or `nil` argument is `None`.
    pub fn opt_bytes(&self, n: usize) -> Result<Option<Vec<u8>>, ScriptError> {
        match self.get(n) {
            None | Some(Value::Nil) => Ok(None),
            Some(_) => self.check_bytes(n).map(Some),
        }
    }

    pub fn opt_table(&self, n: usize) -> Result<Option<&'a Table>, ScriptError> {
        match self.get(n) {
            None | Some(Value::Nil) => Ok(None),
            Some(Value::Table(table)) => Ok(Some(table)),
            other => Err(self.type_error(n, "table", other)),
        }
    }

    fn check_handle<T: UserData>(&self, n: usize) -> Result<Handle, ScriptError> {
        match self.get(n) {
            Some(Value::Handle(handle)) => Ok(*handle),
            other => Err(self.error(
                n,
                format!(
                    "{} expected, got {}",
                    T::DESCRIPTION,
                    other.map_or("no value", Value::type_name)
                ),
            )),
        }
    }

    fn type_error(&self, n: usize, expected: &str, got: Option<&Value>) -> ScriptError {
        let got = got.map_or("no value", Value::type_name);
        self.error(n, format!("{expected} expected, got {got}"))
    }
}
