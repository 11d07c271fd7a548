//! Script-visible values.
//!
//! # Design
//! `Value` is the small value model the bridge needs from the host runtime:
//! scalars, byte strings, string-keyed tables and opaque handles. Tables are
//! shared references like the host's own tables, so a table stored inside
//! another is the same table, not a copy. Equality on tables compares
//! contents, which is what callers inspecting a response want.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use uuid::Uuid;

/// Values returned from a native function, in order.
pub type MultiValue = Vec<Value>;

/// Opaque reference to a native object owned by the handle registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    id: Uuid,
}

impl Handle {
    pub(crate) fn new() -> Self {
        Self { id: Uuid::new_v4() }
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "userdata: {}", self.id)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Table {
    fields: Rc<RefCell<BTreeMap<String, Value>>>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing what was there.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.fields.borrow_mut().insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.fields.borrow().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.fields.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.borrow().is_empty()
    }

    pub fn keys(&self) -> Vec<String> {
        self.fields.borrow().keys().cloned().collect()
    }

    fn address(&self) -> *const () {
        Rc::as_ptr(&self.fields).cast()
    }
}

impl PartialEq for Table {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.fields, &other.fields) || *self.fields.borrow() == *other.fields.borrow()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Table {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let table = Table::new();
        for (key, value) in iter {
            table.set(key, value);
        }
        table
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    /// Raw bytes; script strings are not required to be UTF-8.
    String(Vec<u8>),
    Table(Table),
    Handle(Handle),
}

impl Value {
    /// Host type name, as used in argument error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) | Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Table(_) => "table",
            Value::Handle(_) => "userdata",
        }
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::String(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(table) => Some(table),
            _ => None,
        }
    }

    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Value::Handle(handle) => Some(*handle),
            _ => None,
        }
    }

    /// String form of any value.
    ///
    /// Never fails: setters that take "stringable" arguments pass whatever
    /// the script gave them through this, so `header_set(h, "X", 42)` sets
    /// `X: 42` and `header_set(h, "X", nil)` sets `X: nil`. Floats print with
    /// 14 significant digits (`0.1 + 0.2` is `0.3`). Byte strings that are not
    /// UTF-8 are converted lossily.
    pub fn to_script_string(&self) -> String {
        match self {
            Value::Nil => "nil".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Number(n) => format_number(*n),
            Value::String(bytes) => String::from_utf8_lossy(bytes).into_owned(),
            Value::Table(table) => format!("table: {:p}", table.address()),
            Value::Handle(handle) => handle.to_string(),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "nan".to_string()
    } else if n == f64::INFINITY {
        "inf".to_string()
    } else if n == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format_significant(n, 14)
    }
}

/// C's `%.<digits>g`: fixed notation unless the exponent is below -4 or at
/// least `digits`, trailing zeros dropped, exponent signed with two digits.
fn format_significant(n: f64, digits: usize) -> String {
    let sci = format!("{:.*e}", digits - 1, n);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);

    if exp < -4 || exp >= digits as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs())
    } else {
        let decimals = (digits as i32 - 1 - exp) as usize;
        trim_fraction(&format!("{n:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.as_bytes().to_vec())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into_bytes())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::String(bytes)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<Table> for Value {
    fn from(table: Table) -> Self {
        Value::Table(table)
    }
}

impl From<Handle> for Value {
    fn from(handle: Handle) -> Self {
        Value::Handle(handle)
    }
}

/// `[nil, message]`: the failure half of the two-value return convention.
pub fn nil_error(err: impl fmt::Display) -> MultiValue {
    vec![Value::Nil, Value::from(err.to_string())]
}
