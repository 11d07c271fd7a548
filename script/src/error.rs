//! Hard errors raised into the script runtime.
//!
//! # Design
//! These are caller-misuse conditions, the channel distinct from the
//! `(nil, message)` returns. A script cannot branch on them the way it
//! branches on a failed dispatch; the host runtime reports them as raised
//! errors.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScriptError {
    /// An argument had the wrong type or was missing.
    #[error("bad argument #{position} to '{function}' ({message})")]
    Argument {
        position: usize,
        function: &'static str,
        message: String,
    },

    #[error("attempt to call unknown function '{0}'")]
    UnknownFunction(String),

    /// A method was called on something that has no method table.
    #[error("attempt to index a {0} value")]
    NotIndexable(&'static str),

    /// A native function panicked; the panic was stopped at the boundary.
    #[error("panic in '{function}': {message}")]
    Panic { function: String, message: String },
}
