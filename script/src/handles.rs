//! Type-tagged handle registry.
//!
//! # Design
//! Every native object a script can hold lives in one slot keyed by a random
//! `Handle`. The slot records the type name the object was registered under,
//! and every lookup checks that tag before downcasting, so a client handle
//! passed where a request is expected is reported instead of misread.
//! Dropping a slot drops the native object.

use std::any::Any;
use std::collections::HashMap;

use httpbridge_core::{Client, HttpRequest};
use log::trace;

use crate::types::Handle;

/// A native type that can be stored behind a handle.
pub trait UserData: Any {
    /// Registry tag and method-table key.
    const TYPE_NAME: &'static str;
    /// Human-readable name used in "... expected" messages.
    const DESCRIPTION: &'static str;
}

pub const REQUEST_TYPE: &str = "http_request_ud";
pub const CLIENT_TYPE: &str = "http_client_ud";

impl UserData for HttpRequest {
    const TYPE_NAME: &'static str = REQUEST_TYPE;
    const DESCRIPTION: &'static str = "http request";
}

impl UserData for Client {
    const TYPE_NAME: &'static str = CLIENT_TYPE;
    const DESCRIPTION: &'static str = "http client";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    /// The handle was released or never issued by this registry.
    Released,
    /// The slot holds a different type.
    WrongType { found: &'static str },
}

struct Slot {
    type_name: &'static str,
    value: Box<dyn Any>,
}

#[derive(Default)]
pub struct HandleRegistry {
    slots: HashMap<Handle, Slot>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move `value` into a fresh slot.
    pub fn insert<T: UserData>(&mut self, value: T) -> Handle {
        let handle = Handle::new();
        trace!("allocated {} {handle}", T::TYPE_NAME);
        self.slots.insert(
            handle,
            Slot {
                type_name: T::TYPE_NAME,
                value: Box::new(value),
            },
        );
        handle
    }

    pub fn type_name(&self, handle: Handle) -> Option<&'static str> {
        self.slots.get(&handle).map(|slot| slot.type_name)
    }

    pub fn get<T: UserData>(&self, handle: Handle) -> Result<&T, LookupError> {
        let slot = self.slots.get(&handle).ok_or(LookupError::Released)?;
        if slot.type_name != T::TYPE_NAME {
            return Err(LookupError::WrongType {
                found: slot.type_name,
            });
        }
        slot.value.downcast_ref::<T>().ok_or(LookupError::WrongType {
            found: slot.type_name,
        })
    }

    pub fn get_mut<T: UserData>(&mut self, handle: Handle) -> Result<&mut T, LookupError> {
        let slot = self.slots.get_mut(&handle).ok_or(LookupError::Released)?;
        if slot.type_name != T::TYPE_NAME {
            return Err(LookupError::WrongType {
                found: slot.type_name,
            });
        }
        let found = slot.type_name;
        slot.value
            .downcast_mut::<T>()
            .ok_or(LookupError::WrongType { found })
    }

    /// Drop the object behind `handle`. Returns false if it was already gone.
    pub fn release(&mut self, handle: Handle) -> bool {
        match self.slots.remove(&handle) {
            Some(slot) => {
                trace!("released {} {handle}", slot.type_name);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
