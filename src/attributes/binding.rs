//! Live redirection of an attribute facet to an external host object.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::domain::{ModelError, ModelResult, Scalar};

/// External object an attribute facet can be bound to.
pub trait Host {
    fn property(&self, name: &str) -> ModelResult<Scalar>;

    fn set_property(&mut self, name: &str, value: Scalar) -> ModelResult<()>;

    /// Invoke `method`; getters take no arguments, setters take one.
    fn call(&mut self, method: &str, args: &[Scalar]) -> ModelResult<Option<Scalar>> {
        let _ = args;
        Err(ModelError::Binding(format!("host has no method '{method}'")))
    }
}

pub type SharedHost = Rc<RefCell<dyn Host>>;

/// How a binding reaches into its host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostAccess {
    /// One property used for both reads and writes.
    Property(String),
    /// Zero-argument getter plus one-argument setter.
    Methods { getter: String, setter: String },
}

impl HostAccess {
    pub fn property(name: &str) -> Self {
        HostAccess::Property(name.to_string())
    }

    pub fn methods(getter: &str, setter: &str) -> Self {
        HostAccess::Methods {
            getter: getter.to_string(),
            setter: setter.to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Binding {
    host: SharedHost,
    access: HostAccess,
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding").field("access", &self.access).finish()
    }
}

impl Binding {
    pub fn new(host: SharedHost, access: HostAccess) -> Self {
        Self { host, access }
    }

    pub fn access(&self) -> &HostAccess {
        &self.access
    }

    pub fn read(&self) -> ModelResult<Scalar> {
        match &self.access {
            HostAccess::Property(name) => {
                let host = self
                    .host
                    .try_borrow()
                    .map_err(|e| ModelError::Binding(e.to_string()))?;
                host.property(name)
            }
            HostAccess::Methods { getter, .. } => {
                let mut host = self
                    .host
                    .try_borrow_mut()
                    .map_err(|e| ModelError::Binding(e.to_string()))?;
                host.call(getter, &[])?
                    .ok_or_else(|| ModelError::Binding(format!("getter '{getter}' returned nothing")))
            }
        }
    }

    pub fn write(&self, value: Scalar) -> ModelResult<()> {
        let mut host = self
            .host
            .try_borrow_mut()
            .map_err(|e| ModelError::Binding(e.to_string()))?;
        match &self.access {
            HostAccess::Property(name) => host.set_property(name, value),
            HostAccess::Methods { setter, .. } => host.call(setter, &[value]).map(|_| ()),
        }
    }
}
