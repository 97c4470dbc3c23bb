//! Typed attributes with internal/external facets and host bindings.

mod attribute;
mod binding;
mod wrapper;

pub use attribute::{Attribute, Facet};
pub use binding::{Binding, Host, HostAccess, SharedHost};
pub use wrapper::Wrapper;

use crate::domain::{ModelError, ModelResult, NodeId, Scalar};
use crate::tree::Model;

/// Name of the collection node attributes live under.
pub const ATTRIBUTES: &str = "attributes";

impl Model {
    /// The attribute `name` inside the `attrs` collection.
    pub fn attribute(&self, attrs: NodeId, name: &str) -> ModelResult<NodeId> {
        let id = self.get(attrs, name)?;
        if !self.is::<Attribute>(id) {
            return Err(ModelError::not_found(format!(
                "attribute '{}' in '{}'",
                name,
                self.full_path(attrs)
            )));
        }
        Ok(id)
    }

    pub fn internal(&self, attr: NodeId) -> ModelResult<Scalar> {
        self.behavior::<Attribute>(attr)?.internal_value()
    }

    pub fn external(&self, attr: NodeId) -> ModelResult<Scalar> {
        self.behavior::<Attribute>(attr)?.external_value()
    }

    pub fn set_internal(&mut self, attr: NodeId, value: impl Into<Scalar>) -> ModelResult<()> {
        self.behavior::<Attribute>(attr)?;
        self.set_field(attr, "internal_value", value.into())
    }

    pub fn set_external(&mut self, attr: NodeId, value: impl Into<Scalar>) -> ModelResult<()> {
        self.behavior::<Attribute>(attr)?;
        self.set_field(attr, "external_value", value.into())
    }

    pub fn link_internal(&mut self, attr: NodeId, host: SharedHost, access: HostAccess) -> ModelResult<()> {
        self.behavior_mut::<Attribute>(attr)?
            .link(Facet::Internal, Binding::new(host, access))
    }

    pub fn link_external(&mut self, attr: NodeId, host: SharedHost, access: HostAccess) -> ModelResult<()> {
        self.behavior_mut::<Attribute>(attr)?
            .link(Facet::External, Binding::new(host, access))
    }

    pub fn unlink_internal(&mut self, attr: NodeId) -> ModelResult<()> {
        self.behavior_mut::<Attribute>(attr)?.unlink(Facet::Internal)
    }

    pub fn unlink_external(&mut self, attr: NodeId) -> ModelResult<()> {
        self.behavior_mut::<Attribute>(attr)?.unlink(Facet::External)
    }

    pub fn internal_wrapper(&self, attr: NodeId) -> ModelResult<Wrapper> {
        self.behavior::<Attribute>(attr)?;
        Ok(Wrapper::Internal(attr))
    }

    pub fn external_wrapper(&self, attr: NodeId) -> ModelResult<Wrapper> {
        self.behavior::<Attribute>(attr)?;
        Ok(Wrapper::External(attr))
    }

    /// Wrapper over any readable field of any node.
    pub fn static_wrapper(&self, node: NodeId, field: &str) -> ModelResult<Wrapper> {
        self.field(node, field)?;
        Ok(Wrapper::Static {
            node,
            field: field.to_string(),
        })
    }
}
