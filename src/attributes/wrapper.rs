use crate::domain::{ModelResult, NodeId, Scalar};
use crate::tree::Model;

/// Uniform get/set handle produced by reference resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Wrapper {
    /// Internal facet of an attribute.
    Internal(NodeId),
    /// External facet of an attribute.
    External(NodeId),
    /// Plain field of any node.
    Static { node: NodeId, field: String },
}

impl Wrapper {
    pub fn node(&self) -> NodeId {
        match self {
            Wrapper::Internal(id) | Wrapper::External(id) => *id,
            Wrapper::Static { node, .. } => *node,
        }
    }

    pub fn field_name(&self) -> &str {
        match self {
            Wrapper::Internal(_) => "internal_value",
            Wrapper::External(_) => "external_value",
            Wrapper::Static { field, .. } => field,
        }
    }

    pub fn get(&self, model: &Model) -> ModelResult<Scalar> {
        model.field(self.node(), self.field_name())
    }

    pub fn set(&self, model: &mut Model, value: impl Into<Scalar>) -> ModelResult<()> {
        model.set_field(self.node(), self.field_name(), value.into())
    }
}
