//! Domain layer: values, node storage, type registry and errors.

pub mod arena;
pub mod error;
pub mod registry;
pub mod value;

pub use arena::{NodeId, NodeState, Op, TreeArena, TreeNode};
pub use error::{ModelError, ModelResult};
pub use registry::{TypeDescriptor, TypeRegistry};
pub use value::{Scalar, ValueType};
