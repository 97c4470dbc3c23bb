//! Declarative component-tree runtime.
//!
//! A [`Model`] owns an arena of named nodes built from nested configuration
//! data. Nodes carry typed attributes with internal/external facets, refer to
//! each other through `$attr(...)`-style reference tokens, and can be gated by
//! guarded branches.

pub mod actions;
pub mod attributes;
pub mod builder;
pub mod components;
pub mod config;
pub mod domain;
pub mod expr;
pub mod hooks;
pub mod logic;
pub mod resolve;
pub mod tree;
pub mod tree_traits;
pub mod util;

pub use actions::{Action, ActionList, FunctionAction, SetAction};
pub use attributes::{Attribute, Binding, Facet, Host, HostAccess, SharedHost, Wrapper};
pub use builder::ContainerBuilder;
pub use components::{BaseComponent, Container};
pub use config::{GuardPolicy, Settings};
pub use domain::{ModelError, ModelResult, NodeId, NodeState, Op, Scalar, TypeDescriptor, TypeRegistry, ValueType};
pub use expr::{Evaluator, ExprEvaluator};
pub use hooks::Hooks;
pub use logic::{Branch, BranchChain};
pub use resolve::Reference;
pub use tree::{Assignment, CallArgs, Component, Entry, Model, Recurse};
