//! Plain node types and the built-in registry.

use std::any::Any;

use serde_json::Value;

use crate::actions::{Action, ActionList, FunctionAction, SetAction, ACTION};
use crate::attributes::Attribute;
use crate::builder::ContainerBuilder;
use crate::domain::{ModelResult, NodeId, TypeDescriptor, TypeRegistry};
use crate::hooks::Hooks;
use crate::logic::{Branch, BranchChain};
use crate::tree::{Component, Model};

/// Node with no behavior beyond the shared structure and lifecycle.
#[derive(Debug, Default, Clone)]
pub struct BaseComponent;

impl Component for BaseComponent {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Node whose definition is built into children.
#[derive(Debug, Default, Clone)]
pub struct Container {
    base: Option<String>,
}

impl Container {
    pub fn generic() -> Self {
        Self { base: None }
    }

    /// Children restricted to subtypes of `base`, falling back to `base`.
    pub fn filtered(base: &str) -> Self {
        Self {
            base: Some(base.to_string()),
        }
    }

    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }
}

impl Component for Container {
    fn populate(&mut self, model: &mut Model, id: NodeId, definition: &Value) -> ModelResult<()> {
        build_children(model, id, self.base.as_deref(), definition).map(|_| ())
    }

    fn build_base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

pub fn build_children(
    model: &mut Model,
    parent: NodeId,
    base: Option<&str>,
    definition: &Value,
) -> ModelResult<Vec<NodeId>> {
    match base {
        Some(base) => ContainerBuilder::filtered(model, parent, base).build(definition),
        None => ContainerBuilder::generic(model, parent).build(definition),
    }
}

impl TypeRegistry {
    /// Registry preloaded with every built-in type and its aliases.
    pub fn with_builtins() -> Self {
        let mut r = Self::new();
        r.register("Component", TypeDescriptor::new("Component", BaseComponent::default));
        r.register(
            "Container",
            TypeDescriptor::new("Container", Container::generic).extends("Component"),
        );
        r.register_all(
            &["attributes", "Attributes"],
            TypeDescriptor::new("Attributes", || Container::filtered("Attribute")).extends("Container"),
        );
        r.register(
            "Attribute",
            TypeDescriptor::new("Attribute", Attribute::default).extends("Component"),
        );
        r.register_all(
            &["hooks", "Hooks"],
            TypeDescriptor::new("Hooks", Hooks::default).extends("Container"),
        );
        r.register_all(
            &["conditions", "Conditions", "if_chain"],
            TypeDescriptor::new("BranchChain", BranchChain::default).extends("Container"),
        );
        r.register_all(
            &["if", "when", "case", "ifelse", "if_else", "elif", "condition", "Condition"],
            TypeDescriptor::new("Branch", Branch::default).extends("Container"),
        );
        r.register("else", TypeDescriptor::new("Branch", Branch::default).extends("Container"));
        r.register_all(
            &["actions", "Actions"],
            TypeDescriptor::new("Actions", ActionList::default).extends("Container"),
        );
        r.register(ACTION, TypeDescriptor::new(ACTION, Action::default).extends("Component"));
        r.register_all(
            &["set", "Set"],
            TypeDescriptor::new("SetAction", || SetAction::new("set")).extends(ACTION),
        );
        r.register_all(
            &["function", "Function"],
            TypeDescriptor::new("FunctionAction", || FunctionAction::new("function")).extends(ACTION),
        );
        r
    }
}
