//! The component model: an arena of named nodes plus their lifecycle.

use std::any::{type_name, Any};
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::{json, Value};
use termtree::Tree;
use tracing::{debug, error, instrument, warn};

use crate::builder::ContainerBuilder;
use crate::config::Settings;
use crate::domain::{ModelError, ModelResult, NodeId, NodeState, Op, Scalar, TreeArena, TreeNode, ValueType};
use crate::domain::registry::TypeRegistry;
use crate::expr::{Evaluator, ExprEvaluator};
use crate::tree_traits::TreeNodeConvert;

/// Named values forwarded from a lifecycle call to hooks and guards.
pub type CallArgs = IndexMap<String, Scalar>;

/// How `propagate` walks the children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recurse {
    /// Visit every child.
    All,
    /// Stop after the first child reporting true.
    UntilTrue,
}

/// Result of dict-like indexing.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Child(NodeId),
    Field(Scalar),
}

/// Right-hand side of dict-like assignment.
#[derive(Debug, Clone, PartialEq)]
pub enum Assignment {
    Node(NodeId),
    Value(Value),
}

/// Behavior of one node type.
///
/// The model owns the structure (name, parent, children, state, hooks);
/// implementors own only their type-specific data.
pub trait Component: Any {
    /// Configure the node from its definition. Runs after the node is attached.
    fn populate(&mut self, model: &mut Model, id: NodeId, definition: &Value) -> ModelResult<()> {
        populate_fields(self, model, id, definition)
    }

    /// Lifecycle entry point. Override to gate or reshape recursion.
    fn lifecycle(&mut self, model: &mut Model, id: NodeId, op: Op, args: &CallArgs) -> ModelResult<bool> {
        model.propagate(id, op, args, Recurse::All)
    }

    /// Field names settable from configuration.
    fn field_names(&self) -> &'static [&'static str] {
        &[]
    }

    /// `Ok(None)` means the type has no such field.
    fn field(&self, name: &str) -> ModelResult<Option<Scalar>> {
        let _ = name;
        Ok(None)
    }

    /// `Ok(false)` means the type has no such field.
    fn set_field(&mut self, name: &str, value: &Scalar) -> ModelResult<bool> {
        let _ = (name, value);
        Ok(false)
    }

    /// Base type used when children are added to this node at runtime.
    fn build_base(&self) -> Option<&str> {
        None
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Schema-driven population: every mapping key must be a declared field.
pub fn populate_fields<C: Component + ?Sized>(
    component: &mut C,
    model: &mut Model,
    id: NodeId,
    definition: &Value,
) -> ModelResult<()> {
    let Value::Object(map) = definition else {
        return Ok(());
    };
    for (key, value) in map {
        match key.as_str() {
            // the node name comes from its position in the tree
            "name" => continue,
            "enabled" => {
                let flag = Scalar::from_config(value)
                    .ok_or_else(|| invalid_assignment(model, id, key, value))?
                    .coerce(ValueType::Boolean)?;
                model.node_mut(id)?.enabled = flag.truthy();
            }
            _ => {
                let handled = match Scalar::from_config(value) {
                    Some(scalar) => component.set_field(key, &scalar)?,
                    None if component.field_names().contains(&key.as_str()) => {
                        return Err(invalid_assignment(model, id, key, value));
                    }
                    None => false,
                };
                if !handled {
                    let path = model.full_path(id);
                    if model.settings().strict_fields {
                        return Err(ModelError::malformed(
                            path,
                            format!("cannot set undefined field '{key}'"),
                        ));
                    }
                    warn!("Ignoring undefined field '{}' on '{}'", key, path);
                }
            }
        }
    }
    Ok(())
}

fn invalid_assignment(model: &Model, id: NodeId, key: &str, value: &Value) -> ModelError {
    ModelError::InvalidAssignment {
        node: model.full_path(id),
        key: key.to_string(),
        kind: value_kind(value).to_string(),
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "text",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

/// Arena-backed component tree with its registry, evaluator and settings.
pub struct Model {
    arena: TreeArena,
    registry: Rc<TypeRegistry>,
    evaluator: Rc<dyn Evaluator>,
    settings: Settings,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("nodes", &self.arena.len())
            .field("settings", &self.settings)
            .finish()
    }
}

impl Model {
    pub fn new(registry: TypeRegistry) -> Self {
        Self::with_settings(registry, Settings::default())
    }

    pub fn with_settings(registry: TypeRegistry, settings: Settings) -> Self {
        Self {
            arena: TreeArena::new(),
            registry: Rc::new(registry),
            evaluator: Rc::new(ExprEvaluator),
            settings,
        }
    }

    pub fn set_evaluator(&mut self, evaluator: Rc<dyn Evaluator>) {
        self.evaluator = evaluator;
    }

    pub fn evaluator(&self) -> Rc<dyn Evaluator> {
        Rc::clone(&self.evaluator)
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn arena(&self) -> &TreeArena {
        &self.arena
    }

    // ------------------------------------------------------------------
    // node access
    // ------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> ModelResult<&TreeNode> {
        self.arena.get_node(id).ok_or(ModelError::StaleNode)
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> ModelResult<&mut TreeNode> {
        self.arena.get_node_mut(id).ok_or(ModelError::StaleNode)
    }

    pub fn exists(&self, id: NodeId) -> bool {
        self.arena.contains(id)
    }

    pub fn name(&self, id: NodeId) -> ModelResult<&str> {
        Ok(self.node(id)?.name.as_str())
    }

    pub fn type_name(&self, id: NodeId) -> ModelResult<&str> {
        Ok(self.node(id)?.type_name.as_str())
    }

    pub fn state(&self, id: NodeId) -> ModelResult<NodeState> {
        Ok(self.node(id)?.state)
    }

    pub fn definition(&self, id: NodeId) -> ModelResult<&Value> {
        Ok(&self.node(id)?.definition)
    }

    pub fn is_enabled(&self, id: NodeId) -> ModelResult<bool> {
        Ok(self.node(id)?.enabled)
    }

    /// Downcast the node's behavior to its concrete type.
    pub fn behavior<T: Component>(&self, id: NodeId) -> ModelResult<&T> {
        let node = self.node(id)?;
        node.behavior
            .as_deref()
            .and_then(|b| b.as_any().downcast_ref::<T>())
            .ok_or_else(|| {
                ModelError::not_found(format!("'{}' as {}", node.name, short_type_name::<T>()))
            })
    }

    pub fn behavior_mut<T: Component>(&mut self, id: NodeId) -> ModelResult<&mut T> {
        let node = self.node_mut(id)?;
        let name = node.name.clone();
        node.behavior
            .as_deref_mut()
            .and_then(|b| b.as_any_mut().downcast_mut::<T>())
            .ok_or_else(|| ModelError::not_found(format!("'{}' as {}", name, short_type_name::<T>())))
    }

    pub fn is<T: Component>(&self, id: NodeId) -> bool {
        self.behavior::<T>(id).is_ok()
    }

    // ------------------------------------------------------------------
    // construction and structure
    // ------------------------------------------------------------------

    /// Construct a node of a registered type and attach it under `parent`.
    #[instrument(level = "debug", skip(self, definition))]
    pub fn create(
        &mut self,
        alias: &str,
        name: &str,
        parent: Option<NodeId>,
        definition: Value,
    ) -> ModelResult<NodeId> {
        let registry = Rc::clone(&self.registry);
        let descriptor = registry.resolve(alias)?;
        let definition = descriptor.apply_template(definition);
        self.insert(
            &descriptor.type_name,
            name,
            parent,
            descriptor.instantiate(),
            definition,
        )
    }

    pub fn create_root(&mut self, alias: &str, name: &str, definition: Value) -> ModelResult<NodeId> {
        self.create(alias, name, None, definition)
    }

    /// Attach an explicit behavior instance, then let it populate itself.
    ///
    /// A failing `populate` frees the partially built subtree.
    pub fn insert(
        &mut self,
        type_name: &str,
        name: &str,
        parent: Option<NodeId>,
        mut behavior: Box<dyn Component>,
        definition: Value,
    ) -> ModelResult<NodeId> {
        if let Some(p) = parent {
            self.node(p)?;
            let level = self.arena.level(p) + 1;
            if level > self.settings.max_build_depth {
                return Err(ModelError::malformed(
                    format!("{}.{}", self.full_path(p), name),
                    format!("nesting exceeds max_build_depth ({})", self.settings.max_build_depth),
                ));
            }
        }

        let id = self
            .arena
            .insert_node(TreeNode::new(name, type_name, definition.clone()));
        if let Some(p) = parent {
            if let Err(e) = self.add_child(p, id) {
                self.arena.remove_node(id);
                return Err(e);
            }
        }

        let result = behavior.populate(self, id, &definition);
        if let Some(node) = self.arena.get_node_mut(id) {
            node.behavior = Some(behavior);
        }
        match result {
            Ok(()) => {
                debug!("Created {}(name={}, definition={})", type_name, name, definition);
                Ok(id)
            }
            Err(e) => {
                self.delete(id)?;
                Err(e)
            }
        }
    }

    /// Attach `child` under `parent`, replacing a same-named sibling.
    #[instrument(level = "trace", skip(self))]
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) -> ModelResult<()> {
        self.check_adoptable(parent, child)?;
        let name = self.node(child)?.name.clone();

        self.detach(child);
        let mut position = None;
        if let Some(old) = self.node(parent)?.children.get(&name).copied() {
            position = self.node(parent)?.children.get_index_of(&name);
            self.delete(old)?;
        }
        let children = &mut self.node_mut(parent)?.children;
        match position {
            Some(pos) if pos <= children.len() => {
                children.shift_insert(pos, name, child);
            }
            _ => {
                children.insert(name, child);
            }
        }
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Detach the named child and return it as an orphan.
    pub fn remove(&mut self, parent: NodeId, name: &str) -> ModelResult<Option<NodeId>> {
        let Some(child) = self.node(parent)?.children.get(name).copied() else {
            return Ok(None);
        };
        self.detach(child);
        Ok(Some(child))
    }

    /// Free `id` and its whole subtree from the arena.
    #[instrument(level = "trace", skip(self))]
    pub fn delete(&mut self, id: NodeId) -> ModelResult<()> {
        self.node(id)?;
        self.detach(id);
        let doomed: Vec<NodeId> = self.arena.iter_postorder(id).map(|(i, _)| i).collect();
        for idx in doomed {
            self.arena.remove_node(idx);
        }
        Ok(())
    }

    /// Replace-or-create one named child through the builder.
    #[instrument(level = "debug", skip(self, definition))]
    pub fn add(&mut self, parent: NodeId, name: &str, definition: Value) -> ModelResult<NodeId> {
        if let Some(old) = self.remove(parent, name)? {
            self.delete(old)?;
        }
        let base = self
            .node(parent)?
            .behavior
            .as_deref()
            .and_then(|b| b.build_base().map(str::to_string));
        let element = json!([{ name: definition }]);
        let built = match base {
            Some(base) => ContainerBuilder::filtered(self, parent, &base).build(&element)?,
            None => ContainerBuilder::generic(self, parent).build(&element)?,
        };
        built
            .first()
            .copied()
            .ok_or_else(|| ModelError::not_found(format!("child '{name}' after add")))
    }

    pub fn child(&self, parent: NodeId, name: &str) -> Option<NodeId> {
        self.arena
            .get_node(parent)
            .and_then(|n| n.children.get(name).copied())
    }

    /// Child by name, not-found error when missing.
    pub fn get(&self, parent: NodeId, name: &str) -> ModelResult<NodeId> {
        let node = self.node(parent)?;
        node.children.get(name).copied().ok_or_else(|| {
            ModelError::not_found(format!("no child named '{}' in component '{}'", name, node.name))
        })
    }

    pub fn contains(&self, parent: NodeId, name: &str) -> bool {
        self.child(parent, name).is_some()
    }

    pub fn len(&self, id: NodeId) -> usize {
        self.arena.get_node(id).map_or(0, |n| n.children.len())
    }

    pub fn is_empty(&self, id: NodeId) -> bool {
        self.len(id) == 0
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.arena
            .get_node(id)
            .map(|n| n.children.values().copied().collect())
            .unwrap_or_default()
    }

    pub fn child_names(&self, id: NodeId) -> Vec<String> {
        self.arena
            .get_node(id)
            .map(|n| n.children.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.arena.get_node(id).and_then(|n| n.parent)
    }

    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.parent(current) {
            current = parent;
        }
        current
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.parent(id);
        while let Some(p) = current {
            out.push(p);
            current = self.parent(p);
        }
        out
    }

    fn is_ancestor(&self, candidate: NodeId, of: NodeId) -> bool {
        self.ancestors(of).contains(&candidate)
    }

    /// `child` may move under `parent`: both exist and no cycle would form.
    fn check_adoptable(&self, parent: NodeId, child: NodeId) -> ModelResult<()> {
        if parent == child {
            return Err(ModelError::ConstructionConflict(format!(
                "cannot add '{}' as its own child",
                self.name(child)?
            )));
        }
        self.node(parent)?;
        let name = &self.node(child)?.name;
        if self.is_ancestor(child, parent) {
            return Err(ModelError::ConstructionConflict(format!(
                "cannot add ancestor '{}' under '{}'",
                name,
                self.full_path(parent)
            )));
        }
        Ok(())
    }

    /// Dot-joined names from the root, e.g. `root.child.grandchild`.
    pub fn full_path(&self, id: NodeId) -> String {
        let mut names: Vec<&str> = self
            .ancestors(id)
            .into_iter()
            .filter_map(|a| self.arena.get_node(a).map(|n| n.name.as_str()))
            .collect();
        names.reverse();
        if let Some(node) = self.arena.get_node(id) {
            names.push(node.name.as_str());
        }
        names.join(".")
    }

    /// Walk child names from `start`; `None` when any segment is missing.
    pub fn walk<'a>(&self, start: NodeId, segments: impl IntoIterator<Item = &'a str>) -> Option<NodeId> {
        let mut current = start;
        for seg in segments {
            current = self.child(current, seg)?;
        }
        Some(current)
    }

    pub fn hierarchy(&self, id: NodeId) -> Tree<String> {
        self.arena.to_tree_string(id)
    }

    fn detach(&mut self, child: NodeId) {
        let Some(node) = self.arena.get_node_mut(child) else {
            return;
        };
        let Some(parent) = node.parent.take() else {
            return;
        };
        let name = node.name.clone();
        if let Some(p) = self.arena.get_node_mut(parent) {
            if p.children.get(&name) == Some(&child) {
                p.children.shift_remove(&name);
            }
        }
    }

    // ------------------------------------------------------------------
    // dict-like access
    // ------------------------------------------------------------------

    /// Child lookup when `id` has children, field lookup otherwise.
    pub fn index(&self, id: NodeId, key: &str) -> ModelResult<Entry> {
        let node = self.node(id)?;
        if !node.children.is_empty() {
            return self.get(id, key).map(Entry::Child);
        }
        self.field(id, key).map(Entry::Field).map_err(|e| match e {
            ModelError::NotFound(_) => ModelError::not_found(format!(
                "component '{}' has no child or field named '{}'",
                node.name, key
            )),
            other => other,
        })
    }

    /// Attach a node, set a field, or build a child from configuration.
    #[instrument(level = "debug", skip(self, value))]
    pub fn assign(&mut self, id: NodeId, key: &str, value: Assignment) -> ModelResult<()> {
        match value {
            Assignment::Node(child) => {
                self.check_adoptable(id, child)?;
                self.detach(child);
                self.node_mut(child)?.name = key.to_string();
                self.add_child(id, child)
            }
            Assignment::Value(value) => {
                if self.has_field(id, key) {
                    let scalar = Scalar::from_config(&value)
                        .ok_or_else(|| invalid_assignment(self, id, key, &value))?;
                    return self.set_field(id, key, scalar);
                }
                match value {
                    Value::Object(_) | Value::String(_) => self.add(id, key, value).map(|_| ()),
                    other => Err(invalid_assignment(self, id, key, &other)),
                }
            }
        }
    }

    pub fn has_field(&self, id: NodeId, key: &str) -> bool {
        if matches!(key, "name" | "enabled" | "state") {
            return true;
        }
        self.arena
            .get_node(id)
            .and_then(|n| n.behavior.as_deref())
            .is_some_and(|b| b.field_names().contains(&key))
    }

    pub fn field(&self, id: NodeId, key: &str) -> ModelResult<Scalar> {
        let node = self.node(id)?;
        match key {
            "name" => Ok(Scalar::Text(node.name.clone())),
            "enabled" => Ok(Scalar::Boolean(node.enabled)),
            "state" => Ok(Scalar::Text(node.state.to_string())),
            _ => {
                let behavior = node.behavior.as_deref().ok_or_else(|| {
                    ModelError::not_found(format!("field '{}' on '{}' while it executes", key, node.name))
                })?;
                behavior.field(key)?.ok_or_else(|| {
                    ModelError::not_found(format!("field '{}' on '{}'", key, node.name))
                })
            }
        }
    }

    /// Write a field, then fire the node's `on_set` hooks.
    pub fn set_field(&mut self, id: NodeId, key: &str, value: Scalar) -> ModelResult<()> {
        match key {
            "name" | "state" => Err(ModelError::ReadOnly {
                node: self.full_path(id),
                field: key.to_string(),
            }),
            "enabled" => {
                let flag = value.coerce(ValueType::Boolean)?.truthy();
                self.set_enabled(id, flag)
            }
            _ => {
                let node = self.node_mut(id)?;
                let name = node.name.clone();
                let behavior = node.behavior.as_deref_mut().ok_or_else(|| {
                    ModelError::not_found(format!("field '{}' on '{}' while it executes", key, name))
                })?;
                match behavior.set_field(key, &value) {
                    Ok(true) => {}
                    Ok(false) => return Err(ModelError::not_found(format!("field '{key}' on '{name}'"))),
                    Err(ModelError::ReadOnly { field, .. }) => {
                        return Err(ModelError::ReadOnly {
                            node: self.full_path(id),
                            field,
                        })
                    }
                    Err(e) => return Err(e),
                }
                self.trigger_hooks(id, "on_set", &CallArgs::new());
                Ok(())
            }
        }
    }

    // ------------------------------------------------------------------
    // enable / hooks
    // ------------------------------------------------------------------

    pub fn enable(&mut self, id: NodeId) -> ModelResult<()> {
        self.set_enabled(id, true)
    }

    pub fn disable(&mut self, id: NodeId) -> ModelResult<()> {
        self.set_enabled(id, false)
    }

    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> ModelResult<()> {
        self.node_mut(id)?.enabled = enabled;
        let args = CallArgs::new();
        self.trigger_hooks(id, "on_event", &args);
        self.trigger_hooks(id, if enabled { "on_enable" } else { "on_disable" }, &args);
        Ok(())
    }

    /// Register `hook` for `event` on `id`; registering twice is a no-op.
    pub fn register_hook(&mut self, id: NodeId, event: &str, hook: NodeId) -> ModelResult<()> {
        self.node(hook)?;
        let hooks = self
            .node_mut(id)?
            .hooks
            .entry(event.to_string())
            .or_default();
        if !hooks.contains(&hook) {
            hooks.push(hook);
        }
        Ok(())
    }

    pub fn hooks(&self, id: NodeId, event: &str) -> Vec<NodeId> {
        self.arena
            .get_node(id)
            .and_then(|n| n.hooks.get(event).cloned())
            .unwrap_or_default()
    }

    /// Run every hook registered for `event`; failures are logged, never raised.
    pub fn trigger_hooks(&mut self, id: NodeId, event: &str, args: &CallArgs) {
        for hook in self.hooks(id, event) {
            if !self.exists(hook) {
                continue;
            }
            if let Err(e) = self.dispatch(hook, Op::Run, args) {
                let hook_name = self.name(hook).unwrap_or("?").to_string();
                error!("Hook '{}' on event '{}' failed: {}", hook_name, event, e);
            }
        }
    }

    // ------------------------------------------------------------------
    // lifecycle
    // ------------------------------------------------------------------

    /// Hand `op` to the node's behavior.
    #[instrument(level = "trace", skip(self, args))]
    pub fn dispatch(&mut self, id: NodeId, op: Op, args: &CallArgs) -> ModelResult<bool> {
        let node = self.node_mut(id)?;
        let Some(mut behavior) = node.behavior.take() else {
            warn!("Re-entrant {} on '{}' skipped", op, node.name);
            return Ok(false);
        };
        let result = behavior.lifecycle(self, id, op, args);
        if let Some(node) = self.arena.get_node_mut(id) {
            node.behavior = Some(behavior);
        }
        result
    }

    /// Ordinary lifecycle step: hooks, transitional state, children, terminal state.
    ///
    /// A disabled node fires its hooks and reports false without touching its
    /// subtree. Destroy ignores the enabled flag.
    pub fn propagate(&mut self, id: NodeId, op: Op, args: &CallArgs, recurse: Recurse) -> ModelResult<bool> {
        self.trigger_hooks(id, "on_event", args);
        self.trigger_hooks(id, op.hook_event(), args);

        let node = self.node(id)?;
        if !node.enabled && op != Op::Destroy {
            debug!("Component {} is disabled; skipping {}", node.name, op);
            return Ok(false);
        }
        debug!("{} {}", op, node.name);

        self.node_mut(id)?.state = op.transitional();
        for child in self.children(id) {
            let hit = self.dispatch(child, op, args)?;
            if recurse == Recurse::UntilTrue && hit {
                break;
            }
        }
        if op == Op::Destroy {
            self.detach(id);
            let node = self.node_mut(id)?;
            node.hooks.clear();
            let leftovers = std::mem::take(&mut node.children);
            for orphan in leftovers.into_values() {
                if let Some(n) = self.arena.get_node_mut(orphan) {
                    n.parent = None;
                }
            }
        }
        self.node_mut(id)?.state = op.terminal();
        Ok(true)
    }

    pub fn prepare(&mut self, id: NodeId) -> ModelResult<bool> {
        self.prepare_with(id, &CallArgs::new())
    }

    pub fn prepare_with(&mut self, id: NodeId, args: &CallArgs) -> ModelResult<bool> {
        self.dispatch(id, Op::Prepare, args)
    }

    pub fn run(&mut self, id: NodeId) -> ModelResult<bool> {
        self.run_with(id, &CallArgs::new())
    }

    pub fn run_with(&mut self, id: NodeId, args: &CallArgs) -> ModelResult<bool> {
        self.dispatch(id, Op::Run, args)
    }

    pub fn start(&mut self, id: NodeId) -> ModelResult<bool> {
        self.start_with(id, &CallArgs::new())
    }

    pub fn start_with(&mut self, id: NodeId, args: &CallArgs) -> ModelResult<bool> {
        self.dispatch(id, Op::Start, args)
    }

    pub fn pause(&mut self, id: NodeId) -> ModelResult<bool> {
        self.pause_with(id, &CallArgs::new())
    }

    pub fn pause_with(&mut self, id: NodeId, args: &CallArgs) -> ModelResult<bool> {
        self.dispatch(id, Op::Pause, args)
    }

    pub fn stop(&mut self, id: NodeId) -> ModelResult<bool> {
        self.stop_with(id, &CallArgs::new())
    }

    pub fn stop_with(&mut self, id: NodeId, args: &CallArgs) -> ModelResult<bool> {
        self.dispatch(id, Op::Stop, args)
    }

    pub fn reset(&mut self, id: NodeId) -> ModelResult<bool> {
        self.reset_with(id, &CallArgs::new())
    }

    pub fn reset_with(&mut self, id: NodeId, args: &CallArgs) -> ModelResult<bool> {
        self.dispatch(id, Op::Reset, args)
    }

    /// Destroy the subtree: states become Destroyed and all links are cleared.
    /// Slots stay in the arena until `delete`.
    pub fn destroy(&mut self, id: NodeId) -> ModelResult<bool> {
        self.destroy_with(id, &CallArgs::new())
    }

    pub fn destroy_with(&mut self, id: NodeId, args: &CallArgs) -> ModelResult<bool> {
        self.dispatch(id, Op::Destroy, args)
    }

    pub fn evaluate(&self, text: &str, context: &CallArgs) -> ModelResult<Scalar> {
        self.evaluator.evaluate(text, context)
    }
}

fn short_type_name<T>() -> &'static str {
    let full = type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
