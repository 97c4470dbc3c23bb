//! Tests for the component tree: structure, dict-like access, hooks and lifecycle.

use std::any::Any;

use serde_json::{json, Value};

use spx_model::domain::{ModelError, NodeState, Op, Scalar, TypeDescriptor, TypeRegistry};
use spx_model::tree::{Assignment, CallArgs, Component, Entry, Model, Recurse};
use spx_model::util::testing;

/// Records lifecycle calls and reports a preset outcome for prepare/run.
#[derive(Debug, Default)]
struct Recorder {
    outcome: bool,
    calls: Vec<Op>,
    last_args: CallArgs,
}

impl Component for Recorder {
    fn lifecycle(&mut self, model: &mut Model, id: spx_model::NodeId, op: Op, args: &CallArgs) -> spx_model::ModelResult<bool> {
        self.calls.push(op);
        self.last_args = args.clone();
        match op {
            Op::Prepare | Op::Run => Ok(self.outcome),
            _ => model.propagate(id, op, args, Recurse::All),
        }
    }

    fn field_names(&self) -> &'static [&'static str] {
        &["outcome"]
    }

    fn field(&self, name: &str) -> spx_model::ModelResult<Option<Scalar>> {
        Ok((name == "outcome").then_some(Scalar::Boolean(self.outcome)))
    }

    fn set_field(&mut self, name: &str, value: &Scalar) -> spx_model::ModelResult<bool> {
        if name != "outcome" {
            return Ok(false);
        }
        self.outcome = value.truthy();
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn setup() -> (Model, spx_model::NodeId) {
    testing::init_test_setup();
    let mut registry = TypeRegistry::with_builtins();
    registry.register("Recorder", TypeDescriptor::new("Recorder", Recorder::default).extends("Component"));
    let mut model = Model::new(registry);
    let root = model.create_root("Container", "root", Value::Null).unwrap();
    (model, root)
}

fn recorded_calls(model: &Model, id: spx_model::NodeId) -> Vec<Op> {
    model.behavior::<Recorder>(id).unwrap().calls.clone()
}

// ============================================================
// Lifecycle Tests
// ============================================================

#[test]
fn given_enabled_tree_when_prepare_then_children_prepared_in_order() {
    // Arrange
    let (mut model, root) = setup();
    let a = model.create("Container", "a", Some(root), json!({"Component": null})).unwrap();
    let leaf = model.get(a, "Component").unwrap();

    // Act
    let result = model.prepare(root).unwrap();

    // Assert
    assert!(result);
    assert_eq!(model.state(root).unwrap(), NodeState::Prepared);
    assert_eq!(model.state(a).unwrap(), NodeState::Prepared);
    assert_eq!(model.state(leaf).unwrap(), NodeState::Prepared);
}

#[test]
fn given_run_when_finished_then_state_is_stopped() {
    let (mut model, root) = setup();
    assert!(model.run(root).unwrap());
    assert_eq!(model.state(root).unwrap(), NodeState::Stopped);
    assert_eq!(model.state(root).unwrap().to_string(), "STOPPED");
}

#[test]
fn given_disabled_node_when_prepare_then_false_and_subtree_untouched() {
    // Arrange
    let (mut model, root) = setup();
    let hook = model.create("Recorder", "hook", None, Value::Null).unwrap();
    let branch = model.create("Container", "branch", Some(root), json!({"Component": null})).unwrap();
    let leaf = model.get(branch, "Component").unwrap();
    model.register_hook(branch, "on_prepare", hook).unwrap();
    model.disable(branch).unwrap();

    // Act
    let result = model.prepare(branch).unwrap();

    // Assert
    assert!(!result);
    assert_eq!(model.state(branch).unwrap(), NodeState::Initialized);
    assert_eq!(model.state(leaf).unwrap(), NodeState::Initialized);
    assert_eq!(recorded_calls(&model, hook), vec![Op::Run], "hook fires even when disabled");
}

#[test]
fn given_disabled_child_when_parent_runs_then_only_child_skipped() {
    let (mut model, root) = setup();
    let on = model.create("Component", "on", Some(root), Value::Null).unwrap();
    let off = model.create("Component", "off", Some(root), json!({"enabled": false})).unwrap();

    assert!(model.run(root).unwrap());

    assert_eq!(model.state(on).unwrap(), NodeState::Stopped);
    assert_eq!(model.state(off).unwrap(), NodeState::Initialized);
}

#[test]
fn given_subtree_when_destroy_then_destroyed_and_detached() {
    // Arrange
    let (mut model, root) = setup();
    let a = model.create("Container", "a", Some(root), json!({"Component": null})).unwrap();
    let leaf = model.get(a, "Component").unwrap();
    model.disable(a).unwrap();

    // Act
    let result = model.destroy(a).unwrap();

    // Assert
    assert!(result, "destroy ignores the enabled flag");
    assert_eq!(model.state(a).unwrap(), NodeState::Destroyed);
    assert_eq!(model.state(leaf).unwrap(), NodeState::Destroyed);
    assert!(!model.contains(root, "a"));
    assert_eq!(model.parent(a), None);
    assert!(model.is_empty(a));
}

#[test]
fn given_lifecycle_args_when_run_then_forwarded_to_children() {
    let (mut model, root) = setup();
    let recorder = model.create("Recorder", "p", Some(root), json!({"outcome": true})).unwrap();
    let args = CallArgs::from([("speed".to_string(), Scalar::Float(3.5))]);

    model.run_with(root, &args).unwrap();

    assert_eq!(model.behavior::<Recorder>(recorder).unwrap().last_args, args);
}

#[test]
fn given_until_true_when_propagating_then_stops_after_first_hit() {
    let (mut model, root) = setup();
    let p1 = model.create("Recorder", "p1", Some(root), json!({"outcome": false})).unwrap();
    let p2 = model.create("Recorder", "p2", Some(root), json!({"outcome": true})).unwrap();
    let p3 = model.create("Recorder", "p3", Some(root), json!({"outcome": true})).unwrap();

    model.propagate(root, Op::Run, &CallArgs::new(), Recurse::UntilTrue).unwrap();

    assert_eq!(recorded_calls(&model, p1), vec![Op::Run]);
    assert_eq!(recorded_calls(&model, p2), vec![Op::Run]);
    assert!(recorded_calls(&model, p3).is_empty());
}

// ============================================================
// Hook Tests
// ============================================================

#[test]
fn given_hooks_when_lifecycle_runs_then_on_event_and_specific_hooks_fire() {
    let (mut model, root) = setup();
    let generic = model.create("Recorder", "generic", None, Value::Null).unwrap();
    let specific = model.create("Recorder", "specific", None, Value::Null).unwrap();
    model.register_hook(root, "on_event", generic).unwrap();
    model.register_hook(root, "on_start", specific).unwrap();
    model.register_hook(root, "on_start", specific).unwrap();

    model.start(root).unwrap();
    model.stop(root).unwrap();

    assert_eq!(model.hooks(root, "on_start"), vec![specific]);
    assert_eq!(recorded_calls(&model, generic).len(), 2);
    assert_eq!(recorded_calls(&model, specific).len(), 1);
}

#[test]
fn given_failing_hook_when_triggered_then_remaining_hooks_still_run() {
    // Arrange
    let (mut model, root) = setup();
    let failing = model
        .create("function", "failing", None, json!({"call": "1 / 0"}))
        .unwrap();
    let recorder = model.create("Recorder", "recorder", None, Value::Null).unwrap();
    model.register_hook(root, "on_run", failing).unwrap();
    model.register_hook(root, "on_run", recorder).unwrap();

    // Act
    let result = model.run(root);

    // Assert
    assert_eq!(result, Ok(true));
    assert_eq!(recorded_calls(&model, recorder), vec![Op::Run]);
}

#[test]
fn given_enable_toggle_when_set_then_enable_hooks_fire() {
    let (mut model, root) = setup();
    let on_disable = model.create("Recorder", "d", None, Value::Null).unwrap();
    model.register_hook(root, "on_disable", on_disable).unwrap();

    model.disable(root).unwrap();
    model.enable(root).unwrap();

    assert_eq!(recorded_calls(&model, on_disable).len(), 1);
    assert!(model.is_enabled(root).unwrap());
}

// ============================================================
// Dict-like Access Tests
// ============================================================

#[test]
fn given_node_with_children_when_indexing_then_child_or_not_found() {
    let (mut model, root) = setup();
    let child = model.create("Component", "child", Some(root), Value::Null).unwrap();

    assert_eq!(model.index(root, "child").unwrap(), Entry::Child(child));
    assert!(matches!(model.index(root, "missing"), Err(ModelError::NotFound(_))));
}

#[test]
fn given_leaf_when_indexing_then_field_or_not_found() {
    let (mut model, root) = setup();
    let recorder = model.create("Recorder", "p", Some(root), json!({"outcome": true})).unwrap();

    assert_eq!(model.index(recorder, "outcome").unwrap(), Entry::Field(Scalar::Boolean(true)));
    assert_eq!(model.index(recorder, "name").unwrap(), Entry::Field(Scalar::from("p")));
    assert!(matches!(model.index(recorder, "nope"), Err(ModelError::NotFound(_))));
}

#[test]
fn given_mapping_value_when_assigning_unknown_key_then_child_built() {
    let (mut model, root) = setup();

    model
        .assign(root, "Container", Assignment::Value(json!({"Component": null})))
        .unwrap();

    let built = model.get(root, "Container").unwrap();
    assert_eq!(model.type_name(built).unwrap(), "Container");
    assert_eq!(model.child_names(built), vec!["Component"]);
}

#[test]
fn given_field_when_assigning_value_then_set_and_read_only_rejected() {
    let (mut model, root) = setup();
    let recorder = model.create("Recorder", "p", Some(root), Value::Null).unwrap();

    model.assign(recorder, "outcome", Assignment::Value(json!(true))).unwrap();
    let read_only = model.assign(recorder, "name", Assignment::Value(json!("other")));

    assert_eq!(model.field(recorder, "outcome").unwrap(), Scalar::Boolean(true));
    assert!(matches!(read_only, Err(ModelError::ReadOnly { .. })));
}

#[test]
fn given_number_for_unknown_key_when_assigning_then_invalid_assignment() {
    let (mut model, root) = setup();
    let result = model.assign(root, "whatever", Assignment::Value(json!(42)));
    assert!(matches!(result, Err(ModelError::InvalidAssignment { .. })));
}

#[test]
fn given_orphan_node_when_assigning_under_key_then_renamed_and_attached() {
    let (mut model, root) = setup();
    let orphan = model.create("Component", "orphan", None, Value::Null).unwrap();

    model.assign(root, "adopted", Assignment::Node(orphan)).unwrap();

    assert_eq!(model.get(root, "adopted").unwrap(), orphan);
    assert_eq!(model.full_path(orphan), "root.adopted");
}

#[test]
fn given_ancestor_node_when_assigning_under_descendant_then_conflict_and_tree_unchanged() {
    // Arrange
    let (mut model, root) = setup();
    let middle = model.create("Component", "middle", Some(root), Value::Null).unwrap();
    let leaf = model.create("Component", "leaf", Some(middle), Value::Null).unwrap();

    // Act
    let onto_self = model.assign(middle, "again", Assignment::Node(middle));
    let onto_leaf = model.assign(leaf, "loop", Assignment::Node(middle));

    // Assert
    assert!(matches!(onto_self, Err(ModelError::ConstructionConflict(_))));
    assert!(matches!(onto_leaf, Err(ModelError::ConstructionConflict(_))));
    assert_eq!(model.parent(middle), Some(root));
    assert_eq!(model.get(root, "middle").unwrap(), middle);
    assert_eq!(model.full_path(leaf), "root.middle.leaf");
}

#[test]
fn given_child_when_removed_then_orphan_returned_and_still_alive() {
    let (mut model, root) = setup();
    let child = model.create("Component", "child", Some(root), Value::Null).unwrap();

    let removed = model.remove(root, "child").unwrap();

    assert_eq!(removed, Some(child));
    assert!(model.exists(child));
    assert_eq!(model.parent(child), None);
    assert_eq!(model.remove(root, "child").unwrap(), None);
}

#[test]
fn given_existing_child_when_add_then_replaced() {
    let (mut model, root) = setup();
    let old = model.create("Component", "Component", Some(root), Value::Null).unwrap();

    let new = model.add(root, "Component", json!({"enabled": false})).unwrap();

    assert_ne!(old, new);
    assert!(!model.exists(old));
    assert!(!model.is_enabled(new).unwrap());
    assert_eq!(model.len(root), 1);
}

#[test]
fn given_tree_when_rendering_hierarchy_then_names_nested() {
    let (mut model, root) = setup();
    model
        .create("Container", "a", Some(root), json!({"Component": null}))
        .unwrap();

    let rendered = model.hierarchy(root).to_string();

    assert_eq!(rendered, "root\n└── a\n    └── Component\n");
}
