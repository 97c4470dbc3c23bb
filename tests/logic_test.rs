//! Tests for guarded branches and branch chains.

use std::any::Any;
use std::rc::Rc;

use rstest::rstest;
use serde_json::{json, Value};

use spx_model::config::{GuardPolicy, Settings};
use spx_model::domain::{ModelError, NodeState, Op, Scalar, TypeDescriptor, TypeRegistry};
use spx_model::tree::{CallArgs, Component, Model, Recurse};
use spx_model::util::testing;
use spx_model::{Branch, BranchChain, Evaluator, NodeId};

/// Accepts any configuration; records lifecycle calls.
///
/// With `outcome` configured, prepare/run report it instead of recursing.
#[derive(Debug, Default)]
struct Recorder {
    outcome: Option<bool>,
    calls: Vec<Op>,
    last_args: CallArgs,
}

impl Component for Recorder {
    fn populate(&mut self, _model: &mut Model, _id: NodeId, definition: &Value) -> spx_model::ModelResult<()> {
        self.outcome = definition.get("outcome").and_then(Value::as_bool);
        Ok(())
    }

    fn lifecycle(&mut self, model: &mut Model, id: NodeId, op: Op, args: &CallArgs) -> spx_model::ModelResult<bool> {
        self.calls.push(op);
        self.last_args = args.clone();
        match (op, self.outcome) {
            (Op::Prepare | Op::Run, Some(outcome)) => Ok(outcome),
            _ => model.propagate(id, op, args, Recurse::All),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Treats every guard as the value of `flag`, ignoring the text.
struct FlagEvaluator;

impl Evaluator for FlagEvaluator {
    fn evaluate(&self, _text: &str, context: &CallArgs) -> spx_model::ModelResult<Scalar> {
        Ok(context.get("flag").cloned().unwrap_or(Scalar::Boolean(false)))
    }
}

fn registry() -> TypeRegistry {
    testing::init_test_setup();
    let mut registry = TypeRegistry::with_builtins();
    registry.register("ActionA", TypeDescriptor::new("ActionA", Recorder::default).extends("Component"));
    registry.register("ActionB", TypeDescriptor::new("ActionB", Recorder::default).extends("Component"));
    registry
}

fn calls(model: &Model, id: NodeId) -> Vec<Op> {
    model.behavior::<Recorder>(id).unwrap().calls.clone()
}

fn chain_of(model: &mut Model, outcomes: &[bool]) -> (NodeId, Vec<NodeId>) {
    let definition: Vec<Value> = outcomes
        .iter()
        .map(|o| json!({"ActionA": {"outcome": o}}))
        .collect();
    let chain = model.create_root("conditions", "conditions", Value::Array(definition)).unwrap();
    let children = model.children(chain);
    (chain, children)
}

// ============================================================
// Chain Short-circuit Tests
// ============================================================

#[test]
fn given_second_child_true_when_chain_runs_then_third_never_called() {
    // Arrange
    let mut model = Model::new(registry());
    let (chain, children) = chain_of(&mut model, &[false, true, true]);
    let args = CallArgs::from([("foo".to_string(), Scalar::Integer(123))]);

    // Act
    let result = model.run_with(chain, &args).unwrap();

    // Assert
    assert!(result);
    assert_eq!(calls(&model, children[0]), vec![Op::Run]);
    assert_eq!(calls(&model, children[1]), vec![Op::Run]);
    assert!(calls(&model, children[2]).is_empty());
    assert_eq!(model.behavior::<Recorder>(children[0]).unwrap().last_args, args);
    assert_eq!(model.behavior::<Recorder>(children[1]).unwrap().last_args, args);
}

#[test]
fn given_no_child_true_when_chain_runs_then_all_called_and_chain_true() {
    let mut model = Model::new(registry());
    let (chain, children) = chain_of(&mut model, &[false, false]);

    assert!(model.run(chain).unwrap());

    assert_eq!(calls(&model, children[0]), vec![Op::Run]);
    assert_eq!(calls(&model, children[1]), vec![Op::Run]);
}

#[test]
fn given_second_child_true_when_chain_prepares_then_third_never_called() {
    let mut model = Model::new(registry());
    let (chain, children) = chain_of(&mut model, &[false, true, true]);

    assert!(model.prepare(chain).unwrap());

    assert_eq!(calls(&model, children[1]), vec![Op::Prepare]);
    assert!(calls(&model, children[2]).is_empty());
}

#[test]
fn given_empty_chain_when_run_and_prepare_then_true() {
    let mut model = Model::new(registry());
    let (chain, _) = chain_of(&mut model, &[]);

    assert!(model.run(chain).unwrap());
    assert!(model.prepare(chain).unwrap());
}

#[test]
fn given_chain_when_stopped_then_every_child_visited() {
    let mut model = Model::new(registry());
    let (chain, children) = chain_of(&mut model, &[true, true]);

    model.stop(chain).unwrap();

    assert_eq!(calls(&model, children[0]), vec![Op::Stop]);
    assert_eq!(calls(&model, children[1]), vec![Op::Stop]);
}

// ============================================================
// Loader Tests
// ============================================================

#[test]
fn given_branch_elements_when_loading_then_extra_keys_nest_under_branch() {
    // Arrange
    let mut model = Model::new(registry());
    let definition = json!([
        {"if": "x < y", "ActionA": {"foo": 1}, "ActionB": {"bar": 2}},
        {"else": null, "actions": [{"ActionB": {"baz": 3}}]},
        {},
        "not a dict"
    ]);

    // Act
    let chain = model.create_root("conditions", "conditions", definition).unwrap();

    // Assert
    assert_eq!(model.child_names(chain), vec!["if", "else"]);
    let first = model.get(chain, "if").unwrap();
    assert_eq!(model.type_name(first).unwrap(), "Branch");
    assert_eq!(model.definition(first).unwrap(), &json!("x < y"));
    assert_eq!(model.behavior::<Branch>(first).unwrap().guard(), Some("x < y"));
    assert_eq!(model.child_names(first), vec!["ActionA", "ActionB"]);
    let action_b = model.get(first, "ActionB").unwrap();
    assert_eq!(model.definition(action_b).unwrap(), &json!({"bar": 2}));

    let second = model.get(chain, "else").unwrap();
    assert_eq!(model.definition(second).unwrap(), &Value::Null);
    let actions = model.get(second, "actions").unwrap();
    let nested_b = model.get(actions, "ActionB").unwrap();
    assert_eq!(model.definition(nested_b).unwrap(), &json!({"baz": 3}));
}

#[test]
fn given_only_empty_or_non_mapping_elements_when_loading_then_no_children() {
    let mut model = Model::new(registry());
    let chain = model
        .create_root("conditions", "if", json!([{}, [], 123, null]))
        .unwrap();
    assert!(model.is_empty(chain));
}

#[test]
fn given_mapping_definition_when_loading_chain_then_generic_build() {
    let mut model = Model::new(registry());

    let chain = model
        .create_root("conditions", "if", json!({"ActionA": {"x": 42}, "ActionB": {"y": 99}}))
        .unwrap();

    assert!(model.is::<BranchChain>(chain));
    assert_eq!(model.child_names(chain), vec!["ActionA", "ActionB"]);
}

#[test]
fn given_nested_chain_when_loading_then_structure_preserved() {
    // Arrange
    let mut model = Model::new(registry());
    let definition = json!([
        {
            "if": "True",
            "ActionA": {"foo": 1},
            "conditions": [{"when": "False", "ActionB": {"bar": 2}, "ActionA": {"baz": 3}}],
            "ActionB": {"qux": 4}
        },
        {"else": null, "actions": [{"ActionA": {"else_foo": 5}}]}
    ]);

    // Act
    let chain = model.create_root("conditions", "", definition).unwrap();

    // Assert
    let top_if = model.get(chain, "if").unwrap();
    assert_eq!(model.child_names(top_if), vec!["ActionA", "conditions", "ActionB"]);
    let nested = model.get(top_if, "conditions").unwrap();
    assert!(model.is::<BranchChain>(nested));
    let when = model.get(nested, "when").unwrap();
    assert_eq!(model.child_names(when), vec!["ActionB", "ActionA"]);
    let qux = model.get(top_if, "ActionB").unwrap();
    assert_eq!(model.definition(qux).unwrap(), &json!({"qux": 4}));
}

// ============================================================
// Propagation Tests
// ============================================================

#[test]
fn given_taken_branch_when_prepare_and_run_then_only_its_actions_progress() {
    // Arrange
    let mut model = Model::new(registry());
    let chain = model
        .create_root(
            "conditions",
            "conditions",
            json!([
                {"if": "True", "actions": [{"ActionA": {"foo": 1}}, {"ActionB": {"bar": 2}}]},
                {"else": null, "actions": [{"ActionA": {"baz": 3}}]}
            ]),
        )
        .unwrap();
    let first_actions = model.get(model.get(chain, "if").unwrap(), "actions").unwrap();
    let second_actions = model.get(model.get(chain, "else").unwrap(), "actions").unwrap();

    // Act / Assert
    assert!(model.prepare(chain).unwrap());
    for action in model.children(first_actions) {
        assert_eq!(model.state(action).unwrap().to_string(), "PREPARED");
    }
    for action in model.children(second_actions) {
        assert_ne!(model.state(action).unwrap(), NodeState::Prepared);
    }

    assert!(model.run(chain).unwrap());
    for action in model.children(first_actions) {
        assert_eq!(model.state(action).unwrap().to_string(), "STOPPED");
    }
    for action in model.children(second_actions) {
        assert_eq!(model.state(action).unwrap(), NodeState::Initialized);
        assert!(calls(&model, action).is_empty());
    }
}

#[test]
fn given_nested_chain_when_run_then_inner_false_branch_skipped() {
    let mut model = Model::new(registry());
    let chain = model
        .create_root(
            "conditions",
            "outer",
            json!([{
                "if": "True",
                "ActionA": null,
                "conditions": [{"when": "False", "ActionB": null}],
            }]),
        )
        .unwrap();
    let top_if = model.get(chain, "if").unwrap();
    let outer_action = model.get(top_if, "ActionA").unwrap();
    let when = model.get(model.get(top_if, "conditions").unwrap(), "when").unwrap();
    let inner_action = model.get(when, "ActionB").unwrap();

    model.run(chain).unwrap();

    assert_eq!(calls(&model, outer_action), vec![Op::Run]);
    assert!(calls(&model, inner_action).is_empty());
    assert_eq!(model.state(when).unwrap(), NodeState::Initialized);
}

// ============================================================
// Guard Tests
// ============================================================

#[rstest]
#[case("if")]
#[case("when")]
#[case("case")]
#[case("ifelse")]
#[case("if_else")]
#[case("elif")]
#[case("condition")]
fn given_branch_alias_when_created_then_branch_type(#[case] alias: &str) {
    let mut model = Model::new(registry());
    let id = model.create_root(alias, alias, json!("1 < 2")).unwrap();
    assert!(model.is::<Branch>(id));
    assert_eq!(model.type_name(id).unwrap(), "Branch");
}

#[rstest]
#[case("1 < 2", true)]
#[case("1 > 2", false)]
#[case("a < b", false)]
fn given_guard_text_when_evaluating_then_result_or_false(#[case] text: &str, #[case] expected: bool) {
    let mut model = Model::new(registry());
    let id = model.create_root("if", "if", json!(text)).unwrap();
    assert_eq!(Branch::evaluate(&model, id, text, &CallArgs::new()).unwrap(), expected);
}

#[rstest]
#[case::rem_of_min_by_minus_one("(-9223372036854775807 - 1) % -1 == 0")]
#[case::rem_near_max("9223372036854775806 % 9223372036854775807 < 0")]
#[case::add_overflow("9223372036854775807 + 1 > 0")]
#[case::mul_overflow("4611686018427387904 * 2 > 0")]
#[case::neg_overflow("-(-9223372036854775807 - 1) > 0")]
#[case::rem_by_zero("5 % 0 == 0")]
fn given_integer_edge_guard_when_run_then_branch_not_taken(#[case] guard: &str) {
    // Arrange
    let mut model = Model::new(registry());
    let branch = model
        .create_root("if", "if", json!({"condition": guard, "ActionA": null}))
        .unwrap();
    let action = model.get(branch, "ActionA").unwrap();

    // Act
    let result = model.run(branch);

    // Assert
    assert!(!result.unwrap());
    assert!(calls(&model, action).is_empty());
}

#[test]
fn given_deeply_nested_guard_when_run_then_fails_closed() {
    let deep = format!("{}1{} == 1", "(".repeat(200_000), ")".repeat(200_000));
    let mut model = Model::new(registry());
    let branch = model.create_root("if", "if", json!(deep)).unwrap();

    assert!(!model.run(branch).unwrap());
}

#[test]
fn given_deeply_nested_guard_under_strict_policy_when_run_then_error() {
    let deep = format!("{}1{}", "(".repeat(10_000), ")".repeat(10_000));
    let settings = Settings {
        guard_policy: GuardPolicy::Strict,
        ..Settings::default()
    };
    let mut model = Model::with_settings(registry(), settings);
    let branch = model.create_root("if", "if", json!(deep)).unwrap();

    assert!(matches!(model.run(branch), Err(ModelError::Expression { .. })));
}

#[test]
fn given_guard_on_attributes_when_values_change_then_branch_follows() {
    // Arrange
    let mut model = Model::new(registry());
    let root = model
        .create_root(
            "Container",
            "root",
            json!({
                "attributes": {"speed": 5.0, "mode": "auto"},
                "if": {"condition": "$attr(speed) > 10 and $attr(mode) == 'auto'", "ActionA": null}
            }),
        )
        .unwrap();
    let attrs = model.get(root, "attributes").unwrap();
    let speed = model.attribute(attrs, "speed").unwrap();
    let branch = model.get(root, "if").unwrap();
    let action = model.get(branch, "ActionA").unwrap();

    // Act / Assert
    assert!(!model.run(branch).unwrap());
    assert!(calls(&model, action).is_empty());

    model.set_internal(speed, 12.5).unwrap();
    assert!(model.run(branch).unwrap());
    assert_eq!(calls(&model, action), vec![Op::Run]);
}

#[test]
fn given_guard_with_call_args_when_run_then_args_visible_to_guard() {
    let mut model = Model::new(registry());
    let branch = model.create_root("if", "if", json!("limit >= 3")).unwrap();

    let low = CallArgs::from([("limit".to_string(), Scalar::Integer(2))]);
    let high = CallArgs::from([("limit".to_string(), Scalar::Integer(3))]);

    assert!(!model.run_with(branch, &low).unwrap());
    assert!(model.run_with(branch, &high).unwrap());
}

#[test]
fn given_boolean_definitions_when_created_then_guard_fixed() {
    let mut model = Model::new(registry());
    let always = model.create_root("if", "always", json!(true)).unwrap();
    let never = model.create_root("if", "never", json!(false)).unwrap();

    assert!(model.run(always).unwrap());
    assert!(!model.run(never).unwrap());
    assert_eq!(model.state(never).unwrap(), NodeState::Initialized);
}

#[test]
fn given_sequence_definition_when_creating_branch_then_malformed() {
    let mut model = Model::new(registry());
    let result = model.create_root("if", "if", json!(["1 < 2"]));
    assert!(matches!(result, Err(ModelError::MalformedConfig { .. })));
}

#[test]
fn given_strict_policy_when_guard_unparseable_then_error() {
    let settings = Settings {
        guard_policy: GuardPolicy::Strict,
        ..Settings::default()
    };
    let mut model = Model::with_settings(registry(), settings);
    let bad = model.create_root("if", "bad", json!("foo bar")).unwrap();
    let unknown = model.create_root("if", "unknown", json!("a < b")).unwrap();

    assert!(matches!(model.run(bad), Err(ModelError::Expression { .. })));
    assert!(!model.run(unknown).unwrap(), "evaluation failures stay false");
}

#[test]
fn given_disabled_branch_when_run_then_false_without_evaluating() {
    let mut model = Model::new(registry());
    let branch = model
        .create_root("if", "if", json!({"condition": "True", "ActionA": null}))
        .unwrap();
    let action = model.get(branch, "ActionA").unwrap();
    model.disable(branch).unwrap();

    assert!(!model.run(branch).unwrap());
    assert!(calls(&model, action).is_empty());
}

#[test]
fn given_custom_evaluator_when_set_then_guards_use_it() {
    // Arrange
    let mut model = Model::new(registry());
    let branch = model
        .create_root("if", "if", json!({"condition": "1 > 2", "ActionA": null}))
        .unwrap();
    let action = model.get(branch, "ActionA").unwrap();
    let flag = CallArgs::from([("flag".to_string(), Scalar::Boolean(true))]);
    assert!(!model.run_with(branch, &flag).unwrap());

    // Act
    model.set_evaluator(Rc::new(FlagEvaluator));

    // Assert
    assert!(model.run_with(branch, &flag).unwrap());
    assert!(!model.run(branch).unwrap());
    assert_eq!(calls(&model, action), vec![Op::Run]);
}
