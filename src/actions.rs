//! Actions: nodes that write values to attribute outputs when run.

use std::any::Any;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::attributes::Wrapper;
use crate::builder::{unique_name, ContainerBuilder};
use crate::domain::value::is_falsy;
use crate::domain::{ModelError, ModelResult, NodeId, Op, Scalar};
use crate::resolve::Reference;
use crate::tree::{value_kind, CallArgs, Component, Model, Recurse};

/// Registered name of the base action type.
pub const ACTION: &str = "Action";

const OUTPUT_KEY: &str = "output";
const FUNCTION_KEY: &str = "function";

/// Output handling shared by every action type.
///
/// Output references come from the key equal to the action's alias or from
/// `output`, as one reference or a sequence of them. Other keys are kept
/// as parameters.
#[derive(Debug, Clone)]
pub struct Action {
    alias: String,
    function: Option<String>,
    output_refs: Vec<String>,
    params: Map<String, Value>,
    outputs: IndexMap<String, Wrapper>,
}

impl Default for Action {
    fn default() -> Self {
        Self::new(ACTION)
    }
}

impl Action {
    pub fn new(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            function: None,
            output_refs: Vec::new(),
            params: Map::new(),
            outputs: IndexMap::new(),
        }
    }

    pub fn function(&self) -> Option<&str> {
        self.function.as_deref()
    }

    pub fn output_refs(&self) -> &[String] {
        &self.output_refs
    }

    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    /// Resolved outputs keyed by referenced attribute name; empty before `prepare`.
    pub fn outputs(&self) -> &IndexMap<String, Wrapper> {
        &self.outputs
    }

    fn configure(&mut self, path: &str, definition: &Value) -> ModelResult<()> {
        match definition {
            Value::Null => {}
            Value::String(_) | Value::Array(_) => self.output_refs = parse_output_refs(path, definition)?,
            Value::Object(map) => {
                // with an explicit `output`, a `function` key only names the function
                let names_function = map.contains_key(OUTPUT_KEY) || self.alias != FUNCTION_KEY;
                for (key, value) in map {
                    if key == OUTPUT_KEY {
                        self.output_refs.extend(parse_output_refs(path, value)?);
                    } else if key == FUNCTION_KEY && names_function {
                        self.function = value.as_str().map(str::to_string);
                    } else if *key == self.alias {
                        self.output_refs.extend(parse_output_refs(path, value)?);
                    } else {
                        self.params.insert(key.clone(), value.clone());
                    }
                }
            }
            other => {
                return Err(ModelError::malformed(
                    path,
                    format!("action definition cannot be {}", value_kind(other)),
                ))
            }
        }
        Ok(())
    }

    /// Resolve every output reference from `id`'s scope.
    pub fn resolve_outputs(&mut self, model: &Model, id: NodeId) -> ModelResult<()> {
        let mut outputs = IndexMap::with_capacity(self.output_refs.len());
        for raw in &self.output_refs {
            let token = match Reference::parse(raw) {
                Some(_) => raw.clone(),
                None => format!("$attr({})", raw.trim()),
            };
            let reference = Reference::parse(&token)
                .ok_or_else(|| ModelError::malformed(model.full_path(id), format!("bad output '{raw}'")))?;
            let wrapper = model
                .resolve_reference(id, &token)
                .ok_or_else(|| ModelError::not_found(format!("output '{}' of '{}'", raw, model.full_path(id))))?;
            outputs.insert(reference.target_name().to_string(), wrapper);
        }
        self.outputs = outputs;
        Ok(())
    }

    /// Write `value` to every output, resolving them first if `prepare` was skipped.
    pub fn write_outputs(&mut self, model: &mut Model, id: NodeId, value: &Scalar) -> ModelResult<()> {
        if self.outputs.len() != self.output_refs.len() {
            self.resolve_outputs(model, id)?;
        }
        for (name, wrapper) in &self.outputs {
            debug!("{} -> {} = {}", model.full_path(id), name, value);
            wrapper.set(model, value.clone())?;
        }
        Ok(())
    }

    fn base_field(&self, name: &str) -> Option<Scalar> {
        match name {
            FUNCTION_KEY => Some(Scalar::Text(self.function.clone().unwrap_or_else(|| self.alias.clone()))),
            OUTPUT_KEY => Some(Scalar::Text(self.output_refs.join(", "))),
            _ => None,
        }
    }

    fn reject_write(name: &str) -> ModelResult<bool> {
        match name {
            FUNCTION_KEY | OUTPUT_KEY => Err(ModelError::ReadOnly {
                node: String::new(),
                field: name.to_string(),
            }),
            _ => Ok(false),
        }
    }

    /// Shared lifecycle: resolve on prepare, run `execute` on run.
    fn drive<F>(&mut self, model: &mut Model, id: NodeId, op: Op, args: &CallArgs, execute: F) -> ModelResult<bool>
    where
        F: FnOnce(&mut Self, &mut Model) -> ModelResult<bool>,
    {
        if !model.is_enabled(id)? {
            return model.propagate(id, op, args, Recurse::All);
        }
        match op {
            Op::Prepare => {
                self.resolve_outputs(model, id)?;
                model.propagate(id, op, args, Recurse::All)
            }
            Op::Run => {
                let done = execute(self, model)?;
                model.propagate(id, op, args, Recurse::All)?;
                Ok(done)
            }
            _ => model.propagate(id, op, args, Recurse::All),
        }
    }
}

fn parse_output_refs(path: &str, value: &Value) -> ModelResult<Vec<String>> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.clone()),
                other => Err(ModelError::malformed(
                    path,
                    format!("output reference must be text, got {}", value_kind(other)),
                )),
            })
            .collect(),
        other => Err(ModelError::malformed(
            path,
            format!("output must be a reference or a sequence, got {}", value_kind(other)),
        )),
    }
}

impl Component for Action {
    fn populate(&mut self, model: &mut Model, id: NodeId, definition: &Value) -> ModelResult<()> {
        self.configure(&model.full_path(id), definition)
    }

    fn lifecycle(&mut self, model: &mut Model, id: NodeId, op: Op, args: &CallArgs) -> ModelResult<bool> {
        self.drive(model, id, op, args, |_, _| Ok(true))
    }

    fn field_names(&self) -> &'static [&'static str] {
        &[FUNCTION_KEY, OUTPUT_KEY]
    }

    fn field(&self, name: &str) -> ModelResult<Option<Scalar>> {
        Ok(self.base_field(name))
    }

    fn set_field(&mut self, name: &str, _value: &Scalar) -> ModelResult<bool> {
        Action::reject_write(name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Writes a literal `value` to its outputs.
#[derive(Debug, Clone)]
pub struct SetAction {
    action: Action,
    value: Option<Scalar>,
}

impl SetAction {
    pub fn new(alias: &str) -> Self {
        Self {
            action: Action::new(alias),
            value: None,
        }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn value(&self) -> Option<&Scalar> {
        self.value.as_ref()
    }
}

impl Component for SetAction {
    fn populate(&mut self, model: &mut Model, id: NodeId, definition: &Value) -> ModelResult<()> {
        let path = model.full_path(id);
        self.action.configure(&path, definition)?;
        // `value` may sit at top level or under `params`
        let raw = match self.action.params.shift_remove("value") {
            Some(v) => Some(v),
            None => self
                .action
                .params
                .get_mut("params")
                .and_then(Value::as_object_mut)
                .and_then(|p| p.shift_remove("value")),
        };
        self.value = match raw {
            None | Some(Value::Null) => None,
            Some(v) => Some(Scalar::from_config(&v).ok_or_else(|| ModelError::InvalidAssignment {
                node: path,
                key: "value".to_string(),
                kind: value_kind(&v).to_string(),
            })?),
        };
        Ok(())
    }

    #[instrument(level = "debug", skip(self, model, args))]
    fn lifecycle(&mut self, model: &mut Model, id: NodeId, op: Op, args: &CallArgs) -> ModelResult<bool> {
        let value = self.value.clone();
        self.action.drive(model, id, op, args, |action, model| {
            let Some(value) = value else {
                warn!("'{}' has no value to set", model.full_path(id));
                return Ok(false);
            };
            action.write_outputs(model, id, &value)?;
            Ok(true)
        })
    }

    fn field_names(&self) -> &'static [&'static str] {
        &[FUNCTION_KEY, OUTPUT_KEY, "value"]
    }

    fn field(&self, name: &str) -> ModelResult<Option<Scalar>> {
        if name == "value" {
            return Ok(self.value.clone());
        }
        Ok(self.action.base_field(name))
    }

    fn set_field(&mut self, name: &str, value: &Scalar) -> ModelResult<bool> {
        if name == "value" {
            self.value = Some(value.clone());
            return Ok(true);
        }
        Action::reject_write(name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Evaluates `call` and writes the result to its outputs.
#[derive(Debug, Clone)]
pub struct FunctionAction {
    action: Action,
    call: Option<String>,
    result: Option<Scalar>,
}

impl FunctionAction {
    pub fn new(alias: &str) -> Self {
        Self {
            action: Action::new(alias),
            call: None,
            result: None,
        }
    }

    pub fn action(&self) -> &Action {
        &self.action
    }

    pub fn call(&self) -> Option<&str> {
        self.call.as_deref()
    }

    /// Value produced by the last run.
    pub fn result(&self) -> Option<&Scalar> {
        self.result.as_ref()
    }
}

impl Component for FunctionAction {
    fn populate(&mut self, model: &mut Model, id: NodeId, definition: &Value) -> ModelResult<()> {
        self.action.configure(&model.full_path(id), definition)?;
        self.call = match self.action.params.shift_remove("call") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            Some(other) => {
                return Err(ModelError::InvalidAssignment {
                    node: model.full_path(id),
                    key: "call".to_string(),
                    kind: value_kind(&other).to_string(),
                })
            }
        };
        Ok(())
    }

    #[instrument(level = "debug", skip(self, model, args))]
    fn lifecycle(&mut self, model: &mut Model, id: NodeId, op: Op, args: &CallArgs) -> ModelResult<bool> {
        let call = self.call.clone();
        let mut result = None;
        let done = self.action.drive(model, id, op, args, |action, model| {
            let Some(call) = call else {
                warn!("'{}' has no call to evaluate", model.full_path(id));
                return Ok(false);
            };
            let (bound, context) = model.bind_references(id, &call, args)?;
            let value = model.evaluate(&bound, &context)?;
            action.write_outputs(model, id, &value)?;
            result = Some(value);
            Ok(true)
        })?;
        if result.is_some() {
            self.result = result;
        }
        Ok(done)
    }

    fn field_names(&self) -> &'static [&'static str] {
        &[FUNCTION_KEY, OUTPUT_KEY, "call", "result"]
    }

    fn field(&self, name: &str) -> ModelResult<Option<Scalar>> {
        match name {
            "call" => Ok(Some(Scalar::Text(self.call.clone().unwrap_or_default()))),
            "result" => Ok(self.result.clone()),
            _ => Ok(self.action.base_field(name)),
        }
    }

    fn set_field(&mut self, name: &str, value: &Scalar) -> ModelResult<bool> {
        match name {
            "call" => {
                self.call = Some(value.to_string());
                Ok(true)
            }
            "result" => Err(ModelError::ReadOnly {
                node: String::new(),
                field: name.to_string(),
            }),
            _ => Action::reject_write(name),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Sequence of actions, one per element.
///
/// In `{alias: output, param: ...}` the first key names the action and the
/// remaining keys are its parameters. Keys naming a non-action type build
/// that type the generic way; unknown keys fall back to [`Action`].
#[derive(Debug, Default, Clone)]
pub struct ActionList;

impl ActionList {
    fn build_element(model: &mut Model, id: NodeId, map: &Map<String, Value>) -> ModelResult<()> {
        let Some((alias, output)) = map.iter().next() else {
            return Ok(());
        };
        let registry = model.registry();
        let known = registry.contains(alias);
        let is_action = !known || registry.is_subtype(alias, ACTION);
        let type_alias = if known { alias.clone() } else { ACTION.to_string() };
        if !is_action {
            ContainerBuilder::generic(model, id).build(&Value::Array(vec![Value::Object(map.clone())]))?;
            return Ok(());
        }
        let mut definition = Map::new();
        definition.insert(FUNCTION_KEY.to_string(), Value::String(alias.clone()));
        definition.insert(OUTPUT_KEY.to_string(), output.clone());
        for (key, value) in map.iter().skip(1) {
            definition.insert(key.clone(), value.clone());
        }
        let name = unique_name(model, id, alias);
        model.create(&type_alias, &name, Some(id), Value::Object(definition))?;
        Ok(())
    }
}

impl Component for ActionList {
    fn populate(&mut self, model: &mut Model, id: NodeId, definition: &Value) -> ModelResult<()> {
        let items = match definition {
            Value::Null => return Ok(()),
            Value::Array(items) => items,
            other => {
                return Err(ModelError::malformed(
                    model.full_path(id),
                    format!("actions must be a sequence, got {}", value_kind(other)),
                ))
            }
        };
        for item in items {
            if is_falsy(item) {
                continue;
            }
            let Value::Object(map) = item else {
                return Err(ModelError::malformed(
                    model.full_path(id),
                    format!("action entry must be a mapping, got {}", value_kind(item)),
                ));
            };
            Self::build_element(model, id, map)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
