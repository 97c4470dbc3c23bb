//! Guarded branches and the short-circuit chain grouping them.

use std::any::Any;

use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::builder::ContainerBuilder;
use crate::config::GuardPolicy;
use crate::domain::value::config_text;
use crate::domain::{ModelError, ModelResult, NodeId, Op, Scalar};
use crate::tree::{CallArgs, Component, Model, Recurse};

/// Definition key holding the guard when a branch is configured as a mapping.
const GUARD_KEY: &str = "condition";

/// Sub-tree that runs only when its guard holds.
///
/// A branch without a guard always holds, which is what `else` relies on.
#[derive(Debug, Default, Clone)]
pub struct Branch {
    guard: Option<String>,
}

impl Branch {
    pub fn new(guard: Option<&str>) -> Self {
        Self {
            guard: guard.map(str::to_string),
        }
    }

    pub fn guard(&self) -> Option<&str> {
        self.guard.as_deref()
    }

    /// Evaluate `text` from `id`'s scope. Failures count as false unless the
    /// strict policy sees unparseable text.
    pub fn evaluate(model: &Model, id: NodeId, text: &str, args: &CallArgs) -> ModelResult<bool> {
        let evaluator = model.evaluator();
        let (bound, context) = match model.bind_references(id, text, args) {
            Ok(bound) => bound,
            Err(e) => {
                warn!("Guard '{}' on '{}' cannot read its references: {}", text, model.full_path(id), e);
                return Ok(false);
            }
        };
        if model.settings().guard_policy == GuardPolicy::Strict {
            evaluator.check(&bound)?;
        }
        match evaluator.evaluate(&bound, &context) {
            Ok(value) => Ok(value.truthy()),
            Err(e) => {
                warn!("Guard '{}' on '{}' failed: {}", text, model.full_path(id), e);
                Ok(false)
            }
        }
    }

    fn holds(&self, model: &Model, id: NodeId, args: &CallArgs) -> ModelResult<bool> {
        match &self.guard {
            None => Ok(true),
            Some(text) => Self::evaluate(model, id, text, args),
        }
    }
}

impl Component for Branch {
    fn populate(&mut self, model: &mut Model, id: NodeId, definition: &Value) -> ModelResult<()> {
        match definition {
            Value::Null => self.guard = None,
            Value::Bool(true) => self.guard = None,
            Value::Bool(false) => self.guard = Some("false".to_string()),
            Value::String(_) | Value::Number(_) => self.guard = Some(config_text(definition)),
            Value::Object(map) => {
                self.guard = match map.get(GUARD_KEY) {
                    None | Some(Value::Null) => None,
                    Some(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => Some(config_text(v)),
                    Some(_) => {
                        return Err(ModelError::malformed(
                            model.full_path(id),
                            "branch condition must be text",
                        ))
                    }
                };
                let rest: Map<String, Value> = map
                    .iter()
                    .filter(|(k, _)| k.as_str() != GUARD_KEY)
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                if !rest.is_empty() {
                    ContainerBuilder::generic(model, id).build(&Value::Object(rest))?;
                }
            }
            Value::Array(_) => {
                return Err(ModelError::malformed(
                    model.full_path(id),
                    "branch definition must be a condition or a mapping",
                ))
            }
        }
        Ok(())
    }

    #[instrument(level = "debug", skip(self, model, args))]
    fn lifecycle(&mut self, model: &mut Model, id: NodeId, op: Op, args: &CallArgs) -> ModelResult<bool> {
        if matches!(op, Op::Prepare | Op::Run) && model.is_enabled(id)? && !self.holds(model, id, args)? {
            debug!("Branch {} not taken", model.full_path(id));
            return Ok(false);
        }
        model.propagate(id, op, args, Recurse::All)
    }

    fn field_names(&self) -> &'static [&'static str] {
        &[GUARD_KEY]
    }

    fn field(&self, name: &str) -> ModelResult<Option<Scalar>> {
        Ok(match name {
            GUARD_KEY => Some(Scalar::Text(self.guard.clone().unwrap_or_default())),
            _ => None,
        })
    }

    fn set_field(&mut self, name: &str, value: &Scalar) -> ModelResult<bool> {
        if name != GUARD_KEY {
            return Ok(false);
        }
        self.guard = match value {
            Scalar::Text(t) if t.trim().is_empty() => None,
            other => Some(other.to_string()),
        };
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Ordered group of branches; the first one that holds wins.
#[derive(Debug, Default, Clone)]
pub struct BranchChain;

impl Component for BranchChain {
    fn populate(&mut self, model: &mut Model, id: NodeId, definition: &Value) -> ModelResult<()> {
        let Value::Array(items) = definition else {
            ContainerBuilder::generic(model, id).build(definition)?;
            return Ok(());
        };
        // only non-empty mappings name a branch
        let branches: Vec<Value> = items
            .iter()
            .filter(|item| matches!(item, Value::Object(map) if !map.is_empty()))
            .cloned()
            .collect();
        ContainerBuilder::generic(model, id).build(&Value::Array(branches))?;
        Ok(())
    }

    /// Reports true whether or not a branch was taken.
    fn lifecycle(&mut self, model: &mut Model, id: NodeId, op: Op, args: &CallArgs) -> ModelResult<bool> {
        let recurse = match op {
            Op::Prepare | Op::Run => Recurse::UntilTrue,
            _ => Recurse::All,
        };
        model.propagate(id, op, args, recurse)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
