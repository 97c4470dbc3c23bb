//! Container turning `event -> hook type` definitions into registered hook nodes.

use std::any::Any;

use serde_json::Value;
use tracing::debug;

use crate::builder::unique_name;
use crate::domain::{ModelError, ModelResult, NodeId, Op};
use crate::tree::{value_kind, CallArgs, Component, Model, Recurse};

/// Holds hook nodes and registers them on its own parent.
///
/// Accepted shapes per event: a type name, a single-key mapping
/// `{type: definition}`, or a sequence of those.
#[derive(Debug, Default, Clone)]
pub struct Hooks;

struct HookEntry {
    event: String,
    alias: String,
    definition: Value,
}

fn parse_entries(path: &str, definition: &Value) -> ModelResult<Vec<HookEntry>> {
    let Value::Object(events) = definition else {
        return Err(ModelError::malformed(
            path,
            format!("hooks must map event names to hooks, got {}", value_kind(definition)),
        ));
    };
    let mut entries = Vec::new();
    for (event, entry) in events {
        let items = match entry {
            Value::String(_) | Value::Object(_) => std::slice::from_ref(entry),
            Value::Array(items) => items.as_slice(),
            other => {
                return Err(ModelError::malformed(
                    path,
                    format!("hook '{}' expects text, mapping or sequence, got {}", event, value_kind(other)),
                ))
            }
        };
        for item in items {
            let (alias, definition) = match item {
                Value::String(alias) => (alias.clone(), Value::Null),
                Value::Object(map) if map.len() == 1 => match map.iter().next() {
                    Some((alias, def)) => (alias.clone(), def.clone()),
                    None => continue,
                },
                other => {
                    return Err(ModelError::malformed(
                        path,
                        format!("invalid entry for hook '{event}': {other}"),
                    ))
                }
            };
            entries.push(HookEntry {
                event: event.clone(),
                alias,
                definition,
            });
        }
    }
    Ok(entries)
}

impl Component for Hooks {
    fn populate(&mut self, model: &mut Model, id: NodeId, definition: &Value) -> ModelResult<()> {
        let entries = parse_entries(&model.full_path(id), definition)?;
        let owner = model.parent(id);
        for entry in entries {
            let name = unique_name(model, id, &entry.alias);
            let hook = model.create(&entry.alias, &name, Some(id), entry.definition)?;
            match owner {
                Some(owner) => model.register_hook(owner, &entry.event, hook)?,
                None => debug!("Hook '{}' has no owner to register on", name),
            }
        }
        Ok(())
    }

    /// Hook nodes run only when triggered; only destroy reaches them.
    fn lifecycle(&mut self, model: &mut Model, id: NodeId, op: Op, args: &CallArgs) -> ModelResult<bool> {
        match op {
            Op::Destroy => model.propagate(id, op, args, Recurse::All),
            _ => Ok(true),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
