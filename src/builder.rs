//! Turns nested configuration data into typed child nodes.

use serde_json::{Map, Value};
use tracing::{instrument, trace};

use crate::domain::value::{config_text, is_falsy};
use crate::domain::{ModelError, ModelResult, NodeId};
use crate::tree::Model;

/// Type used for scalar elements when no base type is given.
pub const FALLBACK_TYPE: &str = "Component";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Origin {
    Mapping,
    Sequence,
}

/// Builds children under one parent, in generic or filtered mode.
///
/// Generic mode requires every key to be a registered type. Filtered mode
/// accepts keys naming a subtype of `base` and falls back to `base` itself
/// for anything else, carrying the key's value as configuration.
pub struct ContainerBuilder<'m> {
    model: &'m mut Model,
    parent: NodeId,
    base: Option<String>,
}

impl<'m> ContainerBuilder<'m> {
    pub fn generic(model: &'m mut Model, parent: NodeId) -> Self {
        Self {
            model,
            parent,
            base: None,
        }
    }

    pub fn filtered(model: &'m mut Model, parent: NodeId, base: &str) -> Self {
        Self {
            model,
            parent,
            base: Some(base.to_string()),
        }
    }

    /// Build `config` under the parent and return the top-level children created.
    #[instrument(level = "debug", skip(self, config), fields(base = ?self.base))]
    pub fn build(&mut self, config: &Value) -> ModelResult<Vec<NodeId>> {
        if let Some(base) = &self.base {
            if !self.model.registry().contains(base) {
                return Err(ModelError::UnregisteredBase(base.clone()));
            }
        }
        let parent = self.parent;
        match config {
            Value::Null => Ok(Vec::new()),
            Value::Object(map) => self.build_mapping(parent, map),
            Value::Array(items) => self.build_sequence(parent, items),
            scalar => {
                let alias = self.scalar_type().to_string();
                let name = unique_name(self.model, parent, &alias);
                let child = self.model.create(&alias, &name, Some(parent), scalar.clone())?;
                Ok(vec![child])
            }
        }
    }

    fn build_mapping(&mut self, parent: NodeId, map: &Map<String, Value>) -> ModelResult<Vec<NodeId>> {
        let mut created = Vec::with_capacity(map.len());
        for (key, value) in map {
            created.push(self.build_entry(parent, key, value, Origin::Mapping)?);
        }
        Ok(created)
    }

    fn build_sequence(&mut self, parent: NodeId, items: &[Value]) -> ModelResult<Vec<NodeId>> {
        let mut created = Vec::with_capacity(items.len());
        for item in items {
            if is_falsy(item) {
                trace!("Skipping empty element {}", item);
                continue;
            }
            match item {
                Value::Object(map) => {
                    let mut entries = map.iter();
                    let Some((key, value)) = entries.next() else {
                        continue;
                    };
                    let child = self.build_entry(parent, key, value, Origin::Sequence)?;
                    // remaining keys nest under the first child, not beside it
                    let rest: Map<String, Value> =
                        entries.map(|(k, v)| (k.clone(), v.clone())).collect();
                    if !rest.is_empty() {
                        self.build_mapping(child, &rest)?;
                    }
                    created.push(child);
                }
                Value::Array(_) => {
                    return Err(ModelError::malformed(
                        self.model.full_path(parent),
                        "nested sequence cannot name a child",
                    ));
                }
                scalar => {
                    let alias = self.scalar_type().to_string();
                    let name = unique_name(self.model, parent, &config_text(scalar));
                    let definition = match scalar {
                        Value::String(_) => Value::Null,
                        other => other.clone(),
                    };
                    created.push(self.model.create(&alias, &name, Some(parent), definition)?);
                }
            }
        }
        Ok(created)
    }

    fn build_entry(&mut self, parent: NodeId, key: &str, value: &Value, origin: Origin) -> ModelResult<NodeId> {
        let registry = self.model.registry();
        let alias = match &self.base {
            None if registry.contains(key) => key.to_string(),
            None => {
                let parent = self.model.full_path(parent);
                return Err(match origin {
                    Origin::Mapping => ModelError::UnknownTypeInMapping {
                        key: key.to_string(),
                        parent,
                    },
                    Origin::Sequence => ModelError::UnknownTypeInSequence {
                        key: key.to_string(),
                        parent,
                    },
                });
            }
            Some(base) if registry.is_subtype(key, base) => key.to_string(),
            Some(base) => base.clone(),
        };
        let name = unique_name(self.model, parent, key);
        self.model.create(&alias, &name, Some(parent), value.clone())
    }

    fn scalar_type(&self) -> &str {
        self.base.as_deref().unwrap_or(FALLBACK_TYPE)
    }
}

/// `key`, or `key_1`, `key_2`, ... when a sibling already holds the name.
pub(crate) fn unique_name(model: &Model, parent: NodeId, key: &str) -> String {
    if !model.contains(parent, key) {
        return key.to_string();
    }
    (1..)
        .map(|n| format!("{key}_{n}"))
        .find(|candidate| !model.contains(parent, candidate))
        .unwrap_or_else(|| key.to_string())
}
