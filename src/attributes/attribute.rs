use std::any::Any;

use serde_json::Value;
use tracing::{debug, warn};

use crate::attributes::binding::Binding;
use crate::domain::{ModelError, ModelResult, NodeId, Op, Scalar, ValueType};
use crate::tree::{CallArgs, Component, Model, Recurse};

/// One of the two views of an attribute's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    /// Authoritative, commanded value.
    Internal,
    /// Observed value; mirrors internal until overridden.
    External,
}

/// Typed value cell with an internal and an external facet.
#[derive(Debug, Clone)]
pub struct Attribute {
    value_type: ValueType,
    default: Scalar,
    unit: Option<String>,
    description: Option<String>,
    internal: Scalar,
    external: Option<Scalar>,
    internal_link: Option<Binding>,
    external_link: Option<Binding>,
}

impl Default for Attribute {
    fn default() -> Self {
        Self::new(ValueType::Float, None)
    }
}

impl Attribute {
    /// `initial` is coerced later by `populate`; here it must already fit.
    pub fn new(value_type: ValueType, initial: Option<Scalar>) -> Self {
        let default = initial.unwrap_or_else(|| value_type.zero());
        Self {
            value_type,
            internal: default.clone(),
            default,
            unit: None,
            description: None,
            external: None,
            internal_link: None,
            external_link: None,
        }
    }

    pub fn value_type(&self) -> ValueType {
        self.value_type
    }

    pub fn unit(&self) -> Option<&str> {
        self.unit.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn default_value(&self) -> &Scalar {
        &self.default
    }

    pub fn internal_value(&self) -> ModelResult<Scalar> {
        match &self.internal_link {
            Some(link) => link.read()?.coerce(self.value_type),
            None => Ok(self.internal.clone()),
        }
    }

    /// Mirrors the internal value unless overridden or bound.
    pub fn external_value(&self) -> ModelResult<Scalar> {
        match (&self.external_link, &self.external) {
            (Some(link), _) => link.read()?.coerce(self.value_type),
            (None, Some(value)) => Ok(value.clone()),
            (None, None) => self.internal_value(),
        }
    }

    /// Coerce and store; clears the external override unless external is bound.
    pub fn set_internal_value(&mut self, value: &Scalar) -> ModelResult<()> {
        let value = value.coerce(self.value_type)?;
        match &self.internal_link {
            Some(link) => link.write(value)?,
            None => self.internal = value,
        }
        if !self.is_linked(Facet::External) {
            self.external = None;
        }
        Ok(())
    }

    pub fn set_external_value(&mut self, value: &Scalar) -> ModelResult<()> {
        let value = value.coerce(self.value_type)?;
        match &self.external_link {
            Some(link) => link.write(value),
            None => {
                self.external = Some(value);
                Ok(())
            }
        }
    }

    pub fn has_external_override(&self) -> bool {
        self.external.is_some()
    }

    pub fn is_linked(&self, facet: Facet) -> bool {
        match facet {
            Facet::Internal => self.internal_link.is_some(),
            Facet::External => self.external_link.is_some(),
        }
    }

    /// Bind `facet` to a host, pushing the facet's current value into it once.
    ///
    /// A host that refuses the initial push (e.g. a read-only property) is
    /// still bound.
    pub fn link(&mut self, facet: Facet, binding: Binding) -> ModelResult<()> {
        let current = match facet {
            Facet::Internal => self.internal_value()?,
            Facet::External => self.external_value()?,
        };
        if let Err(e) = binding.write(current) {
            warn!("Initial push to {:?} binding failed: {}", binding.access(), e);
        }
        match facet {
            Facet::Internal => self.internal_link = Some(binding),
            Facet::External => self.external_link = Some(binding),
        }
        Ok(())
    }

    /// Drop the binding; the local cell takes over with the host's last value.
    pub fn unlink(&mut self, facet: Facet) -> ModelResult<()> {
        match facet {
            Facet::Internal => {
                if self.internal_link.is_some() {
                    let last = self.internal_value()?;
                    self.internal_link = None;
                    self.internal = last;
                }
            }
            Facet::External => {
                if self.external_link.is_some() {
                    let last = self.external_value()?;
                    self.external_link = None;
                    self.external = Some(last);
                }
            }
        }
        Ok(())
    }

    fn configure(&mut self, model: &mut Model, id: NodeId, definition: &Value) -> ModelResult<()> {
        let mut explicit_type = None;
        let mut default = None;
        match definition {
            Value::Null => {}
            Value::Object(map) => {
                for (key, value) in map {
                    match key.as_str() {
                        "type" => {
                            let Value::String(s) = value else {
                                return Err(ModelError::malformed(
                                    model.full_path(id),
                                    "attribute type must be text",
                                ));
                            };
                            explicit_type = Some(s.parse::<ValueType>()?);
                        }
                        "default" => default = Some(value.clone()),
                        "unit" => self.unit = Some(crate::domain::value::config_text(value)),
                        "description" => {
                            self.description = Some(crate::domain::value::config_text(value))
                        }
                        "hooks" => {
                            model.create("hooks", "hooks", Some(id), value.clone())?;
                        }
                        "name" => {}
                        other => {
                            let path = model.full_path(id);
                            if model.settings().strict_fields {
                                return Err(ModelError::malformed(
                                    path,
                                    format!("cannot set undefined field '{other}'"),
                                ));
                            }
                            warn!("Ignoring undefined field '{}' on '{}'", other, path);
                        }
                    }
                }
            }
            scalar => default = Some(scalar.clone()),
        }

        let default = match default {
            None | Some(Value::Null) => None,
            Some(value) => Some(Scalar::from_config(&value).ok_or_else(|| {
                ModelError::TypeMismatch {
                    value: value.to_string(),
                    expected: "a scalar default".to_string(),
                }
            })?),
        };
        self.value_type = explicit_type
            .or_else(|| default.as_ref().map(Scalar::value_type))
            .unwrap_or(ValueType::Float);
        self.default = match default {
            Some(value) => value.coerce(self.value_type)?,
            None => self.value_type.zero(),
        };
        self.internal = self.default.clone();
        self.external = None;
        debug!(
            "Attribute {} type={} default={}",
            model.full_path(id),
            self.value_type,
            self.default
        );
        Ok(())
    }
}

impl Component for Attribute {
    fn populate(&mut self, model: &mut Model, id: NodeId, definition: &Value) -> ModelResult<()> {
        self.configure(model, id, definition)
    }

    fn lifecycle(&mut self, model: &mut Model, id: NodeId, op: Op, args: &CallArgs) -> ModelResult<bool> {
        if matches!(op, Op::Prepare | Op::Run)
            && self.has_external_override()
            && !self.is_linked(Facet::External)
            && model.is_enabled(id)?
        {
            // each cycle starts with external mirroring internal
            debug!("Clearing external override on {}", model.full_path(id));
            self.external = None;
        }
        model.propagate(id, op, args, Recurse::All)
    }

    fn field_names(&self) -> &'static [&'static str] {
        &["internal_value", "external_value"]
    }

    fn field(&self, name: &str) -> ModelResult<Option<Scalar>> {
        let value = match name {
            "internal_value" => self.internal_value()?,
            "external_value" => self.external_value()?,
            "type" => Scalar::Text(self.value_type.to_string()),
            "unit" => Scalar::Text(self.unit.clone().unwrap_or_default()),
            "description" => Scalar::Text(self.description.clone().unwrap_or_default()),
            "default" => self.default.clone(),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    fn set_field(&mut self, name: &str, value: &Scalar) -> ModelResult<bool> {
        match name {
            "internal_value" => self.set_internal_value(value)?,
            "external_value" => self.set_external_value(value)?,
            "type" | "unit" | "description" | "default" => {
                return Err(ModelError::ReadOnly {
                    node: String::new(),
                    field: name.to_string(),
                })
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
