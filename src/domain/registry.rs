//! Explicit type registry: alias → descriptor, with immediate supertypes.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::domain::error::{ModelError, ModelResult};
use crate::tree::Component;

pub type Factory = Rc<dyn Fn() -> Box<dyn Component>>;

/// Everything needed to construct one node type.
#[derive(Clone)]
pub struct TypeDescriptor {
    pub type_name: String,
    pub supertype: Option<String>,
    pub template: Option<Value>,
    factory: Factory,
}

impl TypeDescriptor {
    pub fn new<F, C>(type_name: &str, factory: F) -> Self
    where
        F: Fn() -> C + 'static,
        C: Component + 'static,
    {
        Self {
            type_name: type_name.to_string(),
            supertype: None,
            template: None,
            factory: Rc::new(move || Box::new(factory()) as Box<dyn Component>),
        }
    }

    pub fn extends(mut self, supertype: &str) -> Self {
        self.supertype = Some(supertype.to_string());
        self
    }

    pub fn with_template(mut self, template: Value) -> Self {
        self.template = Some(template);
        self
    }

    pub fn instantiate(&self) -> Box<dyn Component> {
        (self.factory)()
    }

    /// Provided mapping keys win over template keys; null takes the template.
    pub fn apply_template(&self, definition: Value) -> Value {
        match (&self.template, definition) {
            (Some(template), Value::Null) => template.clone(),
            (Some(Value::Object(template)), Value::Object(provided)) => {
                let mut merged = template.clone();
                for (k, v) in provided {
                    merged.insert(k, v);
                }
                Value::Object(merged)
            }
            (_, definition) => definition,
        }
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDescriptor")
            .field("type_name", &self.type_name)
            .field("supertype", &self.supertype)
            .field("template", &self.template)
            .finish()
    }
}

/// Registry constructed once and handed to the model by context.
#[derive(Debug, Default, Clone)]
pub struct TypeRegistry {
    aliases: IndexMap<String, Rc<TypeDescriptor>>,
    canonical: HashMap<String, Rc<TypeDescriptor>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `alias`. Re-registering an alias replaces it.
    #[instrument(level = "debug", skip(self, descriptor), fields(type_name = %descriptor.type_name))]
    pub fn register(&mut self, alias: &str, descriptor: TypeDescriptor) {
        let descriptor = Rc::new(descriptor);
        self.canonical
            .entry(descriptor.type_name.clone())
            .or_insert_with(|| Rc::clone(&descriptor));
        if self.aliases.insert(alias.to_string(), descriptor).is_some() {
            debug!("Replaced registration for alias '{}'", alias);
        }
    }

    /// Register one descriptor under several aliases.
    pub fn register_all(&mut self, aliases: &[&str], descriptor: TypeDescriptor) {
        for alias in aliases {
            self.register(alias, descriptor.clone());
        }
    }

    pub fn resolve(&self, alias: &str) -> ModelResult<&TypeDescriptor> {
        self.aliases
            .get(alias)
            .map(|d| d.as_ref())
            .ok_or_else(|| ModelError::not_found(format!("type '{alias}'")))
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.aliases.contains_key(alias)
    }

    /// Aliases whose immediate supertype is `base`, in registration order.
    pub fn direct_subtypes(&self, base: &str) -> Vec<(&str, &TypeDescriptor)> {
        let Ok(base) = self.resolve(base) else {
            return Vec::new();
        };
        self.aliases
            .iter()
            .filter(|(_, d)| d.supertype.as_deref() == Some(base.type_name.as_str()))
            .map(|(alias, d)| (alias.as_str(), d.as_ref()))
            .collect()
    }

    /// Reflexive, transitive subtype check over aliases.
    pub fn is_subtype(&self, alias: &str, base: &str) -> bool {
        let (Ok(start), Ok(base)) = (self.resolve(alias), self.resolve(base)) else {
            return false;
        };
        let mut current = Some(start);
        let mut hops = 0;
        while let Some(desc) = current {
            if desc.type_name == base.type_name {
                return true;
            }
            hops += 1;
            if hops > self.canonical.len() {
                // supertype cycle
                return false;
            }
            current = desc
                .supertype
                .as_deref()
                .and_then(|s| self.canonical.get(s))
                .map(|d| d.as_ref());
        }
        false
    }
}
