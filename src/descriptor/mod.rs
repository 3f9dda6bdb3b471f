#![forbid(unsafe_code)]

//! Per-interface, per-method query metadata.
//!
//! Descriptors are immutable once registered. An interface's methods are
//! grouped into one [`InterfaceDescriptor`] snapshot which the
//! [`DescriptorStore`] swaps wholesale on reload.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::binding::RESERVED_KEYS;
use crate::error::{MapperError, Result};
use crate::types::Value;

mod file;
mod store;

pub use file::{DescriptorSource, MapperFile, StaticSource};
pub use store::DescriptorStore;

/// Suffix of the row-count companion of a paginated method.
pub const COUNT_SUFFIX: &str = "$Count";
/// Suffix of the page-of-rows companion of a paginated method.
pub const PAGE_SUFFIX: &str = "$Page";

/// Declared shape of a method's result.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultShape {
    /// First row mapped to one entity, absent when empty.
    Entity,
    /// Every row mapped to an entity.
    List,
    /// First cell read as an integer count.
    Count,
    /// Untouched raw result.
    Raw,
    /// Rows of a paginated call backed by `$Count`/`$Page` companions.
    PageRows,
}

impl fmt::Display for ResultShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResultShape::Entity => "entity",
            ResultShape::List => "list",
            ResultShape::Count => "count",
            ResultShape::Raw => "raw",
            ResultShape::PageRows => "page_rows",
        };
        f.write_str(name)
    }
}

/// Registered metadata of one data-access method.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    /// Method name, unique within its interface.
    pub name: String,
    /// Query template text.
    pub text: String,
    /// Declared result shape.
    pub result: ResultShape,
    /// Method-level namespace, overriding the interface's.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    /// Placeholder names bound to positional arguments, in order.
    #[serde(default)]
    pub params: Vec<String>,
    /// Flatten `$a.b` references into plain parameters before execution.
    #[serde(default)]
    pub key_arg_replace: bool,
}

impl MethodDescriptor {
    /// Creates a descriptor with no parameters and no namespace override.
    pub fn new(name: impl Into<String>, text: impl Into<String>, result: ResultShape) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
            result,
            space: None,
            params: Vec::new(),
            key_arg_replace: false,
        }
    }

    /// Sets the ordered placeholder names.
    pub fn params<I, S>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.params = params.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the method-level namespace.
    pub fn space(mut self, space: impl Into<String>) -> Self {
        self.space = Some(space.into());
        self
    }

    /// Enables the named-parameter-safe rewrite.
    pub fn key_arg_replace(mut self, enabled: bool) -> Self {
        self.key_arg_replace = enabled;
        self
    }

    /// Summary handed to templates under the reserved method key.
    pub(crate) fn context_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), Value::from(self.name.as_str()));
        map.insert("result".to_string(), Value::from(self.result.to_string()));
        map.insert("space".to_string(), Value::from(self.space.clone()));
        map.insert(
            "params".to_string(),
            Value::List(self.params.iter().map(|p| Value::from(p.as_str())).collect()),
        );
        Value::Map(map)
    }
}

/// Immutable snapshot of every method of one interface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    /// Interface name used for dispatch.
    #[serde(rename = "interface")]
    pub name: String,
    /// Interface-level namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub space: Option<String>,
    /// Registered methods.
    #[serde(default, rename = "method")]
    pub methods: Vec<MethodDescriptor>,
}

impl InterfaceDescriptor {
    /// Creates an empty interface.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            space: None,
            methods: Vec::new(),
        }
    }

    /// Sets the interface-level namespace.
    pub fn space(mut self, space: impl Into<String>) -> Self {
        self.space = Some(space.into());
        self
    }

    /// Appends a method.
    pub fn method(mut self, method: MethodDescriptor) -> Self {
        self.methods.push(method);
        self
    }

    /// Looks a method up by name.
    pub fn method_named(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    /// Summary handed to templates under the reserved interface key.
    pub(crate) fn context_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("name".to_string(), Value::from(self.name.as_str()));
        map.insert("space".to_string(), Value::from(self.space.clone()));
        Value::Map(map)
    }

    /// Registration-time checks.
    ///
    /// Rejects empty templates, duplicate method names, parameters that
    /// shadow the reserved context keys, and paginated methods without their
    /// `$Count`/`$Page` companions.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(MapperError::Configuration("interface name is empty".into()));
        }
        let mut seen = HashSet::new();
        for method in &self.methods {
            let qualified = format!("{}.{}", self.name, method.name);
            if !seen.insert(method.name.as_str()) {
                return Err(MapperError::Configuration(format!(
                    "duplicate method '{qualified}'"
                )));
            }
            if method.text.trim().is_empty() {
                return Err(MapperError::Configuration(format!(
                    "method '{qualified}' has an empty template"
                )));
            }
            if let Some(key) = method
                .params
                .iter()
                .find(|p| RESERVED_KEYS.contains(&p.as_str()))
            {
                return Err(MapperError::Configuration(format!(
                    "parameter '{key}' of '{qualified}' collides with a reserved context key"
                )));
            }
            if method.result == ResultShape::PageRows {
                self.require_companion(method, COUNT_SUFFIX, ResultShape::Count)?;
                self.require_companion(method, PAGE_SUFFIX, ResultShape::List)?;
            }
        }
        Ok(())
    }

    fn require_companion(
        &self,
        method: &MethodDescriptor,
        suffix: &str,
        shape: ResultShape,
    ) -> Result<()> {
        let name = format!("{}{suffix}", method.name);
        match self.method_named(&name) {
            Some(companion) if companion.result != shape => Err(MapperError::Configuration(format!(
                "companion '{}.{name}' must declare result '{shape}' (found '{}')",
                self.name, companion.result
            ))),
            Some(companion) if companion.params != method.params => {
                Err(MapperError::Configuration(format!(
                    "companion '{}.{name}' must declare the same params as '{}' ({:?} vs {:?})",
                    self.name, method.name, companion.params, method.params
                )))
            }
            Some(_) => Ok(()),
            None => Err(MapperError::Configuration(format!(
                "paginated method '{}.{}' requires companion '{name}'",
                self.name, method.name
            ))),
        }
    }
}
