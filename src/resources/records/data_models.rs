//! Data modeling records: spaces, containers, views and data models.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::{string_or_number, Extra, Resource};
use crate::resources::identifier::Identifier;

/// A data modeling space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Space {
    /// Space name.
    pub space: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Resource for Space {
    fn identifier(&self) -> Identifier {
        Identifier::space(&self.space)
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}

/// What instances a container may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UsedFor {
    /// Nodes only.
    Node,
    /// Edges only.
    Edge,
    /// Nodes and edges.
    All,
}

/// Reference to a container.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerReference {
    /// Owning space.
    pub space: String,
    /// External id.
    pub external_id: String,
    /// Reference type, always `container`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ref_type: Option<String>,
}

impl ContainerReference {
    /// Identifier of the referenced container.
    #[must_use]
    pub fn identifier(&self) -> Identifier {
        Identifier::Container {
            space: self.space.clone(),
            external_id: self.external_id.clone(),
        }
    }
}

/// Reference to a view.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewReference {
    /// Owning space.
    pub space: String,
    /// External id.
    pub external_id: String,
    /// Version.
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,
    /// Reference type, always `view`.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ref_type: Option<String>,
}

impl ViewReference {
    /// Identifier of the referenced view.
    #[must_use]
    pub fn identifier(&self) -> Identifier {
        Identifier::View {
            space: self.space.clone(),
            external_id: self.external_id.clone(),
            version: self.version.clone(),
        }
    }

    fn fill_defaults(&mut self) {
        self.ref_type.get_or_insert_with(|| String::from("view"));
    }
}

/// Type of a container property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyType {
    /// Type name, e.g. `text`, `int64` or `direct`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Whether the property holds a list of values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<bool>,
    /// Collation of text values.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collation: Option<String>,
    /// Type-specific settings such as `container` or `unit`.
    #[serde(flatten)]
    pub extra: Extra,
}

impl PropertyType {
    fn fill_defaults(&mut self) {
        self.list.get_or_insert(false);
        if self.type_name == "text" {
            self.collation.get_or_insert_with(|| String::from("ucs_basic"));
        }
    }
}

/// A property of a container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerProperty {
    /// Property type definition.
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    /// Whether the property may be null.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nullable: Option<bool>,
    /// Whether the property auto-increments.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_increment: Option<bool>,
    /// Whether the property is immutable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub immutable: Option<bool>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// A data modeling container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Owning space.
    pub space: String,
    /// External id.
    pub external_id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Instance types the container holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_for: Option<UsedFor>,
    /// Properties by name.
    #[serde(default)]
    pub properties: BTreeMap<String, ContainerProperty>,
    /// Constraints by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: BTreeMap<String, Value>,
    /// Indexes by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub indexes: BTreeMap<String, Value>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Resource for Container {
    fn identifier(&self) -> Identifier {
        Identifier::Container {
            space: self.space.clone(),
            external_id: self.external_id.clone(),
        }
    }

    fn dependencies(&self) -> Vec<Identifier> {
        vec![Identifier::space(&self.space)]
    }

    fn fill_defaults(&mut self) {
        self.used_for.get_or_insert(UsedFor::Node);
        for property in self.properties.values_mut() {
            property.nullable.get_or_insert(true);
            property.auto_increment.get_or_insert(false);
            property.immutable.get_or_insert(false);
            property.property_type.fill_defaults();
        }
    }

    fn clear_extra(&mut self) {
        self.extra.clear();
        for property in self.properties.values_mut() {
            property.extra.clear();
        }
    }

    fn scope_key(&self) -> Option<String> {
        Some(self.space.clone())
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}

/// A property of a view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewProperty {
    /// Container the property maps to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<ContainerReference>,
    /// Property name inside the container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_property_identifier: Option<String>,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Target view of a connection property.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<ViewReference>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

/// A data modeling view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct View {
    /// Owning space.
    pub space: String,
    /// External id.
    pub external_id: String,
    /// Version.
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Instance filter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,
    /// Implemented views. Order decides property precedence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub implements: Vec<ViewReference>,
    /// Properties by name.
    #[serde(default)]
    pub properties: BTreeMap<String, ViewProperty>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Resource for View {
    fn identifier(&self) -> Identifier {
        Identifier::View {
            space: self.space.clone(),
            external_id: self.external_id.clone(),
            version: self.version.clone(),
        }
    }

    fn dependencies(&self) -> Vec<Identifier> {
        let mut deps = vec![Identifier::space(&self.space)];
        deps.extend(self.implements.iter().map(ViewReference::identifier));
        for property in self.properties.values() {
            if let Some(container) = &property.container {
                deps.push(container.identifier());
            }
            if let Some(source) = &property.source {
                deps.push(source.identifier());
            }
        }
        deps
    }

    fn fill_defaults(&mut self) {
        self.implements.iter_mut().for_each(ViewReference::fill_defaults);
        for property in self.properties.values_mut() {
            if let Some(container) = &mut property.container {
                container.ref_type.get_or_insert_with(|| String::from("container"));
            }
            if let Some(source) = &mut property.source {
                source.fill_defaults();
            }
        }
    }

    fn clear_extra(&mut self) {
        self.extra.clear();
        for property in self.properties.values_mut() {
            property.extra.clear();
        }
    }

    fn scope_key(&self) -> Option<String> {
        Some(self.space.clone())
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}

/// A data model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataModel {
    /// Owning space.
    pub space: String,
    /// External id.
    pub external_id: String,
    /// Version.
    #[serde(deserialize_with = "string_or_number")]
    pub version: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Views in the model.
    #[serde(default)]
    pub views: Vec<ViewReference>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Resource for DataModel {
    fn identifier(&self) -> Identifier {
        Identifier::DataModel {
            space: self.space.clone(),
            external_id: self.external_id.clone(),
            version: self.version.clone(),
        }
    }

    fn dependencies(&self) -> Vec<Identifier> {
        let mut deps = vec![Identifier::space(&self.space)];
        deps.extend(self.views.iter().map(ViewReference::identifier));
        deps
    }

    fn fill_defaults(&mut self) {
        self.views.iter_mut().for_each(ViewReference::fill_defaults);
    }

    fn canonicalize(&mut self) {
        self.views.sort();
    }

    fn scope_key(&self) -> Option<String> {
        Some(self.space.clone())
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}
