//! Canonical per-kind resource records.
//!
//! Each resource kind has its own typed record. [`ResourceRecord`] is the
//! closed union over them; the variant is always chosen from the kind the
//! registry routed a file to, never from the shape of the data.

mod auth;
mod compute;
mod catalog;
mod data_models;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::identifier::Identifier;
use super::kind::ResourceKind;

pub use auth::Group;
pub use compute::{Function, Transformation, Workflow, WorkflowTask};
pub use catalog::{DataSet, FileMetadata, RawDatabase, RawTable, TimeSeries};
pub use data_models::{
    Container, ContainerProperty, ContainerReference, DataModel, PropertyType, Space, UsedFor,
    View, ViewProperty, ViewReference,
};

/// Fields a record does not model. Server-populated fields land here too.
pub type Extra = BTreeMap<String, Value>;

/// Behaviour shared by every typed record.
pub trait Resource {
    /// The unique identifier of this record.
    fn identifier(&self) -> Identifier;

    /// Identifiers of the resources this record references.
    fn dependencies(&self) -> Vec<Identifier> {
        Vec::new()
    }

    /// Fills omitted optional fields with the platform's defaults.
    fn fill_defaults(&mut self) {}

    /// Sorts fields whose order carries no meaning.
    fn canonicalize(&mut self) {}

    /// Namespace used to decide which remote-only records a deploy may delete.
    fn scope_key(&self) -> Option<String> {
        None
    }

    /// Unmodeled fields.
    fn extra(&self) -> &Extra;

    /// Mutable access to unmodeled fields.
    fn extra_mut(&mut self) -> &mut Extra;

    /// Drops unmodeled fields, including those of nested items.
    fn clear_extra(&mut self) {
        self.extra_mut().clear();
    }
}

macro_rules! resource_records {
    ($($variant:ident),* $(,)?) => {
        /// A canonical record of any supported kind.
        #[derive(Debug, Clone, PartialEq, Serialize)]
        #[serde(untagged)]
        pub enum ResourceRecord {
            $(
                #[doc = concat!("A `", stringify!($variant), "` record.")]
                $variant($variant),
            )*
        }

        impl ResourceRecord {
            /// The kind of this record.
            #[must_use]
            pub const fn kind(&self) -> ResourceKind {
                match self {
                    $(Self::$variant(_) => ResourceKind::$variant,)*
                }
            }

            /// Borrows the record through its shared behaviour.
            #[must_use]
            pub fn as_resource(&self) -> &dyn Resource {
                match self {
                    $(Self::$variant(r) => r,)*
                }
            }

            /// Mutably borrows the record through its shared behaviour.
            pub fn as_resource_mut(&mut self) -> &mut dyn Resource {
                match self {
                    $(Self::$variant(r) => r,)*
                }
            }

            /// Parses a declaration value as a record of `kind`.
            ///
            /// # Errors
            ///
            /// Returns an error if the value does not match the kind's schema.
            pub fn from_yaml(
                kind: ResourceKind,
                value: serde_yaml::Value,
            ) -> std::result::Result<Self, serde_yaml::Error> {
                match kind {
                    $(ResourceKind::$variant => serde_yaml::from_value(value).map(Self::$variant),)*
                }
            }

            /// Parses an API response item as a record of `kind`.
            ///
            /// # Errors
            ///
            /// Returns an error if the value does not match the kind's schema.
            pub fn from_json(
                kind: ResourceKind,
                value: Value,
            ) -> std::result::Result<Self, serde_json::Error> {
                match kind {
                    $(ResourceKind::$variant => serde_json::from_value(value).map(Self::$variant),)*
                }
            }
        }
    };
}

resource_records!(
    Space,
    DataSet,
    RawDatabase,
    RawTable,
    Group,
    Container,
    View,
    DataModel,
    TimeSeries,
    FileMetadata,
    Function,
    Transformation,
    Workflow,
);

impl ResourceRecord {
    /// Identifier of the record.
    #[must_use]
    pub fn identifier(&self) -> Identifier {
        self.as_resource().identifier()
    }

    /// Wire form of the record.
    #[must_use]
    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Returns the record with defaults filled and set-like fields sorted.
    #[must_use]
    pub fn normalized(&self) -> Self {
        let mut record = self.clone();
        let resource = record.as_resource_mut();
        resource.fill_defaults();
        resource.canonicalize();
        record
    }

    /// Returns the record without unmodeled fields.
    #[must_use]
    pub fn without_extra(&self) -> Self {
        let mut record = self.clone();
        record.as_resource_mut().clear_extra();
        record
    }
}

/// Accepts both `version: 1` and `version: "1"`.
pub(crate) fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Int(i) => i.to_string(),
        Raw::Float(f) => f.to_string(),
    })
}

/// Reads `value[key]` as a string.
pub(crate) fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_yaml_routes_by_kind() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("externalId: ds_1\nname: Ingest\n").unwrap();
        let record = ResourceRecord::from_yaml(ResourceKind::DataSet, value).unwrap();
        assert_eq!(record.kind(), ResourceKind::DataSet);
        assert_eq!(record.identifier(), Identifier::data_set("ds_1"));
    }

    #[test]
    fn test_missing_required_field_is_reported() {
        let value: serde_yaml::Value = serde_yaml::from_str("name: Ingest\n").unwrap();
        let err = ResourceRecord::from_yaml(ResourceKind::DataSet, value).unwrap_err();
        assert!(err.to_string().contains("missing field `externalId`"));
    }

    #[test]
    fn test_unknown_fields_are_kept_in_extra() {
        let value: serde_yaml::Value =
            serde_yaml::from_str("externalId: ds_1\ncolour: blue\n").unwrap();
        let record = ResourceRecord::from_yaml(ResourceKind::DataSet, value).unwrap();
        assert!(record.as_resource().extra().contains_key("colour"));
        assert!(record.without_extra().as_resource().extra().is_empty());
    }
}
