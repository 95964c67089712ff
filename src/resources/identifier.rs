//! Kind-tagged resource identifiers.

use serde::{Serialize, Serializer};
use serde_json::{json, Value};
use std::fmt;

use super::kind::ResourceKind;

/// Prefix of spaces owned by the platform itself.
pub const RESERVED_SPACE_PREFIX: &str = "cdf_";

/// The kind-specific composite key of a resource.
///
/// Variants are declared in deploy order, so the derived `Ord` sorts by kind
/// first and by fields second.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Identifier {
    /// Space id.
    Space {
        /// Space name.
        space: String,
    },
    /// Data set id.
    DataSet {
        /// External id.
        external_id: String,
    },
    /// Raw database id.
    RawDatabase {
        /// Database name.
        db_name: String,
    },
    /// Raw table id.
    RawTable {
        /// Database name.
        db_name: String,
        /// Table name.
        table_name: String,
    },
    /// Group id.
    Group {
        /// Group name.
        name: String,
    },
    /// Container id.
    Container {
        /// Owning space.
        space: String,
        /// External id.
        external_id: String,
    },
    /// View id.
    View {
        /// Owning space.
        space: String,
        /// External id.
        external_id: String,
        /// Version.
        version: String,
    },
    /// Data model id.
    DataModel {
        /// Owning space.
        space: String,
        /// External id.
        external_id: String,
        /// Version.
        version: String,
    },
    /// Time series id.
    TimeSeries {
        /// External id.
        external_id: String,
    },
    /// File id.
    FileMetadata {
        /// External id.
        external_id: String,
    },
    /// Function id.
    Function {
        /// External id.
        external_id: String,
    },
    /// Transformation id.
    Transformation {
        /// External id.
        external_id: String,
    },
    /// Workflow id.
    Workflow {
        /// External id.
        external_id: String,
    },
}

impl Identifier {
    /// Shorthand for a data set id.
    #[must_use]
    pub fn data_set(external_id: impl Into<String>) -> Self {
        Self::DataSet {
            external_id: external_id.into(),
        }
    }

    /// Shorthand for a space id.
    #[must_use]
    pub fn space(space: impl Into<String>) -> Self {
        Self::Space {
            space: space.into(),
        }
    }

    /// The resource kind this identifier belongs to.
    #[must_use]
    pub const fn kind(&self) -> ResourceKind {
        match self {
            Self::Space { .. } => ResourceKind::Space,
            Self::DataSet { .. } => ResourceKind::DataSet,
            Self::RawDatabase { .. } => ResourceKind::RawDatabase,
            Self::RawTable { .. } => ResourceKind::RawTable,
            Self::Group { .. } => ResourceKind::Group,
            Self::Container { .. } => ResourceKind::Container,
            Self::View { .. } => ResourceKind::View,
            Self::DataModel { .. } => ResourceKind::DataModel,
            Self::TimeSeries { .. } => ResourceKind::TimeSeries,
            Self::FileMetadata { .. } => ResourceKind::FileMetadata,
            Self::Function { .. } => ResourceKind::Function,
            Self::Transformation { .. } => ResourceKind::Transformation,
            Self::Workflow { .. } => ResourceKind::Workflow,
        }
    }

    /// Wire form used in retrieve and delete requests.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Space { space } => json!({ "space": space }),
            Self::RawDatabase { db_name } => json!({ "dbName": db_name }),
            Self::RawTable {
                db_name,
                table_name,
            } => json!({ "dbName": db_name, "tableName": table_name }),
            Self::Group { name } => json!({ "name": name }),
            Self::Container { space, external_id } => {
                json!({ "space": space, "externalId": external_id })
            }
            Self::View {
                space,
                external_id,
                version,
            }
            | Self::DataModel {
                space,
                external_id,
                version,
            } => json!({ "space": space, "externalId": external_id, "version": version }),
            Self::DataSet { external_id }
            | Self::TimeSeries { external_id }
            | Self::FileMetadata { external_id }
            | Self::Function { external_id }
            | Self::Transformation { external_id }
            | Self::Workflow { external_id } => json!({ "externalId": external_id }),
        }
    }

    /// True when the identifier lives in a platform-owned namespace.
    #[must_use]
    pub fn is_platform_reserved(&self) -> bool {
        match self {
            Self::Space { space }
            | Self::Container { space, .. }
            | Self::View { space, .. }
            | Self::DataModel { space, .. } => space.starts_with(RESERVED_SPACE_PREFIX),
            _ => false,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Space { space } => write!(f, "space:{space}"),
            Self::RawDatabase { db_name } => write!(f, "raw:{db_name}"),
            Self::RawTable {
                db_name,
                table_name,
            } => write!(f, "raw:{db_name}.{table_name}"),
            Self::Group { name } => write!(f, "group:{name}"),
            Self::Container { space, external_id } => write!(f, "container:{space}:{external_id}"),
            Self::View {
                space,
                external_id,
                version,
            } => write!(f, "view:{space}:{external_id}(version={version})"),
            Self::DataModel {
                space,
                external_id,
                version,
            } => write!(f, "datamodel:{space}:{external_id}(version={version})"),
            Self::DataSet { external_id } => write!(f, "dataset:{external_id}"),
            Self::TimeSeries { external_id } => write!(f, "timeseries:{external_id}"),
            Self::FileMetadata { external_id } => write!(f, "file:{external_id}"),
            Self::Function { external_id } => write!(f, "function:{external_id}"),
            Self::Transformation { external_id } => write!(f, "transformation:{external_id}"),
            Self::Workflow { external_id } => write!(f, "workflow:{external_id}"),
        }
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
