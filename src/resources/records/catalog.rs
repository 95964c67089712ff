//! Catalog records: data sets, raw storage, time series and files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Extra, Resource};
use crate::resources::identifier::Identifier;

/// A data set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSet {
    /// External id.
    pub external_id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Whether writes require explicit permission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_protected: Option<bool>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Resource for DataSet {
    fn identifier(&self) -> Identifier {
        Identifier::data_set(&self.external_id)
    }

    fn fill_defaults(&mut self) {
        self.write_protected.get_or_insert(false);
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}

/// A raw database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDatabase {
    /// Database name.
    pub db_name: String,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Resource for RawDatabase {
    fn identifier(&self) -> Identifier {
        Identifier::RawDatabase {
            db_name: self.db_name.clone(),
        }
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}

/// A raw table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTable {
    /// Database name.
    pub db_name: String,
    /// Table name.
    pub table_name: String,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Resource for RawTable {
    fn identifier(&self) -> Identifier {
        Identifier::RawTable {
            db_name: self.db_name.clone(),
            table_name: self.table_name.clone(),
        }
    }

    fn dependencies(&self) -> Vec<Identifier> {
        vec![Identifier::RawDatabase {
            db_name: self.db_name.clone(),
        }]
    }

    fn scope_key(&self) -> Option<String> {
        Some(self.db_name.clone())
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}

/// A time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeries {
    /// External id.
    pub external_id: String,
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Owning data set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_set_external_id: Option<String>,
    /// Whether datapoints are strings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_string: Option<bool>,
    /// Whether values are step-interpolated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_step: Option<bool>,
    /// Physical unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Resource for TimeSeries {
    fn identifier(&self) -> Identifier {
        Identifier::TimeSeries {
            external_id: self.external_id.clone(),
        }
    }

    fn dependencies(&self) -> Vec<Identifier> {
        self.data_set_external_id
            .iter()
            .map(Identifier::data_set)
            .collect()
    }

    fn fill_defaults(&mut self) {
        self.is_string.get_or_insert(false);
        self.is_step.get_or_insert(false);
    }

    fn scope_key(&self) -> Option<String> {
        self.data_set_external_id.clone()
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}

/// File metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMetadata {
    /// External id.
    pub external_id: String,
    /// File name.
    pub name: String,
    /// Directory the file lives in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
    /// MIME type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Source system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Owning data set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_set_external_id: Option<String>,
    /// Free-form metadata.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
    /// Unmodeled fields.
    #[serde(flatten)]
    pub extra: Extra,
}

impl Resource for FileMetadata {
    fn identifier(&self) -> Identifier {
        Identifier::FileMetadata {
            external_id: self.external_id.clone(),
        }
    }

    fn dependencies(&self) -> Vec<Identifier> {
        self.data_set_external_id
            .iter()
            .map(Identifier::data_set)
            .collect()
    }

    fn scope_key(&self) -> Option<String> {
        self.data_set_external_id.clone()
    }

    fn extra(&self) -> &Extra {
        &self.extra
    }

    fn extra_mut(&mut self) -> &mut Extra {
        &mut self.extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_table_depends_on_database() {
        let table: RawTable = serde_yaml::from_str("dbName: ingest\ntableName: assets\n").unwrap();
        assert_eq!(
            table.dependencies(),
            vec![Identifier::RawDatabase {
                db_name: String::from("ingest")
            }]
        );
        assert_eq!(table.scope_key().as_deref(), Some("ingest"));
    }

    #[test]
    fn test_time_series_defaults() {
        let mut ts: TimeSeries =
            serde_yaml::from_str("externalId: ts_1\ndataSetExternalId: ds_1\n").unwrap();
        ts.fill_defaults();
        assert_eq!(ts.is_string, Some(false));
        assert_eq!(ts.is_step, Some(false));
        assert_eq!(ts.dependencies(), vec![Identifier::data_set("ds_1")]);
    }

    #[test]
    fn test_data_set_without_parent_has_no_dependencies() {
        let ds: DataSet = serde_yaml::from_str("externalId: ds_1\n").unwrap();
        assert!(ds.dependencies().is_empty());
        assert!(ds.scope_key().is_none());
    }
}
