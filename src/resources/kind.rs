//! Resource-folder kinds and resource kinds.
//!
//! The declaration order of [`ResourceKind`] is the deploy order: every kind
//! appears after all of its upstream kinds.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A recognized resource-folder name inside a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderKind {
    /// Access-control groups.
    Auth,
    /// Spaces, containers, views and data models.
    DataModels,
    /// Data sets.
    DataSets,
    /// Raw databases and tables.
    Raw,
    /// Time series.
    Timeseries,
    /// File metadata.
    Files,
    /// Transformations.
    Transformations,
    /// Functions.
    Functions,
    /// Workflows.
    Workflows,
}

impl FolderKind {
    /// Every recognized folder kind.
    pub const ALL: [Self; 9] = [
        Self::Auth,
        Self::DataModels,
        Self::DataSets,
        Self::Raw,
        Self::Timeseries,
        Self::Files,
        Self::Transformations,
        Self::Functions,
        Self::Workflows,
    ];

    /// Directory name of this folder kind.
    #[must_use]
    pub const fn folder_name(self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::DataModels => "data_models",
            Self::DataSets => "data_sets",
            Self::Raw => "raw",
            Self::Timeseries => "timeseries",
            Self::Files => "files",
            Self::Transformations => "transformations",
            Self::Functions => "functions",
            Self::Workflows => "workflows",
        }
    }

    /// Resource kinds that can be declared in this folder.
    #[must_use]
    pub const fn kinds(self) -> &'static [ResourceKind] {
        match self {
            Self::Auth => &[ResourceKind::Group],
            Self::DataModels => &[
                ResourceKind::Space,
                ResourceKind::Container,
                ResourceKind::View,
                ResourceKind::DataModel,
            ],
            Self::DataSets => &[ResourceKind::DataSet],
            Self::Raw => &[ResourceKind::RawDatabase, ResourceKind::RawTable],
            Self::Timeseries => &[ResourceKind::TimeSeries],
            Self::Files => &[ResourceKind::FileMetadata],
            Self::Transformations => &[ResourceKind::Transformation],
            Self::Functions => &[ResourceKind::Function],
            Self::Workflows => &[ResourceKind::Workflow],
        }
    }

    /// Routes a declaration file to its resource kind.
    ///
    /// Folders holding several kinds use the type tag before the extension,
    /// e.g. `pump.container.yaml`. Returns `None` when the tag is not known.
    #[must_use]
    pub fn kind_for_file(self, file_name: &str) -> Option<ResourceKind> {
        let tag = type_tag(file_name);
        match self {
            Self::DataModels => match tag? {
                "space" => Some(ResourceKind::Space),
                "container" => Some(ResourceKind::Container),
                "view" => Some(ResourceKind::View),
                "datamodel" => Some(ResourceKind::DataModel),
                _ => None,
            },
            Self::Raw => match tag {
                Some("database") => Some(ResourceKind::RawDatabase),
                _ => Some(ResourceKind::RawTable),
            },
            _ => self.kinds().first().copied(),
        }
    }
}

/// Returns the lowercased type tag of `name.tag.yaml`, if present.
fn type_tag(file_name: &str) -> Option<&str> {
    let stem = file_name
        .strip_suffix(".yaml")
        .or_else(|| file_name.strip_suffix(".yml"))?;
    stem.rsplit_once('.').map(|(_, tag)| tag)
}

impl fmt::Display for FolderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.folder_name())
    }
}

impl FromStr for FolderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.folder_name() == s)
            .ok_or_else(|| format!("unknown resource folder '{s}'"))
    }
}

/// A category of platform resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    /// Data modeling space.
    Space,
    /// Data set.
    DataSet,
    /// Raw database.
    RawDatabase,
    /// Raw table.
    RawTable,
    /// Access-control group.
    Group,
    /// Data modeling container.
    Container,
    /// Data modeling view.
    View,
    /// Data model.
    DataModel,
    /// Time series.
    TimeSeries,
    /// File metadata.
    FileMetadata,
    /// Function.
    Function,
    /// Transformation.
    Transformation,
    /// Workflow.
    Workflow,
}

impl ResourceKind {
    /// Every kind in deploy order.
    pub const ALL: [Self; 13] = [
        Self::Space,
        Self::DataSet,
        Self::RawDatabase,
        Self::RawTable,
        Self::Group,
        Self::Container,
        Self::View,
        Self::DataModel,
        Self::TimeSeries,
        Self::FileMetadata,
        Self::Function,
        Self::Transformation,
        Self::Workflow,
    ];

    /// Human-readable plural name.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Space => "spaces",
            Self::DataSet => "data sets",
            Self::RawDatabase => "raw databases",
            Self::RawTable => "raw tables",
            Self::Group => "groups",
            Self::Container => "containers",
            Self::View => "views",
            Self::DataModel => "data models",
            Self::TimeSeries => "time series",
            Self::FileMetadata => "files",
            Self::Function => "functions",
            Self::Transformation => "transformations",
            Self::Workflow => "workflows",
        }
    }

    /// Folder the kind is declared in.
    #[must_use]
    pub const fn folder(self) -> FolderKind {
        match self {
            Self::Space | Self::Container | Self::View | Self::DataModel => FolderKind::DataModels,
            Self::DataSet => FolderKind::DataSets,
            Self::RawDatabase | Self::RawTable => FolderKind::Raw,
            Self::Group => FolderKind::Auth,
            Self::TimeSeries => FolderKind::Timeseries,
            Self::FileMetadata => FolderKind::Files,
            Self::Function => FolderKind::Functions,
            Self::Transformation => FolderKind::Transformations,
            Self::Workflow => FolderKind::Workflows,
        }
    }

    /// Path segment of the kind's resource API.
    #[must_use]
    pub const fn api_path(self) -> &'static str {
        match self {
            Self::Space => "models/spaces",
            Self::DataSet => "datasets",
            Self::RawDatabase => "raw/dbs",
            Self::RawTable => "raw/tables",
            Self::Group => "groups",
            Self::Container => "models/containers",
            Self::View => "models/views",
            Self::DataModel => "models/datamodels",
            Self::TimeSeries => "timeseries",
            Self::FileMetadata => "files",
            Self::Function => "functions",
            Self::Transformation => "transformations",
            Self::Workflow => "workflows",
        }
    }

    /// Position in the deploy order.
    #[must_use]
    pub const fn dependency_rank(self) -> u32 {
        self as u32
    }

    /// Maximum number of items per create, update or delete call.
    #[must_use]
    pub const fn batch_limit(self) -> usize {
        match self {
            // A group carries all of its capabilities in one call.
            Self::Group | Self::FileMetadata | Self::Function | Self::Workflow => 1,
            Self::DataSet => 10,
            Self::Space | Self::Container | Self::View | Self::DataModel => 100,
            Self::RawDatabase | Self::RawTable | Self::TimeSeries | Self::Transformation => 1000,
        }
    }

    /// True for kinds whose deletion also deletes bulk data.
    #[must_use]
    pub const fn holds_data(self) -> bool {
        matches!(
            self,
            Self::Space
                | Self::Container
                | Self::RawDatabase
                | Self::RawTable
                | Self::TimeSeries
                | Self::FileMetadata
        )
    }

    /// False for kinds the platform never deletes.
    #[must_use]
    pub const fn deletable(self) -> bool {
        !matches!(self, Self::DataSet)
    }

    /// True for kinds that cannot be updated in place and are dropped then recreated.
    #[must_use]
    pub const fn recreate_on_change(self) -> bool {
        matches!(self, Self::Group | Self::Function)
    }

    /// Kinds whose resources this kind may reference.
    #[must_use]
    pub const fn upstream(self) -> &'static [Self] {
        match self {
            Self::Space | Self::DataSet | Self::RawDatabase => &[],
            Self::RawTable => &[Self::RawDatabase],
            Self::Group => &[Self::Space, Self::DataSet],
            Self::Container => &[Self::Space],
            Self::View => &[Self::Space, Self::Container],
            Self::DataModel => &[Self::Space, Self::View],
            Self::TimeSeries | Self::FileMetadata | Self::Function => &[Self::DataSet],
            Self::Transformation => &[
                Self::Space,
                Self::DataSet,
                Self::RawTable,
                Self::View,
                Self::DataModel,
            ],
            Self::Workflow => &[Self::DataSet, Self::Function, Self::Transformation],
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_kinds_come_first() {
        for kind in ResourceKind::ALL {
            for upstream in kind.upstream() {
                assert!(
                    upstream.dependency_rank() < kind.dependency_rank(),
                    "{upstream} must deploy before {kind}"
                );
            }
        }
    }

    #[test]
    fn test_data_model_file_routing() {
        let folder = FolderKind::DataModels;
        assert_eq!(folder.kind_for_file("pump.container.yaml"), Some(ResourceKind::Container));
        assert_eq!(folder.kind_for_file("pump.view.yml"), Some(ResourceKind::View));
        assert_eq!(folder.kind_for_file("sp.space.yaml"), Some(ResourceKind::Space));
        assert_eq!(folder.kind_for_file("model.datamodel.yaml"), Some(ResourceKind::DataModel));
        assert_eq!(folder.kind_for_file("pump.yaml"), None);
    }

    #[test]
    fn test_raw_and_single_kind_routing() {
        assert_eq!(
            FolderKind::Raw.kind_for_file("ingest.database.yaml"),
            Some(ResourceKind::RawDatabase)
        );
        assert_eq!(FolderKind::Raw.kind_for_file("assets.yaml"), Some(ResourceKind::RawTable));
        assert_eq!(
            FolderKind::Transformations.kind_for_file("t.yaml"),
            Some(ResourceKind::Transformation)
        );
    }

    #[test]
    fn test_folder_from_str() {
        assert_eq!("data_sets".parse::<FolderKind>(), Ok(FolderKind::DataSets));
        assert!("streamlit".parse::<FolderKind>().is_err());
    }
}
