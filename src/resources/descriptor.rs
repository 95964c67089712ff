//! Per-kind resource descriptors and the registry that selects them.
//!
//! A descriptor owns everything the pipeline needs to know about one kind:
//! how to turn a parsed declaration into a canonical record, how to identify
//! it, what it depends on, how the platform fills omitted fields and how two
//! records compare. The registry is keyed by resource-folder kind plus file
//! name, never by the shape of the record.

use regex::Regex;
use serde::Serialize;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

use super::identifier::Identifier;
use super::kind::{FolderKind, ResourceKind};
use super::records::ResourceRecord;

#[allow(clippy::expect_used)]
static UNQUOTED_VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^(\s*(?:-\s+)?version:[ \t]*)([^\s"'\[{#][^\s#]*)[ \t]*$"#)
        .expect("version pattern is valid")
});

/// One differing top-level field between a local and a remote record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiffDetail {
    /// Field name, in wire casing.
    pub field: String,
    /// Remote value, compact JSON. `None` when the remote lacks the field.
    pub remote: Option<String>,
    /// Local value, compact JSON. `None` when the local record lacks the field.
    pub local: Option<String>,
}

/// Capability set of one resource kind.
pub trait ResourceDescriptor: Send + Sync {
    /// The kind this descriptor handles.
    fn kind(&self) -> ResourceKind;

    /// Rewrites resolved file content before it is parsed.
    fn post_substitute<'a>(&self, content: &'a str) -> Cow<'a, str> {
        Cow::Borrowed(content)
    }

    /// Fields a declaration must carry, in wire casing.
    ///
    /// Nested fields are written as dotted paths, with `*` standing for every
    /// entry of a mapping or list. A nested field is only required where its
    /// parent is present.
    fn required_fields(&self) -> &'static [&'static str] {
        required_fields_of(self.kind())
    }

    /// Required fields absent or null in `raw`, as concrete dotted paths.
    fn missing_fields(&self, raw: &serde_yaml::Value) -> Vec<String> {
        let mut missing = Vec::new();
        for path in self.required_fields() {
            let segments: Vec<&str> = path.split('.').collect();
            collect_missing(raw, &segments, "", &mut missing);
        }
        missing
    }

    /// Parses one raw declaration into a canonical record.
    ///
    /// # Errors
    ///
    /// Returns the deserializer error if the value does not match the kind's
    /// schema.
    fn normalize(&self, raw: serde_yaml::Value) -> Result<ResourceRecord, serde_yaml::Error> {
        let mut record = ResourceRecord::from_yaml(self.kind(), raw)?;
        record.as_resource_mut().canonicalize();
        Ok(record)
    }

    /// Parses one API response item into a record of this kind.
    ///
    /// # Errors
    ///
    /// Returns the deserializer error if the item does not match the schema.
    fn from_remote(&self, raw: Value) -> Result<ResourceRecord, serde_json::Error> {
        ResourceRecord::from_json(self.kind(), raw)
    }

    /// Identifier of a record.
    fn identifier_of(&self, record: &ResourceRecord) -> Identifier {
        record.identifier()
    }

    /// Identifiers the record references.
    fn dependencies_of(&self, record: &ResourceRecord) -> BTreeSet<Identifier> {
        record.as_resource().dependencies().into_iter().collect()
    }

    /// The record with platform defaults filled in and set-like fields sorted.
    fn default_fill(&self, record: &ResourceRecord) -> ResourceRecord {
        record.normalized()
    }

    /// Semantic equality after defaults, ignoring server-populated fields.
    fn equals(&self, local: &ResourceRecord, remote: &ResourceRecord) -> bool {
        self.default_fill(local).without_extra() == self.default_fill(remote).without_extra()
    }

    /// Differing top-level fields, for display.
    fn field_diff(&self, local: &ResourceRecord, remote: &ResourceRecord) -> Vec<DiffDetail> {
        let local = object_fields(&self.default_fill(local).without_extra());
        let remote = object_fields(&self.default_fill(remote).without_extra());
        let fields: BTreeSet<&String> = local.keys().chain(remote.keys()).collect();
        fields
            .into_iter()
            .filter(|field| local.get(*field) != remote.get(*field))
            .map(|field| DiffDetail {
                field: field.clone(),
                remote: remote.get(field).map(Value::to_string),
                local: local.get(field).map(Value::to_string),
            })
            .collect()
    }

    /// Maximum items per mutating call.
    fn batch_limit(&self) -> usize {
        self.kind().batch_limit()
    }

    /// Position in the deploy order.
    fn dependency_rank(&self) -> u32 {
        self.kind().dependency_rank()
    }
}

fn required_fields_of(kind: ResourceKind) -> &'static [&'static str] {
    match kind {
        ResourceKind::Space => &["space"],
        ResourceKind::DataSet | ResourceKind::TimeSeries => &["externalId"],
        ResourceKind::RawDatabase => &["dbName"],
        ResourceKind::RawTable => &["dbName", "tableName"],
        ResourceKind::Group => &["name"],
        ResourceKind::Container => &[
            "space",
            "externalId",
            "properties.*.type",
            "properties.*.type.type",
        ],
        ResourceKind::View => &[
            "space",
            "externalId",
            "version",
            "implements.*.space",
            "implements.*.externalId",
            "implements.*.version",
            "properties.*.container.space",
            "properties.*.container.externalId",
            "properties.*.source.space",
            "properties.*.source.externalId",
            "properties.*.source.version",
        ],
        ResourceKind::DataModel => &[
            "space",
            "externalId",
            "version",
            "views.*.space",
            "views.*.externalId",
            "views.*.version",
        ],
        ResourceKind::FileMetadata | ResourceKind::Function | ResourceKind::Transformation => {
            &["externalId", "name"]
        }
        ResourceKind::Workflow => &["externalId", "tasks.*.externalId", "tasks.*.type"],
    }
}

fn collect_missing(
    value: &serde_yaml::Value,
    segments: &[&str],
    at: &str,
    missing: &mut Vec<String>,
) {
    let Some((first, rest)) = segments.split_first() else {
        return;
    };
    let join = |key: &str| {
        if at.is_empty() {
            key.to_string()
        } else {
            format!("{at}.{key}")
        }
    };

    if *first == "*" {
        match value {
            serde_yaml::Value::Mapping(map) => {
                for (key, child) in map {
                    let key = key.as_str().map_or_else(|| format!("{key:?}"), str::to_string);
                    collect_missing(child, rest, &join(&key), missing);
                }
            }
            serde_yaml::Value::Sequence(items) => {
                for (index, child) in items.iter().enumerate() {
                    collect_missing(child, rest, &join(&index.to_string()), missing);
                }
            }
            _ => {}
        }
        return;
    }

    let serde_yaml::Value::Mapping(map) = value else {
        return;
    };
    match map.get(*first) {
        Some(child) if !child.is_null() => collect_missing(child, rest, &join(*first), missing),
        _ if rest.is_empty() => missing.push(join(*first)),
        _ => {}
    }
}

fn object_fields(record: &ResourceRecord) -> BTreeMap<String, Value> {
    match record.to_json() {
        Value::Object(map) => map.into_iter().collect(),
        _ => BTreeMap::new(),
    }
}

/// Descriptor for kinds that parse their declarations as-is.
#[derive(Debug, Clone, Copy)]
pub struct StandardDescriptor(ResourceKind);

impl ResourceDescriptor for StandardDescriptor {
    fn kind(&self) -> ResourceKind {
        self.0
    }
}

/// Descriptor for versioned data modeling kinds.
///
/// An unquoted `version: 1.10` would otherwise parse as the float `1.1`, so
/// version scalars are quoted before parsing.
#[derive(Debug, Clone, Copy)]
pub struct VersionedDescriptor(ResourceKind);

impl ResourceDescriptor for VersionedDescriptor {
    fn kind(&self) -> ResourceKind {
        self.0
    }

    fn post_substitute<'a>(&self, content: &'a str) -> Cow<'a, str> {
        UNQUOTED_VERSION.replace_all(content, r#"$1"$2""#)
    }
}

/// Lookup table from resource kind to descriptor.
pub struct DescriptorRegistry {
    descriptors: Vec<Box<dyn ResourceDescriptor>>,
}

impl DescriptorRegistry {
    /// Creates a registry holding a descriptor for every supported kind.
    #[must_use]
    pub fn new() -> Self {
        let descriptors = ResourceKind::ALL
            .into_iter()
            .map(|kind| -> Box<dyn ResourceDescriptor> {
                match kind {
                    ResourceKind::View | ResourceKind::DataModel => {
                        Box::new(VersionedDescriptor(kind))
                    }
                    _ => Box::new(StandardDescriptor(kind)),
                }
            })
            .collect();
        Self { descriptors }
    }

    /// Descriptor of `kind`.
    #[must_use]
    pub fn get(&self, kind: ResourceKind) -> &dyn ResourceDescriptor {
        // Built from `ResourceKind::ALL`, so the rank is always in bounds.
        self.descriptors[kind.dependency_rank() as usize].as_ref()
    }

    /// Routes a declaration file inside `folder` to its descriptor.
    ///
    /// Returns `None` when the file name does not map to a kind.
    #[must_use]
    pub fn for_file(&self, folder: FolderKind, file_name: &str) -> Option<&dyn ResourceDescriptor> {
        folder.kind_for_file(file_name).map(|kind| self.get(kind))
    }
}

impl Default for DescriptorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for DescriptorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.descriptors.iter().map(|d| d.kind()))
            .finish()
    }
}
