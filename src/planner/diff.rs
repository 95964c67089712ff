//! Diff engine for comparing local and remote resources.
//!
//! Both sides are default-filled and canonicalized by the kind's descriptor
//! before comparing, so server defaults, server-populated fields and the
//! order of set-like fields never show up as changes.

use serde::Serialize;
use tracing::debug;

use crate::build::BuiltResource;
use crate::resources::{DescriptorRegistry, DiffDetail, ResourceRecord};

/// Classification of one resource against the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", content = "fields", rename_all = "snake_case")]
pub enum DiffResult {
    /// Absent remotely.
    ToCreate,
    /// Present remotely with different content.
    ToUpdate(Vec<DiffDetail>),
    /// Present remotely and semantically equal.
    Unchanged,
    /// Present remotely and scheduled for deletion.
    ToDelete,
}

impl DiffResult {
    /// Returns true unless the resource is unchanged.
    #[must_use]
    pub const fn is_change(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Engine for computing diffs.
#[derive(Debug)]
pub struct DiffEngine<'a> {
    registry: &'a DescriptorRegistry,
}

impl<'a> DiffEngine<'a> {
    /// Creates a diff engine.
    #[must_use]
    pub const fn new(registry: &'a DescriptorRegistry) -> Self {
        Self { registry }
    }

    /// Classifies `local` against its remote counterpart, if any.
    #[must_use]
    pub fn diff(&self, local: &BuiltResource, remote: Option<&ResourceRecord>) -> DiffResult {
        let Some(remote) = remote else {
            debug!("{} needs to be created", local.identifier);
            return DiffResult::ToCreate;
        };

        let descriptor = self.registry.get(local.record.kind());
        if descriptor.equals(&local.record, remote) {
            debug!("{} is up to date", local.identifier);
            DiffResult::Unchanged
        } else {
            let details = descriptor.field_diff(&local.record, remote);
            debug!(
                "{} differs in {}",
                local.identifier,
                details
                    .iter()
                    .map(|d| d.field.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            DiffResult::ToUpdate(details)
        }
    }
}

impl std::fmt::Display for DiffResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToCreate => write!(f, "create"),
            Self::ToUpdate(details) => {
                write!(f, "update")?;
                if !details.is_empty() {
                    write!(f, " (")?;
                    for (i, detail) in details.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", detail.field)?;
                    }
                    write!(f, ")")?;
                }
                Ok(())
            }
            Self::Unchanged => write!(f, "unchanged"),
            Self::ToDelete => write!(f, "delete"),
        }
    }
}
