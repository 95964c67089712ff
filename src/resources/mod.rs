//! Resource kinds, identifiers, canonical records and their descriptors.

pub mod descriptor;
pub mod identifier;
pub mod kind;
pub mod records;

pub use descriptor::{DescriptorRegistry, DiffDetail, ResourceDescriptor};
pub use identifier::Identifier;
pub use kind::{FolderKind, ResourceKind};
pub use records::{Resource, ResourceRecord};
