//! Build pipeline.
//!
//! This module provides:
//! - Module discovery over the module root
//! - `{{ name }}` variable resolution with scoped lookups
//! - Per-file resource building folded into a [`BuildContext`]
//! - Missing-dependency validation
//! - The persisted build directory and its manifest

mod artifacts;
mod builder;
mod context;
mod discovery;
mod hash;
mod issue;
mod validator;
mod variables;

pub use artifacts::{BuildLoader, BuildManifest, BuildWriter, ManifestEntry, MANIFEST_FILE};
pub use builder::{BuiltFile, BuiltResource, ResourceBuilder};
pub use context::BuildContext;
pub use discovery::{Module, ModuleDiscovery, BUILD_DIR_NAME, MODULE_MARKERS};
pub use hash::ContentHasher;
pub use issue::{BuildIssue, IssueCategory, IssueCode, IssueCollector, Severity};
pub use validator::DependencyValidator;
pub use variables::{
    render_value, substitute_env, ResolvedContent, Substitution, UnresolvedVariable,
    VariableResolver, VariableScope, MODULE_DEFAULTS_FILE,
};
