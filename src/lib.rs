// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![deny(unsafe_code)]                 // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::nursery)]             // Experimental lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::missing_const_for_fn)] // Force const when possible
#![warn(clippy::unwrap_in_result)]    // unwrap() in Result warning
#![warn(clippy::module_inception)]    // Module with same name as crate warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

// Safety and robustness lints
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![deny(arithmetic_overflow)]         // Arithmetic overflow is forbidden

// ============================================================================
// Crate Documentation
// ============================================================================

//! # modkit
//!
//! A declarative build and deploy engine for platform resource configuration.
//!
//! ## Overview
//!
//! Resources are declared as YAML files grouped into modules. modkit:
//!
//! - Discovers modules and their resource folders under a root directory
//! - Resolves `{{ variable }}` placeholders from an environment config
//! - Validates every declaration and checks cross-resource dependencies
//! - Writes a deterministic build directory
//! - Deploys or cleans the build by diffing against the platform
//!
//! ## Architecture
//!
//! The build side never talks to the platform, except for the optional
//! dependency check. The deploy side reads only the build directory:
//!
//! 1. **Build**: modules and `config.<env>.yaml` to a build directory
//! 2. **Plan**: the build directory against the platform's current records
//! 3. **Execute**: creates, updates and deletes in dependency order
//!
//! ## Modules
//!
//! - [`config`]: Environment configuration and platform settings
//! - [`build`]: Discovery, variable resolution, validation and build output
//! - [`resources`]: Resource kinds, identifiers and descriptors
//! - [`platform`]: Platform API trait and HTTP client
//! - [`planner`]: Diff computation, planning and execution
//! - [`deployer`]: Orchestration of the build, deploy and clean commands
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! # config.dev.yaml
//! environment:
//!   name: dev
//!   project: my-project
//! variables:
//!   modules:
//!     common:
//!       dataset: ds_common
//! ```
//!
//! ```yaml
//! # modules/common/data_sets/common.yaml
//! externalId: "{{ dataset }}"
//! name: Common
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod build;
pub mod cli;
pub mod config;
pub mod deployer;
pub mod error;
pub mod planner;
pub mod platform;
pub mod resources;

// ============================================================================
// Re-exports
// ============================================================================

pub use build::{BuildContext, BuildIssue, IssueCode, IssueCollector, Severity};
pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, EnvironmentConfig, PlatformSettings};
pub use deployer::{BuildOptions, BuildOutcome, DeployOptions, DeployOutcome, Deployer};
pub use error::{ModkitError, Result};
pub use planner::{DeploymentPlan, DiffEngine, ExecutionReport, PlanExecutor, Planner};
pub use platform::{PlatformApi, PlatformClient};
pub use resources::{DescriptorRegistry, FolderKind, Identifier, ResourceKind};
