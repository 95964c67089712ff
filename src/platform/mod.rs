//! Platform API access.
//!
//! This module provides:
//! - The [`PlatformApi`] trait the planner and executor work against
//! - The [`ResourceLookup`] capability used by the dependency validator
//! - An HTTP client with timeouts and bounded retries

mod api;
mod client;
#[cfg(test)]
pub(crate) mod memory;

pub use api::{PlatformApi, PlatformLookup, ResourceLookup};
#[cfg(test)]
pub(crate) use api::MockResourceLookup;
pub use client::PlatformClient;
