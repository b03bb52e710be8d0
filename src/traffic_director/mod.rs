//! Traffic Director resource lifecycle
//!
//! - [`manager`] - Base compute resources (health check through forwarding rule)
//! - [`route`] - gRPC route and router add-on
//! - [`security`] - TLS policies and endpoint config selector add-on
//! - [`deployment`] - Sequences setup and cleanup across all of the above
//!
//! Every create refuses to run when its kind is already tracked or an
//! upstream resource is missing. Deletes treat a missing remote resource as
//! success. Cleanup walks resources in reverse creation order and keeps
//! going past failures.

pub mod deployment;
pub mod manager;
pub mod route;
pub mod security;

pub use deployment::TrafficDirector;
pub use manager::{ManagerOptions, TrafficDirectorManager};
pub use route::RouteAddon;
pub use security::SecurityAddon;

use crate::error::Result;
use crate::resource::ResourceKind;

/// Metadata key the affinity backend service hashes on
pub const TEST_AFFINITY_METADATA_KEY: &str = "xds_md";

/// Treat "already gone" as a successful delete
pub(crate) fn ignore_not_found(result: Result<()>, kind: ResourceKind, name: &str) -> Result<()> {
    match result {
        Err(e) if e.is_not_found() => {
            tracing::info!("{} \"{}\" already deleted", kind, name);
            Ok(())
        },
        other => other,
    }
}

/// Log a failed cleanup step and remember it for the final report
pub(crate) fn record_failure(failures: &mut Vec<String>, kind: ResourceKind, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!("Failed to delete {}: {}", kind, e);
        failures.push(format!("{}: {}", kind, e));
    }
}
