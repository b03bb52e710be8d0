//! GCP API interaction module
//!
//! Authentication, HTTP plumbing, and the three control-plane APIs the
//! Traffic Director manager depends on.
//!
//! # Module Structure
//!
//! - [`api`] - Collaborator traits the manager is written against
//! - [`auth`] - GCP authentication using Application Default Credentials
//! - [`client`] - Main GCP client for making API requests and waiting on operations
//! - [`compute`] - Compute Engine v1 implementation
//! - [`network_security`] - Network Security v1alpha1 implementation
//! - [`network_services`] - Network Services v1alpha1 implementation
//! - [`poll`] - Bounded exponential-backoff polling
//! - [`types`] - Resource identities and protocol enums
//!
//! # Example
//!
//! ```ignore
//! use tdmesh::gcp::client::GcpClient;
//! use tdmesh::gcp::compute::ComputeV1;
//!
//! async fn example() -> tdmesh::Result<()> {
//!     let client = GcpClient::new("my-project").await?;
//!     let compute = ComputeV1::new(client);
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod compute;
pub mod http;
mod location;
pub mod network_security;
pub mod network_services;
pub mod poll;
pub mod types;
