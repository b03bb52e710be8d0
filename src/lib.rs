//! tdmesh: stand up and tear down Traffic Director resources
//!
//! - [`resource`] - Kinds, naming and the per-manager registry
//! - [`gcp`] - Authentication, REST clients and collaborator traits
//! - [`traffic_director`] - Lifecycle controllers and orchestrators
//! - [`config`] - Persistent configuration

pub mod config;
pub mod error;
pub mod gcp;
pub mod resource;
pub mod traffic_director;

pub use error::{Result, TdError};
pub use gcp::types::{BackendServiceProtocol, HealthCheckProtocol, ZonalBackend};
pub use resource::{BackendRole, ResourceKind};
pub use traffic_director::{
    ManagerOptions, RouteAddon, SecurityAddon, TrafficDirector, TrafficDirectorManager,
};
