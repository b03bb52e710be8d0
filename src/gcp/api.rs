//! Collaborator interfaces
//!
//! The manager talks to the cloud only through these traits. The REST
//! implementations live next to them in this module tree; tests substitute
//! in-memory fakes.
//!
//! Every call is awaited to completion before the caller continues. `wait_*`
//! methods own their polling budget and return `Timeout`/`Unhealthy` when
//! it is spent. Deletes report a missing resource as `TdError::NotFound`;
//! callers decide whether that is acceptable.

use super::types::{
    BackendServiceProtocol, ComputeCollection, GcpResource, HealthCheckProtocol, ZonalBackend,
};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeSet;

/// Backend service as read back from the API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendServiceInfo {
    pub resource: GcpResource,
    pub protocol: BackendServiceProtocol,
}

#[async_trait]
pub trait ComputeApi: Send + Sync {
    async fn create_health_check(
        &self,
        name: &str,
        protocol: HealthCheckProtocol,
        port: Option<u16>,
    ) -> Result<GcpResource>;

    async fn create_backend_service(
        &self,
        name: &str,
        health_check: &GcpResource,
        protocol: BackendServiceProtocol,
        affinity_header: Option<&str>,
    ) -> Result<GcpResource>;

    async fn get_backend_service(&self, name: &str) -> Result<BackendServiceInfo>;

    /// Partial update; fields absent from `body` are left alone
    async fn patch_backend_service(&self, backend_service: &GcpResource, body: &Value)
        -> Result<()>;

    /// Replace the backend set with exactly `backends`
    async fn backend_service_add_backends(
        &self,
        backend_service: &GcpResource,
        backends: &BTreeSet<ZonalBackend>,
    ) -> Result<()>;

    async fn backend_service_remove_all_backends(&self, backend_service: &GcpResource)
        -> Result<()>;

    async fn wait_for_network_endpoint_group(&self, name: &str, zone: &str)
        -> Result<ZonalBackend>;

    async fn wait_for_backends_healthy_status(
        &self,
        backend_service: &GcpResource,
        backends: &BTreeSet<ZonalBackend>,
    ) -> Result<()>;

    async fn create_url_map(
        &self,
        name: &str,
        matcher_name: &str,
        src_hosts: &[String],
        backend_service: &GcpResource,
    ) -> Result<GcpResource>;

    async fn create_url_map_with_content(&self, body: &Value) -> Result<GcpResource>;

    async fn create_target_grpc_proxy(&self, name: &str, url_map: &GcpResource)
        -> Result<GcpResource>;

    async fn create_target_http_proxy(&self, name: &str, url_map: &GcpResource)
        -> Result<GcpResource>;

    async fn create_forwarding_rule(
        &self,
        name: &str,
        src_port: u16,
        target_proxy: &GcpResource,
        network_url: &str,
    ) -> Result<GcpResource>;

    /// Whether any forwarding rule already listens on `src_port`
    async fn exists_forwarding_rule(&self, src_port: u16) -> Result<bool>;

    async fn create_firewall_rule(
        &self,
        name: &str,
        network_url: &str,
        source_ranges: &[String],
        ports: &[String],
    ) -> Result<GcpResource>;

    /// Delete a global resource by name
    async fn delete(&self, collection: ComputeCollection, name: &str) -> Result<()>;
}

#[async_trait]
pub trait NetworkSecurityApi: Send + Sync {
    async fn create_server_tls_policy(&self, name: &str, body: &Value) -> Result<()>;
    async fn get_server_tls_policy(&self, name: &str) -> Result<GcpResource>;
    async fn delete_server_tls_policy(&self, name: &str) -> Result<()>;

    async fn create_client_tls_policy(&self, name: &str, body: &Value) -> Result<()>;
    async fn get_client_tls_policy(&self, name: &str) -> Result<GcpResource>;
    async fn delete_client_tls_policy(&self, name: &str) -> Result<()>;
}

#[async_trait]
pub trait NetworkServicesApi: Send + Sync {
    async fn create_router(&self, name: &str, body: &Value) -> Result<()>;
    async fn get_router(&self, name: &str) -> Result<GcpResource>;
    async fn delete_router(&self, name: &str) -> Result<()>;

    async fn create_grpc_route(&self, name: &str, body: &Value) -> Result<()>;
    async fn get_grpc_route(&self, name: &str) -> Result<GcpResource>;
    async fn delete_grpc_route(&self, name: &str) -> Result<()>;

    async fn create_endpoint_config_selector(&self, name: &str, body: &Value) -> Result<()>;
    async fn get_endpoint_config_selector(&self, name: &str) -> Result<GcpResource>;
    async fn delete_endpoint_config_selector(&self, name: &str) -> Result<()>;
}
