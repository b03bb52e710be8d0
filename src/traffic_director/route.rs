//! gRPC route add-on
//!
//! Replaces the URL map / proxy / forwarding rule chain with a Network
//! Services gRPC route bound to a proxyless router.

use super::manager::TrafficDirectorManager;
use super::{ignore_not_found, record_failure};
use crate::error::{Result, TdError};
use crate::gcp::api::NetworkServicesApi;
use crate::gcp::types::{BackendServiceProtocol, GcpResource};
use crate::resource::{BackendRole, ManagedResource, ResourceKind, ResourceNamer, ResourceRegistry};
use serde_json::{json, Value};
use std::sync::Arc;

const ROUTER_TYPE: &str = "PROXYLESS_GRPC";

pub struct RouteAddon {
    netsvc: Arc<dyn NetworkServicesApi>,
    network: String,
    namer: ResourceNamer,
    registry: ResourceRegistry,
}

impl RouteAddon {
    /// Share the base manager's naming and network
    pub fn new(base: &TrafficDirectorManager, netsvc: Arc<dyn NetworkServicesApi>) -> Self {
        Self {
            netsvc,
            network: base.network().to_string(),
            namer: base.namer().clone(),
            registry: ResourceRegistry::new(),
        }
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn resource(&self, kind: ResourceKind) -> Option<&ManagedResource> {
        self.registry.get(kind)
    }

    /// Backend setup on `base`, then the gRPC route and the router
    pub async fn setup_for_grpc_route(
        &mut self,
        base: &mut TrafficDirectorManager,
        service_host: &str,
        service_port: u16,
        backend_protocol: BackendServiceProtocol,
        health_check_port: Option<u16>,
    ) -> Result<()> {
        base.setup_backend_for_grpc(backend_protocol, health_check_port)
            .await?;
        self.create_grpc_route(base, service_host, service_port)
            .await?;
        self.create_router().await?;
        Ok(())
    }

    /// Route `host:port` to the primary backend service of `base`
    pub async fn create_grpc_route(
        &mut self,
        base: &TrafficDirectorManager,
        src_host: &str,
        src_port: u16,
    ) -> Result<GcpResource> {
        let kind = ResourceKind::GrpcRoute;
        self.registry.ensure_absent(kind)?;
        let backend_service = base
            .resource(ResourceKind::BackendService(BackendRole::Primary))
            .ok_or(TdError::MissingDependency {
                kind,
                required: ResourceKind::BackendService(BackendRole::Primary),
            })?;

        let body = grpc_route_body(&format!("{}:{}", src_host, src_port), backend_service.name());
        self.create_grpc_route_with_content(&body).await
    }

    /// Create the gRPC route from a caller-built body
    pub async fn create_grpc_route_with_content(&mut self, body: &Value) -> Result<GcpResource> {
        let kind = ResourceKind::GrpcRoute;
        self.registry.ensure_absent(kind)?;

        let name = self.namer.resource_name(kind).to_string();
        tracing::info!("Creating GrpcRoute {}", name);
        self.netsvc.create_grpc_route(&name, body).await?;

        let resource = self.netsvc.get_grpc_route(&name).await?;
        tracing::debug!("Loaded GrpcRoute: {}", resource.url);
        self.registry.insert(ManagedResource::new(kind, resource.clone()));
        Ok(resource)
    }

    pub async fn delete_grpc_route(&mut self, force: bool) -> Result<()> {
        let kind = ResourceKind::GrpcRoute;
        let Some(name) = self.registry.deletion_target(kind, force, &self.namer) else {
            return Ok(());
        };
        tracing::info!("Deleting GrpcRoute {}", name);
        let result = self.netsvc.delete_grpc_route(&name).await;
        ignore_not_found(result, kind, &name)?;
        self.registry.remove(kind);
        Ok(())
    }

    pub async fn create_router(&mut self) -> Result<GcpResource> {
        let kind = ResourceKind::Router;
        self.registry.ensure_absent(kind)?;
        let grpc_route = self.registry.require(ResourceKind::GrpcRoute, kind)?;

        let body = json!({
            "type": ROUTER_TYPE,
            "routes": [grpc_route.url()],
            "network": self.network,
        });

        let name = self.namer.resource_name(kind).to_string();
        tracing::info!("Creating Router {}", name);
        self.netsvc.create_router(&name, &body).await?;

        let resource = self.netsvc.get_router(&name).await?;
        tracing::debug!("Loaded Router: {}", resource.url);
        self.registry.insert(ManagedResource::new(kind, resource.clone()));
        Ok(resource)
    }

    pub async fn delete_router(&mut self, force: bool) -> Result<()> {
        let kind = ResourceKind::Router;
        let Some(name) = self.registry.deletion_target(kind, force, &self.namer) else {
            return Ok(());
        };
        tracing::info!("Deleting Router {}", name);
        let result = self.netsvc.delete_router(&name).await;
        ignore_not_found(result, kind, &name)?;
        self.registry.remove(kind);
        Ok(())
    }

    pub(crate) async fn cleanup_into(&mut self, force: bool, failures: &mut Vec<String>) {
        let result = self.delete_router(force).await;
        record_failure(failures, ResourceKind::Router, result);

        let result = self.delete_grpc_route(force).await;
        record_failure(failures, ResourceKind::GrpcRoute, result);
    }
}

fn grpc_route_body(hostname: &str, backend_service_name: &str) -> Value {
    json!({
        "hostnames": hostname,
        "rules": [{
            "action": {
                "destination": {
                    "serviceName": backend_service_name
                }
            }
        }],
    })
}
