//! Base Traffic Director manager
//!
//! Owns the compute resources of the classic data path:
//! health check, three backend services, URL map, target proxy, forwarding
//! rule and the health-check firewall rule.

use super::{ignore_not_found, record_failure, TEST_AFFINITY_METADATA_KEY};
use crate::config::DEFAULT_FIREWALL_SOURCE_RANGES;
use crate::error::{Result, TdError};
use crate::gcp::api::ComputeApi;
use crate::gcp::types::{
    BackendServiceProtocol, ComputeCollection, GcpResource, HealthCheckProtocol, TargetProxyKind,
    ZonalBackend,
};
use crate::resource::{BackendRole, ManagedResource, ResourceKind, ResourceNamer, ResourceRegistry};
use rand::Rng;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Lowest port sampled for forwarding rules; well-known ports are skipped
pub const DEFAULT_PORT_LO: u16 = 1024;
pub const DEFAULT_PORT_HI: u16 = 65535;
pub const DEFAULT_PORT_ATTEMPTS: u32 = 25;

const URL_MAP_PATH_MATCHER_NAME: &str = "path-matcher";

static NO_BACKENDS: BTreeSet<ZonalBackend> = BTreeSet::new();

/// Identity parameters of a manager
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub project: String,
    pub network: String,
    pub resource_prefix: String,
    pub resource_suffix: String,
    /// Source ranges allowed through the health-check firewall rule
    pub firewall_source_ranges: Vec<String>,
}

impl ManagerOptions {
    pub fn new(project: &str, resource_prefix: &str, resource_suffix: &str) -> Self {
        Self {
            project: project.to_string(),
            network: "default".to_string(),
            resource_prefix: resource_prefix.to_string(),
            resource_suffix: resource_suffix.to_string(),
            firewall_source_ranges: DEFAULT_FIREWALL_SOURCE_RANGES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn with_network(mut self, network: &str) -> Self {
        self.network = network.to_string();
        self
    }
}

pub struct TrafficDirectorManager {
    compute: Arc<dyn ComputeApi>,
    project: String,
    network: String,
    firewall_source_ranges: Vec<String>,
    namer: ResourceNamer,
    registry: ResourceRegistry,
    backends: HashMap<BackendRole, BTreeSet<ZonalBackend>>,
}

impl TrafficDirectorManager {
    pub fn new(compute: Arc<dyn ComputeApi>, options: ManagerOptions) -> Self {
        Self {
            compute,
            namer: ResourceNamer::new(&options.resource_prefix, &options.resource_suffix),
            project: options.project,
            network: options.network,
            firewall_source_ranges: options.firewall_source_ranges,
            registry: ResourceRegistry::new(),
            backends: HashMap::new(),
        }
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Relative network URL accepted by the compute API
    pub fn network_url(&self) -> String {
        format!("global/networks/{}", self.network)
    }

    pub fn namer(&self) -> &ResourceNamer {
        &self.namer
    }

    pub fn resource_name(&self, kind: ResourceKind) -> &str {
        self.namer.resource_name(kind)
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn resource(&self, kind: ResourceKind) -> Option<&ManagedResource> {
        self.registry.get(kind)
    }

    /// Tracked backend service for `role`, or `NotCreated`
    pub fn backend_service(&self, role: BackendRole) -> Result<&ManagedResource> {
        let kind = ResourceKind::BackendService(role);
        self.registry.get(kind).ok_or(TdError::NotCreated(kind))
    }

    // =========================================================================
    // Composite setup
    // =========================================================================

    /// Health check, backend service, URL map, target proxy, forwarding rule
    pub async fn setup_for_grpc(
        &mut self,
        service_host: &str,
        service_port: u16,
        backend_protocol: BackendServiceProtocol,
        health_check_port: Option<u16>,
    ) -> Result<()> {
        self.setup_backend_for_grpc(backend_protocol, health_check_port)
            .await?;
        self.setup_routing_rule_map_for_grpc(service_host, service_port)
            .await
    }

    pub async fn setup_backend_for_grpc(
        &mut self,
        protocol: BackendServiceProtocol,
        health_check_port: Option<u16>,
    ) -> Result<()> {
        self.create_health_check(HealthCheckProtocol::Grpc, health_check_port)
            .await?;
        self.create_backend_service(BackendRole::Primary, protocol)
            .await?;
        Ok(())
    }

    pub async fn setup_routing_rule_map_for_grpc(
        &mut self,
        service_host: &str,
        service_port: u16,
    ) -> Result<()> {
        self.create_url_map(service_host, service_port).await?;
        self.create_target_proxy().await?;
        self.create_forwarding_rule(service_port).await?;
        Ok(())
    }

    // =========================================================================
    // Health check
    // =========================================================================

    pub async fn create_health_check(
        &mut self,
        protocol: HealthCheckProtocol,
        port: Option<u16>,
    ) -> Result<GcpResource> {
        let kind = ResourceKind::HealthCheck;
        self.registry.ensure_absent(kind)?;

        let name = self.namer.resource_name(kind).to_string();
        tracing::info!("Creating {} Health Check \"{}\"", protocol, name);
        let resource = self.compute.create_health_check(&name, protocol, port).await?;
        self.registry.insert(ManagedResource::new(kind, resource.clone()));
        Ok(resource)
    }

    pub async fn delete_health_check(&mut self, force: bool) -> Result<()> {
        self.delete_compute_resource(
            ResourceKind::HealthCheck,
            ComputeCollection::HealthChecks,
            force,
        )
        .await
    }

    // =========================================================================
    // Backend services
    // =========================================================================

    /// Create the backend service for `role`; the affinity service hashes on
    /// the test metadata header
    pub async fn create_backend_service(
        &mut self,
        role: BackendRole,
        protocol: BackendServiceProtocol,
    ) -> Result<GcpResource> {
        let kind = ResourceKind::BackendService(role);
        self.registry.ensure_absent(kind)?;
        let health_check = self
            .registry
            .require(ResourceKind::HealthCheck, kind)?
            .resource
            .clone();

        let name = self.namer.resource_name(kind).to_string();
        let affinity_header = match role {
            BackendRole::Affinity => Some(TEST_AFFINITY_METADATA_KEY),
            _ => None,
        };

        tracing::info!("Creating {} {} \"{}\"", protocol, kind, name);
        let resource = self
            .compute
            .create_backend_service(&name, &health_check, protocol, affinity_header)
            .await?;
        self.registry.insert(ManagedResource::new(kind, resource.clone()).with_protocol(protocol));
        Ok(resource)
    }

    /// Track an existing backend service without creating it
    pub async fn load_backend_service(&mut self, role: BackendRole) -> Result<GcpResource> {
        let kind = ResourceKind::BackendService(role);
        let name = self.namer.resource_name(kind).to_string();
        let info = self.compute.get_backend_service(&name).await?;
        tracing::debug!("Loaded {} {} ({})", kind, info.resource.url, info.protocol);

        self.registry.insert(
            ManagedResource::new(kind, info.resource.clone()).with_protocol(info.protocol),
        );
        Ok(info.resource)
    }

    pub async fn delete_backend_service(&mut self, role: BackendRole, force: bool) -> Result<()> {
        self.delete_compute_resource(
            ResourceKind::BackendService(role),
            ComputeCollection::BackendServices,
            force,
        )
        .await
    }

    pub async fn patch_backend_service(&self, role: BackendRole, body: &Value) -> Result<()> {
        let backend_service = self.backend_service(role)?;
        tracing::info!("Patching {} {}: {}", backend_service.kind, backend_service.name(), body);
        self.compute
            .patch_backend_service(&backend_service.resource, body)
            .await
    }

    // =========================================================================
    // Backends
    // =========================================================================

    /// Backends tracked for `role`
    pub fn backends(&self, role: BackendRole) -> &BTreeSet<ZonalBackend> {
        self.backends.get(&role).unwrap_or(&NO_BACKENDS)
    }

    /// Forget the tracked backends for `role`; the remote service is untouched
    pub fn clear_backends(&mut self, role: BackendRole) {
        self.backends.remove(&role);
    }

    /// Wait for the NEG in each zone, then attach all of them in one call
    pub async fn backend_service_add_neg_backends(
        &mut self,
        role: BackendRole,
        neg_name: &str,
        zones: &[String],
    ) -> Result<()> {
        self.backend_service(role)?;

        tracing::info!("Waiting for Network Endpoint Groups to load endpoints.");
        for zone in zones {
            let backend = self
                .compute
                .wait_for_network_endpoint_group(neg_name, zone)
                .await?;
            tracing::info!("Loaded NEG \"{}\" in zone {}", backend.name, backend.zone);
            self.backends.entry(role).or_default().insert(backend);
        }

        self.backend_service_add_backends(role).await
    }

    /// Set the remote backends of `role` to the tracked set
    pub async fn backend_service_add_backends(&self, role: BackendRole) -> Result<()> {
        let backend_service = self.backend_service(role)?;
        let backends = self.backends(role);
        tracing::info!(
            "Adding backends to Backend Service {}: {}",
            backend_service.name(),
            describe(backends)
        );
        self.compute
            .backend_service_add_backends(&backend_service.resource, backends)
            .await
    }

    pub async fn backend_service_remove_all_backends(&self, role: BackendRole) -> Result<()> {
        let backend_service = self.backend_service(role)?;
        tracing::info!("Removing backends from Backend Service {}", backend_service.name());
        self.compute
            .backend_service_remove_all_backends(&backend_service.resource)
            .await
    }

    pub async fn wait_for_backends_healthy_status(&self, role: BackendRole) -> Result<()> {
        let backend_service = self.backend_service(role)?;
        let backends = self.backends(role);
        tracing::debug!(
            "Waiting for Backend Service {} to report all backends healthy: {}",
            backend_service.name(),
            describe(backends)
        );
        self.compute
            .wait_for_backends_healthy_status(&backend_service.resource, backends)
            .await
    }

    // =========================================================================
    // URL map
    // =========================================================================

    /// Route `host:port` to the primary backend service
    pub async fn create_url_map(&mut self, src_host: &str, src_port: u16) -> Result<GcpResource> {
        let kind = ResourceKind::UrlMap;
        self.registry.ensure_absent(kind)?;
        let backend_service = self
            .registry
            .require(ResourceKind::BackendService(BackendRole::Primary), kind)?
            .resource
            .clone();

        let src_address = format!("{}:{}", src_host, src_port);
        let name = self.namer.resource_name(kind).to_string();
        let matcher_name = self.namer.make_name(URL_MAP_PATH_MATCHER_NAME);
        tracing::info!(
            "Creating URL map \"{}\": {} -> {}",
            name,
            src_address,
            backend_service.name
        );

        let resource = self
            .compute
            .create_url_map(&name, &matcher_name, &[src_address], &backend_service)
            .await?;
        self.registry.insert(ManagedResource::new(kind, resource.clone()));
        Ok(resource)
    }

    /// Create a URL map from a caller-built body
    pub async fn create_url_map_with_content(&mut self, body: &Value) -> Result<GcpResource> {
        let kind = ResourceKind::UrlMap;
        self.registry.ensure_absent(kind)?;

        tracing::info!("Creating URL map: {}", body);
        let resource = self.compute.create_url_map_with_content(body).await?;
        self.registry.insert(ManagedResource::new(kind, resource.clone()));
        Ok(resource)
    }

    pub async fn delete_url_map(&mut self, force: bool) -> Result<()> {
        self.delete_compute_resource(ResourceKind::UrlMap, ComputeCollection::UrlMaps, force)
            .await
    }

    // =========================================================================
    // Target proxy
    // =========================================================================

    /// GRPC backends get a gRPC proxy, HTTP2 backends an HTTP proxy
    pub async fn create_target_proxy(&mut self) -> Result<GcpResource> {
        let kind = ResourceKind::TargetProxy;
        self.registry.ensure_absent(kind)?;

        let backend_service = self
            .registry
            .require(ResourceKind::BackendService(BackendRole::Primary), kind)?;
        let protocol = backend_service.protocol.unwrap_or_default();
        let proxy_kind = TargetProxyKind::for_protocol(protocol)?;
        let url_map = self
            .registry
            .require(ResourceKind::UrlMap, kind)?
            .resource
            .clone();

        let name = self.namer.resource_name(kind).to_string();
        tracing::info!(
            "Creating target {} proxy \"{}\" to URL map {}",
            proxy_kind.as_str(),
            name,
            url_map.name
        );

        let resource = match proxy_kind {
            TargetProxyKind::Grpc => self.compute.create_target_grpc_proxy(&name, &url_map).await?,
            TargetProxyKind::Http => self.compute.create_target_http_proxy(&name, &url_map).await?,
        };
        self.registry.insert(ManagedResource::new(kind, resource.clone()).with_protocol(protocol));
        Ok(resource)
    }

    /// Forced deletes try the HTTP flavor, then the gRPC flavor
    pub async fn delete_target_proxy(&mut self, force: bool) -> Result<()> {
        let kind = ResourceKind::TargetProxy;
        let Some(name) = self.registry.deletion_target(kind, force, &self.namer) else {
            return Ok(());
        };

        let tracked_flavor = self
            .registry
            .get(kind)
            .and_then(|entry| entry.protocol)
            .and_then(|protocol| TargetProxyKind::for_protocol(protocol).ok());

        let flavors = match (force, tracked_flavor) {
            (false, Some(flavor)) => vec![flavor],
            _ => vec![TargetProxyKind::Http, TargetProxyKind::Grpc],
        };

        for flavor in flavors {
            tracing::info!("Deleting Target {} proxy \"{}\"", flavor.as_str(), name);
            let result = self.compute.delete(flavor.collection(), &name).await;
            ignore_not_found(result, kind, &name)?;
        }

        self.registry.remove(kind);
        Ok(())
    }

    // =========================================================================
    // Forwarding rule
    // =========================================================================

    /// Sample ports in `[lo, hi]` until one has no forwarding rule
    pub async fn find_unused_forwarding_rule_port(
        &self,
        lo: u16,
        hi: u16,
        attempts: u32,
    ) -> Result<u16> {
        if lo > hi {
            return Err(TdError::InvalidArgument(format!(
                "empty port range {}..={}",
                lo, hi
            )));
        }

        for _ in 0..attempts {
            let src_port = rand::thread_rng().gen_range(lo..=hi);
            if !self.compute.exists_forwarding_rule(src_port).await? {
                tracing::debug!("Port {} has no forwarding rule", src_port);
                return Ok(src_port);
            }
        }

        Err(TdError::ExhaustedAttempts {
            what: "unused forwarding rule port".to_string(),
            attempts,
        })
    }

    pub async fn create_forwarding_rule(&mut self, src_port: u16) -> Result<GcpResource> {
        let kind = ResourceKind::ForwardingRule;
        self.registry.ensure_absent(kind)?;
        let target_proxy = self
            .registry
            .require(ResourceKind::TargetProxy, kind)?
            .resource
            .clone();

        let name = self.namer.resource_name(kind).to_string();
        tracing::info!(
            "Creating forwarding rule \"{}\" in network \"{}\": 0.0.0.0:{} -> {}",
            name,
            self.network,
            src_port,
            target_proxy.url
        );

        let resource = self
            .compute
            .create_forwarding_rule(&name, src_port, &target_proxy, &self.network_url())
            .await?;
        self.registry.insert(ManagedResource::new(kind, resource.clone()));
        Ok(resource)
    }

    pub async fn delete_forwarding_rule(&mut self, force: bool) -> Result<()> {
        self.delete_compute_resource(
            ResourceKind::ForwardingRule,
            ComputeCollection::GlobalForwardingRules,
            force,
        )
        .await
    }

    // =========================================================================
    // Firewall rule
    // =========================================================================

    /// Allow health checkers to reach `allowed_ports`
    pub async fn create_firewall_rule(&mut self, allowed_ports: &[String]) -> Result<GcpResource> {
        let kind = ResourceKind::FirewallRule;
        self.registry.ensure_absent(kind)?;

        let name = self.namer.resource_name(kind).to_string();
        tracing::info!(
            "Creating firewall rule \"{}\" in network \"{}\" with allowed ports {:?}",
            name,
            self.network,
            allowed_ports
        );

        let resource = self
            .compute
            .create_firewall_rule(
                &name,
                &self.network_url(),
                &self.firewall_source_ranges,
                allowed_ports,
            )
            .await?;
        self.registry.insert(ManagedResource::new(kind, resource.clone()));
        Ok(resource)
    }

    /// Not part of [`cleanup`](Self::cleanup); the rule outlives test runs
    pub async fn delete_firewall_rule(&mut self, force: bool) -> Result<()> {
        self.delete_compute_resource(
            ResourceKind::FirewallRule,
            ComputeCollection::Firewalls,
            force,
        )
        .await
    }

    // =========================================================================
    // Cleanup
    // =========================================================================

    /// Delete every base resource in reverse creation order
    pub async fn cleanup(&mut self, force: bool) -> Result<()> {
        let mut failures = Vec::new();
        self.cleanup_into(force, &mut failures).await;
        if failures.is_empty() {
            Ok(())
        } else {
            Err(TdError::PartialCleanup { failures })
        }
    }

    /// Best-effort teardown, appending failures instead of stopping
    pub(crate) async fn cleanup_into(&mut self, force: bool, failures: &mut Vec<String>) {
        let result = self.delete_forwarding_rule(force).await;
        record_failure(failures, ResourceKind::ForwardingRule, result);

        let result = self.delete_target_proxy(force).await;
        record_failure(failures, ResourceKind::TargetProxy, result);

        let result = self.delete_url_map(force).await;
        record_failure(failures, ResourceKind::UrlMap, result);

        for role in BackendRole::ALL {
            let result = self.delete_backend_service(role, force).await;
            record_failure(failures, ResourceKind::BackendService(role), result);
        }

        let result = self.delete_health_check(force).await;
        record_failure(failures, ResourceKind::HealthCheck, result);
    }

    async fn delete_compute_resource(
        &mut self,
        kind: ResourceKind,
        collection: ComputeCollection,
        force: bool,
    ) -> Result<()> {
        let Some(name) = self.registry.deletion_target(kind, force, &self.namer) else {
            return Ok(());
        };

        tracing::info!("Deleting {} \"{}\"", kind, name);
        let result = self.compute.delete(collection, &name).await;
        ignore_not_found(result, kind, &name)?;
        self.registry.remove(kind);
        Ok(())
    }
}

fn describe(backends: &BTreeSet<ZonalBackend>) -> String {
    let parts: Vec<String> = backends.iter().map(|b| b.to_string()).collect();
    format!("[{}]", parts.join(", "))
}
