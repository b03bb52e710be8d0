//! In-memory fake of the three GCP APIs
//!
//! Records every call as a short line so tests can assert on order, and
//! keeps a set of existing resources so deletes of missing ones report
//! `NotFound` the way the real APIs do.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tdmesh::gcp::api::{BackendServiceInfo, ComputeApi, NetworkSecurityApi, NetworkServicesApi};
use tdmesh::gcp::types::{
    BackendServiceProtocol, ComputeCollection, GcpResource, HealthCheckProtocol, ZonalBackend,
};
use tdmesh::{ManagerOptions, Result, TdError, TrafficDirectorManager};

pub const PROJECT: &str = "grpc-testing";
pub const PREFIX: &str = "xds-k8s";
pub const SUFFIX: &str = "run1";

#[derive(Default)]
struct State {
    calls: Vec<String>,
    existing: BTreeSet<(String, String)>,
    protocols: HashMap<String, BackendServiceProtocol>,
    bodies: HashMap<String, Value>,
    visible_negs: HashSet<(String, String)>,
    taken_ports: HashSet<u16>,
    failing: HashSet<String>,
    unhealthy: bool,
}

#[derive(Default)]
pub struct FakeCloud {
    state: Mutex<State>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that change remote state
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| {
                ["create ", "delete ", "set_backends ", "remove_backends ", "patch "]
                    .iter()
                    .any(|prefix| c.starts_with(prefix))
            })
            .collect()
    }

    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    pub fn clear_calls(&self) {
        self.state.lock().unwrap().calls.clear();
    }

    pub fn exists(&self, collection: &str, name: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .existing
            .contains(&(collection.to_string(), name.to_string()))
    }

    pub fn existing_count(&self) -> usize {
        self.state.lock().unwrap().existing.len()
    }

    /// Pretend a previous run left this resource behind
    pub fn add_existing(&self, collection: &str, name: &str) {
        self.state
            .lock()
            .unwrap()
            .existing
            .insert((collection.to_string(), name.to_string()));
    }

    pub fn add_backend_service(&self, name: &str, protocol: BackendServiceProtocol) {
        self.add_existing("backendServices", name);
        self.state
            .lock()
            .unwrap()
            .protocols
            .insert(name.to_string(), protocol);
    }

    pub fn set_neg_visible(&self, name: &str, zone: &str) {
        self.state
            .lock()
            .unwrap()
            .visible_negs
            .insert((name.to_string(), zone.to_string()));
    }

    pub fn take_port(&self, port: u16) {
        self.state.lock().unwrap().taken_ports.insert(port);
    }

    /// Every mutation naming `name` fails with a 400
    pub fn fail_on(&self, name: &str) {
        self.state.lock().unwrap().failing.insert(name.to_string());
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.state.lock().unwrap().unhealthy = unhealthy;
    }

    /// Last body sent to a create or patch for `name`
    pub fn body(&self, name: &str) -> Option<Value> {
        self.state.lock().unwrap().bodies.get(name).cloned()
    }

    fn record(&self, call: String) {
        self.state.lock().unwrap().calls.push(call);
    }

    fn check_failing(&self, name: &str) -> Result<()> {
        if self.state.lock().unwrap().failing.contains(name) {
            return Err(TdError::Api {
                status: 400,
                message: format!("injected failure for {}", name),
            });
        }
        Ok(())
    }

    fn create(&self, collection: &str, name: &str, detail: &str) -> Result<GcpResource> {
        let line = if detail.is_empty() {
            format!("create {} {}", collection, name)
        } else {
            format!("create {} {} {}", collection, name, detail)
        };
        self.record(line);
        self.check_failing(name)?;

        let key = (collection.to_string(), name.to_string());
        let mut state = self.state.lock().unwrap();
        if !state.existing.insert(key) {
            return Err(TdError::Api {
                status: 409,
                message: format!("{} {} already exists", collection, name),
            });
        }
        Ok(GcpResource::new(name, url_for(collection, name)))
    }

    fn create_location(&self, collection: &str, name: &str, body: &Value) -> Result<()> {
        self.create(collection, name, "")?;
        self.state
            .lock()
            .unwrap()
            .bodies
            .insert(name.to_string(), body.clone());
        Ok(())
    }

    fn get_location(&self, collection: &str, name: &str) -> Result<GcpResource> {
        self.record(format!("get {} {}", collection, name));
        if !self.exists(collection, name) {
            return Err(TdError::NotFound {
                resource: name.to_string(),
            });
        }
        Ok(GcpResource::new(name, location_name(collection, name)))
    }

    fn remove(&self, collection: &str, name: &str) -> Result<()> {
        self.record(format!("delete {} {}", collection, name));
        self.check_failing(name)?;
        let key = (collection.to_string(), name.to_string());
        if self.state.lock().unwrap().existing.remove(&key) {
            Ok(())
        } else {
            Err(TdError::NotFound {
                resource: format!("{}/{}", collection, name),
            })
        }
    }
}

pub fn url_for(collection: &str, name: &str) -> String {
    format!("https://fake.googleapis.com/{}/{}", collection, name)
}

pub fn location_name(collection: &str, name: &str) -> String {
    format!("projects/{}/locations/global/{}/{}", PROJECT, collection, name)
}

fn describe(backends: &BTreeSet<ZonalBackend>) -> String {
    let parts: Vec<String> = backends.iter().map(|b| b.to_string()).collect();
    format!("[{}]", parts.join(", "))
}

#[async_trait]
impl ComputeApi for FakeCloud {
    async fn create_health_check(
        &self,
        name: &str,
        protocol: HealthCheckProtocol,
        port: Option<u16>,
    ) -> Result<GcpResource> {
        let detail = match port {
            Some(port) => format!("{} port={}", protocol, port),
            None => protocol.to_string(),
        };
        self.create("healthChecks", name, &detail)
    }

    async fn create_backend_service(
        &self,
        name: &str,
        health_check: &GcpResource,
        protocol: BackendServiceProtocol,
        affinity_header: Option<&str>,
    ) -> Result<GcpResource> {
        let mut detail = format!("{} hc={}", protocol, health_check.name);
        if let Some(header) = affinity_header {
            detail.push_str(&format!(" affinity={}", header));
        }
        let resource = self.create("backendServices", name, &detail)?;
        self.state
            .lock()
            .unwrap()
            .protocols
            .insert(name.to_string(), protocol);
        Ok(resource)
    }

    async fn get_backend_service(&self, name: &str) -> Result<BackendServiceInfo> {
        self.record(format!("get backendServices {}", name));
        let protocol = self.state.lock().unwrap().protocols.get(name).copied();
        match protocol {
            Some(protocol) if self.exists("backendServices", name) => Ok(BackendServiceInfo {
                resource: GcpResource::new(name, url_for("backendServices", name)),
                protocol,
            }),
            _ => Err(TdError::NotFound {
                resource: name.to_string(),
            }),
        }
    }

    async fn patch_backend_service(
        &self,
        backend_service: &GcpResource,
        body: &Value,
    ) -> Result<()> {
        self.record(format!("patch backendServices {}", backend_service.name));
        self.check_failing(&backend_service.name)?;
        self.state
            .lock()
            .unwrap()
            .bodies
            .insert(backend_service.name.clone(), body.clone());
        Ok(())
    }

    async fn backend_service_add_backends(
        &self,
        backend_service: &GcpResource,
        backends: &BTreeSet<ZonalBackend>,
    ) -> Result<()> {
        self.record(format!(
            "set_backends {} {}",
            backend_service.name,
            describe(backends)
        ));
        self.check_failing(&backend_service.name)
    }

    async fn backend_service_remove_all_backends(
        &self,
        backend_service: &GcpResource,
    ) -> Result<()> {
        self.record(format!("remove_backends {}", backend_service.name));
        self.check_failing(&backend_service.name)
    }

    async fn wait_for_network_endpoint_group(
        &self,
        name: &str,
        zone: &str,
    ) -> Result<ZonalBackend> {
        self.record(format!("wait_neg {} {}", name, zone));
        let visible = self
            .state
            .lock()
            .unwrap()
            .visible_negs
            .contains(&(name.to_string(), zone.to_string()));
        if visible {
            Ok(ZonalBackend::new(name, zone))
        } else {
            Err(TdError::Timeout {
                condition: format!("NEG {} in {}", name, zone),
                elapsed: std::time::Duration::ZERO,
            })
        }
    }

    async fn wait_for_backends_healthy_status(
        &self,
        backend_service: &GcpResource,
        backends: &BTreeSet<ZonalBackend>,
    ) -> Result<()> {
        self.record(format!("wait_healthy {}", backend_service.name));
        if self.state.lock().unwrap().unhealthy {
            return Err(TdError::Unhealthy {
                service: backend_service.name.clone(),
                backends: backends.iter().map(|b| b.to_string()).collect(),
            });
        }
        Ok(())
    }

    async fn create_url_map(
        &self,
        name: &str,
        matcher_name: &str,
        src_hosts: &[String],
        backend_service: &GcpResource,
    ) -> Result<GcpResource> {
        let detail = format!(
            "{} matcher={} -> {}",
            src_hosts.join(","),
            matcher_name,
            backend_service.name
        );
        self.create("urlMaps", name, &detail)
    }

    async fn create_url_map_with_content(&self, body: &Value) -> Result<GcpResource> {
        let name = body
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TdError::InvalidArgument("url map body has no name".to_string()))?
            .to_string();
        self.create("urlMaps", &name, "content")
    }

    async fn create_target_grpc_proxy(
        &self,
        name: &str,
        url_map: &GcpResource,
    ) -> Result<GcpResource> {
        self.create("targetGrpcProxies", name, &format!("-> {}", url_map.name))
    }

    async fn create_target_http_proxy(
        &self,
        name: &str,
        url_map: &GcpResource,
    ) -> Result<GcpResource> {
        self.create("targetHttpProxies", name, &format!("-> {}", url_map.name))
    }

    async fn create_forwarding_rule(
        &self,
        name: &str,
        src_port: u16,
        target_proxy: &GcpResource,
        network_url: &str,
    ) -> Result<GcpResource> {
        let detail = format!(":{} {} -> {}", src_port, network_url, target_proxy.name);
        let resource = self.create("globalForwardingRules", name, &detail)?;
        self.take_port(src_port);
        Ok(resource)
    }

    async fn exists_forwarding_rule(&self, src_port: u16) -> Result<bool> {
        self.record(format!("exists_forwarding_rule {}", src_port));
        Ok(self.state.lock().unwrap().taken_ports.contains(&src_port))
    }

    async fn create_firewall_rule(
        &self,
        name: &str,
        network_url: &str,
        source_ranges: &[String],
        ports: &[String],
    ) -> Result<GcpResource> {
        let detail = format!(
            "{} from={} ports={}",
            network_url,
            source_ranges.join(","),
            ports.join(",")
        );
        self.create("firewalls", name, &detail)
    }

    async fn delete(&self, collection: ComputeCollection, name: &str) -> Result<()> {
        self.remove(collection.path(), name)
    }
}

#[async_trait]
impl NetworkSecurityApi for FakeCloud {
    async fn create_server_tls_policy(&self, name: &str, body: &Value) -> Result<()> {
        self.create_location("serverTlsPolicies", name, body)
    }

    async fn get_server_tls_policy(&self, name: &str) -> Result<GcpResource> {
        self.get_location("serverTlsPolicies", name)
    }

    async fn delete_server_tls_policy(&self, name: &str) -> Result<()> {
        self.remove("serverTlsPolicies", name)
    }

    async fn create_client_tls_policy(&self, name: &str, body: &Value) -> Result<()> {
        self.create_location("clientTlsPolicies", name, body)
    }

    async fn get_client_tls_policy(&self, name: &str) -> Result<GcpResource> {
        self.get_location("clientTlsPolicies", name)
    }

    async fn delete_client_tls_policy(&self, name: &str) -> Result<()> {
        self.remove("clientTlsPolicies", name)
    }
}

#[async_trait]
impl NetworkServicesApi for FakeCloud {
    async fn create_router(&self, name: &str, body: &Value) -> Result<()> {
        self.create_location("routers", name, body)
    }

    async fn get_router(&self, name: &str) -> Result<GcpResource> {
        self.get_location("routers", name)
    }

    async fn delete_router(&self, name: &str) -> Result<()> {
        self.remove("routers", name)
    }

    async fn create_grpc_route(&self, name: &str, body: &Value) -> Result<()> {
        self.create_location("grpcRoutes", name, body)
    }

    async fn get_grpc_route(&self, name: &str) -> Result<GcpResource> {
        self.get_location("grpcRoutes", name)
    }

    async fn delete_grpc_route(&self, name: &str) -> Result<()> {
        self.remove("grpcRoutes", name)
    }

    async fn create_endpoint_config_selector(&self, name: &str, body: &Value) -> Result<()> {
        self.create_location("endpointConfigSelectors", name, body)
    }

    async fn get_endpoint_config_selector(&self, name: &str) -> Result<GcpResource> {
        self.get_location("endpointConfigSelectors", name)
    }

    async fn delete_endpoint_config_selector(&self, name: &str) -> Result<()> {
        self.remove("endpointConfigSelectors", name)
    }
}

/// Manager named `xds-k8s-<base>-run1` on the fake cloud
pub fn manager(cloud: &Arc<FakeCloud>) -> TrafficDirectorManager {
    TrafficDirectorManager::new(cloud.clone(), ManagerOptions::new(PROJECT, PREFIX, SUFFIX))
}

/// Resource name as the manager derives it
pub fn name(base: &str) -> String {
    format!("{}-{}-{}", PREFIX, base, SUFFIX)
}
