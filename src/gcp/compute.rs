//! Compute Engine v1
//!
//! REST implementation of [`ComputeApi`]. Every mutation returns a global
//! operation which is polled to completion before the call returns.

use super::api::{BackendServiceInfo, ComputeApi};
use super::client::{extract_short_name, GcpClient};
use super::poll::{poll_until, Attempt, ExponentialBackoff};
use super::types::{
    BackendServiceProtocol, ComputeCollection, GcpResource, HealthCheckProtocol, ZonalBackend,
};
use crate::error::{Result, TdError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Traffic Director resources use the self-managed internal scheme
const LOAD_BALANCING_SCHEME: &str = "INTERNAL_SELF_MANAGED";

/// Rate cap per endpoint when attaching NEG backends
const MAX_RATE_PER_ENDPOINT: u32 = 5;

pub struct ComputeV1 {
    client: GcpClient,
}

impl ComputeV1 {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }

    /// POST a global resource and wait for the insert operation
    async fn insert_global(&self, collection: &str, body: &Value) -> Result<GcpResource> {
        let name = body
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TdError::InvalidArgument(format!("{} body has no name", collection)))?
            .to_string();

        let url = self.client.compute_global_url(collection);
        let operation = self.client.post(&url, Some(body)).await?;
        let done = self.client.wait_for_global_operation(&operation).await?;

        let self_link = done
            .get("targetLink")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| {
                self.client
                    .compute_global_url(&format!("{}/{}", collection, name))
            });

        tracing::debug!("Created {} {}", collection, self_link);
        Ok(GcpResource::new(name, self_link))
    }

    async fn patch_and_wait(&self, backend_service: &GcpResource, body: &Value) -> Result<()> {
        let url = self
            .client
            .compute_global_url(&format!("backendServices/{}", backend_service.name));
        let operation = self.client.patch(&url, body).await?;
        self.client.wait_for_global_operation(&operation).await?;
        Ok(())
    }

    fn neg_url(&self, backend: &ZonalBackend) -> String {
        self.client.compute_zonal_url(
            &backend.zone,
            &format!("networkEndpointGroups/{}", backend.name),
        )
    }

    /// Backends that don't report HEALTHY on every endpoint
    async fn unhealthy_backends(
        &self,
        backend_service: &GcpResource,
        backends: &BTreeSet<ZonalBackend>,
    ) -> Result<Vec<String>> {
        let url = self
            .client
            .compute_global_url(&format!("backendServices/{}/getHealth", backend_service.name));

        let mut unhealthy = Vec::new();
        for backend in backends {
            let body = json!({ "group": self.neg_url(backend) });
            let response = self.client.post(&url, Some(&body)).await?;
            if !all_healthy(&response) {
                unhealthy.push(backend.to_string());
            }
        }
        Ok(unhealthy)
    }
}

fn all_healthy(response: &Value) -> bool {
    match response.get("healthStatus").and_then(|v| v.as_array()) {
        Some(statuses) if !statuses.is_empty() => statuses.iter().all(|s| {
            s.get("healthState").and_then(|v| v.as_str()) == Some("HEALTHY")
        }),
        _ => false,
    }
}

fn health_check_body(name: &str, protocol: HealthCheckProtocol, port: Option<u16>) -> Value {
    let spec = match port {
        Some(port) => json!({ "portSpecification": "USE_FIXED_PORT", "port": port }),
        None => json!({ "portSpecification": "USE_SERVING_PORT" }),
    };
    let spec_field = match protocol {
        HealthCheckProtocol::Grpc => "grpcHealthCheck",
        HealthCheckProtocol::Tcp => "tcpHealthCheck",
    };

    let mut body = json!({ "name": name, "type": protocol.as_str() });
    body[spec_field] = spec;
    body
}

fn backend_service_body(
    name: &str,
    health_check: &GcpResource,
    protocol: BackendServiceProtocol,
    affinity_header: Option<&str>,
) -> Value {
    let mut body = json!({
        "name": name,
        "loadBalancingScheme": LOAD_BALANCING_SCHEME,
        "healthChecks": [health_check.url],
        "protocol": protocol.as_str(),
    });
    if let Some(header) = affinity_header {
        body["localityLbPolicy"] = json!("RING_HASH");
        body["sessionAffinity"] = json!("HEADER_FIELD");
        body["consistentHash"] = json!({ "httpHeaderName": header });
    }
    body
}

fn url_map_body(
    name: &str,
    matcher_name: &str,
    src_hosts: &[String],
    backend_service: &GcpResource,
) -> Value {
    json!({
        "name": name,
        "defaultService": backend_service.url,
        "hostRules": [{
            "hosts": src_hosts,
            "pathMatcher": matcher_name,
        }],
        "pathMatchers": [{
            "name": matcher_name,
            "defaultService": backend_service.url,
        }],
    })
}

fn forwarding_rule_filter(src_port: u16) -> String {
    format!(
        "(portRange = \"{port}-{port}\") (IPAddress = \"0.0.0.0\") \
         (loadBalancingScheme = \"{scheme}\")",
        port = src_port,
        scheme = LOAD_BALANCING_SCHEME
    )
}

#[async_trait]
impl ComputeApi for ComputeV1 {
    async fn create_health_check(
        &self,
        name: &str,
        protocol: HealthCheckProtocol,
        port: Option<u16>,
    ) -> Result<GcpResource> {
        self.insert_global("healthChecks", &health_check_body(name, protocol, port))
            .await
    }

    async fn create_backend_service(
        &self,
        name: &str,
        health_check: &GcpResource,
        protocol: BackendServiceProtocol,
        affinity_header: Option<&str>,
    ) -> Result<GcpResource> {
        let body = backend_service_body(name, health_check, protocol, affinity_header);
        self.insert_global("backendServices", &body).await
    }

    async fn get_backend_service(&self, name: &str) -> Result<BackendServiceInfo> {
        let url = self
            .client
            .compute_global_url(&format!("backendServices/{}", name));
        let response = self.client.get(&url).await?;

        let raw_protocol = response
            .get("protocol")
            .and_then(|v| v.as_str())
            .unwrap_or("GRPC");
        let protocol = raw_protocol.parse().map_err(|_| {
            TdError::InvalidArgument(format!(
                "backend service {} has unsupported protocol {}",
                name, raw_protocol
            ))
        })?;
        let self_link = response
            .get("selfLink")
            .and_then(|v| v.as_str())
            .unwrap_or(&url)
            .to_string();

        Ok(BackendServiceInfo {
            resource: GcpResource::new(name, self_link),
            protocol,
        })
    }

    async fn patch_backend_service(
        &self,
        backend_service: &GcpResource,
        body: &Value,
    ) -> Result<()> {
        self.patch_and_wait(backend_service, body).await
    }

    async fn backend_service_add_backends(
        &self,
        backend_service: &GcpResource,
        backends: &BTreeSet<ZonalBackend>,
    ) -> Result<()> {
        let backend_list: Vec<Value> = backends
            .iter()
            .map(|backend| {
                json!({
                    "group": self.neg_url(backend),
                    "balancingMode": "RATE",
                    "maxRatePerEndpoint": MAX_RATE_PER_ENDPOINT,
                })
            })
            .collect();

        self.patch_and_wait(backend_service, &json!({ "backends": backend_list }))
            .await
    }

    async fn backend_service_remove_all_backends(
        &self,
        backend_service: &GcpResource,
    ) -> Result<()> {
        self.patch_and_wait(backend_service, &json!({ "backends": [] }))
            .await
    }

    async fn wait_for_network_endpoint_group(
        &self,
        name: &str,
        zone: &str,
    ) -> Result<ZonalBackend> {
        let url = self
            .client
            .compute_zonal_url(zone, &format!("networkEndpointGroups/{}", name));
        let condition = format!("network endpoint group {} in {}", name, zone);

        poll_until(&self.client.polling, &condition, || {
            let url = url.clone();
            async move {
                match self.client.get(&url).await {
                    Ok(neg) => {
                        let neg_name = neg
                            .get("name")
                            .and_then(|v| v.as_str())
                            .unwrap_or(name)
                            .to_string();
                        let neg_zone = neg
                            .get("zone")
                            .and_then(|v| v.as_str())
                            .map(extract_short_name)
                            .unwrap_or_else(|| zone.to_string());
                        Ok(Attempt::Ready(ZonalBackend::new(neg_name, neg_zone)))
                    },
                    Err(e) if e.is_not_found() => Ok(Attempt::Pending("not found yet".into())),
                    Err(e) => Err(e),
                }
            }
        })
        .await
    }

    async fn wait_for_backends_healthy_status(
        &self,
        backend_service: &GcpResource,
        backends: &BTreeSet<ZonalBackend>,
    ) -> Result<()> {
        let mut backoff = ExponentialBackoff::new(&self.client.polling);

        loop {
            let unhealthy = self.unhealthy_backends(backend_service, backends).await?;
            if unhealthy.is_empty() {
                return Ok(());
            }

            let Some(delay) = backoff.next_backoff() else {
                return Err(TdError::Unhealthy {
                    service: backend_service.name.clone(),
                    backends: unhealthy,
                });
            };
            tracing::debug!(
                "Backend Service {} not healthy yet ({}), retrying in {:?}",
                backend_service.name,
                unhealthy.join(", "),
                delay
            );
            tokio::time::sleep(delay).await;
        }
    }

    async fn create_url_map(
        &self,
        name: &str,
        matcher_name: &str,
        src_hosts: &[String],
        backend_service: &GcpResource,
    ) -> Result<GcpResource> {
        let body = url_map_body(name, matcher_name, src_hosts, backend_service);
        self.insert_global("urlMaps", &body).await
    }

    async fn create_url_map_with_content(&self, body: &Value) -> Result<GcpResource> {
        self.insert_global("urlMaps", body).await
    }

    async fn create_target_grpc_proxy(
        &self,
        name: &str,
        url_map: &GcpResource,
    ) -> Result<GcpResource> {
        let body = json!({
            "name": name,
            "urlMap": url_map.url,
            "validateForProxyless": true,
        });
        self.insert_global("targetGrpcProxies", &body).await
    }

    async fn create_target_http_proxy(
        &self,
        name: &str,
        url_map: &GcpResource,
    ) -> Result<GcpResource> {
        let body = json!({ "name": name, "urlMap": url_map.url });
        self.insert_global("targetHttpProxies", &body).await
    }

    async fn create_forwarding_rule(
        &self,
        name: &str,
        src_port: u16,
        target_proxy: &GcpResource,
        network_url: &str,
    ) -> Result<GcpResource> {
        let body = json!({
            "name": name,
            "loadBalancingScheme": LOAD_BALANCING_SCHEME,
            "portRange": src_port.to_string(),
            "IPAddress": "0.0.0.0",
            "network": network_url,
            "target": target_proxy.url,
        });
        self.insert_global("globalForwardingRules", &body).await
    }

    async fn exists_forwarding_rule(&self, src_port: u16) -> Result<bool> {
        // Assumes nobody in the project allocates port ranges wider than one port.
        let url = format!(
            "{}?filter={}",
            self.client.compute_global_url("globalForwardingRules"),
            urlencoding::encode(&forwarding_rule_filter(src_port))
        );
        let response = self.client.get(&url).await?;

        Ok(response
            .get("items")
            .and_then(|v| v.as_array())
            .map(|items| !items.is_empty())
            .unwrap_or(false))
    }

    async fn create_firewall_rule(
        &self,
        name: &str,
        network_url: &str,
        source_ranges: &[String],
        ports: &[String],
    ) -> Result<GcpResource> {
        let body = json!({
            "name": name,
            "network": network_url,
            "direction": "INGRESS",
            "sourceRanges": source_ranges,
            "allowed": [{
                "IPProtocol": "tcp",
                "ports": ports,
            }],
        });
        self.insert_global("firewalls", &body).await
    }

    async fn delete(&self, collection: ComputeCollection, name: &str) -> Result<()> {
        let url = self
            .client
            .compute_global_url(&format!("{}/{}", collection.path(), name));
        let operation = self.client.delete(&url).await?;
        self.client.wait_for_global_operation(&operation).await?;
        Ok(())
    }
}
