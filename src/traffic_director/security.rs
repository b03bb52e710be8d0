//! Security add-on
//!
//! Server side: server TLS policy plus an endpoint config selector that binds
//! it to the server's pods. Client side: client TLS policy attached to the
//! primary backend service together with the expected server SPIFFE id.

use super::manager::TrafficDirectorManager;
use super::{ignore_not_found, record_failure};
use crate::error::Result;
use crate::gcp::api::{NetworkSecurityApi, NetworkServicesApi};
use crate::gcp::types::GcpResource;
use crate::resource::{BackendRole, ManagedResource, ResourceKind, ResourceNamer, ResourceRegistry};
use serde_json::{json, Map, Value};
use std::sync::Arc;

/// Certificate provider plugin serving workload certificates
pub const CERTIFICATE_PROVIDER_INSTANCE: &str = "google_cloud_private_spiffe";

pub struct SecurityAddon {
    netsec: Arc<dyn NetworkSecurityApi>,
    netsvc: Arc<dyn NetworkServicesApi>,
    project: String,
    namer: ResourceNamer,
    registry: ResourceRegistry,
}

impl SecurityAddon {
    /// Share the base manager's naming and project
    pub fn new(
        base: &TrafficDirectorManager,
        netsec: Arc<dyn NetworkSecurityApi>,
        netsvc: Arc<dyn NetworkServicesApi>,
    ) -> Self {
        Self {
            netsec,
            netsvc,
            project: base.project().to_string(),
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

    pub async fn setup_server_security(
        &mut self,
        server_namespace: &str,
        server_name: &str,
        server_port: u16,
        tls: bool,
        mtls: bool,
    ) -> Result<()> {
        self.create_server_tls_policy(tls, mtls).await?;
        self.create_endpoint_config_selector(server_namespace, server_name, server_port)
            .await?;
        Ok(())
    }

    pub async fn setup_client_security(
        &mut self,
        base: &TrafficDirectorManager,
        server_namespace: &str,
        server_name: &str,
        tls: bool,
        mtls: bool,
    ) -> Result<()> {
        self.create_client_tls_policy(tls, mtls).await?;
        self.backend_service_apply_client_mtls_policy(base, server_namespace, server_name)
            .await
    }

    /// Returns `None` when neither TLS nor mTLS is requested
    pub async fn create_server_tls_policy(
        &mut self,
        tls: bool,
        mtls: bool,
    ) -> Result<Option<GcpResource>> {
        let kind = ResourceKind::ServerTlsPolicy;
        self.registry.ensure_absent(kind)?;

        let name = self.namer.resource_name(kind).to_string();
        tracing::info!("Creating Server TLS Policy {}", name);
        let Some(policy) = server_tls_policy_body(tls, mtls) else {
            tracing::warn!(
                "Server TLS Policy {} neither TLS, nor mTLS policy. Skipping creation",
                name
            );
            return Ok(None);
        };

        self.netsec.create_server_tls_policy(&name, &policy).await?;
        let resource = self.netsec.get_server_tls_policy(&name).await?;
        tracing::debug!("Server TLS Policy loaded: {}", resource.url);
        self.registry.insert(ManagedResource::new(kind, resource.clone()));
        Ok(Some(resource))
    }

    pub async fn delete_server_tls_policy(&mut self, force: bool) -> Result<()> {
        let kind = ResourceKind::ServerTlsPolicy;
        let Some(name) = self.registry.deletion_target(kind, force, &self.namer) else {
            return Ok(());
        };
        tracing::info!("Deleting Server TLS Policy {}", name);
        let result = self.netsec.delete_server_tls_policy(&name).await;
        ignore_not_found(result, kind, &name)?;
        self.registry.remove(kind);
        Ok(())
    }

    /// Select the server's pods by `app=<namespace>-<name>` on `server_port`
    pub async fn create_endpoint_config_selector(
        &mut self,
        server_namespace: &str,
        server_name: &str,
        server_port: u16,
    ) -> Result<GcpResource> {
        let kind = ResourceKind::EndpointConfigSelector;
        self.registry.ensure_absent(kind)?;

        let name = self.namer.resource_name(kind).to_string();
        tracing::info!("Creating Endpoint Config Selector {}", name);

        let server_tls_policy = self
            .registry
            .get(ResourceKind::ServerTlsPolicy)
            .map(|policy| policy.url().to_string());
        if server_tls_policy.is_none() {
            tracing::warn!(
                "Creating Endpoint Config Selector {} with no Server TLS policy attached",
                name
            );
        }

        let config = endpoint_config_selector_body(
            server_namespace,
            server_name,
            server_port,
            server_tls_policy.as_deref(),
        );
        self.netsvc
            .create_endpoint_config_selector(&name, &config)
            .await?;

        let resource = self.netsvc.get_endpoint_config_selector(&name).await?;
        tracing::debug!("Loaded Endpoint Config Selector: {}", resource.url);
        self.registry.insert(ManagedResource::new(kind, resource.clone()));
        Ok(resource)
    }

    pub async fn delete_endpoint_config_selector(&mut self, force: bool) -> Result<()> {
        let kind = ResourceKind::EndpointConfigSelector;
        let Some(name) = self.registry.deletion_target(kind, force, &self.namer) else {
            return Ok(());
        };
        tracing::info!("Deleting Endpoint Config Selector {}", name);
        let result = self.netsvc.delete_endpoint_config_selector(&name).await;
        ignore_not_found(result, kind, &name)?;
        self.registry.remove(kind);
        Ok(())
    }

    /// Returns `None` when neither TLS nor mTLS is requested
    pub async fn create_client_tls_policy(
        &mut self,
        tls: bool,
        mtls: bool,
    ) -> Result<Option<GcpResource>> {
        let kind = ResourceKind::ClientTlsPolicy;
        self.registry.ensure_absent(kind)?;

        let name = self.namer.resource_name(kind).to_string();
        tracing::info!("Creating Client TLS Policy {}", name);
        let Some(policy) = client_tls_policy_body(tls, mtls) else {
            tracing::warn!(
                "Client TLS Policy {} neither TLS, nor mTLS policy. Skipping creation",
                name
            );
            return Ok(None);
        };

        self.netsec.create_client_tls_policy(&name, &policy).await?;
        let resource = self.netsec.get_client_tls_policy(&name).await?;
        tracing::debug!("Client TLS Policy loaded: {}", resource.url);
        self.registry.insert(ManagedResource::new(kind, resource.clone()));
        Ok(Some(resource))
    }

    pub async fn delete_client_tls_policy(&mut self, force: bool) -> Result<()> {
        let kind = ResourceKind::ClientTlsPolicy;
        let Some(name) = self.registry.deletion_target(kind, force, &self.namer) else {
            return Ok(());
        };
        tracing::info!("Deleting Client TLS Policy {}", name);
        let result = self.netsec.delete_client_tls_policy(&name).await;
        ignore_not_found(result, kind, &name)?;
        self.registry.remove(kind);
        Ok(())
    }

    /// Point the primary backend service at the client TLS policy
    ///
    /// Skipped with a warning when no client policy was created.
    pub async fn backend_service_apply_client_mtls_policy(
        &self,
        base: &TrafficDirectorManager,
        server_namespace: &str,
        server_name: &str,
    ) -> Result<()> {
        let backend_service = base.backend_service(BackendRole::Primary)?;
        let Some(client_tls_policy) = self.registry.get(ResourceKind::ClientTlsPolicy) else {
            tracing::warn!(
                "Client TLS policy not created, skipping attaching to Backend Service {}",
                backend_service.name()
            );
            return Ok(());
        };

        let server_spiffe = server_spiffe_id(&self.project, server_namespace, server_name);
        tracing::info!(
            "Adding Client TLS Policy to Backend Service {}: {}, server {}",
            backend_service.name(),
            client_tls_policy.url(),
            server_spiffe
        );

        let body = json!({
            "securitySettings": {
                "clientTlsPolicy": client_tls_policy.url(),
                "subjectAltNames": [server_spiffe],
            }
        });
        base.patch_backend_service(BackendRole::Primary, &body).await
    }

    /// Endpoint config selector, then server policy, then client policy
    pub(crate) async fn cleanup_into(&mut self, force: bool, failures: &mut Vec<String>) {
        let result = self.delete_endpoint_config_selector(force).await;
        record_failure(failures, ResourceKind::EndpointConfigSelector, result);

        let result = self.delete_server_tls_policy(force).await;
        record_failure(failures, ResourceKind::ServerTlsPolicy, result);

        let result = self.delete_client_tls_policy(force).await;
        record_failure(failures, ResourceKind::ClientTlsPolicy, result);
    }
}

pub fn server_spiffe_id(project: &str, namespace: &str, service_account: &str) -> String {
    format!(
        "spiffe://{}.svc.id.goog/ns/{}/sa/{}",
        project, namespace, service_account
    )
}

fn certificate_provider() -> Value {
    json!({
        "certificateProviderInstance": {
            "pluginInstance": CERTIFICATE_PROVIDER_INSTANCE
        }
    })
}

fn server_tls_policy_body(tls: bool, mtls: bool) -> Option<Value> {
    if !tls && !mtls {
        return None;
    }
    let mut policy = Map::new();
    if tls {
        policy.insert("serverCertificate".to_string(), certificate_provider());
    }
    if mtls {
        policy.insert(
            "mtlsPolicy".to_string(),
            json!({ "clientValidationCa": [certificate_provider()] }),
        );
    }
    Some(Value::Object(policy))
}

fn client_tls_policy_body(tls: bool, mtls: bool) -> Option<Value> {
    if !tls && !mtls {
        return None;
    }
    let mut policy = Map::new();
    if tls {
        policy.insert(
            "serverValidationCa".to_string(),
            json!([certificate_provider()]),
        );
    }
    if mtls {
        policy.insert("clientCertificate".to_string(), certificate_provider());
    }
    Some(Value::Object(policy))
}

fn endpoint_config_selector_body(
    server_namespace: &str,
    server_name: &str,
    server_port: u16,
    server_tls_policy: Option<&str>,
) -> Value {
    let mut config = json!({
        "type": "GRPC_SERVER",
        "httpFilters": {},
        "trafficPortSelector": {
            "ports": [server_port.to_string()]
        },
        "endpointMatcher": {
            "metadataLabelMatcher": {
                "metadataLabelMatchCriteria": "MATCH_ALL",
                "metadataLabels": [{
                    "labelName": "app",
                    "labelValue": format!("{}-{}", server_namespace, server_name)
                }]
            }
        },
    });
    if let Some(policy) = server_tls_policy {
        config["serverTlsPolicy"] = Value::String(policy.to_string());
    }
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_policy_tls_and_mtls() {
        let policy = server_tls_policy_body(true, true).unwrap();
        assert_eq!(
            policy["serverCertificate"]["certificateProviderInstance"]["pluginInstance"],
            CERTIFICATE_PROVIDER_INSTANCE
        );
        assert!(policy["mtlsPolicy"]["clientValidationCa"].is_array());
    }

    #[test]
    fn test_policies_skip_when_nothing_requested() {
        assert!(server_tls_policy_body(false, false).is_none());
        assert!(client_tls_policy_body(false, false).is_none());
    }

    #[test]
    fn test_client_policy_tls_only() {
        let policy = client_tls_policy_body(true, false).unwrap();
        assert!(policy.get("serverValidationCa").is_some());
        assert!(policy.get("clientCertificate").is_none());
    }

    #[test]
    fn test_endpoint_config_selector_body() {
        let config = endpoint_config_selector_body("ns", "server", 8080, Some("projects/p/x"));
        assert_eq!(config["type"], "GRPC_SERVER");
        assert_eq!(config["trafficPortSelector"]["ports"][0], "8080");
        assert_eq!(
            config["endpointMatcher"]["metadataLabelMatcher"]["metadataLabels"][0]["labelValue"],
            "ns-server"
        );
        assert_eq!(config["serverTlsPolicy"], "projects/p/x");

        let unbound = endpoint_config_selector_body("ns", "server", 8080, None);
        assert!(unbound.get("serverTlsPolicy").is_none());
    }

    #[test]
    fn test_server_spiffe_id() {
        assert_eq!(
            server_spiffe_id("grpc-testing", "ns", "server"),
            "spiffe://grpc-testing.svc.id.goog/ns/ns/sa/server"
        );
    }
}
