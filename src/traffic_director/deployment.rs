//! Top-level orchestrator
//!
//! Holds the base manager and whichever add-ons a scenario enabled, and
//! sequences setup and teardown across them.

use super::manager::TrafficDirectorManager;
use super::record_failure;
use super::route::RouteAddon;
use super::security::SecurityAddon;
use crate::error::{Result, TdError};
use crate::gcp::api::{NetworkSecurityApi, NetworkServicesApi};
use crate::gcp::types::BackendServiceProtocol;
use crate::resource::ResourceKind;
use std::sync::Arc;

pub struct TrafficDirector {
    pub base: TrafficDirectorManager,
    pub route: Option<RouteAddon>,
    pub security: Option<SecurityAddon>,
}

impl TrafficDirector {
    pub fn new(base: TrafficDirectorManager) -> Self {
        Self {
            base,
            route: None,
            security: None,
        }
    }

    pub fn with_route(mut self, netsvc: Arc<dyn NetworkServicesApi>) -> Self {
        self.route = Some(RouteAddon::new(&self.base, netsvc));
        self
    }

    pub fn with_security(
        mut self,
        netsec: Arc<dyn NetworkSecurityApi>,
        netsvc: Arc<dyn NetworkServicesApi>,
    ) -> Self {
        self.security = Some(SecurityAddon::new(&self.base, netsec, netsvc));
        self
    }

    pub async fn setup_for_grpc(
        &mut self,
        service_host: &str,
        service_port: u16,
        backend_protocol: BackendServiceProtocol,
        health_check_port: Option<u16>,
    ) -> Result<()> {
        self.base
            .setup_for_grpc(service_host, service_port, backend_protocol, health_check_port)
            .await
    }

    pub async fn setup_for_grpc_route(
        &mut self,
        service_host: &str,
        service_port: u16,
        backend_protocol: BackendServiceProtocol,
        health_check_port: Option<u16>,
    ) -> Result<()> {
        let route = self.route.as_mut().ok_or_else(route_disabled)?;
        route
            .setup_for_grpc_route(
                &mut self.base,
                service_host,
                service_port,
                backend_protocol,
                health_check_port,
            )
            .await
    }

    pub async fn setup_server_security(
        &mut self,
        server_namespace: &str,
        server_name: &str,
        server_port: u16,
        tls: bool,
        mtls: bool,
    ) -> Result<()> {
        let security = self.security.as_mut().ok_or_else(security_disabled)?;
        security
            .setup_server_security(server_namespace, server_name, server_port, tls, mtls)
            .await
    }

    pub async fn setup_client_security(
        &mut self,
        server_namespace: &str,
        server_name: &str,
        tls: bool,
        mtls: bool,
    ) -> Result<()> {
        let security = self.security.as_mut().ok_or_else(security_disabled)?;
        security
            .setup_client_security(&self.base, server_namespace, server_name, tls, mtls)
            .await
    }

    /// Route add-on, then the base, then the security add-on
    ///
    /// The backend service references the client TLS policy, so policies go
    /// last. Every step runs even when an earlier one failed.
    pub async fn cleanup(&mut self, force: bool) -> Result<()> {
        self.teardown(force, false).await
    }

    /// [`cleanup`](Self::cleanup), then the shared firewall rule
    ///
    /// The firewall delete is attempted even when the rest of the teardown
    /// failed; all failures are reported together.
    pub async fn cleanup_with_firewall(&mut self, force: bool) -> Result<()> {
        self.teardown(force, true).await
    }

    async fn teardown(&mut self, force: bool, firewall: bool) -> Result<()> {
        let mut failures = Vec::new();

        if let Some(route) = self.route.as_mut() {
            route.cleanup_into(force, &mut failures).await;
        }
        self.base.cleanup_into(force, &mut failures).await;
        if let Some(security) = self.security.as_mut() {
            security.cleanup_into(force, &mut failures).await;
        }
        if firewall {
            let result = self.base.delete_firewall_rule(force).await;
            record_failure(&mut failures, ResourceKind::FirewallRule, result);
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(TdError::PartialCleanup { failures })
        }
    }
}

fn route_disabled() -> TdError {
    TdError::InvalidArgument("gRPC route add-on is not enabled".to_string())
}

fn security_disabled() -> TdError {
    TdError::InvalidArgument("security add-on is not enabled".to_string())
}
