//! Network Security v1alpha1: server and client TLS policies

use super::api::NetworkSecurityApi;
use super::client::GcpClient;
use super::location::{LocationCollection, LocationService};
use super::types::GcpResource;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

const SERVER_TLS_POLICIES: LocationCollection = LocationCollection {
    service: LocationService::NetworkSecurity,
    collection: "serverTlsPolicies",
    id_param: "serverTlsPolicyId",
};

const CLIENT_TLS_POLICIES: LocationCollection = LocationCollection {
    service: LocationService::NetworkSecurity,
    collection: "clientTlsPolicies",
    id_param: "clientTlsPolicyId",
};

pub struct NetworkSecurityV1Alpha1 {
    client: GcpClient,
}

impl NetworkSecurityV1Alpha1 {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NetworkSecurityApi for NetworkSecurityV1Alpha1 {
    async fn create_server_tls_policy(&self, name: &str, body: &Value) -> Result<()> {
        SERVER_TLS_POLICIES.create(&self.client, name, body).await
    }

    async fn get_server_tls_policy(&self, name: &str) -> Result<GcpResource> {
        SERVER_TLS_POLICIES.get(&self.client, name).await
    }

    async fn delete_server_tls_policy(&self, name: &str) -> Result<()> {
        SERVER_TLS_POLICIES.delete(&self.client, name).await
    }

    async fn create_client_tls_policy(&self, name: &str, body: &Value) -> Result<()> {
        CLIENT_TLS_POLICIES.create(&self.client, name, body).await
    }

    async fn get_client_tls_policy(&self, name: &str) -> Result<GcpResource> {
        CLIENT_TLS_POLICIES.get(&self.client, name).await
    }

    async fn delete_client_tls_policy(&self, name: &str) -> Result<()> {
        CLIENT_TLS_POLICIES.delete(&self.client, name).await
    }
}
