//! Shared CRUD for `projects/<p>/locations/global/<collection>` APIs
//!
//! Network Security and Network Services expose the same resource shape:
//! create takes the id as a query parameter and returns a long-running
//! operation, get returns the resource keyed by its full name.

use super::client::GcpClient;
use super::types::GcpResource;
use crate::error::Result;
use serde_json::Value;

/// Which API a collection belongs to
#[derive(Debug, Clone, Copy)]
pub(crate) enum LocationService {
    NetworkSecurity,
    NetworkServices,
}

/// One collection, e.g. `serverTlsPolicies` with id param `serverTlsPolicyId`
#[derive(Debug, Clone, Copy)]
pub(crate) struct LocationCollection {
    pub service: LocationService,
    pub collection: &'static str,
    pub id_param: &'static str,
}

impl LocationCollection {
    fn collection_url(&self, client: &GcpClient) -> String {
        match self.service {
            LocationService::NetworkSecurity => client.network_security_url(self.collection),
            LocationService::NetworkServices => client.network_services_url(self.collection),
        }
    }

    fn service_base<'a>(&self, client: &'a GcpClient) -> &'a str {
        match self.service {
            LocationService::NetworkSecurity => &client.endpoints.network_security,
            LocationService::NetworkServices => &client.endpoints.network_services,
        }
    }

    pub async fn create(&self, client: &GcpClient, name: &str, body: &Value) -> Result<()> {
        let url = format!(
            "{}?{}={}",
            self.collection_url(client),
            self.id_param,
            urlencoding::encode(name)
        );
        let operation = client.post(&url, Some(body)).await?;
        client
            .wait_for_long_running_operation(self.service_base(client), &operation)
            .await?;
        Ok(())
    }

    /// Fetch by short name; the URL is the full resource name
    pub async fn get(&self, client: &GcpClient, name: &str) -> Result<GcpResource> {
        let url = format!("{}/{}", self.collection_url(client), name);
        let response = client.get(&url).await?;
        tracing::debug!("Loaded {} {}: {}", self.collection, name, response);

        let full_name = response
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .unwrap_or_else(|| {
                format!(
                    "projects/{}/locations/global/{}/{}",
                    client.project_id, self.collection, name
                )
            });

        Ok(GcpResource::new(name, full_name))
    }

    pub async fn delete(&self, client: &GcpClient, name: &str) -> Result<()> {
        let url = format!("{}/{}", self.collection_url(client), name);
        let operation = client.delete(&url).await?;
        client
            .wait_for_long_running_operation(self.service_base(client), &operation)
            .await?;
        Ok(())
    }
}
