//! GCP Client
//!
//! Main client for interacting with GCP APIs, combining authentication,
//! HTTP functionality and long-running operation polling.

use super::auth::GcpCredentials;
use super::http::GcpHttpClient;
use super::poll::{poll_until, Attempt, PollPolicy};
use crate::error::{Result, TdError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// API base URLs, overridable for staging endpoints and tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpoints {
    pub compute: String,
    pub network_security: String,
    pub network_services: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            compute: "https://compute.googleapis.com/compute/v1".to_string(),
            network_security: "https://networksecurity.googleapis.com/v1alpha1".to_string(),
            network_services: "https://networkservices.googleapis.com/v1alpha1".to_string(),
        }
    }
}

impl ApiEndpoints {
    /// Point every API at one base URL (used against mock servers)
    pub fn single_host(base: &str) -> Self {
        let base = base.trim_end_matches('/');
        Self {
            compute: format!("{}/compute/v1", base),
            network_security: format!("{}/networksecurity/v1alpha1", base),
            network_services: format!("{}/networkservices/v1alpha1", base),
        }
    }
}

/// Main GCP client
#[derive(Clone)]
pub struct GcpClient {
    pub credentials: GcpCredentials,
    pub http: GcpHttpClient,
    pub project_id: String,
    pub endpoints: ApiEndpoints,
    pub polling: PollPolicy,
}

impl GcpClient {
    /// Create a new GCP client using Application Default Credentials
    pub async fn new(project_id: &str) -> Result<Self> {
        let credentials = GcpCredentials::new().await?;
        Self::with_credentials(credentials, project_id, ApiEndpoints::default())
    }

    /// Create a client from explicit credentials and endpoints
    pub fn with_credentials(
        credentials: GcpCredentials,
        project_id: &str,
        endpoints: ApiEndpoints,
    ) -> Result<Self> {
        Ok(Self {
            credentials,
            http: GcpHttpClient::new()?,
            project_id: project_id.to_string(),
            endpoints,
            polling: PollPolicy::default(),
        })
    }

    /// Replace the polling policy, rejecting values that cannot drive a backoff
    pub fn with_polling(mut self, polling: PollPolicy) -> Result<Self> {
        polling.validate()?;
        self.polling = polling;
        Ok(self)
    }

    /// Make a GET request to a GCP API
    pub async fn get(&self, url: &str) -> Result<Value> {
        let token = self.credentials.get_token().await?;
        self.http.get(url, &token).await
    }

    /// Make a POST request to a GCP API
    pub async fn post(&self, url: &str, body: Option<&Value>) -> Result<Value> {
        let token = self.credentials.get_token().await?;
        self.http.post(url, &token, body).await
    }

    /// Make a PATCH request to a GCP API
    pub async fn patch(&self, url: &str, body: &Value) -> Result<Value> {
        let token = self.credentials.get_token().await?;
        self.http.patch(url, &token, body).await
    }

    /// Make a DELETE request to a GCP API
    pub async fn delete(&self, url: &str) -> Result<Value> {
        let token = self.credentials.get_token().await?;
        self.http.delete(url, &token).await
    }

    // =========================================================================
    // Compute Engine API helpers
    // =========================================================================

    /// Build Compute Engine API URL
    pub fn compute_url(&self, path: &str) -> String {
        format!(
            "{}/projects/{}/{}",
            self.endpoints.compute, self.project_id, path
        )
    }

    /// Build global Compute Engine API URL
    pub fn compute_global_url(&self, resource: &str) -> String {
        self.compute_url(&format!("global/{}", resource))
    }

    /// Build zonal Compute Engine API URL
    pub fn compute_zonal_url(&self, zone: &str, resource: &str) -> String {
        self.compute_url(&format!("zones/{}/{}", zone, resource))
    }

    /// Wait for a global Compute Engine operation to reach DONE
    pub async fn wait_for_global_operation(&self, operation: &Value) -> Result<Value> {
        let name = operation
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Operation response has no name"))?
            .to_string();

        let url = self.compute_global_url(&format!("operations/{}", name));
        let first = operation.clone();
        let mut fetched = false;

        poll_until(&self.polling, &format!("operation {}", name), || {
            let op_name = name.clone();
            let url = url.clone();
            let snapshot = (!fetched).then(|| first.clone());
            fetched = true;
            async move {
                let op = match snapshot {
                    Some(op) if op.get("status").and_then(|v| v.as_str()) == Some("DONE") => op,
                    _ => self.get(&url).await?,
                };
                match op.get("status").and_then(|v| v.as_str()) {
                    Some("DONE") => {
                        if let Some(message) = compute_operation_error(&op) {
                            return Err(TdError::Operation {
                                operation: op_name,
                                message,
                            });
                        }
                        Ok(Attempt::Ready(op))
                    },
                    status => Ok(Attempt::Pending(format!(
                        "status {}",
                        status.unwrap_or("UNKNOWN")
                    ))),
                }
            }
        })
        .await
    }

    // =========================================================================
    // Network Security / Network Services API helpers
    // =========================================================================

    /// Build Network Security collection URL
    pub fn network_security_url(&self, collection: &str) -> String {
        format!(
            "{}/projects/{}/locations/global/{}",
            self.endpoints.network_security, self.project_id, collection
        )
    }

    /// Build Network Services collection URL
    pub fn network_services_url(&self, collection: &str) -> String {
        format!(
            "{}/projects/{}/locations/global/{}",
            self.endpoints.network_services, self.project_id, collection
        )
    }

    /// Wait for a google.longrunning Operation to report `done`
    pub async fn wait_for_long_running_operation(
        &self,
        service_base: &str,
        operation: &Value,
    ) -> Result<Value> {
        let name = operation
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("Operation response has no name"))?
            .to_string();
        let url = format!("{}/{}", service_base, name);
        let first = operation.clone();
        let mut fetched = false;

        poll_until(&self.polling, &format!("operation {}", name), || {
            let op_name = name.clone();
            let url = url.clone();
            let snapshot = (!fetched).then(|| first.clone());
            fetched = true;
            async move {
                let op = match snapshot {
                    Some(op) if is_done(&op) => op,
                    _ => self.get(&url).await?,
                };
                if !is_done(&op) {
                    return Ok(Attempt::Pending("not done".to_string()));
                }
                if let Some(message) = op
                    .get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(|m| m.as_str())
                {
                    return Err(TdError::Operation {
                        operation: op_name,
                        message: message.to_string(),
                    });
                }
                Ok(Attempt::Ready(op))
            }
        })
        .await
    }
}

fn is_done(operation: &Value) -> bool {
    operation
        .get("done")
        .and_then(|v| v.as_bool())
        .unwrap_or(false)
}

/// Collect `error.errors[].message` from a finished compute operation
fn compute_operation_error(operation: &Value) -> Option<String> {
    let errors = operation.get("error")?.get("errors")?.as_array()?;
    let messages: Vec<&str> = errors
        .iter()
        .filter_map(|e| e.get("message").and_then(|m| m.as_str()))
        .collect();
    if messages.is_empty() {
        None
    } else {
        Some(messages.join("; "))
    }
}

/// Extract short name from GCP resource URL
/// e.g., ".../compute/v1/projects/my-project/zones/us-central1-a" -> "us-central1-a"
pub fn extract_short_name(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}
