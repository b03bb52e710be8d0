//! Network Services v1alpha1: routers, gRPC routes, endpoint config selectors

use super::api::NetworkServicesApi;
use super::client::GcpClient;
use super::location::{LocationCollection, LocationService};
use super::types::GcpResource;
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;

const ROUTERS: LocationCollection = LocationCollection {
    service: LocationService::NetworkServices,
    collection: "routers",
    id_param: "routerId",
};

const GRPC_ROUTES: LocationCollection = LocationCollection {
    service: LocationService::NetworkServices,
    collection: "grpcRoutes",
    id_param: "grpcRouteId",
};

const ENDPOINT_CONFIG_SELECTORS: LocationCollection = LocationCollection {
    service: LocationService::NetworkServices,
    collection: "endpointConfigSelectors",
    id_param: "endpointConfigSelectorId",
};

pub struct NetworkServicesV1Alpha1 {
    client: GcpClient,
}

impl NetworkServicesV1Alpha1 {
    pub fn new(client: GcpClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NetworkServicesApi for NetworkServicesV1Alpha1 {
    async fn create_router(&self, name: &str, body: &Value) -> Result<()> {
        ROUTERS.create(&self.client, name, body).await
    }

    async fn get_router(&self, name: &str) -> Result<GcpResource> {
        ROUTERS.get(&self.client, name).await
    }

    async fn delete_router(&self, name: &str) -> Result<()> {
        ROUTERS.delete(&self.client, name).await
    }

    async fn create_grpc_route(&self, name: &str, body: &Value) -> Result<()> {
        GRPC_ROUTES.create(&self.client, name, body).await
    }

    async fn get_grpc_route(&self, name: &str) -> Result<GcpResource> {
        GRPC_ROUTES.get(&self.client, name).await
    }

    async fn delete_grpc_route(&self, name: &str) -> Result<()> {
        GRPC_ROUTES.delete(&self.client, name).await
    }

    async fn create_endpoint_config_selector(&self, name: &str, body: &Value) -> Result<()> {
        ENDPOINT_CONFIG_SELECTORS.create(&self.client, name, body).await
    }

    async fn get_endpoint_config_selector(&self, name: &str) -> Result<GcpResource> {
        ENDPOINT_CONFIG_SELECTORS.get(&self.client, name).await
    }

    async fn delete_endpoint_config_selector(&self, name: &str) -> Result<()> {
        ENDPOINT_CONFIG_SELECTORS.delete(&self.client, name).await
    }
}
