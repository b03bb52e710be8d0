//! Managed resource kinds

use std::fmt;

/// Which of the three backend services a call refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BackendRole {
    Primary,
    Alternative,
    Affinity,
}

impl BackendRole {
    pub const ALL: [BackendRole; 3] = [Self::Primary, Self::Alternative, Self::Affinity];
}

/// Every kind of resource a manager can own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    HealthCheck,
    BackendService(BackendRole),
    UrlMap,
    TargetProxy,
    ForwardingRule,
    FirewallRule,
    Router,
    GrpcRoute,
    ServerTlsPolicy,
    ClientTlsPolicy,
    EndpointConfigSelector,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 13] = [
        Self::HealthCheck,
        Self::BackendService(BackendRole::Primary),
        Self::BackendService(BackendRole::Alternative),
        Self::BackendService(BackendRole::Affinity),
        Self::UrlMap,
        Self::TargetProxy,
        Self::ForwardingRule,
        Self::FirewallRule,
        Self::Router,
        Self::GrpcRoute,
        Self::ServerTlsPolicy,
        Self::ClientTlsPolicy,
        Self::EndpointConfigSelector,
    ];

    /// Name segment between the prefix and the suffix
    pub fn base_name(&self) -> &'static str {
        match self {
            Self::HealthCheck => "health-check",
            Self::BackendService(BackendRole::Primary) => "backend-service",
            Self::BackendService(BackendRole::Alternative) => "backend-service-alt",
            Self::BackendService(BackendRole::Affinity) => "backend-service-affinity",
            Self::UrlMap => "url-map",
            Self::TargetProxy => "target-proxy",
            Self::ForwardingRule => "forwarding-rule",
            Self::FirewallRule => "allow-health-checks",
            Self::Router => "router",
            Self::GrpcRoute => "grpc-route",
            Self::ServerTlsPolicy => "server-tls-policy",
            Self::ClientTlsPolicy => "client-tls-policy",
            Self::EndpointConfigSelector => "endpoint-policy",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::HealthCheck => "Health Check",
            Self::BackendService(BackendRole::Primary) => "Backend Service",
            Self::BackendService(BackendRole::Alternative) => "Alternative Backend Service",
            Self::BackendService(BackendRole::Affinity) => "Affinity Backend Service",
            Self::UrlMap => "URL Map",
            Self::TargetProxy => "Target Proxy",
            Self::ForwardingRule => "Forwarding Rule",
            Self::FirewallRule => "Firewall Rule",
            Self::Router => "Router",
            Self::GrpcRoute => "GrpcRoute",
            Self::ServerTlsPolicy => "Server TLS Policy",
            Self::ClientTlsPolicy => "Client TLS Policy",
            Self::EndpointConfigSelector => "Endpoint Config Selector",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}
