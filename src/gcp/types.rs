//! Shared GCP resource types
//!
//! Identities returned by the collaborators and the protocol enums that
//! decide how resources are paired.

use crate::error::{Result, TdError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity of a created remote resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct GcpResource {
    pub name: String,
    pub url: String,
}

impl GcpResource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Zonal network endpoint group used as a backend
///
/// Identity is the (name, zone) pair, so the same group name in two zones
/// is two backends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZonalBackend {
    pub name: String,
    pub zone: String,
}

impl ZonalBackend {
    pub fn new(name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            zone: zone.into(),
        }
    }
}

impl fmt::Display for ZonalBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.zone)
    }
}

/// Backend service protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BackendServiceProtocol {
    #[default]
    Grpc,
    Http2,
    Http,
    Https,
    Tcp,
    Ssl,
    Udp,
    Unspecified,
}

impl BackendServiceProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grpc => "GRPC",
            Self::Http2 => "HTTP2",
            Self::Http => "HTTP",
            Self::Https => "HTTPS",
            Self::Tcp => "TCP",
            Self::Ssl => "SSL",
            Self::Udp => "UDP",
            Self::Unspecified => "UNSPECIFIED",
        }
    }
}

impl fmt::Display for BackendServiceProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendServiceProtocol {
    type Err = TdError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GRPC" => Ok(Self::Grpc),
            "HTTP2" => Ok(Self::Http2),
            "HTTP" => Ok(Self::Http),
            "HTTPS" => Ok(Self::Https),
            "TCP" => Ok(Self::Tcp),
            "SSL" => Ok(Self::Ssl),
            "UDP" => Ok(Self::Udp),
            "UNSPECIFIED" => Ok(Self::Unspecified),
            other => Err(TdError::InvalidArgument(format!(
                "unknown backend service protocol: {}",
                other
            ))),
        }
    }
}

/// Health check protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HealthCheckProtocol {
    #[default]
    Grpc,
    Tcp,
}

impl HealthCheckProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grpc => "GRPC",
            Self::Tcp => "TCP",
        }
    }
}

impl fmt::Display for HealthCheckProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target proxy flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetProxyKind {
    Grpc,
    Http,
}

impl TargetProxyKind {
    /// Proxy flavor a backend service protocol can be paired with
    pub fn for_protocol(protocol: BackendServiceProtocol) -> Result<Self> {
        match protocol {
            BackendServiceProtocol::Grpc => Ok(Self::Grpc),
            BackendServiceProtocol::Http2 => Ok(Self::Http),
            other => Err(TdError::UnsupportedProtocol(other)),
        }
    }

    pub fn collection(&self) -> ComputeCollection {
        match self {
            Self::Grpc => ComputeCollection::TargetGrpcProxies,
            Self::Http => ComputeCollection::TargetHttpProxies,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grpc => "GRPC",
            Self::Http => "HTTP",
        }
    }
}

/// Global Compute Engine collections the manager deletes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputeCollection {
    HealthChecks,
    BackendServices,
    UrlMaps,
    TargetGrpcProxies,
    TargetHttpProxies,
    GlobalForwardingRules,
    Firewalls,
}

impl ComputeCollection {
    /// REST path segment under `projects/<project>/global/`
    pub fn path(&self) -> &'static str {
        match self {
            Self::HealthChecks => "healthChecks",
            Self::BackendServices => "backendServices",
            Self::UrlMaps => "urlMaps",
            Self::TargetGrpcProxies => "targetGrpcProxies",
            Self::TargetHttpProxies => "targetHttpProxies",
            Self::GlobalForwardingRules => "globalForwardingRules",
            Self::Firewalls => "firewalls",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_proxy_kind_for_protocol() {
        assert_eq!(
            TargetProxyKind::for_protocol(BackendServiceProtocol::Grpc).unwrap(),
            TargetProxyKind::Grpc
        );
        assert_eq!(
            TargetProxyKind::for_protocol(BackendServiceProtocol::Http2).unwrap(),
            TargetProxyKind::Http
        );
        for protocol in [
            BackendServiceProtocol::Http,
            BackendServiceProtocol::Https,
            BackendServiceProtocol::Tcp,
            BackendServiceProtocol::Ssl,
            BackendServiceProtocol::Udp,
            BackendServiceProtocol::Unspecified,
        ] {
            assert!(matches!(
                TargetProxyKind::for_protocol(protocol),
                Err(TdError::UnsupportedProtocol(p)) if p == protocol
            ));
        }
    }

    #[test]
    fn test_protocol_parse_is_case_insensitive() {
        assert_eq!(
            "http2".parse::<BackendServiceProtocol>().unwrap(),
            BackendServiceProtocol::Http2
        );
        assert_eq!(
            "udp".parse::<BackendServiceProtocol>().unwrap(),
            BackendServiceProtocol::Udp
        );
        assert!("quic".parse::<BackendServiceProtocol>().is_err());
    }

    #[test]
    fn test_zonal_backend_set_semantics() {
        let mut set = BTreeSet::new();
        set.insert(ZonalBackend::new("neg", "us-central1-a"));
        set.insert(ZonalBackend::new("neg", "us-central1-b"));
        set.insert(ZonalBackend::new("neg", "us-central1-a"));
        assert_eq!(set.len(), 2);
    }
}
