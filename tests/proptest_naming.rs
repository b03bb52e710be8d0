//! Property-based tests using proptest
//!
//! These tests verify resource naming and protocol parsing using
//! randomized inputs.

use proptest::prelude::*;
use std::collections::HashSet;
use tdmesh::gcp::types::{BackendServiceProtocol, TargetProxyKind};
use tdmesh::resource::{ResourceKind, ResourceNamer};

/// Generate GCP-style name segments
fn arb_segment() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,15}"
}

fn arb_kind() -> impl Strategy<Value = ResourceKind> {
    (0..ResourceKind::ALL.len()).prop_map(|i| ResourceKind::ALL[i])
}

proptest! {
    /// Names are pure: two namers with the same inputs agree
    #[test]
    fn test_resource_name_is_stable(
        prefix in arb_segment(),
        suffix in arb_segment(),
        kind in arb_kind()
    ) {
        let a = ResourceNamer::new(&prefix, &suffix);
        let b = ResourceNamer::new(&prefix, &suffix);
        prop_assert_eq!(a.resource_name(kind), b.resource_name(kind));
        prop_assert_eq!(a.resource_name(kind), a.resource_name(kind));
    }

    /// Name layout is prefix, base, then suffix
    #[test]
    fn test_resource_name_layout(
        prefix in arb_segment(),
        suffix in arb_segment(),
        kind in arb_kind()
    ) {
        let namer = ResourceNamer::new(&prefix, &suffix);
        let expected = format!("{}-{}-{}", prefix, kind.base_name(), suffix);
        prop_assert_eq!(namer.resource_name(kind), expected.as_str());
    }

    /// An empty suffix never leaves a trailing separator
    #[test]
    fn test_empty_suffix_has_no_trailing_dash(prefix in arb_segment(), kind in arb_kind()) {
        let namer = ResourceNamer::new(&prefix, "");
        let name = namer.resource_name(kind);
        prop_assert!(!name.ends_with('-'));
        let expected = format!("{}-{}", prefix, kind.base_name());
        prop_assert_eq!(name, expected.as_str());
    }

    /// Every kind gets its own name under one namer
    #[test]
    fn test_names_are_unique_per_namer(prefix in arb_segment(), suffix in arb_segment()) {
        let namer = ResourceNamer::new(&prefix, &suffix);
        let names: HashSet<&str> =
            ResourceKind::ALL.iter().map(|k| namer.resource_name(*k)).collect();
        prop_assert_eq!(names.len(), ResourceKind::ALL.len());
    }

    /// Protocol names parse case-insensitively; anything else is rejected
    #[test]
    fn test_protocol_parsing(input in "[A-Za-z0-9]{1,8}") {
        let known = ["GRPC", "HTTP2", "HTTP", "HTTPS", "TCP", "SSL", "UDP"];
        let parsed = input.parse::<BackendServiceProtocol>();
        if known.contains(&input.to_uppercase().as_str()) {
            let protocol = parsed.unwrap();
            prop_assert_eq!(protocol.as_str(), input.to_uppercase());
        } else {
            prop_assert!(parsed.is_err());
        }
    }
}

#[test]
fn test_only_grpc_and_http2_pair_with_proxies() {
    let paired: Vec<_> = [
        BackendServiceProtocol::Grpc,
        BackendServiceProtocol::Http2,
        BackendServiceProtocol::Http,
        BackendServiceProtocol::Https,
        BackendServiceProtocol::Tcp,
        BackendServiceProtocol::Ssl,
        BackendServiceProtocol::Udp,
        BackendServiceProtocol::Unspecified,
    ]
    .into_iter()
    .filter(|p| TargetProxyKind::for_protocol(*p).is_ok())
    .collect();

    assert_eq!(
        paired,
        vec![BackendServiceProtocol::Grpc, BackendServiceProtocol::Http2]
    );
}
