//! Address Tests
//!
//! Tests for endpoint resolution.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use maboss_rpc::network::{is_tcp_port, Endpoint};
use maboss_rpc::RpcError;

// =============================================================================
// TCP Tests
// =============================================================================

#[test]
fn test_numeric_port_is_tcp() {
    assert!(is_tcp_port("7777"));
    assert!(is_tcp_port("0"));
    assert!(!is_tcp_port(""));
    assert!(!is_tcp_port("/tmp/maboss.sock"));
    assert!(!is_tcp_port("77a"));
}

#[test]
fn test_resolve_ipv4_literal() {
    let endpoint = Endpoint::resolve(Some("127.0.0.1"), "4291").unwrap();
    assert_eq!(
        endpoint,
        Endpoint::Tcp(SocketAddr::from((Ipv4Addr::LOCALHOST, 4291)))
    );
    assert!(!endpoint.is_unix());
    assert_eq!(endpoint.to_string(), "tcp://127.0.0.1:4291");
}

#[test]
fn test_resolve_localhost_prefers_ipv4() {
    match Endpoint::resolve(Some("localhost"), "4291").unwrap() {
        Endpoint::Tcp(addr) => {
            assert!(addr.is_ipv4());
            assert_eq!(addr.port(), 4291);
        }
        other => panic!("Expected TCP endpoint, got {}", other),
    }
}

#[test]
fn test_port_out_of_range() {
    assert!(matches!(
        Endpoint::resolve(Some("127.0.0.1"), "70000"),
        Err(RpcError::Config(_))
    ));
}

#[test]
fn test_unresolvable_host() {
    assert!(matches!(
        Endpoint::resolve(Some("no-such-host.invalid"), "4291"),
        Err(RpcError::Resolve { .. })
    ));
}

#[test]
fn test_empty_port() {
    assert!(matches!(
        Endpoint::resolve(None, ""),
        Err(RpcError::Config(_))
    ));
}

// =============================================================================
// Unix Socket Tests
// =============================================================================

#[test]
fn test_path_port_is_unix_socket() {
    let endpoint = Endpoint::resolve(None, "/tmp/maboss.sock").unwrap();
    assert_eq!(endpoint, Endpoint::Unix(PathBuf::from("/tmp/maboss.sock")));
    assert!(endpoint.is_unix());
    assert_eq!(endpoint.to_string(), "unix:///tmp/maboss.sock");
}

#[test]
fn test_unix_socket_accepts_localhost_and_empty_host() {
    assert!(Endpoint::resolve(Some("localhost"), "maboss.sock").unwrap().is_unix());
    assert!(Endpoint::resolve(Some(""), "maboss.sock").unwrap().is_unix());
}

#[test]
fn test_unix_socket_rejects_remote_host() {
    assert!(matches!(
        Endpoint::resolve(Some("example.org"), "/tmp/maboss.sock"),
        Err(RpcError::Config(_))
    ));
}
