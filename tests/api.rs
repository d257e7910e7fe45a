//! `api` rules against a local HTTP server.

use nss_dnd::resolver::RuleResolver;
use nss_dnd::rules::RuleSet;
use nss_dnd::{AddressFamily, AddressList, HostResolver, ResolveError};
use std::sync::Arc;
use std::time::Duration;

fn resolver(yaml: &str) -> RuleResolver {
    RuleResolver::new(
        Arc::new(RuleSet::parse(yaml).unwrap()),
        Duration::from_millis(500),
    )
}

#[test]
fn api_rule_resolves_from_the_endpoint_body() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/resolve/dyn.example")
        .with_status(200)
        .with_body("10.9.8.7\n")
        .create();

    let yaml = format!(
        r#"
rules:
  - type: api
    pattern: ".*\\.example"
    options:
      endpoint: "{}/resolve/{{host}}"
"#,
        server.url()
    );
    let record = resolver(&yaml)
        .resolve("dyn.example", AddressFamily::V4)
        .unwrap()
        .unwrap();
    assert_eq!(record.canonical_name, "dyn.example");
    assert_eq!(
        record.addresses,
        AddressList::V4(vec!["10.9.8.7".parse().unwrap()])
    );
    mock.assert();
}

#[test]
fn api_body_may_carry_several_addresses() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/resolve/lb.example")
        .with_status(200)
        .with_body("10.0.0.1 10.0.0.2\nfd00::1\n")
        .create();

    let yaml = format!(
        r#"
rules:
  - type: api
    pattern: "lb\\.example"
    options:
      endpoint: "{}/resolve/{{host}}"
"#,
        server.url()
    );
    let resolver = resolver(&yaml);

    let v4 = resolver
        .resolve("lb.example", AddressFamily::V4)
        .unwrap()
        .unwrap();
    assert_eq!(v4.addresses.len(), 2);

    let v6 = resolver
        .resolve("lb.example", AddressFamily::V6)
        .unwrap()
        .unwrap();
    assert_eq!(v6.addresses, AddressList::V6(vec!["fd00::1".parse().unwrap()]));
}

#[test]
fn declining_endpoint_falls_through_to_later_rules() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/resolve/host.example")
        .with_status(404)
        .create();

    let yaml = format!(
        r#"
rules:
  - type: api
    pattern: "host\\.example"
    options:
      endpoint: "{}/resolve/{{host}}"
  - type: static
    pattern: "host\\.example"
    options:
      target: "10.0.0.9"
"#,
        server.url()
    );
    let record = resolver(&yaml)
        .resolve("host.example", AddressFamily::V4)
        .unwrap()
        .unwrap();
    assert_eq!(
        record.addresses,
        AddressList::V4(vec!["10.0.0.9".parse().unwrap()])
    );
}

#[test]
fn unreachable_endpoint_is_transient() {
    // Nothing listens on the discard port.
    let yaml = r#"
rules:
  - type: api
    pattern: "host\\.example"
    options:
      endpoint: "http://127.0.0.1:9/resolve/{host}"
"#;
    let err = resolver(yaml)
        .resolve("host.example", AddressFamily::V4)
        .unwrap_err();
    assert!(matches!(err, ResolveError::Transient(_)), "{err}");
}

#[test]
fn garbage_body_is_a_backend_failure() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/resolve/host.example")
        .with_status(200)
        .with_body("certainly not an address")
        .create();

    let yaml = format!(
        r#"
rules:
  - type: api
    pattern: "host\\.example"
    options:
      endpoint: "{}/resolve/{{host}}"
"#,
        server.url()
    );
    let err = resolver(&yaml)
        .resolve("host.example", AddressFamily::V4)
        .unwrap_err();
    assert!(matches!(err, ResolveError::Failed(_)), "{err}");
}

#[test]
fn wrong_family_answer_is_a_miss_not_an_error() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/resolve/host.example")
        .with_status(200)
        .with_body("10.0.0.1")
        .create();

    let yaml = format!(
        r#"
rules:
  - type: api
    pattern: "host\\.example"
    options:
      endpoint: "{}/resolve/{{host}}"
"#,
        server.url()
    );
    assert!(resolver(&yaml)
        .resolve("host.example", AddressFamily::V6)
        .unwrap()
        .is_none());
}
