mod common;

use std::{
  collections::BTreeSet,
  net::{Ipv4Addr, Ipv6Addr},
};

use combonet::{Endpoint, Error, Family, sockaddr};
use proptest::prelude::*;

#[test]
fn test_mapped_ipv4() {
  let mapped = Endpoint::parse("::ffff:1.2.3.4", 0).unwrap();
  assert!(mapped.is_mapped_ipv4());
  assert_eq!(mapped.map_to_ipv4().unwrap().to_text(), "1.2.3.4");

  let loopback = Endpoint::parse("::1", 0).unwrap();
  assert!(!loopback.is_mapped_ipv4());
  assert!(matches!(loopback.map_to_ipv4(), Err(Error::NotMapped(_))));
}

#[test]
fn test_sorting_mixed_families() {
  let set: BTreeSet<Endpoint> = [
    "[::1]:80",
    "10.0.0.1:443",
    "10.0.0.1:80",
    "9.9.9.9:80",
  ]
  .iter()
  .map(|text| text.parse().unwrap())
  .chain([Endpoint::Unset])
  .collect();

  let ordered: Vec<String> = set.iter().map(Endpoint::to_string).collect();
  assert_eq!(
    ordered,
    ["9.9.9.9:80", "10.0.0.1:80", "10.0.0.1:443", "[::1]:80", "invalid"]
  );
}

#[test]
fn test_family_mismatch_is_reported() {
  let v4 = Endpoint::parse("1.2.3.4", 0).unwrap();
  let v6 = Endpoint::parse("::1", 0).unwrap();
  let err = v4.try_cmp_address(&v6).unwrap_err();
  assert!(matches!(
    err,
    Error::AddressFamilyMismatch { left: Family::V4, right: Family::V6 }
  ));
}

#[test]
fn test_kernel_layout_round_trip() {
  common::init_tracing();

  for text in ["127.0.0.1:8080", "0.0.0.0:0", "[2001:db8::1]:53", "[::]:65535"] {
    let endpoint: Endpoint = text.parse().unwrap();
    let (storage, len) = sockaddr::encode(&endpoint).unwrap();
    assert_eq!(sockaddr::decode(&storage, len).unwrap(), endpoint, "{text}");
  }
}

proptest! {
  #[test]
  fn prop_ipv4_text_round_trip(octets in any::<[u8; 4]>(), port in any::<u16>()) {
    let text = Ipv4Addr::from(octets).to_string();
    let endpoint = Endpoint::parse(&text, 0).unwrap();
    prop_assert_eq!(endpoint.to_text(), text.clone());

    let with_port = format!("{text}:{port}");
    let endpoint = Endpoint::parse(&with_port, 1).unwrap();
    prop_assert_eq!(endpoint.port(), port);
    prop_assert_eq!(endpoint.to_text_with_port(), with_port);
  }

  #[test]
  fn prop_ipv6_text_round_trip(octets in any::<[u8; 16]>(), port in any::<u16>()) {
    let text = Ipv6Addr::from(octets).to_string();
    let endpoint = Endpoint::parse(&text, 0).unwrap();
    prop_assert_eq!(endpoint.to_text(), text.clone());

    let bracketed = format!("[{text}]:{port}");
    prop_assert_eq!(Endpoint::parse(&bracketed, 0).unwrap().to_string(), bracketed);
  }

  #[test]
  fn prop_truncate_is_idempotent(octets in any::<[u8; 16]>(), bits in 0u8..=160) {
    let mut once = Endpoint::v6(octets, 0);
    once.truncate(bits);
    let mut twice = once;
    twice.truncate(bits);
    prop_assert_eq!(once, twice);
  }

  #[test]
  fn prop_truncate_bounds(octets in any::<[u8; 4]>()) {
    let original = Endpoint::v4(octets, 7);

    let mut zeroed = original;
    zeroed.truncate(0);
    prop_assert_eq!(zeroed, Endpoint::v4([0; 4], 7));

    let mut full = original;
    full.truncate(32);
    prop_assert_eq!(full, original);
  }

  #[test]
  fn prop_ordering_agrees_with_equality(
    a in any::<[u8; 4]>(),
    b in any::<[u8; 4]>(),
    port in any::<u16>(),
  ) {
    let (a, b) = (Endpoint::v4(a, port), Endpoint::v4(b, port));
    prop_assert_eq!(a == b, a.cmp(&b).is_eq());
    prop_assert_eq!(a.eq_address(&b), a == b);
  }
}
