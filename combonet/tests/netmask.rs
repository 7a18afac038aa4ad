mod common;

use combonet::{Endpoint, Netmask};
use proptest::prelude::*;

#[test]
fn test_documented_matches() {
  let v4: Netmask = "10.0.0.0/24".parse().unwrap();
  assert!(v4.matches_str("10.0.0.5").unwrap());
  assert!(!v4.matches_str("10.0.1.5").unwrap());

  let v6: Netmask = "2001:db8::/32".parse().unwrap();
  assert!(v6.matches_str("2001:db8::1").unwrap());
  assert!(!v6.matches_str("2001:db9::1").unwrap());
}

#[test]
fn test_allow_list() {
  let allowed: Vec<Netmask> = ["127.0.0.0/8", "192.168.0.0/16", "::1/128", "fc00::/7"]
    .iter()
    .map(|text| text.parse().unwrap())
    .collect();
  let permitted = |text: &str| {
    let candidate = Endpoint::parse(text, 0).unwrap();
    allowed.iter().any(|mask| mask.matches(&candidate))
  };

  assert!(permitted("127.1.2.3"));
  assert!(permitted("192.168.254.1:8080"));
  assert!(permitted("[::1]:53"));
  assert!(permitted("fd12:3456::1"));
  assert!(!permitted("8.8.8.8"));
  assert!(!permitted("::2"));
  // Mapped addresses are IPv6 and do not hit IPv4 masks.
  assert!(!permitted("::ffff:127.0.0.1"));
}

proptest! {
  #[test]
  fn prop_network_matches_itself(octets in any::<[u8; 16]>(), bits in 0u8..=128) {
    let mask = Netmask::new(Endpoint::v6(octets, 0), bits);
    prop_assert!(mask.matches(&Endpoint::v6(octets, 443)));
    prop_assert!(mask.matches(&mask.masked_network()));
  }

  #[test]
  fn prop_v4_match_is_prefix_compare(
    net in any::<u32>(),
    candidate in any::<u32>(),
    bits in 0u8..=32,
  ) {
    let mask = Netmask::new(Endpoint::v4(net.to_be_bytes(), 0), bits);
    let shift = 32 - u32::from(bits);
    let expected = net.checked_shr(shift).unwrap_or(0)
      == candidate.checked_shr(shift).unwrap_or(0);
    prop_assert_eq!(mask.matches(&Endpoint::v4(candidate.to_be_bytes(), 0)), expected);
  }

  #[test]
  fn prop_display_round_trip(octets in any::<[u8; 4]>(), bits in 0u8..=32) {
    let mask = Netmask::new(Endpoint::v4(octets, 0), bits);
    let parsed: Netmask = mask.to_string().parse().unwrap();
    prop_assert_eq!(parsed, mask);
  }
}
