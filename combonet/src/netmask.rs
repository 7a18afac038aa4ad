//! CIDR netmasks over [`Endpoint`]s.
//!
//! A [`Netmask`] is a network address plus a prefix length, and answers
//! whether a candidate address lies inside it.
//!
//! The network address is stored as given. Bits beyond the prefix are not
//! cleared on construction: [`Netmask::matches`] only ever looks at the prefix
//! bits, so `10.0.0.1/8` and `10.0.0.0/8` match exactly the same addresses,
//! but they print differently and do not compare equal. Use
//! [`Netmask::masked_network`] to get the canonical network address.
//!
//! ```rust
//! use combonet::{Endpoint, Netmask};
//!
//! # fn main() -> combonet::Result<()> {
//! let mask: Netmask = "10.0.0.0/24".parse()?;
//! assert!(mask.matches(&Endpoint::parse("10.0.0.5", 0)?));
//! assert!(!mask.matches(&Endpoint::parse("10.0.1.5", 0)?));
//! # Ok(())
//! # }
//! ```

use std::{fmt, str::FromStr};

use crate::{Endpoint, Error, Result, address::truncate_bytes};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Netmask {
  network: Endpoint,
  bits: u8,
  // host order, only used for IPv4
  mask: u32,
}

impl Netmask {
  /// Builds a netmask over `network`, forcing its port to 0.
  ///
  /// `bits` larger than the family's width is clamped to the width.
  pub fn new(mut network: Endpoint, bits: u8) -> Netmask {
    network.set_port(0);
    let bits = bits.min(network.family().width());
    Netmask { network, bits, mask: v4_mask(bits) }
  }

  /// Parses `addr/len`.
  ///
  /// Without `/len` the mask covers the full address width. `len` must be
  /// decimal; values beyond the width are clamped.
  pub fn parse(text: &str) -> Result<Netmask> {
    let (addr, len) = match text.split_once('/') {
      None => (text, None),
      Some((addr, len)) => (addr, Some(len)),
    };
    let network = Endpoint::parse(addr, 0)?;

    let bits = match len {
      None => network.family().width(),
      Some(len) => parse_prefix_len(len)
        .ok_or_else(|| Error::AddressParse(text.to_owned()))?,
    };

    Ok(Netmask::new(network, bits))
  }

  /// Does `candidate` fall inside this network?
  ///
  /// Addresses of a different family never match, and neither does anything
  /// against the empty netmask.
  pub fn matches(&self, candidate: &Endpoint) -> bool {
    match (&self.network, candidate) {
      (Endpoint::V4 { addr: ours, .. }, Endpoint::V4 { addr: theirs, .. }) => {
        self.matches_v4(u32::from_be_bytes(*theirs), u32::from_be_bytes(*ours))
      }
      (Endpoint::V6 { addr: ours, .. }, Endpoint::V6 { addr: theirs, .. }) => {
        let bytes = usize::from(self.bits / 8);
        if ours[..bytes] != theirs[..bytes] {
          return false;
        }
        if bytes == ours.len() {
          return true;
        }

        // still here, now match remaining bits
        let mask = !(0xFFu8 >> (self.bits % 8));
        ours[bytes] & mask == theirs[bytes] & mask
      }
      _ => false,
    }
  }

  /// Parses `text` as an address and matches it.
  pub fn matches_str(&self, text: &str) -> Result<bool> {
    Ok(self.matches(&Endpoint::parse(text, 0)?))
  }

  fn matches_v4(&self, candidate: u32, network: u32) -> bool {
    candidate & self.mask == network & self.mask
  }

  /// The network address with every bit past the prefix cleared.
  pub fn masked_network(&self) -> Endpoint {
    let mut result = self.network;
    match &mut result {
      Endpoint::Unset => {}
      Endpoint::V4 { addr, .. } => {
        *addr = (u32::from_be_bytes(*addr) & self.mask).to_be_bytes();
      }
      Endpoint::V6 { addr, .. } => truncate_bytes(addr, self.bits),
    }
    result
  }

  pub fn network(&self) -> &Endpoint {
    &self.network
  }

  pub fn bits(&self) -> u8 {
    self.bits
  }

  pub fn is_ipv4(&self) -> bool {
    self.network.is_ipv4()
  }

  pub fn is_ipv6(&self) -> bool {
    self.network.is_ipv6()
  }

  /// True for the default netmask, which matches nothing.
  pub fn is_empty(&self) -> bool {
    self.network.is_unset()
  }

  pub fn to_string_no_mask(&self) -> String {
    self.network.to_text()
  }
}

fn v4_mask(bits: u8) -> u32 {
  u32::MAX.checked_shr(u32::from(bits)).map_or(u32::MAX, |rest| !rest)
}

fn parse_prefix_len(text: &str) -> Option<u8> {
  if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
    return None;
  }
  // Anything past u8 is clamped by the constructor anyway.
  Some(text.parse::<u32>().map_or(u8::MAX, |n| n.min(u32::from(u8::MAX)) as u8))
}

impl fmt::Display for Netmask {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.network.to_text(), self.bits)
  }
}

impl FromStr for Netmask {
  type Err = Error;

  fn from_str(text: &str) -> Result<Netmask> {
    Netmask::parse(text)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ep(text: &str) -> Endpoint {
    Endpoint::parse(text, 0).unwrap()
  }

  fn nm(text: &str) -> Netmask {
    Netmask::parse(text).unwrap()
  }

  #[test]
  fn test_v4_mask_values() {
    assert_eq!(v4_mask(0), 0);
    assert_eq!(v4_mask(1), 0x8000_0000);
    assert_eq!(v4_mask(24), 0xFFFF_FF00);
    assert_eq!(v4_mask(32), 0xFFFF_FFFF);
  }

  #[test]
  fn test_match_v4() {
    let mask = nm("10.0.0.0/24");
    assert!(mask.matches(&ep("10.0.0.5")));
    assert!(mask.matches(&ep("10.0.0.255:53")));
    assert!(!mask.matches(&ep("10.0.1.5")));
    assert!(!mask.matches(&ep("::ffff:10.0.0.5")));
  }

  #[test]
  fn test_match_v6() {
    let mask = nm("2001:db8::/32");
    assert!(mask.matches(&ep("2001:db8::1")));
    assert!(!mask.matches(&ep("2001:db9::1")));
    assert!(!mask.matches(&ep("10.0.0.1")));

    let mask = nm("2001:db8::/33");
    assert!(mask.matches(&ep("2001:db8:7fff::1")));
    assert!(!mask.matches(&ep("2001:db8:8000::1")));
  }

  #[test]
  fn test_full_and_zero_prefix() {
    assert!(nm("1.2.3.4").matches(&ep("1.2.3.4")));
    assert!(!nm("1.2.3.4").matches(&ep("1.2.3.5")));
    assert!(nm("::1").matches(&ep("::1")));
    assert!(!nm("::1").matches(&ep("::2")));

    assert!(nm("0.0.0.0/0").matches(&ep("203.0.113.9")));
    assert!(nm("::/0").matches(&ep("2001:db8::1")));
  }

  #[test]
  fn test_dirty_network_matches_like_clean_one() {
    let dirty = nm("10.1.2.3/8");
    let clean = nm("10.0.0.0/8");
    for candidate in ["10.9.9.9", "11.0.0.0", "10.1.2.3"] {
      assert_eq!(dirty.matches(&ep(candidate)), clean.matches(&ep(candidate)));
    }

    assert_ne!(dirty, clean);
    assert_eq!(dirty.to_string(), "10.1.2.3/8");
    assert_eq!(dirty.masked_network(), *clean.network());
  }

  #[test]
  fn test_masked_network() {
    assert_eq!(nm("192.168.77.5/20").masked_network().to_text(), "192.168.64.0");
    assert_eq!(nm("2001:db8:ffff::1/36").masked_network().to_text(), "2001:db8:f000::");
    assert_eq!(nm("2001:db8::1/128").masked_network().to_text(), "2001:db8::1");
    assert_eq!(nm("2001:db8::1/0").masked_network().to_text(), "::");
  }

  #[test]
  fn test_port_forced_to_zero() {
    let mask = Netmask::new(ep("10.0.0.0:80"), 8);
    assert_eq!(mask.network().port(), 0);
    assert_eq!(mask, nm("10.0.0.0/8"));
  }

  #[test]
  fn test_prefix_clamped() {
    assert_eq!(nm("10.0.0.0/33").bits(), 32);
    assert_eq!(nm("10.0.0.0/4000").bits(), 32);
    assert_eq!(nm("::/129").bits(), 128);
    assert_eq!(Netmask::new(ep("::"), 200).bits(), 128);
  }

  #[test]
  fn test_parse_errors() {
    for bad in ["", "/8", "10.0.0.0/", "10.0.0.0/x", "10.0.0.0/-1", "nope/8"] {
      assert!(
        matches!(Netmask::parse(bad), Err(Error::AddressParse(_))),
        "{bad:?} should not parse"
      );
    }
  }

  #[test]
  fn test_empty_netmask_matches_nothing() {
    let empty = Netmask::default();
    assert!(empty.is_empty());
    assert!(!empty.matches(&ep("0.0.0.0")));
    assert!(!empty.matches(&Endpoint::Unset));
  }

  #[test]
  fn test_ordering_is_network_then_bits() {
    assert!(nm("10.0.0.0/8") < nm("10.0.0.0/16"));
    assert!(nm("10.0.0.0/16") < nm("11.0.0.0/8"));
    assert!(nm("255.0.0.0/8") < nm("::/0"));
  }

  #[test]
  fn test_display_and_accessors() {
    let mask = nm("2001:db8::/32");
    assert_eq!(mask.to_string(), "2001:db8::/32");
    assert_eq!(mask.to_string_no_mask(), "2001:db8::");
    assert!(mask.is_ipv6());
    assert!(!mask.is_ipv4());
    assert!(mask.matches_str("2001:db8::42").unwrap());
    assert!(mask.matches_str("bogus").is_err());
  }
}
