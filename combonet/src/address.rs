//! Dual-family socket endpoints.
//!
//! [`Endpoint`] holds an IPv4 or IPv6 address together with a port. It is the
//! value every other part of this crate passes around: netmasks are built over
//! it, connects target it and accepts return it.
//!
//! Unlike a C union aliased over `sockaddr_in`/`sockaddr_in6`, the endpoint is
//! a tagged enum. Going to and from the kernel's binary layout is done by the
//! explicit functions in [`crate::sockaddr`].
//!
//! # Parsing
//!
//! The following are all the same endpoint:
//!
//! ```rust
//! use combonet::Endpoint;
//!
//! # fn main() -> combonet::Result<()> {
//! let a = Endpoint::parse("1.2.3.4:80", 0)?;
//! let b = Endpoint::parse("1.2.3.4", 80)?;
//! let c = Endpoint::parse("1.2.3.4:80", 1234)?; // text overrides the default
//! assert_eq!(a, b);
//! assert_eq!(b, c);
//! # Ok(())
//! # }
//! ```
//!
//! IPv6 literals take their port in brackets, optionally with a scope:
//! `[::1]:53`, `[fe80::1%eth0]:53`, or bare `fe80::1%eth0`.
//!
//! # Ordering
//!
//! Endpoints order by `(family, port, address bytes)`. That is fast and total
//! but not meant to be human friendly. The [`Endpoint::Unset`] sentinel is
//! never less than anything, so it sorts after every real endpoint.

use std::{
  cmp::Ordering,
  ffi::{CStr, CString},
  fmt,
  hash::{Hash, Hasher},
  net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, SocketAddrV6},
  str::FromStr,
};

use crate::{Error, Result};

/// Address family of an [`Endpoint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
  Unset,
  V4,
  V6,
}

impl Family {
  /// The `AF_*` constant for this family.
  pub const fn to_raw(self) -> libc::c_int {
    match self {
      Family::Unset => libc::AF_UNSPEC,
      Family::V4 => libc::AF_INET,
      Family::V6 => libc::AF_INET6,
    }
  }

  pub fn from_raw(raw: libc::c_int) -> Option<Family> {
    match raw {
      libc::AF_UNSPEC => Some(Family::Unset),
      libc::AF_INET => Some(Family::V4),
      libc::AF_INET6 => Some(Family::V6),
      _ => None,
    }
  }

  /// Address width in bits: 32, 128, or 0 for [`Family::Unset`].
  pub const fn width(self) -> u8 {
    match self {
      Family::Unset => 0,
      Family::V4 => 32,
      Family::V6 => 128,
    }
  }
}

impl fmt::Display for Family {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Family::Unset => "unset",
      Family::V4 => "IPv4",
      Family::V6 => "IPv6",
    })
  }
}

/// An IPv4 or IPv6 address plus port.
///
/// The port is kept as a plain host integer and only turned into network byte
/// order when encoded for the kernel. Equality looks at family, port and
/// address bytes; the IPv6 scope id does not take part.
#[derive(Debug, Clone, Copy, Default)]
pub enum Endpoint {
  /// Empty sentinel, family tag 0.
  #[default]
  Unset,
  V4 { addr: [u8; 4], port: u16 },
  V6 { addr: [u8; 16], port: u16, scope_id: u32 },
}

impl Endpoint {
  pub const fn v4(addr: [u8; 4], port: u16) -> Endpoint {
    Endpoint::V4 { addr, port }
  }

  pub const fn v6(addr: [u8; 16], port: u16) -> Endpoint {
    Endpoint::V6 { addr, port, scope_id: 0 }
  }

  /// Parses a numeric presentation address.
  ///
  /// Accepts `a.b.c.d`, `a.b.c.d:port`, an IPv6 literal (optionally
  /// `%scope`d), or `[literal]:port`. A port written in the text always wins
  /// over `default_port`, `:0` included. IPv4 is tried first, then IPv6. No
  /// name resolution is ever performed.
  pub fn parse(text: &str, default_port: u16) -> Result<Endpoint> {
    if let Some((addr, port)) = parse_v4(text) {
      return Ok(Endpoint::V4 { addr, port: port.unwrap_or(default_port) });
    }

    if let Some((addr, scope_id, port)) = parse_v6(text) {
      return Ok(Endpoint::V6 {
        addr,
        port: port.unwrap_or(default_port),
        scope_id,
      });
    }

    Err(Error::AddressParse(text.to_owned()))
  }

  pub fn family(&self) -> Family {
    match self {
      Endpoint::Unset => Family::Unset,
      Endpoint::V4 { .. } => Family::V4,
      Endpoint::V6 { .. } => Family::V6,
    }
  }

  pub fn is_ipv4(&self) -> bool {
    matches!(self, Endpoint::V4 { .. })
  }

  pub fn is_ipv6(&self) -> bool {
    matches!(self, Endpoint::V6 { .. })
  }

  pub fn is_unset(&self) -> bool {
    matches!(self, Endpoint::Unset)
  }

  pub fn port(&self) -> u16 {
    match *self {
      Endpoint::Unset => 0,
      Endpoint::V4 { port, .. } | Endpoint::V6 { port, .. } => port,
    }
  }

  /// Sets the port. Does nothing on [`Endpoint::Unset`].
  pub fn set_port(&mut self, new_port: u16) {
    match self {
      Endpoint::Unset => {}
      Endpoint::V4 { port, .. } | Endpoint::V6 { port, .. } => *port = new_port,
    }
  }

  pub fn scope_id(&self) -> u32 {
    match *self {
      Endpoint::V6 { scope_id, .. } => scope_id,
      _ => 0,
    }
  }

  /// Address bytes in network order: 4 for IPv4, 16 for IPv6, none if unset.
  pub fn octets(&self) -> &[u8] {
    match self {
      Endpoint::Unset => &[],
      Endpoint::V4 { addr, .. } => addr,
      Endpoint::V6 { addr, .. } => addr,
    }
  }

  pub fn ip(&self) -> Option<IpAddr> {
    match *self {
      Endpoint::Unset => None,
      Endpoint::V4 { addr, .. } => Some(IpAddr::from(addr)),
      Endpoint::V6 { addr, .. } => Some(IpAddr::from(addr)),
    }
  }

  /// Zeroes every address bit from position `bits` on, counting from the
  /// most significant bit.
  ///
  /// `truncate(0)` clears the whole address; anything at or beyond the
  /// address width leaves it untouched.
  pub fn truncate(&mut self, bits: u8) {
    match self {
      Endpoint::Unset => {}
      Endpoint::V4 { addr, .. } => truncate_bytes(addr, bits),
      Endpoint::V6 { addr, .. } => truncate_bytes(addr, bits),
    }
  }

  /// Is this an `::ffff:a.b.c.d` style IPv6 address?
  pub fn is_mapped_ipv4(&self) -> bool {
    match self {
      Endpoint::V6 { addr, .. } => {
        addr[..10].iter().all(|&b| b == 0) && addr[10..12] == [0xff, 0xff]
      }
      _ => false,
    }
  }

  /// Extracts the IPv4 endpoint from a mapped IPv6 one, keeping the port.
  pub fn map_to_ipv4(&self) -> Result<Endpoint> {
    match *self {
      Endpoint::V6 { addr, port, .. } if self.is_mapped_ipv4() => {
        Ok(Endpoint::V4 { addr: [addr[12], addr[13], addr[14], addr[15]], port })
      }
      _ => Err(Error::NotMapped(self.to_text())),
    }
  }

  /// Numeric presentation of the address, without the port.
  pub fn to_text(&self) -> String {
    match *self {
      Endpoint::Unset => "invalid".to_owned(),
      Endpoint::V4 { addr, .. } => Ipv4Addr::from(addr).to_string(),
      Endpoint::V6 { addr, scope_id: 0, .. } => Ipv6Addr::from(addr).to_string(),
      Endpoint::V6 { addr, scope_id, .. } => {
        format!("{}%{}", Ipv6Addr::from(addr), scope_name(scope_id))
      }
    }
  }

  /// `a.b.c.d:port` or `[v6]:port`.
  pub fn to_text_with_port(&self) -> String {
    match self {
      Endpoint::Unset => self.to_text(),
      Endpoint::V4 { port, .. } => format!("{}:{port}", self.to_text()),
      Endpoint::V6 { port, .. } => format!("[{}]:{port}", self.to_text()),
    }
  }

  /// Equality that ignores the port.
  pub fn eq_address(&self, other: &Endpoint) -> bool {
    self.family() == other.family() && self.octets() == other.octets()
  }

  /// Ordering that ignores the port: family first, then address bytes.
  pub fn cmp_address(&self, other: &Endpoint) -> Ordering {
    family_rank(self.family())
      .cmp(&family_rank(other.family()))
      .then_with(|| self.octets().cmp(other.octets()))
  }

  /// Like [`cmp_address`](Self::cmp_address), but refuses to compare across
  /// families.
  pub fn try_cmp_address(&self, other: &Endpoint) -> Result<Ordering> {
    if self.family() != other.family() {
      return Err(Error::AddressFamilyMismatch {
        left: self.family(),
        right: other.family(),
      });
    }
    Ok(self.octets().cmp(other.octets()))
  }
}

// Unset is never less than anything.
fn family_rank(family: Family) -> u8 {
  match family {
    Family::V4 => 0,
    Family::V6 => 1,
    Family::Unset => 2,
  }
}

pub(crate) fn truncate_bytes(bytes: &mut [u8], bits: u8) {
  let width = bytes.len() * 8;
  let bits = usize::from(bits);
  if bits >= width {
    return;
  }

  // 22 bits of a.b.c.d: zero 'd', then the low 2 bits of 'c'
  let tozero = width - bits;
  let whole = tozero / 8;
  let len = bytes.len();
  bytes[len - whole..].fill(0);

  let bitsleft = tozero % 8;
  if bitsleft != 0 {
    bytes[len - 1 - whole] &= !((1u8 << bitsleft) - 1);
  }
}

fn parse_port(text: &str) -> Option<u16> {
  if text.is_empty() || text.len() > 5 || !text.bytes().all(|b| b.is_ascii_digit())
  {
    return None;
  }
  text.parse::<u32>().ok().and_then(|port| u16::try_from(port).ok())
}

fn parse_v4(text: &str) -> Option<([u8; 4], Option<u16>)> {
  let (host, port) = match text.split_once(':') {
    None => (text, None),
    Some((host, port)) => (host, Some(parse_port(port)?)),
  };
  let ip: Ipv4Addr = host.parse().ok()?;
  Some((ip.octets(), port))
}

fn parse_v6(text: &str) -> Option<([u8; 16], u32, Option<u16>)> {
  let (literal, port) = match text.strip_prefix('[') {
    Some(rest) => {
      let (literal, after) = rest.split_once(']')?;
      (literal, Some(parse_port(after.strip_prefix(':')?)?))
    }
    None => (text, None),
  };

  let (host, scope_id) = match literal.split_once('%') {
    None => (literal, 0),
    Some((host, scope)) => (host, parse_scope(scope)?),
  };
  let ip: Ipv6Addr = host.parse().ok()?;
  Some((ip.octets(), scope_id, port))
}

fn parse_scope(scope: &str) -> Option<u32> {
  if scope.is_empty() {
    return None;
  }
  if scope.bytes().all(|b| b.is_ascii_digit()) {
    return scope.parse().ok();
  }

  let name = CString::new(scope).ok()?;
  // SAFETY: `name` is a valid NUL-terminated string for the whole call.
  let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
  (index != 0).then_some(index)
}

fn scope_name(scope_id: u32) -> String {
  let mut buf = [0 as libc::c_char; libc::IF_NAMESIZE];
  // SAFETY: `buf` is IF_NAMESIZE bytes, the size if_indextoname requires.
  let name = unsafe { libc::if_indextoname(scope_id, buf.as_mut_ptr()) };
  if name.is_null() {
    return scope_id.to_string();
  }
  // SAFETY: on success the result points into `buf` and is NUL-terminated.
  unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
}

impl PartialEq for Endpoint {
  fn eq(&self, other: &Endpoint) -> bool {
    match (self, other) {
      (Endpoint::Unset, Endpoint::Unset) => true,
      (Endpoint::V4 { addr: a, port: pa }, Endpoint::V4 { addr: b, port: pb }) => {
        pa == pb && a == b
      }
      (
        Endpoint::V6 { addr: a, port: pa, .. },
        Endpoint::V6 { addr: b, port: pb, .. },
      ) => pa == pb && a == b,
      _ => false,
    }
  }
}

impl Eq for Endpoint {}

impl Hash for Endpoint {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.family().hash(state);
    self.port().hash(state);
    self.octets().hash(state);
  }
}

impl PartialOrd for Endpoint {
  fn partial_cmp(&self, other: &Endpoint) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for Endpoint {
  fn cmp(&self, other: &Endpoint) -> Ordering {
    family_rank(self.family())
      .cmp(&family_rank(other.family()))
      .then_with(|| self.port().cmp(&other.port()))
      .then_with(|| self.octets().cmp(other.octets()))
  }
}

impl fmt::Display for Endpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.to_text_with_port())
  }
}

impl FromStr for Endpoint {
  type Err = Error;

  fn from_str(text: &str) -> Result<Endpoint> {
    Endpoint::parse(text, 0)
  }
}

impl From<SocketAddrV4> for Endpoint {
  fn from(addr: SocketAddrV4) -> Endpoint {
    Endpoint::V4 { addr: addr.ip().octets(), port: addr.port() }
  }
}

impl From<SocketAddrV6> for Endpoint {
  fn from(addr: SocketAddrV6) -> Endpoint {
    Endpoint::V6 {
      addr: addr.ip().octets(),
      port: addr.port(),
      scope_id: addr.scope_id(),
    }
  }
}

impl From<SocketAddr> for Endpoint {
  fn from(addr: SocketAddr) -> Endpoint {
    match addr {
      SocketAddr::V4(v4) => v4.into(),
      SocketAddr::V6(v6) => v6.into(),
    }
  }
}

impl TryFrom<Endpoint> for SocketAddr {
  type Error = Error;

  fn try_from(endpoint: Endpoint) -> Result<SocketAddr> {
    match endpoint {
      Endpoint::Unset => Err(Error::AddressParse(endpoint.to_text())),
      Endpoint::V4 { addr, port } => {
        Ok(SocketAddr::V4(SocketAddrV4::new(addr.into(), port)))
      }
      Endpoint::V6 { addr, port, scope_id } => {
        Ok(SocketAddr::V6(SocketAddrV6::new(addr.into(), port, 0, scope_id)))
      }
    }
  }
}
