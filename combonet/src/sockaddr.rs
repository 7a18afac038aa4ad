//! Conversions between [`Endpoint`] and the kernel's socket address layout.
//!
//! Every syscall that takes or returns an address goes through [`encode`] or
//! [`decode`]. Both work on a `sockaddr_storage`, which is large and aligned
//! enough for either family, and carry the exact length the kernel expects:
//! some systems reject a length longer than the structure actually in use.

use std::{mem, ptr};

use crate::{Endpoint, Error, Result, address::Family};

/// Encodes `endpoint` into a zeroed `sockaddr_storage`.
///
/// Returns `None` for [`Endpoint::Unset`], which has no kernel form.
pub fn encode(
  endpoint: &Endpoint,
) -> Option<(libc::sockaddr_storage, libc::socklen_t)> {
  // SAFETY: all-zero is a valid (AF_UNSPEC) sockaddr_storage.
  let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };

  match *endpoint {
    Endpoint::Unset => return None,
    Endpoint::V4 { addr, port } => {
      let sin = into_sockaddr_in(addr, port);
      // SAFETY: both are locals, they do not overlap, and storage is larger
      // than sockaddr_in.
      unsafe {
        ptr::copy_nonoverlapping(
          &sin as *const libc::sockaddr_in as *const u8,
          &mut storage as *mut libc::sockaddr_storage as *mut u8,
          mem::size_of::<libc::sockaddr_in>(),
        );
      }
    }
    Endpoint::V6 { addr, port, scope_id } => {
      let sin6 = into_sockaddr_in6(addr, port, scope_id);
      // SAFETY: same as above, for sockaddr_in6.
      unsafe {
        ptr::copy_nonoverlapping(
          &sin6 as *const libc::sockaddr_in6 as *const u8,
          &mut storage as *mut libc::sockaddr_storage as *mut u8,
          mem::size_of::<libc::sockaddr_in6>(),
        );
      }
    }
  }

  Some((storage, endpoint.socklen()))
}

/// Decodes a kernel-filled address.
///
/// `len` is the length the kernel reported. `AF_UNSPEC` decodes to
/// [`Endpoint::Unset`]; any other family fails with `EAFNOSUPPORT`.
pub fn decode(
  storage: &libc::sockaddr_storage,
  len: libc::socklen_t,
) -> Result<Endpoint> {
  let len = len as usize;
  let family = Family::from_raw(storage.ss_family as libc::c_int)
    .ok_or_else(|| os_error(libc::EAFNOSUPPORT))?;

  match family {
    Family::Unset => Ok(Endpoint::Unset),
    Family::V4 => {
      if len < mem::size_of::<libc::sockaddr_in>() {
        return Err(os_error(libc::EINVAL));
      }
      // SAFETY: ss_family is AF_INET, so the storage holds a sockaddr_in, and
      // sockaddr_storage is aligned for every address type.
      let sin = unsafe {
        &*(storage as *const libc::sockaddr_storage).cast::<libc::sockaddr_in>()
      };
      Ok(Endpoint::V4 {
        addr: sin.sin_addr.s_addr.to_ne_bytes(),
        port: u16::from_be(sin.sin_port),
      })
    }
    Family::V6 => {
      if len < mem::size_of::<libc::sockaddr_in6>() {
        return Err(os_error(libc::EINVAL));
      }
      // SAFETY: same as above, for sockaddr_in6.
      let sin6 = unsafe {
        &*(storage as *const libc::sockaddr_storage).cast::<libc::sockaddr_in6>()
      };
      Ok(Endpoint::V6 {
        addr: sin6.sin6_addr.s6_addr,
        port: u16::from_be(sin6.sin6_port),
        scope_id: sin6.sin6_scope_id,
      })
    }
  }
}

fn os_error(code: i32) -> Error {
  Error::io("decoding socket address", std::io::Error::from_raw_os_error(code))
}

impl Endpoint {
  /// Length of this endpoint's kernel structure.
  ///
  /// It is vital to pass this, and not `size_of::<sockaddr_storage>()`, to the
  /// kernel.
  pub fn socklen(&self) -> libc::socklen_t {
    let len = match self {
      Endpoint::V4 { .. } => mem::size_of::<libc::sockaddr_in>(),
      Endpoint::V6 { .. } => mem::size_of::<libc::sockaddr_in6>(),
      Endpoint::Unset => mem::size_of::<libc::sockaddr_storage>(),
    };
    len as libc::socklen_t
  }
}

fn into_sockaddr_in(addr: [u8; 4], port: u16) -> libc::sockaddr_in {
  // SAFETY: integers only, zero is valid. Also clears sin_zero.
  let mut sin: libc::sockaddr_in = unsafe { mem::zeroed() };

  #[cfg(bsd_like)]
  {
    sin.sin_len = mem::size_of::<libc::sockaddr_in>() as u8;
  }
  sin.sin_family = libc::AF_INET as libc::sa_family_t;
  sin.sin_port = port.to_be();
  // s_addr holds the bytes in network order already
  sin.sin_addr = libc::in_addr { s_addr: u32::from_ne_bytes(addr) };

  sin
}

fn into_sockaddr_in6(
  addr: [u8; 16],
  port: u16,
  scope_id: u32,
) -> libc::sockaddr_in6 {
  // SAFETY: integers and byte arrays only, zero is valid. Leaves flowinfo 0.
  let mut sin6: libc::sockaddr_in6 = unsafe { mem::zeroed() };

  #[cfg(bsd_like)]
  {
    sin6.sin6_len = mem::size_of::<libc::sockaddr_in6>() as u8;
  }
  sin6.sin6_family = libc::AF_INET6 as libc::sa_family_t;
  sin6.sin6_port = port.to_be();
  sin6.sin6_addr = libc::in6_addr { s6_addr: addr };
  sin6.sin6_scope_id = scope_id;

  sin6
}
