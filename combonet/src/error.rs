//! Error types shared by the address model and the I/O layer.
//!
//! Every fallible operation in this crate returns [`Result`]. The variants
//! follow the failure modes callers branch on: malformed text, timeouts, the
//! peer going away, and plain OS errors. Transient conditions (`EAGAIN`,
//! `EINTR`) are retried inside the primitives and never show up here, and end
//! of stream is reported as `Ok(None)` rather than as an error.

use std::io;

use crate::address::Family;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
  /// Text could not be parsed as an address, endpoint or netmask.
  #[error("unable to convert presentation address '{0}'")]
  AddressParse(String),

  /// A comparison that requires both sides to share a family was handed
  /// addresses of different families.
  #[error("address family mismatch: {left} vs {right}")]
  AddressFamilyMismatch { left: Family, right: Family },

  /// [`Endpoint::map_to_ipv4`](crate::Endpoint::map_to_ipv4) on an address
  /// that is not of the `::ffff:a.b.c.d` form.
  #[error("can't map non-mapped address {0} back to IPv4")]
  NotMapped(String),

  #[error("connecting socket to {remote}: {source}")]
  ConnectFailed {
    remote: String,
    #[source]
    source: io::Error,
  },

  #[error("timeout connecting socket to {0}")]
  ConnectTimeout(String),

  /// The remote end hung up, or a write made no progress at all.
  #[error("peer closed the connection")]
  PeerClosed,

  /// A read or write did not become ready before its deadline.
  #[error("timed out waiting for socket readiness")]
  Timeout,

  /// The stream ended before the requested amount of data arrived.
  #[error("unexpected end of stream")]
  UnexpectedEof,

  #[error("{context}: {source}")]
  Io {
    context: &'static str,
    #[source]
    source: io::Error,
  },

  #[error("waiting for data: {0}")]
  Poll(#[source] io::Error),
}

impl Error {
  pub(crate) fn io(context: &'static str, source: io::Error) -> Self {
    Error::Io { context, source }
  }

  /// True for both [`Error::Timeout`] and [`Error::ConnectTimeout`].
  ///
  /// Timeouts are the one failure a caller may reasonably retry with a fresh
  /// budget.
  pub fn is_timeout(&self) -> bool {
    matches!(self, Error::Timeout | Error::ConnectTimeout(_))
  }

  /// The underlying OS error, if this failure came from a syscall.
  pub fn raw_os_error(&self) -> Option<i32> {
    match self {
      Error::ConnectFailed { source, .. }
      | Error::Io { source, .. }
      | Error::Poll(source) => source.raw_os_error(),
      _ => None,
    }
  }

  /// Maps the error onto the closest [`io::ErrorKind`].
  pub fn kind(&self) -> io::ErrorKind {
    match self {
      Error::AddressParse(_)
      | Error::AddressFamilyMismatch { .. }
      | Error::NotMapped(_) => io::ErrorKind::InvalidInput,
      Error::ConnectTimeout(_) | Error::Timeout => io::ErrorKind::TimedOut,
      Error::PeerClosed => io::ErrorKind::ConnectionReset,
      Error::UnexpectedEof => io::ErrorKind::UnexpectedEof,
      Error::ConnectFailed { source, .. }
      | Error::Io { source, .. }
      | Error::Poll(source) => source.kind(),
    }
  }
}

impl From<Error> for io::Error {
  fn from(err: Error) -> io::Error {
    match err {
      Error::Io { source, .. } | Error::Poll(source) => source,
      other => io::Error::new(other.kind(), other),
    }
  }
}
