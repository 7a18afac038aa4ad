//! The byte-stream seam between the buffered types and the OS.
//!
//! Real sockets go through [`Resource`] or a [`BorrowedFd`]; tests plug in
//! their own implementation to script short reads and backpressure.

use std::{
  io,
  os::fd::{AsFd, BorrowedFd},
  time::Duration,
};

use crate::{
  Result,
  readiness::{self, Interest, Readiness},
  resource::Resource,
  sys,
};

/// A byte stream the buffered types can read from, write to and wait on.
///
/// `read` and `write` perform one attempt each and may fail with
/// [`io::ErrorKind::WouldBlock`] or [`io::ErrorKind::Interrupted`]; the
/// buffered layer handles both. `read` returning `Ok(0)` means end of stream.
pub trait Transport {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

  fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

  /// Blocks until the transport is ready for `interest` or `timeout` passes.
  fn wait(
    &mut self,
    interest: Interest,
    timeout: Option<Duration>,
  ) -> Result<Readiness>;
}

impl Transport for Resource {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    sys::read(self.as_fd(), buf)
  }

  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    sys::write(self.as_fd(), buf)
  }

  fn wait(
    &mut self,
    interest: Interest,
    timeout: Option<Duration>,
  ) -> Result<Readiness> {
    readiness::wait_for_rw(self.as_fd(), interest, timeout)
  }
}

impl Transport for BorrowedFd<'_> {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    sys::read(*self, buf)
  }

  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    sys::write(*self, buf)
  }

  fn wait(
    &mut self,
    interest: Interest,
    timeout: Option<Duration>,
  ) -> Result<Readiness> {
    readiness::wait_for_rw(*self, interest, timeout)
  }
}

impl<T: Transport + ?Sized> Transport for &mut T {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    (**self).read(buf)
  }

  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    (**self).write(buf)
  }

  fn wait(
    &mut self,
    interest: Interest,
    timeout: Option<Duration>,
  ) -> Result<Readiness> {
    (**self).wait(interest, timeout)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::os::unix::net::UnixStream;

  #[test]
  fn test_borrowed_fd_transport() {
    let (a, b) = UnixStream::pair().unwrap();
    let mut a = a.as_fd();
    let mut b = b.as_fd();

    assert_eq!(Transport::write(&mut a, b"hi").unwrap(), 2);
    let ready = b.wait(Interest::Read, Some(Duration::from_secs(1))).unwrap();
    assert!(matches!(ready, Readiness::Ready(e) if e.is_readable()));

    let mut buf = [0u8; 4];
    assert_eq!(Transport::read(&mut b, &mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], b"hi");
  }

  #[test]
  fn test_resource_transport() {
    let (a, b) = UnixStream::pair().unwrap();
    let mut a = Resource::from(std::os::fd::OwnedFd::from(a));
    let mut b = Resource::from(std::os::fd::OwnedFd::from(b));

    let mut by_ref = &mut a;
    assert_eq!(Transport::write(&mut by_ref, b"xyz").unwrap(), 3);
    let mut buf = [0u8; 3];
    assert_eq!(Transport::read(&mut b, &mut buf).unwrap(), 3);
    assert_eq!(&buf, b"xyz");

    let ready = b.wait(Interest::Read, Some(Duration::from_millis(10))).unwrap();
    assert!(ready.is_timed_out());
  }
}
