//! Scoped ownership of file descriptors.
//!
//! [`Resource`] is the one owner of a socket descriptor. It closes the
//! descriptor when dropped, so every exit path out of a function holding one,
//! early returns and `?` included, releases it. It is neither `Clone` nor
//! `Copy`; moving it moves the obligation to close.
//!
//! ```rust,no_run
//! use std::os::fd::AsRawFd;
//! use combonet::{Endpoint, sys};
//!
//! fn example() -> combonet::Result<()> {
//!     let socket = sys::socket(libc::AF_INET, libc::SOCK_STREAM)?;
//!     sys::bind(&socket, &Endpoint::parse("127.0.0.1:0", 0)?)?;
//!     println!("bound fd {}", socket.as_raw_fd());
//!     Ok(())
//!     // socket is closed here
//! }
//! ```
//!
//! To hand the descriptor to code that manages it some other way, use
//! [`IntoRawFd::into_raw_fd`](std::os::fd::IntoRawFd), which gives it up
//! without closing.

use std::{
  fmt, io, mem,
  os::fd::{AsFd, AsRawFd, BorrowedFd, FromRawFd, IntoRawFd, OwnedFd, RawFd},
};

use crate::Result;

macro_rules! impl_native_conversions {
  ($nice:ident) => {
    impl AsFd for $nice {
      fn as_fd(&self) -> BorrowedFd<'_> {
        // SAFETY: the descriptor stays open for as long as `self` lives.
        unsafe { BorrowedFd::borrow_raw(self.fd) }
      }
    }

    impl AsRawFd for $nice {
      fn as_raw_fd(&self) -> RawFd {
        self.fd
      }
    }
  };
}

/// Exclusive owner of a descriptor, closed on drop.
pub struct Resource {
  fd: RawFd,
}

impl_native_conversions!(Resource);

impl FromRawFd for Resource {
  /// # Safety
  ///
  /// `fd` must be open and not owned by anything else.
  unsafe fn from_raw_fd(fd: RawFd) -> Resource {
    Resource { fd }
  }
}

impl IntoRawFd for Resource {
  fn into_raw_fd(self) -> RawFd {
    let fd = self.fd;
    mem::forget(self);
    fd
  }
}

impl From<OwnedFd> for Resource {
  fn from(owned: OwnedFd) -> Resource {
    Resource { fd: owned.into_raw_fd() }
  }
}

impl From<Resource> for OwnedFd {
  fn from(resource: Resource) -> OwnedFd {
    // SAFETY: into_raw_fd hands over sole ownership.
    unsafe { OwnedFd::from_raw_fd(resource.into_raw_fd()) }
  }
}

impl Resource {
  /// Closes the descriptor now and reports the outcome, which dropping
  /// cannot do.
  pub fn close(self) -> Result<()> {
    let fd = self.into_raw_fd();
    tracing::debug!(fd, "closing descriptor");
    syscall_ctx!("closing descriptor", close(fd)).map(drop)
  }
}

impl Drop for Resource {
  fn drop(&mut self) {
    tracing::debug!(fd = self.fd, "closing descriptor on drop");
    // SAFETY: we own the descriptor and nothing else will close it.
    if unsafe { libc::close(self.fd) } == -1 {
      let err = io::Error::last_os_error();
      tracing::warn!(fd = self.fd, %err, "close on drop failed");
    }
  }
}

impl fmt::Debug for Resource {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_tuple("Resource").field(&self.fd).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn pipe() -> (Resource, Resource) {
    let mut fds = [0; 2];
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    unsafe { (Resource::from_raw_fd(fds[0]), Resource::from_raw_fd(fds[1])) }
  }

  // Descriptor numbers get reused by parallel tests, so closing is observed
  // through the other end of the pipe instead.
  fn read_end_closed(write: &Resource) -> bool {
    let rc = unsafe { libc::write(write.as_raw_fd(), b"x".as_ptr().cast(), 1) };
    rc == -1 && io::Error::last_os_error().raw_os_error() == Some(libc::EPIPE)
  }

  fn write_end_closed(read: &Resource) -> bool {
    let mut byte = [0u8; 1];
    let rc =
      unsafe { libc::read(read.as_raw_fd(), byte.as_mut_ptr().cast(), 1) };
    rc == 0
  }

  #[test]
  fn test_drop_closes() {
    let (read, write) = pipe();
    assert!(!read_end_closed(&write));
    drop(read);
    assert!(read_end_closed(&write));
  }

  #[test]
  fn test_close_reports_success() {
    let (read, write) = pipe();
    write.close().unwrap();
    assert!(write_end_closed(&read));
  }

  #[test]
  fn test_into_raw_fd_releases_ownership() {
    let (read, write) = pipe();
    let raw = read.into_raw_fd();
    assert!(!read_end_closed(&write));
    // Take it back so the test does not leak.
    drop(unsafe { Resource::from_raw_fd(raw) });
    assert!(read_end_closed(&write));
  }

  #[test]
  fn test_move_keeps_descriptor_open() {
    let (read, write) = pipe();
    let raw = read.as_raw_fd();
    let moved = read;
    assert_eq!(moved.as_raw_fd(), raw);
    assert!(!read_end_closed(&write));
    drop(moved);
    assert!(read_end_closed(&write));
  }

  #[test]
  fn test_owned_fd_round_trip() {
    let (read, write) = pipe();
    let raw = read.as_raw_fd();
    let owned: OwnedFd = read.into();
    let back = Resource::from(owned);
    assert_eq!(back.as_raw_fd(), raw);
    assert!(!read_end_closed(&write));
  }
}
