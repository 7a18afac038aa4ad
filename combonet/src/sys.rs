//! Thin wrappers over the socket syscalls the I/O layer builds on.
//!
//! Each function performs one syscall (occasionally two) and turns a failure
//! into [`Error::Io`] with a short context string. None of them retry or wait;
//! that is the job of [`crate::readiness`] and the buffered types.
//!
//! The raw [`read`] and [`write`] are the exception: they return plain
//! [`io::Result`] so callers can branch on [`io::ErrorKind::WouldBlock`] and
//! [`io::ErrorKind::Interrupted`] without unwrapping a crate error first.

use std::{
  io, mem,
  os::fd::{AsFd, AsRawFd, FromRawFd, RawFd},
};

use crate::{Endpoint, Error, Result, resource::Resource, sockaddr};

fn raw(fd: &impl AsFd) -> RawFd {
  fd.as_fd().as_raw_fd()
}

fn encoded(
  endpoint: &Endpoint,
) -> Result<(libc::sockaddr_storage, libc::socklen_t)> {
  sockaddr::encode(endpoint).ok_or_else(|| {
    Error::io(
      "encoding socket address",
      io::Error::from_raw_os_error(libc::EAFNOSUPPORT),
    )
  })
}

/// Creates a socket of the given `AF_*` family and `SOCK_*` type.
///
/// The descriptor is close-on-exec. On BSD-like systems `SO_NOSIGPIPE` is set
/// so writes to a closed peer fail with `EPIPE` instead of raising a signal;
/// Linux gets the same effect from `MSG_NOSIGNAL` in [`write`].
pub fn socket(family: libc::c_int, ty: libc::c_int) -> Result<Resource> {
  #[cfg(linux)]
  let fd =
    syscall_ctx!("creating socket", socket(family, ty | libc::SOCK_CLOEXEC, 0))?;

  #[cfg(not(linux))]
  let fd = syscall_ctx!("creating socket", socket(family, ty, 0))?;

  // SAFETY: we literally just created it.
  let resource = unsafe { Resource::from_raw_fd(fd) };

  #[cfg(not(linux))]
  syscall_ctx!("setting close-on-exec", fcntl(fd, libc::F_SETFD, libc::FD_CLOEXEC))?;

  #[cfg(bsd_like)]
  set_sockopt(&resource, libc::SOL_SOCKET, libc::SO_NOSIGPIPE, 1)?;

  tracing::debug!(fd, family, ty, "created socket");
  Ok(resource)
}

/// Creates a socket whose family fits `endpoint`.
pub fn socket_for(endpoint: &Endpoint, ty: libc::c_int) -> Result<Resource> {
  if endpoint.is_unset() {
    return Err(Error::io(
      "creating socket",
      io::Error::from_raw_os_error(libc::EAFNOSUPPORT),
    ));
  }
  socket(endpoint.family().to_raw(), ty)
}

pub fn set_nonblocking(fd: impl AsFd, nonblocking: bool) -> Result<()> {
  let fd = raw(&fd);
  let flags = syscall_ctx!("retrieving socket flags", fcntl(fd, libc::F_GETFL))?;
  let wanted = if nonblocking {
    flags | libc::O_NONBLOCK
  } else {
    flags & !libc::O_NONBLOCK
  };
  if wanted != flags {
    syscall_ctx!("setting socket flags", fcntl(fd, libc::F_SETFL, wanted))?;
  }
  Ok(())
}

pub fn is_nonblocking(fd: impl AsFd) -> Result<bool> {
  let flags =
    syscall_ctx!("retrieving socket flags", fcntl(raw(&fd), libc::F_GETFL))?;
  Ok(flags & libc::O_NONBLOCK != 0)
}

pub fn set_sockopt(
  fd: impl AsFd,
  level: libc::c_int,
  name: libc::c_int,
  value: libc::c_int,
) -> Result<()> {
  syscall_ctx!(
    "setting socket option",
    setsockopt(
      raw(&fd),
      level,
      name,
      &value as *const libc::c_int as *const libc::c_void,
      mem::size_of::<libc::c_int>() as libc::socklen_t
    )
  )
  .map(drop)
}

/// Reads and clears the pending `SO_ERROR` of a socket.
pub fn take_socket_error(fd: impl AsFd) -> Result<Option<io::Error>> {
  let mut value: libc::c_int = 0;
  let mut len = mem::size_of::<libc::c_int>() as libc::socklen_t;
  syscall_ctx!(
    "retrieving socket error",
    getsockopt(
      raw(&fd),
      libc::SOL_SOCKET,
      libc::SO_ERROR,
      &mut value as *mut libc::c_int as *mut libc::c_void,
      &mut len
    )
  )?;
  Ok((value != 0).then(|| io::Error::from_raw_os_error(value)))
}

pub fn bind(fd: impl AsFd, local: &Endpoint) -> Result<()> {
  let (storage, len) = encoded(local)?;
  syscall_ctx!(
    "binding socket",
    bind(raw(&fd), &storage as *const _ as *const libc::sockaddr, len)
  )
  .map(drop)
}

pub fn listen(fd: impl AsFd, backlog: libc::c_int) -> Result<()> {
  syscall_ctx!("setting socket to listen", listen(raw(&fd), backlog)).map(drop)
}

/// Accepts one connection, returning the new socket and the peer address.
pub fn accept(fd: impl AsFd) -> Result<(Resource, Endpoint)> {
  // SAFETY: zeroed sockaddr_storage is a valid value.
  let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
  let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
  let addr = &mut storage as *mut _ as *mut libc::sockaddr;

  #[cfg(linux)]
  let client = syscall_ctx!(
    "accepting new connection on socket",
    accept4(raw(&fd), addr, &mut len, libc::SOCK_CLOEXEC)
  )?;

  #[cfg(not(linux))]
  let client = syscall_ctx!(
    "accepting new connection on socket",
    accept(raw(&fd), addr, &mut len)
  )?;

  // SAFETY: accept handed us a fresh descriptor.
  let client = unsafe { Resource::from_raw_fd(client) };

  #[cfg(not(linux))]
  syscall_ctx!(
    "setting close-on-exec",
    fcntl(client.as_raw_fd(), libc::F_SETFD, libc::FD_CLOEXEC)
  )?;

  let remote = sockaddr::decode(&storage, len)?;
  tracing::debug!(fd = client.as_raw_fd(), %remote, "accepted connection");
  Ok((client, remote))
}

/// Plain `connect(2)`: blocks on a blocking socket, and on a non-blocking one
/// reports `EINPROGRESS` as an error. See [`crate::connect`] for the
/// deadline-bounded version.
pub fn connect(fd: impl AsFd, remote: &Endpoint) -> Result<()> {
  let (storage, len) = encoded(remote)?;
  syscall!(connect(raw(&fd), &storage as *const _ as *const libc::sockaddr, len))
    .map(drop)
    .map_err(|source| Error::ConnectFailed {
      remote: remote.to_text_with_port(),
      source,
    })
}

pub(crate) fn connect_raw(fd: RawFd, remote: &Endpoint) -> Result<io::Result<()>> {
  let (storage, len) = encoded(remote)?;
  Ok(
    syscall!(connect(fd, &storage as *const _ as *const libc::sockaddr, len))
      .map(drop),
  )
}

/// The local address a socket is bound to.
pub fn local_addr(fd: impl AsFd) -> Result<Endpoint> {
  let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
  let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
  syscall_ctx!(
    "retrieving sockname of socket",
    getsockname(raw(&fd), &mut storage as *mut _ as *mut libc::sockaddr, &mut len)
  )?;
  sockaddr::decode(&storage, len)
}

pub fn peer_addr(fd: impl AsFd) -> Result<Endpoint> {
  let mut storage: libc::sockaddr_storage = unsafe { mem::zeroed() };
  let mut len = mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
  syscall_ctx!(
    "retrieving peer name of socket",
    getpeername(raw(&fd), &mut storage as *mut _ as *mut libc::sockaddr, &mut len)
  )?;
  sockaddr::decode(&storage, len)
}

/// One `read(2)`. `Ok(0)` is end of stream.
pub fn read(fd: impl AsFd, buf: &mut [u8]) -> io::Result<usize> {
  syscall!(read(raw(&fd), buf.as_mut_ptr() as *mut libc::c_void, buf.len()))
    .map(|n| n as usize)
}

/// One write. Uses `send(MSG_NOSIGNAL)` where available so a vanished peer
/// gives `EPIPE` rather than `SIGPIPE`, and falls back to `write(2)` for
/// descriptors that are not sockets.
pub fn write(fd: impl AsFd, buf: &[u8]) -> io::Result<usize> {
  let fd = raw(&fd);

  #[cfg(linux)]
  {
    match syscall!(send(
      fd,
      buf.as_ptr() as *const libc::c_void,
      buf.len(),
      libc::MSG_NOSIGNAL
    )) {
      Err(err) if err.raw_os_error() == Some(libc::ENOTSOCK) => {}
      res => return res.map(|n| n as usize),
    }
  }

  syscall!(write(fd, buf.as_ptr() as *const libc::c_void, buf.len()))
    .map(|n| n as usize)
}
