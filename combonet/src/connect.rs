//! Connecting a socket with an upper bound on how long it may take.
//!
//! A blocking `connect(2)` can hang for minutes against a host that silently
//! drops packets. [`Connector`] instead switches the descriptor to
//! non-blocking mode, starts the connection, and waits for writability for at
//! most the given timeout:
//!
//! ```text
//! Idle --start--> Connected                  (completed synchronously)
//!      --start--> Connecting --finish--> Connected
//!                            --finish--> Failed | TimedOut
//!      --start--> Failed
//! ```
//!
//! The descriptor is left non-blocking afterwards, which is what the buffered
//! types expect.

use std::{
  io,
  os::fd::{AsFd, AsRawFd, BorrowedFd},
  time::Duration,
};

use crate::{
  Endpoint, Error, Result,
  readiness::{self, Interest, Readiness},
  sys,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectState {
  Idle,
  Connecting,
  Connected,
  Failed,
  TimedOut,
}

pub struct Connector<'fd> {
  fd: BorrowedFd<'fd>,
  remote: Endpoint,
  state: ConnectState,
}

impl<'fd> Connector<'fd> {
  pub fn new(fd: BorrowedFd<'fd>, remote: Endpoint) -> Connector<'fd> {
    Connector { fd, remote, state: ConnectState::Idle }
  }

  pub fn state(&self) -> ConnectState {
    self.state
  }

  pub fn remote(&self) -> &Endpoint {
    &self.remote
  }

  /// Issues the non-blocking `connect`.
  ///
  /// Returns [`ConnectState::Connected`] if the kernel finished right away
  /// (common on loopback), [`ConnectState::Connecting`] if the caller should
  /// go on to [`Connector::finish`].
  pub fn start(&mut self) -> Result<ConnectState> {
    if self.state != ConnectState::Idle {
      return Ok(self.state);
    }

    sys::set_nonblocking(self.fd, true)?;

    match sys::connect_raw(self.fd.as_raw_fd(), &self.remote)? {
      Ok(()) => self.transition(ConnectState::Connected),
      Err(err) if in_progress(&err) => self.transition(ConnectState::Connecting),
      Err(source) => {
        self.transition(ConnectState::Failed);
        return Err(self.failed(source));
      }
    }
    Ok(self.state)
  }

  /// Waits up to `timeout` for a started connection to complete.
  ///
  /// `None` waits as long as the kernel does. Calling this on an idle
  /// connector starts it first.
  pub fn finish(&mut self, timeout: Option<Duration>) -> Result<()> {
    match self.state {
      ConnectState::Idle => {
        if self.start()? == ConnectState::Connected {
          return Ok(());
        }
      }
      ConnectState::Connecting => {}
      ConnectState::Connected => return Ok(()),
      ConnectState::Failed | ConnectState::TimedOut => {
        return Err(self.failed(io::Error::from_raw_os_error(libc::ENOTCONN)));
      }
    }

    let events = match readiness::wait_for_rw(self.fd, Interest::Write, timeout)? {
      Readiness::TimedOut => {
        self.transition(ConnectState::TimedOut);
        return Err(Error::ConnectTimeout(self.remote.to_text_with_port()));
      }
      Readiness::Ready(events) => events,
    };

    if events.is_error() {
      self.transition(ConnectState::Failed);
      let source = sys::take_socket_error(self.fd)?
        .unwrap_or_else(|| io::Error::from_raw_os_error(libc::ENOTCONN));
      return Err(self.failed(source));
    }

    if events.is_hang_up() {
      self.transition(ConnectState::Failed);
      return Err(Error::PeerClosed);
    }

    // Writable alone does not prove the handshake went through.
    if let Some(source) = sys::take_socket_error(self.fd)? {
      self.transition(ConnectState::Failed);
      return Err(self.failed(source));
    }

    self.transition(ConnectState::Connected);
    Ok(())
  }

  fn transition(&mut self, next: ConnectState) {
    tracing::trace!(
      fd = self.fd.as_raw_fd(),
      remote = %self.remote,
      from = ?self.state,
      to = ?next,
      "connect state"
    );
    self.state = next;
  }

  fn failed(&self, source: io::Error) -> Error {
    Error::ConnectFailed { remote: self.remote.to_text_with_port(), source }
  }
}

fn in_progress(err: &io::Error) -> bool {
  matches!(err.raw_os_error(), Some(libc::EINPROGRESS) | Some(libc::EINTR))
}

/// Connects `fd` to `remote`, giving up after `timeout`.
///
/// On success the descriptor is connected and non-blocking.
pub fn connect_with_timeout(
  fd: impl AsFd,
  remote: &Endpoint,
  timeout: Option<Duration>,
) -> Result<()> {
  let mut connector = Connector::new(fd.as_fd(), *remote);
  if connector.start()? == ConnectState::Connected {
    return Ok(());
  }
  connector.finish(timeout)
}
