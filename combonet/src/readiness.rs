//! Waiting for a descriptor to become readable or writable.
//!
//! This is the only place the crate blocks. Everything else (buffered reads,
//! full writes, non-blocking connects) calls [`wait_for_rw`] when the kernel
//! says "would block" and retries afterwards.
//!
//! A ready result is not necessarily good news: the descriptor may be "ready"
//! because it has an error pending or because the peer hung up. [`Events`]
//! keeps those conditions apart so callers can branch on them before trying
//! the actual I/O.

use std::{
  collections::BTreeMap,
  os::fd::{AsFd, AsRawFd, RawFd},
  time::Duration,
};

use crate::{Error, Result, timeout::Deadline, timeout::poll_timeout_ms};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
  Read,
  Write,
}

impl Interest {
  fn poll_events(self) -> libc::c_short {
    match self {
      Interest::Read => libc::POLLIN,
      Interest::Write => libc::POLLOUT,
    }
  }
}

/// The `revents` a poll reported for one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Events(libc::c_short);

impl Events {
  pub const fn from_raw(revents: libc::c_short) -> Events {
    Events(revents)
  }

  pub const fn raw(self) -> libc::c_short {
    self.0
  }

  pub const fn is_readable(self) -> bool {
    self.0 & libc::POLLIN != 0
  }

  pub const fn is_writable(self) -> bool {
    self.0 & libc::POLLOUT != 0
  }

  /// An error is pending on the descriptor, or the descriptor is not open.
  pub const fn is_error(self) -> bool {
    self.0 & (libc::POLLERR | libc::POLLNVAL) != 0
  }

  pub const fn is_hang_up(self) -> bool {
    self.0 & libc::POLLHUP != 0
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
  Ready(Events),
  TimedOut,
}

impl Readiness {
  pub fn is_timed_out(&self) -> bool {
    matches!(self, Readiness::TimedOut)
  }
}

/// Waits until `fd` is ready for `interest`, or `timeout` elapses.
///
/// `None` waits indefinitely. The budget is for this call alone: a caller that
/// waits several times for one logical operation should pass what is left of
/// a [`Deadline`](crate::timeout::Deadline) each time. Interrupted polls are
/// restarted with the time that is left.
pub fn wait_for_rw(
  fd: impl AsFd,
  interest: Interest,
  timeout: Option<Duration>,
) -> Result<Readiness> {
  let mut pfd = [libc::pollfd {
    fd: fd.as_fd().as_raw_fd(),
    events: interest.poll_events(),
    revents: 0,
  }];

  match poll_until(&mut pfd, &Deadline::after(timeout))? {
    0 => Ok(Readiness::TimedOut),
    _ => Ok(Readiness::Ready(Events(pfd[0].revents))),
  }
}

/// `poll(2)` that restarts on `EINTR` with whatever is left of `deadline`.
fn poll_until(pfds: &mut [libc::pollfd], deadline: &Deadline) -> Result<usize> {
  loop {
    let ms = poll_timeout_ms(deadline.remaining());
    match syscall!(poll(pfds.as_mut_ptr(), pfds.len() as libc::nfds_t, ms)) {
      Ok(ready) => return Ok(ready as usize),
      Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
      Err(err) => return Err(Error::Poll(err)),
    }
  }
}

/// Read-interest shorthand for [`wait_for_rw`].
pub fn wait_for_data(
  fd: impl AsFd,
  timeout: Option<Duration>,
) -> Result<Readiness> {
  wait_for_rw(fd, Interest::Read, timeout)
}

/// Polls several descriptors at once.
///
/// A descriptor listed in both slices waits for either. The result holds the
/// descriptors that became ready for what they asked for, or that carry an
/// error or hang-up condition; it is empty on timeout. Like [`wait_for_rw`],
/// an interrupted poll is restarted with the time that is left.
pub fn poll_many(
  read_fds: &[RawFd],
  write_fds: &[RawFd],
  timeout: Option<Duration>,
) -> Result<BTreeMap<RawFd, Events>> {
  let mut interests: BTreeMap<RawFd, libc::c_short> = BTreeMap::new();
  for &fd in read_fds {
    *interests.entry(fd).or_default() |= libc::POLLIN;
  }
  for &fd in write_fds {
    *interests.entry(fd).or_default() |= libc::POLLOUT;
  }

  let mut pfds: Vec<libc::pollfd> = interests
    .iter()
    .map(|(&fd, &events)| libc::pollfd { fd, events, revents: 0 })
    .collect();

  let ready = poll_until(&mut pfds, &Deadline::after(timeout))?;

  let mut out = BTreeMap::new();
  if ready == 0 {
    return Ok(out);
  }
  for pfd in pfds {
    let events = Events(pfd.revents);
    if pfd.revents & pfd.events != 0 || events.is_error() || events.is_hang_up()
    {
      out.insert(pfd.fd, events);
    }
  }
  Ok(out)
}
