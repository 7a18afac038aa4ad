//! Helpers shared by the unit and integration tests.
//!
//! Real descriptors come from loopback TCP and `socketpair(2)`;
//! [`ScriptedTransport`] stands in for a socket when a test needs exact control
//! over short reads, backpressure and timeouts.

use std::{
  collections::VecDeque,
  io,
  os::fd::FromRawFd,
  time::Duration,
};

use crate::{
  Endpoint,
  readiness::{Events, Interest, Readiness},
  resource::Resource,
  sys,
  transport::Transport,
};

/// A listening TCP socket on an ephemeral loopback port, and its address.
#[doc(hidden)]
pub fn tcp_listener() -> (Resource, Endpoint) {
  let listener = sys::socket(libc::AF_INET, libc::SOCK_STREAM).unwrap();
  sys::set_sockopt(&listener, libc::SOL_SOCKET, libc::SO_REUSEADDR, 1).unwrap();
  sys::bind(&listener, &Endpoint::v4([127, 0, 0, 1], 0)).unwrap();
  sys::listen(&listener, 64).unwrap();
  let addr = sys::local_addr(&listener).unwrap();
  (listener, addr)
}

/// A connected loopback TCP pair: `(client, server)`, both blocking.
#[doc(hidden)]
pub fn tcp_pair() -> (Resource, Resource) {
  let (listener, addr) = tcp_listener();
  let client = sys::socket_for(&addr, libc::SOCK_STREAM).unwrap();
  sys::connect(&client, &addr).unwrap();
  let (server, _) = sys::accept(&listener).unwrap();
  (client, server)
}

/// Two connected Unix stream sockets.
#[doc(hidden)]
pub fn socket_pair() -> (Resource, Resource) {
  let mut fds = [0; 2];
  let rc = unsafe {
    libc::socketpair(libc::AF_UNIX, libc::SOCK_STREAM, 0, fds.as_mut_ptr())
  };
  assert_eq!(rc, 0, "socketpair: {}", io::Error::last_os_error());
  unsafe { (Resource::from_raw_fd(fds[0]), Resource::from_raw_fd(fds[1])) }
}

/// What the next `read` on a [`ScriptedTransport`] does.
#[doc(hidden)]
#[derive(Debug, Clone)]
pub enum ReadStep {
  /// Hands out these bytes, over several reads if the buffer is small.
  Data(Vec<u8>),
  WouldBlock,
  Interrupted,
  Eof,
  Fail(i32),
}

/// What the next `write` on a [`ScriptedTransport`] does.
#[doc(hidden)]
#[derive(Debug, Clone, Copy)]
pub enum WriteStep {
  /// Accepts at most this many bytes.
  Accept(usize),
  WouldBlock,
  Interrupted,
  /// Reports zero bytes written.
  Zero,
  Fail(i32),
}

/// An in-memory transport that follows a script.
///
/// Once the read script runs out every read is end of stream; once the write
/// script runs out every write is accepted in full.
#[doc(hidden)]
#[derive(Debug, Default)]
pub struct ScriptedTransport {
  reads: VecDeque<ReadStep>,
  writes: VecDeque<WriteStep>,
  pub written: Vec<u8>,
  pub read_calls: usize,
  pub write_calls: usize,
  pub waits: Vec<Interest>,
  /// How many of the coming waits time out.
  pub timeouts: usize,
}

impl ScriptedTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_reads(reads: impl IntoIterator<Item = ReadStep>) -> Self {
    Self { reads: reads.into_iter().collect(), ..Self::default() }
  }

  pub fn with_writes(writes: impl IntoIterator<Item = WriteStep>) -> Self {
    Self { writes: writes.into_iter().collect(), ..Self::default() }
  }

  /// Every wait times out.
  pub fn stalled(self) -> Self {
    self.timing_out(usize::MAX)
  }

  /// The next `waits` waits time out, later ones report ready.
  pub fn timing_out(mut self, waits: usize) -> Self {
    self.timeouts = waits;
    self
  }
}

impl Transport for ScriptedTransport {
  fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
    self.read_calls += 1;
    match self.reads.pop_front() {
      None | Some(ReadStep::Eof) => Ok(0),
      Some(ReadStep::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
      Some(ReadStep::Interrupted) => Err(io::ErrorKind::Interrupted.into()),
      Some(ReadStep::Fail(errno)) => Err(io::Error::from_raw_os_error(errno)),
      Some(ReadStep::Data(mut data)) => {
        let n = data.len().min(buf.len());
        buf[..n].copy_from_slice(&data[..n]);
        if n < data.len() {
          self.reads.push_front(ReadStep::Data(data.split_off(n)));
        }
        Ok(n)
      }
    }
  }

  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.write_calls += 1;
    match self.writes.pop_front() {
      None => {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
      }
      Some(WriteStep::Accept(max)) => {
        let n = max.min(buf.len());
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
      }
      Some(WriteStep::WouldBlock) => Err(io::ErrorKind::WouldBlock.into()),
      Some(WriteStep::Interrupted) => Err(io::ErrorKind::Interrupted.into()),
      Some(WriteStep::Zero) => Ok(0),
      Some(WriteStep::Fail(errno)) => Err(io::Error::from_raw_os_error(errno)),
    }
  }

  fn wait(
    &mut self,
    interest: Interest,
    _timeout: Option<Duration>,
  ) -> crate::Result<Readiness> {
    self.waits.push(interest);
    if self.timeouts > 0 {
      self.timeouts -= 1;
      Ok(Readiness::TimedOut)
    } else {
      Ok(Readiness::Ready(Events::from_raw(libc::POLLIN | libc::POLLOUT)))
    }
  }
}
