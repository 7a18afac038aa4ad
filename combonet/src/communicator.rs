//! Line-oriented conversations over a socket.
//!
//! [`SocketCommunicator`] pairs a [`ReadBuffer`] with full-write semantics and
//! is what a request/response protocol client is built on: write a command
//! with [`SocketCommunicator::write_all`], read the answer line by line with
//! [`SocketCommunicator::get_line`].
//!
//! Every public operation gets the configured timeout as one budget for the
//! whole call, however many times it has to wait in between.
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use combonet::{CommunicatorConfig, Endpoint, SocketCommunicator, sys};
//!
//! # fn main() -> combonet::Result<()> {
//! let remote = Endpoint::parse("127.0.0.1:5300", 0)?;
//! let socket = sys::socket_for(&remote, libc::SOCK_STREAM)?;
//!
//! let config = CommunicatorConfig::new().timeout(Some(Duration::from_secs(2)));
//! let mut conn = SocketCommunicator::with_config(socket, config);
//! conn.connect(&remote)?;
//!
//! conn.write_all(b"PING\n")?;
//! while let Some(line) = conn.get_line_string()? {
//!   print!("{line}");
//! }
//! # Ok(())
//! # }
//! ```

use std::{io, mem, os::fd::AsFd, time::Duration};

use crate::{
  Endpoint, Error, Result,
  buffer::ReadBuffer,
  config::CommunicatorConfig,
  connect::connect_with_timeout,
  readiness::Interest,
  sys,
  timeout::Deadline,
  transport::Transport,
};

pub struct SocketCommunicator<T> {
  reader: ReadBuffer<T>,
  /// Bytes a timed-out `get_line` or `read_exact` had already taken out of
  /// `reader`. The next read starts with them.
  pending: Vec<u8>,
}

impl<T: Transport> SocketCommunicator<T> {
  pub fn new(inner: T) -> SocketCommunicator<T> {
    SocketCommunicator::with_config(inner, CommunicatorConfig::default())
  }

  pub fn with_config(
    inner: T,
    config: CommunicatorConfig,
  ) -> SocketCommunicator<T> {
    let mut reader = ReadBuffer::with_capacity(config.get_buffer_size(), inner);
    reader.set_timeout(config.get_timeout());
    SocketCommunicator { reader, pending: Vec::new() }
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.reader.timeout()
  }

  pub fn set_timeout(&mut self, timeout: Option<Duration>) {
    self.reader.set_timeout(timeout);
  }

  /// Reads one line, terminator included.
  ///
  /// The last line of a stream may lack the `\n`; it is still returned.
  /// `Ok(None)` once the stream has ended and nothing is left.
  ///
  /// On a timeout the part of the line read so far is kept, so calling again
  /// picks up where the failed call stopped.
  pub fn get_line(&mut self) -> Result<Option<Vec<u8>>> {
    let deadline = Deadline::after(self.timeout());
    let mut line = mem::take(&mut self.pending);
    if let Some(at) = line.iter().position(|&b| b == b'\n') {
      self.pending = line.split_off(at + 1);
      return Ok(Some(line));
    }

    loop {
      match self.reader.fill_by(&deadline) {
        Ok(true) => {}
        Ok(false) => break,
        Err(err) => {
          self.pending = line;
          return Err(err);
        }
      }
      let buffered = self.reader.buffered();
      match buffered.iter().position(|&b| b == b'\n') {
        Some(at) => {
          line.extend_from_slice(&buffered[..=at]);
          self.reader.consume(at + 1);
          return Ok(Some(line));
        }
        None => {
          let n = buffered.len();
          line.extend_from_slice(buffered);
          self.reader.consume(n);
        }
      }
    }

    Ok((!line.is_empty()).then_some(line))
  }

  /// [`SocketCommunicator::get_line`], decoded as UTF-8. Invalid sequences
  /// become U+FFFD.
  pub fn get_line_string(&mut self) -> Result<Option<String>> {
    Ok(
      self
        .get_line()?
        .map(|line| String::from_utf8_lossy(&line).into_owned()),
    )
  }

  /// Reads exactly `len` bytes.
  ///
  /// Fails with [`Error::UnexpectedEof`] if the stream ends first. As with
  /// [`SocketCommunicator::get_line`], bytes read before a failure are handed
  /// out by the next call.
  pub fn read_exact(&mut self, len: usize) -> Result<Vec<u8>> {
    let deadline = Deadline::after(self.timeout());
    let mut out = mem::take(&mut self.pending);
    if out.len() >= len {
      self.pending = out.split_off(len);
      return Ok(out);
    }
    out.reserve(len - out.len());

    while out.len() < len {
      let err = match self.reader.fill_by(&deadline) {
        Ok(true) => None,
        Ok(false) => Some(Error::UnexpectedEof),
        Err(err) => Some(err),
      };
      if let Some(err) = err {
        self.pending = out;
        return Err(err);
      }
      let buffered = self.reader.buffered();
      let n = buffered.len().min(len - out.len());
      out.extend_from_slice(&buffered[..n]);
      self.reader.consume(n);
    }

    Ok(out)
  }

  /// Writes all of `buf`, waiting for the socket to drain when it is full.
  pub fn write_all(&mut self, buf: &[u8]) -> Result<()> {
    let deadline = Deadline::after(self.timeout());
    self.write_all_by(buf, &deadline)
  }

  fn write_all_by(&mut self, mut buf: &[u8], deadline: &Deadline) -> Result<()> {
    let inner = self.reader.get_mut();
    while !buf.is_empty() {
      match inner.write(buf) {
        Ok(0) => return Err(Error::PeerClosed),
        Ok(n) => buf = &buf[n..],
        Err(err) if err.kind() == io::ErrorKind::Interrupted => {}
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
          if inner.wait(Interest::Write, deadline.remaining())?.is_timed_out() {
            return Err(Error::Timeout);
          }
        }
        Err(err) => return Err(Error::io("writing to socket", err)),
      }
    }
    Ok(())
  }

  pub fn get_ref(&self) -> &T {
    self.reader.get_ref()
  }

  pub fn get_mut(&mut self) -> &mut T {
    self.reader.get_mut()
  }

  /// Gives back the transport. Anything still buffered or pending is lost.
  pub fn into_inner(self) -> T {
    self.reader.into_inner()
  }
}

impl<T: Transport + AsFd> SocketCommunicator<T> {
  /// Wraps a socket, switching it to non-blocking mode so that the timeout
  /// applies to reads and writes alike.
  pub fn attach(
    inner: T,
    config: CommunicatorConfig,
  ) -> Result<SocketCommunicator<T>> {
    sys::set_nonblocking(&inner, true)?;
    Ok(SocketCommunicator::with_config(inner, config))
  }

  /// Connects the underlying socket to `remote` within the configured timeout.
  pub fn connect(&mut self, remote: &Endpoint) -> Result<()> {
    connect_with_timeout(self.get_ref(), remote, self.timeout())?;
    sys::set_nonblocking(self.get_ref(), true)
  }
}

#[cfg(feature = "bytes")]
impl<T: Transport> SocketCommunicator<T> {
  pub fn get_line_bytes(&mut self) -> Result<Option<bytes::Bytes>> {
    Ok(self.get_line()?.map(bytes::Bytes::from))
  }

  /// Writes everything remaining in `buf`, chunk by chunk.
  pub fn write_buf(&mut self, mut buf: impl bytes::Buf) -> Result<()> {
    let deadline = Deadline::after(self.timeout());
    while buf.has_remaining() {
      let chunk = buf.chunk();
      let n = chunk.len();
      self.write_all_by(chunk, &deadline)?;
      buf.advance(n);
    }
    Ok(())
  }
}
