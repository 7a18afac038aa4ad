//! Byte-at-a-time reading on top of a fixed-capacity buffer.
//!
//! [`ReadBuffer`] turns one-byte requests into large reads on the underlying
//! [`Transport`]. When the transport has nothing to offer it waits for
//! readability, bounded by the reader's timeout, instead of spinning.
//!
//! End of stream is sticky: once a read returns zero bytes the reader keeps
//! answering `Ok(None)` without touching the transport again.

use std::{io, time::Duration};

use crate::{
  Error, Result, config::DEFAULT_BUFFER_SIZE, readiness::Interest,
  timeout::Deadline, transport::Transport,
};

pub struct ReadBuffer<T> {
  inner: T,
  buf: Box<[u8]>,
  pos: usize,
  end: usize,
  timeout: Option<Duration>,
  eof: bool,
}

impl<T: Transport> ReadBuffer<T> {
  pub fn new(inner: T) -> ReadBuffer<T> {
    ReadBuffer::with_capacity(DEFAULT_BUFFER_SIZE, inner)
  }

  /// A reader with room for `capacity` bytes, at least one.
  pub fn with_capacity(capacity: usize, inner: T) -> ReadBuffer<T> {
    ReadBuffer {
      inner,
      buf: vec![0u8; capacity.max(1)].into_boxed_slice(),
      pos: 0,
      end: 0,
      timeout: None,
      eof: false,
    }
  }

  pub fn timeout(&self) -> Option<Duration> {
    self.timeout
  }

  /// Bounds how long a single [`ReadBuffer::next_byte`] may wait.
  pub fn set_timeout(&mut self, timeout: Option<Duration>) {
    self.timeout = timeout;
  }

  pub fn capacity(&self) -> usize {
    self.buf.len()
  }

  /// Are there bytes left that can be returned without any I/O?
  pub fn has_buffered(&self) -> bool {
    self.pos < self.end
  }

  pub fn buffered(&self) -> &[u8] {
    &self.buf[self.pos..self.end]
  }

  /// Marks `amt` buffered bytes as used. Clamped to what is buffered.
  pub fn consume(&mut self, amt: usize) {
    self.pos = (self.pos + amt).min(self.end);
  }

  /// Has the transport reported end of stream?
  pub fn is_eof(&self) -> bool {
    self.eof
  }

  /// The next byte of the stream, or `Ok(None)` at end of stream.
  ///
  /// Fails with [`Error::Timeout`] if the buffer is empty and the transport
  /// stays silent for longer than the configured timeout.
  pub fn next_byte(&mut self) -> Result<Option<u8>> {
    let deadline = Deadline::after(self.timeout);
    self.next_byte_by(&deadline)
  }

  pub(crate) fn next_byte_by(&mut self, deadline: &Deadline) -> Result<Option<u8>> {
    if !self.fill_by(deadline)? {
      return Ok(None);
    }
    let byte = self.buf[self.pos];
    self.pos += 1;
    Ok(Some(byte))
  }

  /// Makes sure something is buffered. Returns `false` at end of stream.
  pub(crate) fn fill_by(&mut self, deadline: &Deadline) -> Result<bool> {
    if self.has_buffered() {
      return Ok(true);
    }
    if self.eof {
      return Ok(false);
    }

    loop {
      match self.inner.read(&mut self.buf) {
        Ok(0) => {
          tracing::trace!("end of stream");
          self.eof = true;
          return Ok(false);
        }
        Ok(n) => {
          tracing::trace!(n, "refilled read buffer");
          self.pos = 0;
          self.end = n;
          return Ok(true);
        }
        Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
          if self.inner.wait(Interest::Read, deadline.remaining())?.is_timed_out()
          {
            return Err(Error::Timeout);
          }
        }
        Err(err) => return Err(Error::io("reading from socket", err)),
      }
    }
  }

  pub fn get_ref(&self) -> &T {
    &self.inner
  }

  /// Writing through this is fine; reading through it skips the buffer.
  pub fn get_mut(&mut self) -> &mut T {
    &mut self.inner
  }

  /// Unwraps the transport. Buffered bytes are lost.
  pub fn into_inner(self) -> T {
    self.inner
  }
}

/// Exposes the bytes already buffered, without doing any I/O.
#[cfg(feature = "bytes")]
impl<T: Transport> bytes::Buf for ReadBuffer<T> {
  fn remaining(&self) -> usize {
    self.end - self.pos
  }

  fn chunk(&self) -> &[u8] {
    self.buffered()
  }

  fn advance(&mut self, cnt: usize) {
    let remaining = self.end - self.pos;
    assert!(
      cnt <= remaining,
      "ReadBuffer::advance: cannot advance by {cnt} bytes, only {remaining} buffered"
    );
    self.pos += cnt;
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_utils::{ReadStep, ScriptedTransport};

  fn drain<T: Transport>(reader: &mut ReadBuffer<T>) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(byte) = reader.next_byte().unwrap() {
      out.push(byte);
    }
    out
  }

  #[test]
  fn test_reads_across_refills() {
    let transport = ScriptedTransport::with_reads([
      ReadStep::Data(b"hello ".to_vec()),
      ReadStep::Data(b"world".to_vec()),
    ]);
    let mut reader = ReadBuffer::with_capacity(4, transport);

    assert_eq!(drain(&mut reader), b"hello world");
    // "hello " and "world" through a 4 byte buffer, then EOF.
    assert_eq!(reader.get_ref().read_calls, 5);
  }

  #[test]
  fn test_eof_is_sticky() {
    let transport = ScriptedTransport::with_reads([
      ReadStep::Data(b"ab".to_vec()),
      ReadStep::Eof,
      ReadStep::Data(b"late".to_vec()),
    ]);
    let mut reader = ReadBuffer::new(transport);

    assert_eq!(drain(&mut reader), b"ab");
    assert!(reader.is_eof());
    assert_eq!(reader.next_byte().unwrap(), None);
    assert_eq!(reader.next_byte().unwrap(), None);
    assert_eq!(reader.get_ref().read_calls, 2);
  }

  #[test]
  fn test_would_block_waits_then_retries() {
    let transport = ScriptedTransport::with_reads([
      ReadStep::WouldBlock,
      ReadStep::Interrupted,
      ReadStep::WouldBlock,
      ReadStep::Data(b"x".to_vec()),
    ]);
    let mut reader = ReadBuffer::new(transport);

    assert_eq!(reader.next_byte().unwrap(), Some(b'x'));
    assert_eq!(reader.get_ref().waits, [Interest::Read, Interest::Read]);
  }

  #[test]
  fn test_silent_transport_times_out() {
    let transport =
      ScriptedTransport::with_reads([ReadStep::WouldBlock]).stalled();
    let mut reader = ReadBuffer::new(transport);
    reader.set_timeout(Some(Duration::from_millis(10)));

    let err = reader.next_byte().unwrap_err();
    assert!(matches!(err, Error::Timeout), "{err:?}");
    assert!(!reader.is_eof());
  }

  #[test]
  fn test_read_error_is_reported() {
    let transport =
      ScriptedTransport::with_reads([ReadStep::Fail(libc::ECONNRESET)]);
    let mut reader = ReadBuffer::new(transport);

    let err = reader.next_byte().unwrap_err();
    assert!(matches!(err, Error::Io { .. }));
    assert_eq!(err.raw_os_error(), Some(libc::ECONNRESET));
  }

  #[test]
  fn test_buffered_and_consume() {
    let transport = ScriptedTransport::with_reads([ReadStep::Data(b"abcdef".to_vec())]);
    let mut reader = ReadBuffer::new(transport);
    assert!(!reader.has_buffered());

    assert_eq!(reader.next_byte().unwrap(), Some(b'a'));
    assert!(reader.has_buffered());
    assert_eq!(reader.buffered(), b"bcdef");

    reader.consume(2);
    assert_eq!(reader.buffered(), b"def");
    reader.consume(100);
    assert!(!reader.has_buffered());
    assert_eq!(reader.next_byte().unwrap(), None);
  }

  #[cfg(feature = "bytes")]
  #[test]
  fn test_buf_impl() {
    use bytes::Buf;

    let transport = ScriptedTransport::with_reads([ReadStep::Data(b"Hello!!!".to_vec())]);
    let mut reader = ReadBuffer::new(transport);
    assert_eq!(reader.remaining(), 0);

    assert_eq!(reader.next_byte().unwrap(), Some(b'H'));
    assert_eq!(reader.remaining(), 7);
    assert_eq!(reader.get_u8(), b'e');
    reader.advance(3);
    assert_eq!(reader.copy_to_bytes(3).as_ref(), b"!!!");
    assert!(!reader.has_remaining());
  }

  #[test]
  fn test_zero_capacity_is_bumped() {
    let reader = ReadBuffer::with_capacity(0, ScriptedTransport::new());
    assert_eq!(reader.capacity(), 1);
  }
}
