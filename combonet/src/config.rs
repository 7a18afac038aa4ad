//! Tunables for [`SocketCommunicator`](crate::SocketCommunicator).

use std::time::Duration;

use crate::timeout;

/// Default capacity of the read buffer, in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Options for a [`SocketCommunicator`](crate::SocketCommunicator).
///
/// ```rust
/// use std::time::Duration;
/// use combonet::CommunicatorConfig;
///
/// let config = CommunicatorConfig::new()
///   .timeout(Some(Duration::from_secs(5)))
///   .buffer_size(4096);
/// assert_eq!(config.get_buffer_size(), 4096);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommunicatorConfig {
  timeout: Option<Duration>,
  buffer_size: usize,
}

impl CommunicatorConfig {
  /// No timeout and a [`DEFAULT_BUFFER_SIZE`] read buffer.
  #[must_use]
  pub const fn new() -> Self {
    Self { timeout: None, buffer_size: DEFAULT_BUFFER_SIZE }
  }

  /// Sets how long one read or write may wait for the socket.
  ///
  /// `None` waits indefinitely.
  #[must_use]
  pub const fn timeout(mut self, timeout: Option<Duration>) -> Self {
    self.timeout = timeout;
    self
  }

  /// Same as [`CommunicatorConfig::timeout`], from floating seconds. Negative
  /// or non-finite values disable the timeout.
  #[must_use]
  pub fn timeout_secs_f64(self, seconds: f64) -> Self {
    self.timeout(timeout::from_secs_f64(seconds))
  }

  /// Sets the read buffer capacity. Zero is bumped to one byte.
  #[must_use]
  pub const fn buffer_size(mut self, buffer_size: usize) -> Self {
    self.buffer_size = if buffer_size == 0 { 1 } else { buffer_size };
    self
  }

  pub const fn get_timeout(&self) -> Option<Duration> {
    self.timeout
  }

  pub const fn get_buffer_size(&self) -> usize {
    self.buffer_size
  }
}

impl Default for CommunicatorConfig {
  fn default() -> Self {
    Self::new()
  }
}
