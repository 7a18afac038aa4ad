//! Deadlines and the conversions `poll(2)` needs.

use std::time::{Duration, Instant};

/// An absolute point in time a whole operation must finish by.
///
/// Operations that wait more than once (a read that gets woken up spuriously,
/// a write that hits backpressure twice) compute one `Deadline` up front and
/// hand each wait only what is left of it, so the total never exceeds the
/// configured timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline(Option<Instant>);

impl Deadline {
  /// A deadline `timeout` from now, or none at all for `None`.
  pub fn after(timeout: Option<Duration>) -> Deadline {
    // An absurd timeout that overflows Instant is as good as no timeout.
    Deadline(timeout.and_then(|t| Instant::now().checked_add(t)))
  }

  pub const fn never() -> Deadline {
    Deadline(None)
  }

  /// Time left, `Some(ZERO)` once passed, `None` if unbounded.
  pub fn remaining(&self) -> Option<Duration> {
    self.0.map(|at| at.saturating_duration_since(Instant::now()))
  }

  pub fn is_expired(&self) -> bool {
    self.remaining().is_some_and(|left| left.is_zero())
  }
}

/// Converts a wait budget into the millisecond argument of `poll(2)`.
///
/// `None` becomes `-1` (wait forever). Sub-millisecond remainders round up so
/// a wait never returns before its budget is spent; budgets beyond `i32::MAX`
/// milliseconds are capped.
pub fn poll_timeout_ms(timeout: Option<Duration>) -> libc::c_int {
  match timeout {
    None => -1,
    Some(timeout) => {
      let mut ms = timeout.as_millis();
      if timeout.subsec_nanos() % 1_000_000 != 0 {
        ms += 1;
      }
      ms.min(libc::c_int::MAX as u128) as libc::c_int
    }
  }
}

/// Timeout from floating seconds. Negative, NaN and infinite values mean "no
/// timeout".
pub fn from_secs_f64(seconds: f64) -> Option<Duration> {
  if seconds.is_finite() && seconds >= 0.0 {
    Duration::try_from_secs_f64(seconds).ok()
  } else {
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_poll_timeout_ms() {
    assert_eq!(poll_timeout_ms(None), -1);
    assert_eq!(poll_timeout_ms(Some(Duration::ZERO)), 0);
    assert_eq!(poll_timeout_ms(Some(Duration::from_millis(1500))), 1500);
    assert_eq!(poll_timeout_ms(Some(Duration::from_micros(1))), 1);
    assert_eq!(poll_timeout_ms(Some(Duration::from_micros(2500))), 3);
    assert_eq!(
      poll_timeout_ms(Some(Duration::from_secs(u64::MAX))),
      libc::c_int::MAX
    );
  }

  #[test]
  fn test_from_secs_f64() {
    assert_eq!(from_secs_f64(1.5), Some(Duration::from_millis(1500)));
    assert_eq!(from_secs_f64(0.0), Some(Duration::ZERO));
    assert_eq!(from_secs_f64(-1.0), None);
    assert_eq!(from_secs_f64(f64::NAN), None);
    assert_eq!(from_secs_f64(f64::INFINITY), None);
  }

  #[test]
  fn test_deadline_never() {
    let deadline = Deadline::after(None);
    assert_eq!(deadline, Deadline::never());
    assert_eq!(deadline.remaining(), None);
    assert!(!deadline.is_expired());
  }

  #[test]
  fn test_deadline_counts_down() {
    let deadline = Deadline::after(Some(Duration::from_secs(60)));
    let left = deadline.remaining().unwrap();
    assert!(left <= Duration::from_secs(60));
    assert!(left > Duration::from_secs(59));
    assert!(!deadline.is_expired());
  }

  #[test]
  fn test_deadline_expires() {
    let deadline = Deadline::after(Some(Duration::ZERO));
    assert_eq!(deadline.remaining(), Some(Duration::ZERO));
    assert!(deadline.is_expired());
  }

  #[test]
  fn test_deadline_overflow_is_unbounded() {
    let deadline = Deadline::after(Some(Duration::MAX));
    assert_eq!(deadline.remaining(), None);
  }
}
