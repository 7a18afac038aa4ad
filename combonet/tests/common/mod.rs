#![allow(dead_code)]

use std::sync::Once;

use tracing_subscriber::EnvFilter;

/// Installs a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_tracing() {
  static INIT: Once = Once::new();
  INIT.call_once(|| {
    tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env())
      .with_test_writer()
      .init();
  });
}

/// Splits `data` into random-length chunks of at least one byte.
pub fn random_chunks(rng: &mut fastrand::Rng, data: &[u8]) -> Vec<Vec<u8>> {
  let mut chunks = Vec::new();
  let mut rest = data;
  while !rest.is_empty() {
    let n = rng.usize(1..=rest.len().min(64));
    chunks.push(rest[..n].to_vec());
    rest = &rest[n..];
  }
  chunks
}
