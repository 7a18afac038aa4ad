macro_rules! syscall {
  ($fn: ident ( $($arg: expr),* $(,)* ) ) => {{
      #[allow(unused_unsafe)]
      let res = unsafe { libc::$fn($($arg, )*) };
      if res == -1 {
          Err(std::io::Error::last_os_error())
      } else {
          Ok(res)
      }
  }};
}

/// Like `syscall!`, but wraps the failure into [`crate::Error::Io`] with the
/// given context.
macro_rules! syscall_ctx {
  ($ctx: expr, $fn: ident ( $($arg: expr),* $(,)* ) ) => {
    syscall!($fn($($arg),*)).map_err(|source| crate::Error::Io {
      context: $ctx,
      source,
    })
  };
}
