fn main() {
  cfg_aliases::cfg_aliases! {
      linux: { any(target_os = "linux", target_os = "android") },
      bsd_like: { any(
        target_vendor = "apple",
        target_os = "freebsd",
        target_os = "openbsd",
        target_os = "netbsd",
        target_os = "dragonfly"
      ) }
  }
}
