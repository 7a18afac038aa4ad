#![cfg_attr(docsrs, feature(doc_cfg))]

//! # combonet - socket endpoints, netmasks and bounded line I/O
//!
//! A small toolkit for programs that talk simple text protocols over TCP and
//! need to reason about IPv4 and IPv6 addresses side by side.
//!
//! ## Features
//! - **One address type** for both families: [`Endpoint`] parses, prints,
//!   compares and truncates IPv4 and IPv6 socket addresses, and converts to and
//!   from the kernel's `sockaddr` layouts ([`sockaddr`]).
//! - **CIDR matching** with [`Netmask`].
//! - **Deadlines on everything that can block**: connecting
//!   ([`connect_with_timeout`]), reading and writing ([`SocketCommunicator`]).
//!   A timeout is one budget for the whole operation, not per wait.
//! - **Scoped descriptors**: [`Resource`] closes its fd on drop.
//!
//! *Note:* everything here is synchronous. The only blocking call is
//! `poll(2)`, in [`readiness`].
//!
//! ## Quick Start
//!
//! ```rust
//! use combonet::{Endpoint, Netmask};
//!
//! # fn main() -> combonet::Result<()> {
//! let client = Endpoint::parse("[2001:db8::7]:5300", 53)?;
//! assert_eq!(client.port(), 5300);
//!
//! let allowed: Netmask = "2001:db8::/32".parse()?;
//! assert!(allowed.matches(&client));
//!
//! let mapped = Endpoint::parse("::ffff:192.0.2.1", 0)?;
//! assert_eq!(mapped.map_to_ipv4()?.to_text(), "192.0.2.1");
//! # Ok(())
//! # }
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result`] with the crate's [`Error`].
//! Transient conditions (`EAGAIN`, `EINTR`) are retried internally, and end of
//! stream is `Ok(None)` rather than an error.
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events: `trace` for connect state changes and
//! buffer refills, `debug` for descriptors being created, accepted and closed.

#[macro_use]
mod macros;

mod address;
mod error;
mod netmask;

pub mod buffer;
pub mod communicator;
pub mod config;
pub mod connect;
pub mod readiness;
pub mod resource;
pub mod sockaddr;
pub mod sys;
pub mod timeout;
pub mod transport;

#[doc(hidden)]
pub mod test_utils;

pub use address::{Endpoint, Family};
pub use buffer::ReadBuffer;
pub use communicator::SocketCommunicator;
pub use config::CommunicatorConfig;
pub use connect::{ConnectState, Connector, connect_with_timeout};
pub use error::{Error, Result};
pub use netmask::Netmask;
pub use readiness::{Events, Interest, Readiness, wait_for_data, wait_for_rw};
pub use resource::Resource;
pub use transport::Transport;
