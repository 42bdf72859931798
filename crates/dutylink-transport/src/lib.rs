//! Blocking TCP transport for the dutylink node.
//!
//! The node serves a single client at a time: [`TcpTransport`] binds a
//! listener, tunes keep-alive on each accepted socket and hands out
//! [`LinkStream`]s. Clients use [`TcpTransport::connect`].

pub mod error;
pub mod tcp;
pub mod traits;

pub use error::{Result, TransportError};
pub use tcp::{KeepaliveConfig, TcpTransport, DEFAULT_PORT};
pub use traits::LinkStream;
