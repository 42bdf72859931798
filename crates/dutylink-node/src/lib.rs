//! Motor node networking for dutylink.
//!
//! The node serves one TCP client at a time. Each connection is handled
//! by a [`ConnectionHandler`] that decodes text commands, drives the shared
//! [`DutyController`](dutylink_motor::DutyController), and stops the motor
//! when the client goes away.

pub mod connector;
pub mod error;
pub mod handler;
pub mod listener;

pub use connector::{connect, connect_with_config, ClientConfig, MotorClient};
pub use error::{NodeError, Result};
pub use handler::{CloseReason, ConnectionHandler, SessionStats, SessionSummary};
pub use listener::{MotorServer, ServerConfig, ShutdownHandle};
