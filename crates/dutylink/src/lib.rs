//! Remote duty-cycle control for H-bridge driven motors.
//!
//! A motor node listens on TCP and accepts a two-command text protocol from
//! one operator at a time: query the signed duty, or fade to a new one. The
//! node stops the motor whenever the operator disconnects.
//!
//! # Crate Structure
//!
//! - [`motor`]: duty type, fade planning, controller and PWM drivers
//! - [`transport`]: TCP listener and streams with keep-alive
//! - [`frame`]: text command framing and codec
//! - [`node`]: connection handler, single-client server and client

/// Re-export motor control types.
pub mod motor {
    pub use dutylink_motor::*;
}

/// Re-export transport types.
pub mod transport {
    pub use dutylink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use dutylink_frame::*;
}

/// Re-export node types.
pub mod node {
    pub use dutylink_node::*;
}
