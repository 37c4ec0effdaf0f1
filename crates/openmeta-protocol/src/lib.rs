//! OpenMETA Agent Protocol Types
//!
//! Defines the JSON envelope the build host uses to drive an agent on a
//! remote node: write the command script, launch it, read results back and
//! clean up afterwards.

pub mod error;
pub mod frame;
pub mod ops;
pub mod request;
pub mod response;

pub use error::{ErrorCode, RpcError};
pub use frame::{Frame, OutputStream};
pub use request::RpcRequest;
pub use response::RpcResponse;

/// Protocol version used for probe requests (sentinel value).
pub const PROTOCOL_VERSION_PROBE: i32 = 0;

/// Minimum protocol version supported by this implementation.
pub const PROTOCOL_MIN: i32 = 1;

/// Maximum protocol version supported by this implementation.
pub const PROTOCOL_MAX: i32 = 1;

/// Agent version string reported by probe.
pub const AGENT_VERSION: &str = "0.1.0";
