//! In-memory stand-ins for the step's collaborators
//!
//! - [`MockChannel`]: a node with an in-memory filesystem and a scripted
//!   process, with per-operation failure injection
//! - [`MockArchiver`]: a results archiver with a fixed answer
//!
//! Both count calls so tests can assert what the step did.

mod archiver;
mod channel;

pub use archiver::MockArchiver;
pub use channel::{ChannelFault, MockChannel, MockOp, ScriptedProcess};
