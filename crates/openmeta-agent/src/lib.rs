//! OpenMETA Test Bench Agent
//!
//! Runs on the node that executes the test benches (typically a Windows
//! machine with the toolchain installed). The build host reaches it over
//! SSH and asks it, one request per invocation, to write the command
//! script, launch it, read the results file back and delete the script.
//!
//! Every operation is carried out with the same [`LocalChannel`] the host
//! uses for local runs, so a remote run touches the node exactly the way a
//! local one would.
//!
//! [`LocalChannel`]: openmeta_testbench::LocalChannel

pub mod config;
pub mod handlers;
pub mod rpc;

pub use config::AgentConfig;
pub use rpc::RpcHandler;
