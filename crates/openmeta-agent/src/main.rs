//! OpenMETA Agent Entrypoint
//!
//! Usage: openmeta-agent rpc
//!
//! Reads a single JSON RPC request from stdin and answers on stdout with
//! zero or more output frames followed by one response frame. Meant to be
//! invoked as an SSH forced command on the node that runs the test benches.

use std::process::ExitCode;

use openmeta_agent::{AgentConfig, RpcHandler};
use openmeta_testbench::observability::init_tracing;

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() >= 2 && args[1] == "rpc" {
        init_tracing(false);
        let handler = RpcHandler::new(AgentConfig::default());

        if let Err(e) = handler.run() {
            eprintln!("RPC handler error: {}", e);
            return ExitCode::FAILURE;
        }

        ExitCode::SUCCESS
    } else {
        eprintln!("Usage: openmeta-agent rpc");
        eprintln!();
        eprintln!("Reads one JSON request from stdin and writes framed JSON lines to stdout.");
        ExitCode::FAILURE
    }
}
