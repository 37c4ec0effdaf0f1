//! Agent RPC Handler
//!
//! Invoked once per request over SSH:
//!
//!   openmeta-agent rpc
//!
//! The handler reads a single JSON request from stdin and answers on
//! stdout. While a launch runs, each line the process prints is forwarded
//! as an `output` frame; every invocation ends with exactly one `response`
//! frame.

use std::io::{self, BufRead, Write};

use openmeta_protocol::{
    ops::names, Frame, OutputStream, RpcError, RpcRequest, RpcResponse, PROTOCOL_VERSION_PROBE,
};

use crate::config::AgentConfig;
use crate::handlers;

/// Main RPC handler for the agent.
pub struct RpcHandler {
    config: AgentConfig,
}

impl RpcHandler {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }

    /// Run the handler on stdin and stdout.
    pub fn run(&self) -> io::Result<()> {
        self.run_with_io(&mut io::stdin().lock(), &mut io::stdout().lock())
    }

    /// Run the handler with custom I/O (for testing).
    pub fn run_with_io<R: BufRead, W: Write>(
        &self,
        reader: &mut R,
        writer: &mut W,
    ) -> io::Result<()> {
        let request = match self.read_request(reader) {
            Ok(req) => req,
            Err(e) => {
                let response = RpcResponse::error(PROTOCOL_VERSION_PROBE, String::new(), e);
                return write_frame(writer, &Frame::Response(response));
            }
        };

        if let Err(e) = self.validate_protocol_version(&request) {
            let response =
                RpcResponse::error(request.protocol_version, request.request_id.clone(), e);
            return write_frame(writer, &Frame::Response(response));
        }

        let response = self.dispatch(&request, writer)?;
        write_frame(writer, &Frame::Response(response))
    }

    fn read_request<R: BufRead>(&self, reader: &mut R) -> Result<RpcRequest, RpcError> {
        let mut line = String::new();
        reader
            .read_line(&mut line)
            .map_err(|e| RpcError::invalid_request(format!("failed to read request: {}", e)))?;

        serde_json::from_str(&line)
            .map_err(|e| RpcError::invalid_request(format!("invalid JSON: {}", e)))
    }

    fn validate_protocol_version(&self, request: &RpcRequest) -> Result<(), RpcError> {
        // probe MUST use protocol_version 0, nothing else may
        if request.op == names::PROBE {
            if request.protocol_version != PROTOCOL_VERSION_PROBE {
                return Err(RpcError::unsupported_protocol(
                    request.protocol_version,
                    PROTOCOL_VERSION_PROBE,
                    PROTOCOL_VERSION_PROBE,
                ));
            }
            return Ok(());
        }

        if request.protocol_version < self.config.protocol_min
            || request.protocol_version > self.config.protocol_max
        {
            return Err(RpcError::unsupported_protocol(
                request.protocol_version,
                self.config.protocol_min,
                self.config.protocol_max,
            ));
        }

        Ok(())
    }

    /// Run the operation. Only a failure to write an output frame is an
    /// `Err`; operation failures become error responses.
    fn dispatch<W: Write>(&self, request: &RpcRequest, writer: &mut W) -> io::Result<RpcResponse> {
        let protocol_version = if request.op == names::PROBE {
            PROTOCOL_VERSION_PROBE
        } else {
            request.protocol_version
        };

        let mut frame_error: Option<io::Error> = None;
        let result = match request.op.as_str() {
            names::PROBE => handlers::probe::handle(&self.config),
            names::WRITE_TEMP => handlers::files::write_temp(request),
            names::LAUNCH => {
                let mut forward = |stream: OutputStream, line: &str| {
                    if frame_error.is_some() {
                        return;
                    }
                    let frame = Frame::Output {
                        stream,
                        line: line.to_string(),
                    };
                    if let Err(e) = write_frame(writer, &frame) {
                        frame_error = Some(e);
                    }
                };
                handlers::launch::handle(request, &mut forward)
            }
            names::DELETE => handlers::files::delete(request),
            names::READ => handlers::files::read(request),
            names::READ_HEAD => handlers::files::read_head(request),
            names::STAT => handlers::files::stat(request),
            _ => Err(RpcError::unknown_operation(&request.op)),
        };

        if let Some(e) = frame_error {
            // The host is gone; nobody is left to read a response.
            return Err(e);
        }

        Ok(match result {
            Ok(payload) => RpcResponse::success(protocol_version, request.request_id.clone(), payload),
            Err(e) => {
                tracing::warn!(op = %request.op, error = %e, "operation failed");
                RpcResponse::error(protocol_version, request.request_id.clone(), e)
            }
        })
    }
}

fn write_frame<W: Write>(writer: &mut W, frame: &Frame) -> io::Result<()> {
    let json = frame
        .to_line()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)?;
    writer.flush()
}
