//! Filesystem operation handlers: write_temp, delete, read, read_head, stat.

use std::path::Path;

use openmeta_protocol::ops::{
    DeleteRequest, DeleteResponse, ReadHeadRequest, ReadHeadResponse, ReadRequest, ReadResponse,
    StatRequest, StatResponse, WriteTempRequest, WriteTempResponse,
};
use openmeta_protocol::{RpcError, RpcRequest};
use openmeta_testbench::Channel;

use super::{channel, channel_error, to_payload};

/// Handle the write_temp operation.
pub fn write_temp(request: &RpcRequest) -> Result<serde_json::Value, RpcError> {
    let req: WriteTempRequest = request.decode()?;
    let dir = Path::new(&req.dir);
    let path = channel()
        .create_text_temp_file(dir, &req.prefix, &req.suffix, &req.contents)
        .map_err(|e| channel_error("write", dir, e))?;
    tracing::debug!(path = %path.display(), "wrote temp file");
    to_payload(&WriteTempResponse {
        path: path.to_string_lossy().to_string(),
    })
}

/// Handle the delete operation.
pub fn delete(request: &RpcRequest) -> Result<serde_json::Value, RpcError> {
    let req: DeleteRequest = request.decode()?;
    let path = Path::new(&req.path);
    let deleted = channel()
        .delete(path)
        .map_err(|e| channel_error("delete", path, e))?;
    to_payload(&DeleteResponse { deleted })
}

/// Handle the read operation.
pub fn read(request: &RpcRequest) -> Result<serde_json::Value, RpcError> {
    let req: ReadRequest = request.decode()?;
    let path = Path::new(&req.path);
    let contents = channel()
        .read_to_string(path)
        .map_err(|e| channel_error("read", path, e))?;
    to_payload(&ReadResponse { contents })
}

/// Handle the read_head operation.
pub fn read_head(request: &RpcRequest) -> Result<serde_json::Value, RpcError> {
    let req: ReadHeadRequest = request.decode()?;
    let path = Path::new(&req.path);
    let head = channel()
        .read_head(path, req.lines)
        .map_err(|e| channel_error("read", path, e))?;
    to_payload(&ReadHeadResponse { head })
}

/// Handle the stat operation.
pub fn stat(request: &RpcRequest) -> Result<serde_json::Value, RpcError> {
    let req: StatRequest = request.decode()?;
    let path = Path::new(&req.path);
    let kind = channel()
        .stat(path)
        .map_err(|e| channel_error("stat", path, e))?;
    to_payload(&StatResponse { kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use openmeta_protocol::ops::{names, EntryKind};
    use openmeta_protocol::ErrorCode;
    use serde_json::json;
    use tempfile::TempDir;

    fn request(op: &str, payload: serde_json::Value) -> RpcRequest {
        RpcRequest {
            protocol_version: 1,
            op: op.to_string(),
            request_id: "req-test".to_string(),
            payload,
        }
    }

    #[test]
    fn test_write_temp_then_delete() {
        let dir = TempDir::new().unwrap();
        let payload = write_temp(&request(
            names::WRITE_TEMP,
            json!({
                "dir": dir.path().to_string_lossy(),
                "prefix": "openmeta",
                "suffix": ".cmd",
                "contents": "echo hi\r\n",
            }),
        ))
        .unwrap();
        let written: WriteTempResponse = serde_json::from_value(payload).unwrap();
        assert!(written.path.ends_with(".cmd"));
        assert_eq!(std::fs::read_to_string(&written.path).unwrap(), "echo hi\r\n");

        let payload = delete(&request(names::DELETE, json!({ "path": written.path }))).unwrap();
        assert_eq!(payload, json!({ "deleted": true }));
        let payload = delete(&request(names::DELETE, json!({ "path": written.path }))).unwrap();
        assert_eq!(payload, json!({ "deleted": false }));
    }

    #[test]
    fn test_read_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("openmeta-testbenches-result.xml");
        let err = read(&request(names::READ, json!({ "path": missing.to_string_lossy() })))
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn test_read_head_and_stat() {
        let dir = TempDir::new().unwrap();
        let model = dir.path().join("model.xme");
        std::fs::write(&model, "<?xml version=\"1.0\"?>\n<!DOCTYPE project SYSTEM \"mga.dtd\">\n<project/>\n").unwrap();

        let payload = read_head(&request(
            names::READ_HEAD,
            json!({ "path": model.to_string_lossy(), "lines": 2 }),
        ))
        .unwrap();
        let head: ReadHeadResponse = serde_json::from_value(payload).unwrap();
        assert!(head.head.contains("<!DOCTYPE project SYSTEM \"mga"));
        assert!(!head.head.contains("<project/>"));

        let payload = stat(&request(names::STAT, json!({ "path": dir.path().to_string_lossy() }))).unwrap();
        let stat: StatResponse = serde_json::from_value(payload).unwrap();
        assert_eq!(stat.kind, Some(EntryKind::Directory));

        let missing = dir.path().join("nope.xme");
        let payload = super::stat(&request(names::STAT, json!({ "path": missing.to_string_lossy() }))).unwrap();
        assert_eq!(payload, json!({}));
    }

    #[test]
    fn test_bad_payload_is_invalid_request() {
        let err = delete(&request(names::DELETE, json!({ "file": "x" }))).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
    }
}
