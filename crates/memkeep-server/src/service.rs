//! Request dispatch.
//!
//! [`MemoryService`] turns protocol requests into manager calls. Failures
//! become [`Response::Error`] values; nothing a client sends can make the
//! service panic.

use std::sync::Arc;

use memkeep_common::{ErrorCode, MemoryError, MemoryResult};
use memkeep_core::MemoryManager;
use tracing::debug;

use crate::protocol::frame::MAX_DATA_LEN;
use crate::protocol::{Request, Response, ServiceStats};

/// Dispatches requests to a shared [`MemoryManager`].
#[derive(Debug, Clone)]
pub struct MemoryService {
    manager: Arc<MemoryManager>,
}

impl MemoryService {
    /// Creates a service backed by `manager`.
    pub fn new(manager: Arc<MemoryManager>) -> Self {
        Self { manager }
    }

    /// Returns the manager behind the service.
    pub fn manager(&self) -> &Arc<MemoryManager> {
        &self.manager
    }

    /// Executes one request.
    ///
    /// Reads larger than [`MAX_DATA_LEN`] are refused with
    /// [`ErrorCode::ResponseTooLarge`] before touching the manager, since
    /// their answer could not be framed.
    pub fn handle(&self, request: Request) -> Response {
        let name = request.name();
        let response = match request {
            Request::Get { size, .. } if size > MAX_DATA_LEN as u64 => error_response(
                ErrorCode::ResponseTooLarge,
                format!("read of {size} bytes exceeds the {MAX_DATA_LEN}-byte response limit"),
            ),
            request => self.dispatch(request).unwrap_or_else(|e| Response::Error {
                code: e.code().as_u16(),
                message: e.to_string(),
            }),
        };
        if let Response::Error { code, message } = &response {
            debug!(request = name, code, %message, "request failed");
        }
        response
    }

    fn dispatch(&self, request: Request) -> MemoryResult<Response> {
        match request {
            Request::Create { size } => {
                let id = self.manager.create(to_usize(size)?)?;
                Ok(Response::Created { id })
            }
            Request::Set { id, data } => {
                self.manager.set(id, &data)?;
                Ok(Response::Ok)
            }
            Request::Get { id, size } => {
                let bytes = self.manager.get(id, to_usize(size)?)?;
                Ok(Response::Data { bytes })
            }
            Request::IncreaseRefCount { id } => {
                self.manager.increase_ref_count(id);
                Ok(Response::Ok)
            }
            Request::DecreaseRefCount { id } => {
                self.manager.decrease_ref_count(id);
                Ok(Response::Ok)
            }
            Request::Defragment => {
                self.manager.defragment();
                Ok(Response::Ok)
            }
            Request::Stats => Ok(Response::Stats(ServiceStats {
                usage: self.manager.usage(),
                counters: self.manager.stats(),
            })),
        }
    }
}

fn to_usize(size: u64) -> MemoryResult<usize> {
    usize::try_from(size).map_err(|_| MemoryError::OutOfMemory {
        requested: usize::MAX,
        available: 0,
    })
}

/// Builds an error response.
pub fn error_response(code: ErrorCode, message: impl Into<String>) -> Response {
    Response::Error {
        code: code.as_u16(),
        message: message.into(),
    }
}

/// Builds an error response for a request that could not be decoded.
pub fn bad_request(message: impl Into<String>) -> Response {
    error_response(ErrorCode::BadRequest, message)
}
