//! Client for the memory service.

use bytes::BytesMut;
use memkeep_common::{BlockId, ErrorCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{frame, Request, Response, ServiceStats};

/// A connection to a memkeep server.
///
/// Requests are sent one at a time; each call waits for its response.
#[derive(Debug)]
pub struct MemoryClient {
    stream: TcpStream,
    buf: BytesMut,
}

impl MemoryClient {
    /// Connects to a server.
    pub async fn connect(addr: impl ToSocketAddrs) -> ProtocolResult<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self {
            stream,
            buf: BytesMut::with_capacity(4096),
        })
    }

    /// Sends a request and waits for the raw response.
    pub async fn call(&mut self, request: &Request) -> ProtocolResult<Response> {
        self.stream.write_all(&frame::encode(request)?).await?;

        loop {
            if let Some(size) = frame::frame_size(&self.buf)? {
                return frame::decode(self.buf.split_to(size).freeze());
            }
            if self.stream.read_buf(&mut self.buf).await? == 0 {
                return Err(ProtocolError::Closed);
            }
        }
    }

    /// Allocates a block.
    pub async fn create(&mut self, size: usize) -> ProtocolResult<BlockId> {
        match self.call(&Request::Create { size: size as u64 }).await? {
            Response::Created { id } => Ok(id),
            other => Err(unexpected(other)),
        }
    }

    /// Writes bytes at the start of a block.
    pub async fn set(&mut self, id: BlockId, data: &[u8]) -> ProtocolResult<()> {
        let request = Request::Set {
            id,
            data: data.to_vec(),
        };
        expect_ok(self.call(&request).await?)
    }

    /// Reads the first `size` bytes of a block.
    pub async fn get(&mut self, id: BlockId, size: usize) -> ProtocolResult<Vec<u8>> {
        let request = Request::Get {
            id,
            size: size as u64,
        };
        match self.call(&request).await? {
            Response::Data { bytes } => Ok(bytes),
            other => Err(unexpected(other)),
        }
    }

    /// Adds a reference to a block.
    pub async fn increase_ref_count(&mut self, id: BlockId) -> ProtocolResult<()> {
        expect_ok(self.call(&Request::IncreaseRefCount { id }).await?)
    }

    /// Drops a reference to a block.
    pub async fn decrease_ref_count(&mut self, id: BlockId) -> ProtocolResult<()> {
        expect_ok(self.call(&Request::DecreaseRefCount { id }).await?)
    }

    /// Compacts the arena.
    pub async fn defragment(&mut self) -> ProtocolResult<()> {
        expect_ok(self.call(&Request::Defragment).await?)
    }

    /// Fetches usage and counters.
    pub async fn stats(&mut self) -> ProtocolResult<ServiceStats> {
        match self.call(&Request::Stats).await? {
            Response::Stats(stats) => Ok(stats),
            other => Err(unexpected(other)),
        }
    }
}

fn expect_ok(response: Response) -> ProtocolResult<()> {
    match response {
        Response::Ok => Ok(()),
        other => Err(unexpected(other)),
    }
}

fn unexpected(response: Response) -> ProtocolError {
    match response {
        Response::Error { code, message } => ProtocolError::Remote {
            code: ErrorCode::from_u16(code),
            message,
        },
        other => ProtocolError::UnexpectedResponse(format!("{other:?}")),
    }
}
