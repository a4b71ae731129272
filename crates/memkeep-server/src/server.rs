//! TCP server for the memory service.
//!
//! One task accepts connections; each connection gets its own task that
//! reads frames, dispatches them to the shared [`MemoryService`] and writes
//! one response frame per request. Dispatch runs on the blocking pool, as
//! it takes the manager lock and may write snapshot files.
//!
//! A malformed frame is answered with a `BadRequest` error and the
//! connection is closed, since the stream can no longer be trusted to be
//! aligned on frame boundaries. A response too large to frame is replaced
//! by a `ResponseTooLarge` error and the connection stays open.

use std::future::Future;
use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use memkeep_common::ErrorCode;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, ToSocketAddrs};
use tracing::{debug, error, info, warn};

use crate::error::{ProtocolError, ProtocolResult};
use crate::protocol::{frame, Request, Response};
use crate::service::{bad_request, error_response, MemoryService};

/// Serves a [`MemoryService`] over TCP.
#[derive(Debug)]
pub struct MemoryServer {
    service: MemoryService,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl MemoryServer {
    /// Binds a listener for `service`.
    pub async fn bind(addr: impl ToSocketAddrs, service: MemoryService) -> ProtocolResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            service,
            listener,
            local_addr,
        })
    }

    /// Returns the address the server is listening on.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serves until the process exits.
    pub async fn serve(self) -> ProtocolResult<()> {
        self.serve_until(std::future::pending()).await
    }

    /// Serves until `shutdown` completes, then stops accepting connections.
    pub async fn serve_until(self, shutdown: impl Future<Output = ()>) -> ProtocolResult<()> {
        info!("memory service listening on {}", self.local_addr);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, peer)) => {
                            debug!("accepted connection from {}", peer);
                            let service = self.service.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, service).await {
                                    warn!("connection {} closed with error: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("accept error: {}", e);
                        }
                    }
                }
                () = &mut shutdown => {
                    info!("memory service shutting down");
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_connection(mut stream: TcpStream, service: MemoryService) -> ProtocolResult<()> {
    let mut buf = BytesMut::with_capacity(4096);

    loop {
        let n = stream.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }

        loop {
            let size = match frame::frame_size(&buf) {
                Ok(Some(size)) => size,
                Ok(None) => break,
                Err(e) => return reject(&mut stream, e).await,
            };
            let request: Request = match frame::decode(buf.split_to(size).freeze()) {
                Ok(request) => request,
                Err(e) => return reject(&mut stream, e).await,
            };

            let handler = service.clone();
            let response = tokio::task::spawn_blocking(move || handler.handle(request))
                .await
                .unwrap_or_else(|e| {
                    error_response(ErrorCode::Unknown, format!("request handler failed: {e}"))
                });
            stream.write_all(&encode_response(&response)?).await?;
        }
    }
}

/// Encodes `response`, answering with an error frame if it cannot be framed.
fn encode_response(response: &Response) -> ProtocolResult<Bytes> {
    match frame::encode(response) {
        Ok(bytes) => Ok(bytes),
        Err(e) => {
            warn!("response could not be framed: {}", e);
            let code = match &e {
                ProtocolError::FrameTooLarge { .. } => ErrorCode::ResponseTooLarge,
                _ => ErrorCode::Unknown,
            };
            frame::encode(&error_response(code, e.to_string()))
        }
    }
}

async fn reject(stream: &mut TcpStream, cause: ProtocolError) -> ProtocolResult<()> {
    let response = bad_request(cause.to_string());
    stream.write_all(&frame::encode(&response)?).await?;
    stream.shutdown().await?;
    Err(cause)
}
