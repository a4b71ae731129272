//! # memkeep-server
//!
//! Network facade for the memkeep memory manager.
//!
//! - [`protocol`]: request/response messages and their frame codec
//! - [`service`]: maps requests onto a [`memkeep_core::MemoryManager`]
//! - [`server`]: tokio TCP server hosting the service
//! - [`client`]: async client
//! - [`config`]: daemon configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use memkeep_common::ManagerConfig;
//! use memkeep_core::MemoryManager;
//! use memkeep_server::{MemoryClient, MemoryServer, MemoryService};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let manager = Arc::new(MemoryManager::new(ManagerConfig::default())?);
//! let server = MemoryServer::bind("127.0.0.1:0", MemoryService::new(manager)).await?;
//! let addr = server.local_addr();
//! tokio::spawn(server.serve());
//!
//! let mut client = MemoryClient::connect(addr).await?;
//! let id = client.create(5).await?;
//! client.set(id, b"Hola\0").await?;
//! assert_eq!(client.get(id, 5).await?, b"Hola\0");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod protocol;
pub mod server;
pub mod service;

pub use client::MemoryClient;
pub use config::{ServerConfig, ServerConfigBuilder};
pub use error::{ProtocolError, ProtocolResult};
pub use protocol::{Request, Response, ServiceStats};
pub use server::MemoryServer;
pub use service::MemoryService;
