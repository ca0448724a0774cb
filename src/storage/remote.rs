//! Remote Block Store
//!
//! Reaches a storage node over the wire protocol. Each operation dials
//! its own connection; a TCP connect completing within the probe timeout
//! is the node's liveness signal.

use crate::error::{Error, Result};
use crate::protocol::{read_line, Request, Response, MAX_BLOB_SIZE};
use crate::storage::{validate_blob_name, BlockStore};
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, instrument};

/// Bound on waiting for a node to accept a connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(2);

/// Bound on a full request/response exchange once connected.
const IO_TIMEOUT: Duration = Duration::from_secs(30);

/// A storage node reached over TCP.
pub struct RemoteStore {
    node_index: usize,
    addr: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl RemoteStore {
    /// Create a client for the node at `addr` (`host:port`).
    pub fn new(node_index: usize, addr: impl Into<String>) -> Self {
        Self {
            node_index,
            addr: addr.into(),
            connect_timeout: CONNECT_TIMEOUT,
            io_timeout: IO_TIMEOUT,
        }
    }

    /// Override the default timeouts.
    pub fn with_timeouts(mut self, connect: Duration, io: Duration) -> Self {
        self.connect_timeout = connect;
        self.io_timeout = io;
        self
    }

    /// The node's endpoint address.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn connect(&self) -> Result<TcpStream> {
        match timeout(self.connect_timeout, TcpStream::connect(&self.addr)).await {
            Ok(Ok(stream)) => Ok(stream),
            _ => Err(Error::NodeOffline {
                node_index: self.node_index,
                addr: self.addr.clone(),
            }),
        }
    }

    async fn bounded<T>(
        &self,
        exchange: impl std::future::Future<Output = Result<T>>,
    ) -> Result<T> {
        timeout(self.io_timeout, exchange).await.map_err(|_| {
            Error::Io(std::io::Error::new(
                std::io::ErrorKind::TimedOut,
                format!("node {} timed out", self.addr),
            ))
        })?
    }
}

#[async_trait]
impl BlockStore for RemoteStore {
    #[instrument(skip(self, data), fields(node = self.node_index, size = data.len()))]
    async fn put(&self, name: &str, data: Bytes) -> Result<()> {
        validate_blob_name(name)?;
        if data.len() > MAX_BLOB_SIZE {
            return Err(Error::Protocol(format!(
                "blob size {} exceeds limit {}",
                data.len(),
                MAX_BLOB_SIZE
            )));
        }

        let mut stream = self.connect().await?;
        let request = Request::Store {
            name: name.to_string(),
            size: data.len(),
        };

        self.bounded(async {
            stream.write_all(request.encode().as_bytes()).await?;
            stream.write_all(&data).await?;
            stream.flush().await?;

            let mut reader = BufReader::new(stream);
            let line = read_line(&mut reader)
                .await?
                .ok_or_else(|| Error::Protocol("connection closed mid-exchange".to_string()))?;

            match Response::parse(&line)? {
                Response::Ok => {
                    debug!("stored {} on node {}", name, self.node_index);
                    Ok(())
                }
                Response::Error(reason) => Err(Error::StoreRejected {
                    node_index: self.node_index,
                    name: name.to_string(),
                    reason,
                }),
                Response::OkWithSize(_) => {
                    Err(Error::Protocol("unexpected payload in STORE reply".to_string()))
                }
            }
        })
        .await
    }

    #[instrument(skip(self), fields(node = self.node_index))]
    async fn get(&self, name: &str) -> Result<Option<Bytes>> {
        validate_blob_name(name)?;

        let mut stream = self.connect().await?;
        let request = Request::Retrieve {
            name: name.to_string(),
        };

        self.bounded(async {
            stream.write_all(request.encode().as_bytes()).await?;
            stream.flush().await?;

            let mut reader = BufReader::new(stream);
            let line = read_line(&mut reader)
                .await?
                .ok_or_else(|| Error::Protocol("connection closed mid-exchange".to_string()))?;

            match Response::parse(&line)? {
                Response::OkWithSize(size) => {
                    let mut payload = vec![0u8; size];
                    reader.read_exact(&mut payload).await?;
                    debug!("retrieved {} ({} bytes)", name, size);
                    Ok(Some(Bytes::from(payload)))
                }
                // The node is reachable but does not hold the blob
                Response::Error(reason) => {
                    debug!("node {} has no {}: {}", self.node_index, name, reason);
                    Ok(None)
                }
                Response::Ok => {
                    Err(Error::Protocol("RETRIEVE reply missing size".to_string()))
                }
            }
        })
        .await
    }

    #[instrument(skip(self), fields(node = self.node_index))]
    async fn delete(&self, name: &str) -> Result<()> {
        validate_blob_name(name)?;

        let mut stream = self.connect().await?;
        let request = Request::Delete {
            name: name.to_string(),
        };

        self.bounded(async {
            stream.write_all(request.encode().as_bytes()).await?;
            stream.flush().await?;

            let mut reader = BufReader::new(stream);
            let line = read_line(&mut reader)
                .await?
                .ok_or_else(|| Error::Protocol("connection closed mid-exchange".to_string()))?;

            match Response::parse(&line)? {
                Response::Ok => Ok(()),
                Response::Error(reason) => Err(Error::Protocol(reason)),
                Response::OkWithSize(_) => {
                    Err(Error::Protocol("unexpected payload in DELETE reply".to_string()))
                }
            }
        })
        .await
    }

    async fn is_online(&self) -> bool {
        self.connect().await.is_ok()
    }
}
