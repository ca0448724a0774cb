//! Storage Node Server
//!
//! Serves one node's blob namespace over the wire protocol. Connections
//! are long-lived: each one is handled on its own task and may issue any
//! number of commands before closing.

use crate::error::{Error, Result};
use crate::protocol::{read_line, Request, Response};
use crate::storage::BlockStore;
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

/// A storage node serving its blob store over TCP.
pub struct NodeServer {
    store: Arc<dyn BlockStore>,
}

impl NodeServer {
    /// Create a server over `store`.
    pub fn new(store: Arc<dyn BlockStore>) -> Self {
        Self { store }
    }

    /// Bind `addr` and serve until the task is dropped.
    pub async fn run(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("storage node listening on {}", listener.local_addr()?);
        self.run_on(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn run_on(self, listener: TcpListener) -> Result<()> {
        loop {
            let (stream, peer) = listener.accept().await?;
            debug!("connection from {}", peer);

            let store = Arc::clone(&self.store);
            tokio::spawn(async move {
                if let Err(e) = handle_connection(store, stream).await {
                    error!("connection from {} failed: {}", peer, e);
                }
            });
        }
    }
}

/// Serve commands on one connection until the peer closes it.
async fn handle_connection(store: Arc<dyn BlockStore>, stream: TcpStream) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    while let Some(line) = read_line(&mut reader).await? {
        if line.is_empty() {
            continue;
        }

        let request = match Request::parse(&line) {
            Ok(request) => request,
            Err(e) => {
                respond(&mut write_half, Response::Error(e.to_string())).await?;
                continue;
            }
        };

        match request {
            Request::Store { name, size } => {
                // The payload must be consumed even if the put fails, or
                // the connection loses framing
                let mut payload = vec![0u8; size];
                reader.read_exact(&mut payload).await?;

                let response = match store.put(&name, Bytes::from(payload)).await {
                    Ok(()) => Response::Ok,
                    Err(e) => Response::Error(e.to_string()),
                };
                respond(&mut write_half, response).await?;
            }
            Request::Retrieve { name } => match store.get(&name).await {
                Ok(Some(data)) => {
                    respond(&mut write_half, Response::OkWithSize(data.len())).await?;
                    write_half.write_all(&data).await?;
                    write_half.flush().await?;
                }
                Ok(None) => {
                    respond(&mut write_half, Response::Error("File not found".to_string()))
                        .await?;
                }
                Err(e) => {
                    respond(&mut write_half, Response::Error(e.to_string())).await?;
                }
            },
            Request::Delete { name } => {
                let response = match store.delete(&name).await {
                    Ok(()) => Response::Ok,
                    Err(Error::BlobNotFound { .. }) => {
                        Response::Error("File not found".to_string())
                    }
                    Err(e) => Response::Error(e.to_string()),
                };
                respond(&mut write_half, response).await?;
            }
        }
    }

    Ok(())
}

async fn respond(write_half: &mut OwnedWriteHalf, response: Response) -> Result<()> {
    write_half.write_all(response.encode().as_bytes()).await?;
    write_half.flush().await?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
