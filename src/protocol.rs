//! Node Wire Protocol
//!
//! Line-oriented request/response protocol between the stripe manager
//! and storage nodes, one command per exchange over a connection that
//! may serve many exchanges:
//!
//! ```text
//! STORE <name> <size>\n<size bytes>   ->  OK\n | ERROR <message>\n
//! RETRIEVE <name>\n                   ->  OK <size>\n<size bytes> | ERROR <message>\n
//! DELETE <name>\n                     ->  OK\n | ERROR <message>\n
//! ```
//!
//! Response lines end with a single `\n`; payload bytes follow
//! immediately after the newline of the `OK <size>` line.

use crate::error::{Error, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

/// Upper bound on a single blob transfer, guarding both sides of the
/// connection against runaway size fields.
pub const MAX_BLOB_SIZE: usize = 64 * 1024 * 1024;

// =============================================================================
// Requests
// =============================================================================

/// A command sent to a storage node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Store `size` payload bytes under `name`
    Store { name: String, size: usize },
    /// Fetch the blob named `name`
    Retrieve { name: String },
    /// Remove the blob named `name`
    Delete { name: String },
}

impl Request {
    /// Parse one request line (without the trailing newline).
    pub fn parse(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let command = parts
            .next()
            .ok_or_else(|| Error::Protocol("empty request".to_string()))?;

        let request = match command {
            "STORE" => {
                let name = expect_token(&mut parts, "STORE name")?;
                let size: usize = expect_token(&mut parts, "STORE size")?
                    .parse()
                    .map_err(|_| Error::Protocol("invalid STORE size".to_string()))?;
                if size > MAX_BLOB_SIZE {
                    return Err(Error::Protocol(format!(
                        "blob size {} exceeds limit {}",
                        size, MAX_BLOB_SIZE
                    )));
                }
                Request::Store { name, size }
            }
            "RETRIEVE" => Request::Retrieve {
                name: expect_token(&mut parts, "RETRIEVE name")?,
            },
            "DELETE" => Request::Delete {
                name: expect_token(&mut parts, "DELETE name")?,
            },
            other => {
                return Err(Error::Protocol(format!("unknown command: {}", other)));
            }
        };

        if parts.next().is_some() {
            return Err(Error::Protocol(format!("trailing tokens in: {}", line)));
        }
        Ok(request)
    }

    /// Encode the request line, newline included.
    pub fn encode(&self) -> String {
        match self {
            Request::Store { name, size } => format!("STORE {} {}\n", name, size),
            Request::Retrieve { name } => format!("RETRIEVE {}\n", name),
            Request::Delete { name } => format!("DELETE {}\n", name),
        }
    }
}

fn expect_token(parts: &mut std::str::SplitWhitespace<'_>, what: &str) -> Result<String> {
    parts
        .next()
        .map(str::to_string)
        .ok_or_else(|| Error::Protocol(format!("missing {}", what)))
}

// =============================================================================
// Responses
// =============================================================================

/// A storage node's answer to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// The command succeeded with no payload
    Ok,
    /// The command succeeded; `size` payload bytes follow the line
    OkWithSize(usize),
    /// The command failed
    Error(String),
}

impl Response {
    /// Parse one response line (without the trailing newline).
    pub fn parse(line: &str) -> Result<Self> {
        if let Some(rest) = line.strip_prefix("ERROR") {
            return Ok(Response::Error(rest.trim().to_string()));
        }
        if let Some(rest) = line.strip_prefix("OK") {
            let rest = rest.trim();
            if rest.is_empty() {
                return Ok(Response::Ok);
            }
            let size: usize = rest
                .parse()
                .map_err(|_| Error::Protocol(format!("invalid OK size: {}", rest)))?;
            if size > MAX_BLOB_SIZE {
                return Err(Error::Protocol(format!(
                    "blob size {} exceeds limit {}",
                    size, MAX_BLOB_SIZE
                )));
            }
            return Ok(Response::OkWithSize(size));
        }
        Err(Error::Protocol(format!("unparseable response: {}", line)))
    }

    /// Encode the response line, newline included.
    pub fn encode(&self) -> String {
        match self {
            Response::Ok => "OK\n".to_string(),
            Response::OkWithSize(size) => format!("OK {}\n", size),
            Response::Error(message) => format!("ERROR {}\n", message),
        }
    }
}

// =============================================================================
// Line Reading
// =============================================================================

/// Read one newline-terminated line. `Ok(None)` means a clean EOF before
/// any bytes arrived.
pub async fn read_line<R>(reader: &mut R) -> Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut line = String::new();
    let read = reader.read_line(&mut line).await?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

// =============================================================================
// Tests
// =============================================================================
