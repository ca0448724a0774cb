// Allow dead code for library-style API methods not yet used by the binary
#![allow(dead_code)]

//! Block Storage Port
//!
//! The stripe manager talks to storage nodes through the [`BlockStore`]
//! trait: a flat namespace of named byte blobs on each node, with a
//! liveness probe. Adapters:
//!
//! - [`DirectoryStore`] (`local.rs`): blobs as files in a directory; the
//!   node server's backing store.
//! - [`MemoryStore`] (`memory.rs`): in-memory blobs with failure
//!   injection, used by tests and simulations.
//! - [`RemoteStore`] (`remote.rs`): a node reached over the TCP wire
//!   protocol.
//!
//! The manager demotes transport errors to missing fragments at the
//! codec boundary; adapters just report them.

pub mod local;
pub mod memory;
pub mod remote;

pub use local::DirectoryStore;
pub use memory::MemoryStore;
pub use remote::RemoteStore;

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// Port to one storage node's blob namespace.
#[async_trait]
pub trait BlockStore: Send + Sync {
    /// Store a blob under `name`, replacing any previous contents.
    async fn put(&self, name: &str, data: Bytes) -> Result<()>;

    /// Fetch the blob named `name`. `Ok(None)` means the node is
    /// reachable but does not hold the blob.
    async fn get(&self, name: &str) -> Result<Option<Bytes>>;

    /// Remove the blob named `name`. Deleting an absent blob fails with
    /// `BlobNotFound`, which the wire protocol reports as file-not-found.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Probe the node for liveness, bounding the wait.
    async fn is_online(&self) -> bool;
}

/// Reject blob names that could escape a node's flat namespace.
pub(crate) fn validate_blob_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name.len() <= 255
        && !name.contains(['/', '\\'])
        && name != "."
        && name != "..";

    if valid {
        Ok(())
    } else {
        Err(crate::error::Error::Protocol(format!(
            "invalid blob name: {:?}",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_blob_name() {
        assert!(validate_blob_name("metadata").is_ok());
        assert!(validate_blob_name("stripe_0_block_3").is_ok());

        assert!(validate_blob_name("").is_err());
        assert!(validate_blob_name("a/b").is_err());
        assert!(validate_blob_name("a\\b").is_err());
        assert!(validate_blob_name("..").is_err());
        assert!(validate_blob_name(&"x".repeat(256)).is_err());
    }
}
