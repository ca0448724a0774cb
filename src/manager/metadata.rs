//! File Metadata and Blob Naming
//!
//! Metadata describes one stored payload: its name, byte size, fragment
//! length and stripe count. A byte-identical JSON copy is replicated to
//! every node under the reserved name `metadata`, so any single surviving
//! node suffices to recover it.
//!
//! Blob naming follows the fixed layout: node i holds data blob
//! `stripe_{s}_block_{i}`, node D holds `stripe_{s}_parity_p` and node
//! D+1 holds `stripe_{s}_parity_q`.

use crate::error::{Error, Result};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Reserved blob name for the replicated metadata copy.
pub const METADATA_BLOB: &str = "metadata";

// =============================================================================
// File Metadata
// =============================================================================

/// Metadata of one stored payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    /// Original file name, restored on recovery
    pub original_filename: String,
    /// Payload size in bytes before padding
    pub original_size: u64,
    /// Fragment length L
    pub block_size: u64,
    /// Number of stripes the payload occupies
    pub total_stripes: u64,
}

impl FileMetadata {
    /// Describe a payload of `original_size` bytes striped over
    /// `data_fragments` fragments of `block_size` bytes each.
    pub fn new(
        original_filename: impl Into<String>,
        original_size: u64,
        block_size: u64,
        data_fragments: usize,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(Error::InvalidConfig(
                "block size must be positive".to_string(),
            ));
        }

        let stripe_payload = block_size * data_fragments as u64;
        let total_stripes = original_size.div_ceil(stripe_payload);

        Ok(Self {
            original_filename: original_filename.into(),
            original_size,
            block_size,
            total_stripes,
        })
    }

    /// Serialize to the replicated JSON form.
    pub fn to_json(&self) -> Result<Bytes> {
        let json = serde_json::to_vec(self)
            .map_err(|e| Error::Internal(format!("failed to serialize metadata: {}", e)))?;
        Ok(Bytes::from(json))
    }

    /// Parse a replicated JSON copy.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let metadata: Self = serde_json::from_slice(data)
            .map_err(|e| Error::Protocol(format!("unparseable metadata: {}", e)))?;
        if metadata.block_size == 0 {
            return Err(Error::Protocol(
                "metadata carries a zero block size".to_string(),
            ));
        }
        Ok(metadata)
    }
}

// =============================================================================
// Blob Naming
// =============================================================================

/// Name of the data blob for `slot` of stripe `stripe_index`.
pub fn data_blob_name(stripe_index: u64, slot: usize) -> String {
    format!("stripe_{}_block_{}", stripe_index, slot)
}

/// Name of the P parity blob of stripe `stripe_index`.
pub fn parity_p_name(stripe_index: u64) -> String {
    format!("stripe_{}_parity_p", stripe_index)
}

/// Name of the Q parity blob of stripe `stripe_index`.
pub fn parity_q_name(stripe_index: u64) -> String {
    format!("stripe_{}_parity_q", stripe_index)
}

/// Blob name owned by `slot` (0..D+1) for stripe `stripe_index`.
pub fn blob_name_for_slot(stripe_index: u64, slot: usize, data_fragments: usize) -> String {
    if slot < data_fragments {
        data_blob_name(stripe_index, slot)
    } else if slot == data_fragments {
        parity_p_name(stripe_index)
    } else {
        parity_q_name(stripe_index)
    }
}

// =============================================================================
// Tests
// =============================================================================
