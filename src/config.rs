//! Cluster Configuration
//!
//! The array geometry is fixed: six data fragments plus the P and Q
//! parities, eight storage nodes in all. Node index determines which
//! fragment slot of every stripe the node owns. The node address list is
//! loaded from a JSON file, with a localhost default matching the
//! development cluster layout.

use crate::codec::PARITY_FRAGMENTS;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of data fragments per stripe (D).
pub const DATA_FRAGMENTS: usize = 6;

/// Total storage nodes: one per data fragment plus P and Q.
pub const TOTAL_NODES: usize = DATA_FRAGMENTS + PARITY_FRAGMENTS;

/// First port of the default localhost cluster.
const DEFAULT_BASE_PORT: u16 = 5001;

// =============================================================================
// Node Address
// =============================================================================

/// Address of one storage node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    /// Human-readable node name used in diagnostics
    pub name: String,
    /// Host name or IP address
    pub host: String,
    /// TCP port of the node server
    pub port: u16,
}

impl NodeAddress {
    /// The `host:port` endpoint string.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl std::fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name, self.endpoint())
    }
}

// =============================================================================
// Cluster Configuration
// =============================================================================

/// The ordered list of storage nodes. Slot i of every stripe lives on
/// `nodes[i]`: data on 0..D, P on D, Q on D+1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub nodes: Vec<NodeAddress>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        let nodes = (0..TOTAL_NODES)
            .map(|i| {
                let name = if i < DATA_FRAGMENTS {
                    format!("node{}", i + 1)
                } else {
                    format!("parity{}", i - DATA_FRAGMENTS + 1)
                };
                NodeAddress {
                    name,
                    host: "localhost".to_string(),
                    port: DEFAULT_BASE_PORT + i as u16,
                }
            })
            .collect();

        Self { nodes }
    }
}

impl ClusterConfig {
    /// Load a configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: ClusterConfig = serde_json::from_str(&contents)
            .map_err(|e| Error::InvalidConfig(format!("failed to parse {:?}: {}", path, e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the node list against the array geometry.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.len() != TOTAL_NODES {
            return Err(Error::InvalidConfig(format!(
                "expected {} nodes, got {}",
                TOTAL_NODES,
                self.nodes.len()
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Block Size Parsing
// =============================================================================

/// Parse a fragment length from a human form: `64KB`, `1MB`, or plain
/// bytes. Zero is rejected.
pub fn parse_block_size(input: &str) -> Result<usize> {
    let text = input.trim().to_uppercase();

    let (digits, multiplier) = if let Some(stripped) = text.strip_suffix("KB") {
        (stripped.to_string(), 1024)
    } else if let Some(stripped) = text.strip_suffix("MB") {
        (stripped.to_string(), 1024 * 1024)
    } else {
        (text, 1)
    };

    let value: usize = digits
        .trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("invalid block size: {}", input)))?;

    let bytes = value * multiplier;
    if bytes == 0 {
        return Err(Error::InvalidConfig(
            "block size must be positive".to_string(),
        ));
    }
    Ok(bytes)
}

// =============================================================================
// Tests
// =============================================================================
