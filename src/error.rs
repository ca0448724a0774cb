//! Error types for stripestore

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in stripestore
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // =========================================================================
    // Codec Errors
    // =========================================================================
    /// Fragments disagree on length
    #[error("fragment length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },

    /// Too many fragments missing to solve the stripe
    #[error("stripe {stripe_index} unrecoverable: {missing} of {total} fragments missing")]
    Unrecoverable {
        stripe_index: u64,
        missing: usize,
        total: usize,
    },

    /// Division by zero in the field kernel
    #[error("GF(2^8) division by zero")]
    DivisionByZero,

    /// Internal arithmetic invariant violated during reconstruction
    #[error("arithmetic error reconstructing stripe {stripe_index}: {reason}")]
    ArithmeticError { stripe_index: u64, reason: String },

    /// Parity verification of a fully present stripe failed
    #[error("stripe {stripe_index} inconsistent: stored parity does not match data")]
    Inconsistent { stripe_index: u64 },

    // =========================================================================
    // Manager Errors
    // =========================================================================
    /// No node returned a parseable metadata blob
    #[error("metadata unavailable: no node returned a parseable copy")]
    MetadataUnavailable,

    /// A retrieved fragment failed validation
    #[error("corrupted fragment {name} from node {node_index}: {reason}")]
    CorruptedFragment {
        node_index: usize,
        name: String,
        reason: String,
    },

    /// Fragment write rejected by a node
    #[error("failed to store {name} on node {node_index}: {reason}")]
    StoreRejected {
        node_index: usize,
        name: String,
        reason: String,
    },

    // =========================================================================
    // Transport Errors
    // =========================================================================
    /// Blob absent from a node's namespace
    #[error("blob not found: {name}")]
    BlobNotFound { name: String },

    /// Node did not answer the liveness probe
    #[error("node {node_index} at {addr} is offline")]
    NodeOffline { node_index: usize, addr: String },

    /// Wire protocol violation
    #[error("protocol error: {0}")]
    Protocol(String),

    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid cluster or codec configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}
