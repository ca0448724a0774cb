//! stripestore - RAID-6 Style Erasure-Coded Block Storage
//!
//! Stripes opaque payloads across eight storage nodes as six data
//! fragments plus P and Q parity per stripe, and recovers payloads with
//! up to two nodes lost, using Reed-Solomon coding over GF(2^8).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          stripestore                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │   Striping   │───▶│    Stripe    │───▶│    Block     │       │
//! │  │    Codec     │    │   Manager    │    │   Storage    │       │
//! │  │  (GF(2^8))   │    │ (file codec) │    │  (8 nodes)   │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`gf`] - GF(2^8) arithmetic kernel
//! - [`codec`] - stripe encoder and reconstructor
//! - [`manager`] - file codec driving store and recover
//! - [`storage`] - block store port and its adapters
//! - [`protocol`] - node wire protocol
//! - [`server`] - storage node TCP server
//! - [`config`] - cluster configuration
//! - [`error`] - error types

pub mod codec;
pub mod config;
pub mod error;
pub mod gf;
pub mod manager;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types
pub use codec::{StripeEncoder, StripeReconstructor};
pub use config::ClusterConfig;
pub use error::{Error, Result};
pub use manager::{FileMetadata, Recovery, StripeManager, StripeManagerConfig};
pub use server::NodeServer;
pub use storage::BlockStore;
