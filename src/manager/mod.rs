// Allow dead code for library-style API methods not yet used by the binary
#![allow(dead_code)]

//! Stripe Manager / File Codec
//!
//! Drives the striping codec against the storage nodes.
//!
//! # Data Flow
//!
//! ```text
//! Store:    payload ─▶ split/pad ─▶ encode (P, Q) ─▶ D+2 node writes
//! Recover:  node reads ─▶ mark missing ─▶ reconstruct ─▶ concat ─▶ truncate
//! ```
//!
//! Storing writes the metadata blob to every node first, then the
//! stripes in payload order; a single fragment write failure aborts the
//! store. Recovery is per-stripe: an unrecoverable stripe contributes
//! zero bytes and is reported, while the remaining stripes are still
//! attempted.

pub mod metadata;

pub use metadata::FileMetadata;

use crate::codec::stripe::{Fragment, FragmentSlot, Stripe};
use crate::codec::{ReconstructorConfig, StripeEncoder, StripeReconstructor, PARITY_FRAGMENTS};
use crate::config;
use crate::error::{Error, Result};
use crate::manager::metadata::{blob_name_for_slot, METADATA_BLOB};
use crate::storage::BlockStore;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the stripe manager
#[derive(Debug, Clone)]
pub struct StripeManagerConfig {
    /// Number of data fragments per stripe (D)
    pub data_fragments: usize,

    /// Verify parity consistency of fully present stripes on recovery
    pub verify_intact: bool,

    /// Write reconstructed fragments back to online nodes that were
    /// missing them. Advisory: writeback failures never fail recovery.
    pub writeback: bool,
}

impl Default for StripeManagerConfig {
    fn default() -> Self {
        Self {
            data_fragments: config::DATA_FRAGMENTS,
            verify_intact: false,
            writeback: false,
        }
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Outcome of a store operation
#[derive(Debug)]
pub struct StoreReport {
    /// Stored file name
    pub filename: String,

    /// Payload size in bytes
    pub payload_size: u64,

    /// Fragment length L used for this session
    pub block_size: u64,

    /// Stripes written
    pub total_stripes: u64,

    /// Fragments written across all stripes
    pub fragments_written: usize,

    /// Nodes that accepted the metadata blob
    pub metadata_replicas: usize,

    /// Per-node metadata write failures
    pub node_errors: Vec<String>,

    /// When the store finished
    pub completed_at: DateTime<Utc>,

    /// Duration of the operation
    pub duration: Duration,
}

/// Outcome of a recovery operation
#[derive(Debug)]
pub struct RecoveryReport {
    /// Nodes that answered the liveness probe
    pub online_nodes: Vec<usize>,

    /// Node index the metadata was read from
    pub metadata_source: usize,

    /// Stripes that had missing fragments and were reconstructed
    pub reconstructed_stripes: Vec<u64>,

    /// Stripes that could not be recovered and were zero-filled
    pub unrecoverable_stripes: Vec<u64>,

    /// Per-stripe failure diagnostics
    pub stripe_errors: Vec<String>,

    /// Fragments demoted to missing after failing validation
    pub corrupted_fragments: Vec<String>,

    /// Reconstructed fragments written back to their nodes
    pub fragments_written_back: usize,

    /// When the recovery finished
    pub completed_at: DateTime<Utc>,

    /// Duration of the operation
    pub duration: Duration,
}

/// A recovered payload with its metadata and diagnostics
#[derive(Debug)]
pub struct Recovery {
    /// The payload, truncated to the original size
    pub payload: Vec<u8>,

    /// Metadata the recovery ran against
    pub metadata: FileMetadata,

    /// Per-stripe and per-node diagnostics
    pub report: RecoveryReport,
}

// =============================================================================
// Stripe Manager
// =============================================================================

/// Orchestrates store and recover across the D+2 storage nodes.
pub struct StripeManager {
    config: StripeManagerConfig,
    encoder: StripeEncoder,
    reconstructor: StripeReconstructor,
    nodes: Vec<Arc<dyn BlockStore>>,
}

impl std::fmt::Debug for StripeManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeManager")
            .field("config", &self.config)
            .field("encoder", &self.encoder)
            .field("reconstructor", &self.reconstructor)
            .field("nodes", &format!("<{} nodes>", self.nodes.len()))
            .finish()
    }
}

impl StripeManager {
    /// Create a manager over the ordered node list. `nodes[i]` owns slot
    /// i of every stripe: data on 0..D, P on D, Q on D+1.
    pub fn new(config: StripeManagerConfig, nodes: Vec<Arc<dyn BlockStore>>) -> Result<Self> {
        let expected = config.data_fragments + PARITY_FRAGMENTS;
        if nodes.len() != expected {
            return Err(Error::InvalidConfig(format!(
                "expected {} nodes, got {}",
                expected,
                nodes.len()
            )));
        }

        let encoder = StripeEncoder::new(config.data_fragments)?;
        let reconstructor = StripeReconstructor::with_config(
            config.data_fragments,
            ReconstructorConfig {
                verify_intact: config.verify_intact,
            },
        )?;

        Ok(Self {
            config,
            encoder,
            reconstructor,
            nodes,
        })
    }

    /// Current configuration.
    pub fn config(&self) -> &StripeManagerConfig {
        &self.config
    }

    // =========================================================================
    // Store
    // =========================================================================

    /// Stripe `payload` across the nodes as fragments of `block_size`
    /// bytes, replacing any previously stored session.
    ///
    /// # Arguments
    /// * `payload` - The bytes to store
    /// * `filename` - Name restored on recovery
    /// * `block_size` - Fragment length L
    #[instrument(skip(self, payload), fields(size = payload.len(), filename))]
    pub async fn store(
        &self,
        payload: &[u8],
        filename: &str,
        block_size: usize,
    ) -> Result<StoreReport> {
        let start = std::time::Instant::now();
        let d = self.config.data_fragments;

        let metadata = FileMetadata::new(
            filename,
            payload.len() as u64,
            block_size as u64,
            d,
        )?;

        info!(
            "storing {} ({} bytes) as {} stripes of {}x{} bytes",
            filename,
            payload.len(),
            metadata.total_stripes,
            d,
            block_size
        );

        // Replicate metadata to every node; one accepted copy is enough
        // for a later recovery to proceed
        let metadata_json = metadata.to_json()?;
        let outcomes = join_all(
            self.nodes
                .iter()
                .map(|node| node.put(METADATA_BLOB, metadata_json.clone())),
        )
        .await;

        let mut node_errors = Vec::new();
        for (index, outcome) in outcomes.into_iter().enumerate() {
            if let Err(e) = outcome {
                warn!("metadata write to node {} failed: {}", index, e);
                node_errors.push(format!("node {}: {}", index, e));
            }
        }
        let metadata_replicas = self.nodes.len() - node_errors.len();
        if metadata_replicas == 0 {
            return Err(Error::Internal(
                "metadata rejected by every node".to_string(),
            ));
        }

        let mut fragments_written = 0;
        for stripe_index in 0..metadata.total_stripes {
            let data = self.slice_stripe(payload, stripe_index, block_size);
            let stripe = self.encoder.encode_stripe(data)?;

            fragments_written += self.write_stripe(stripe_index, &stripe).await?;
            debug!("stored stripe {}", stripe_index);
        }

        Ok(StoreReport {
            filename: filename.to_string(),
            payload_size: payload.len() as u64,
            block_size: block_size as u64,
            total_stripes: metadata.total_stripes,
            fragments_written,
            metadata_replicas,
            node_errors,
            completed_at: Utc::now(),
            duration: start.elapsed(),
        })
    }

    /// Cut stripe `stripe_index` out of the payload as D fragments,
    /// zero-padding past the payload tail.
    fn slice_stripe(&self, payload: &[u8], stripe_index: u64, block_size: usize) -> Vec<Fragment> {
        let d = self.config.data_fragments;
        let stripe_start = stripe_index as usize * d * block_size;

        (0..d)
            .map(|slot| {
                let start = stripe_start + slot * block_size;
                let end = (start + block_size).min(payload.len());

                let mut fragment = vec![0u8; block_size];
                if start < payload.len() {
                    fragment[..end - start].copy_from_slice(&payload[start..end]);
                }
                Bytes::from(fragment)
            })
            .collect()
    }

    /// Write all D+2 fragments of one stripe to their owning nodes.
    /// Any rejected write aborts the store.
    async fn write_stripe(&self, stripe_index: u64, stripe: &Stripe) -> Result<usize> {
        let d = self.config.data_fragments;

        let mut writes = Vec::with_capacity(self.nodes.len());
        for (slot, node) in self.nodes.iter().enumerate() {
            let name = blob_name_for_slot(stripe_index, slot, d);
            let fragment = stripe.slot(slot).as_bytes().cloned().ok_or_else(|| {
                Error::Internal("encoded stripe has a missing slot".to_string())
            })?;
            writes.push(async move { node.put(&name, fragment).await });
        }

        for outcome in join_all(writes).await {
            outcome?;
        }
        Ok(self.nodes.len())
    }

    // =========================================================================
    // Recover
    // =========================================================================

    /// Recover the stored payload from the surviving fragments.
    ///
    /// Stripes with more than two missing fragments are zero-filled and
    /// reported; recovery continues with the rest.
    #[instrument(skip(self))]
    pub async fn recover(&self) -> Result<Recovery> {
        let start = std::time::Instant::now();

        // Probe every node once and reuse the answer for the whole run
        let online: Vec<bool> =
            join_all(self.nodes.iter().map(|node| node.is_online())).await;
        let online_nodes: Vec<usize> = online
            .iter()
            .enumerate()
            .filter(|(_, up)| **up)
            .map(|(i, _)| i)
            .collect();
        info!("online nodes: {:?}", online_nodes);

        let (metadata, metadata_source) = self.fetch_metadata(&online).await?;
        let block_size = metadata.block_size as usize;
        info!(
            "recovering {} ({} bytes, {} stripes) with metadata from node {}",
            metadata.original_filename,
            metadata.original_size,
            metadata.total_stripes,
            metadata_source
        );

        let mut report = RecoveryReport {
            online_nodes,
            metadata_source,
            reconstructed_stripes: Vec::new(),
            unrecoverable_stripes: Vec::new(),
            stripe_errors: Vec::new(),
            corrupted_fragments: Vec::new(),
            fragments_written_back: 0,
            completed_at: Utc::now(),
            duration: Duration::ZERO,
        };

        let mut payload = Vec::with_capacity(metadata.original_size as usize);
        for stripe_index in 0..metadata.total_stripes {
            let stripe = self
                .fetch_stripe(stripe_index, block_size, &online, &mut report)
                .await?;
            let missing = stripe.missing_indices();

            let restored = match self.reconstructor.reconstruct(&stripe, stripe_index) {
                Ok(restored) => {
                    if !missing.is_empty() {
                        report.reconstructed_stripes.push(stripe_index);
                        if self.config.writeback {
                            report.fragments_written_back += self
                                .write_back(stripe_index, &restored, &missing, &online)
                                .await;
                        }
                    }
                    restored
                }
                Err(e) => {
                    warn!("stripe {} failed: {}", stripe_index, e);
                    report.unrecoverable_stripes.push(stripe_index);
                    report.stripe_errors.push(e.to_string());
                    self.reconstructor.zero_stripe(block_size)?
                }
            };

            for fragment in restored.data()? {
                payload.extend_from_slice(&fragment);
            }
        }

        payload.truncate(metadata.original_size as usize);

        report.completed_at = Utc::now();
        report.duration = start.elapsed();

        Ok(Recovery {
            payload,
            metadata,
            report,
        })
    }

    /// Read the metadata blob from the first online node holding a
    /// parseable copy.
    async fn fetch_metadata(&self, online: &[bool]) -> Result<(FileMetadata, usize)> {
        for (index, node) in self.nodes.iter().enumerate() {
            if !online[index] {
                continue;
            }
            match node.get(METADATA_BLOB).await {
                Ok(Some(blob)) => match FileMetadata::from_json(&blob) {
                    Ok(metadata) => {
                        debug!("metadata retrieved from node {}", index);
                        return Ok((metadata, index));
                    }
                    Err(e) => warn!("node {} returned bad metadata: {}", index, e),
                },
                Ok(None) => warn!("node {} has no metadata blob", index),
                Err(e) => warn!("metadata read from node {} failed: {}", index, e),
            }
        }
        Err(Error::MetadataUnavailable)
    }

    /// Fetch the D+2 fragments of one stripe, demoting transport errors
    /// and length mismatches to missing slots.
    async fn fetch_stripe(
        &self,
        stripe_index: u64,
        block_size: usize,
        online: &[bool],
        report: &mut RecoveryReport,
    ) -> Result<Stripe> {
        let d = self.config.data_fragments;

        let fetches = self.nodes.iter().enumerate().map(|(slot, node)| {
            let name = blob_name_for_slot(stripe_index, slot, d);
            let up = online[slot];
            async move {
                if !up {
                    return (slot, name, Ok(None));
                }
                let outcome = node.get(&name).await;
                (slot, name, outcome)
            }
        });

        let mut slots = Vec::with_capacity(self.nodes.len());
        for (slot, name, outcome) in join_all(fetches).await {
            let fragment_slot = match outcome {
                Ok(Some(blob)) if blob.len() == block_size => FragmentSlot::Present(blob),
                Ok(Some(blob)) => {
                    let corruption = Error::CorruptedFragment {
                        node_index: slot,
                        name: name.clone(),
                        reason: format!("length {}, expected {}", blob.len(), block_size),
                    };
                    warn!("demoting to missing: {}", corruption);
                    report.corrupted_fragments.push(name);
                    FragmentSlot::Missing
                }
                Ok(None) => FragmentSlot::Missing,
                Err(e) => {
                    debug!("fetch of {} from node {} failed: {}", name, slot, e);
                    FragmentSlot::Missing
                }
            };
            slots.push(fragment_slot);
        }

        Stripe::from_slots(d, block_size, slots)
    }

    /// Advisory writeback of reconstructed fragments to online nodes
    /// that were missing them.
    async fn write_back(
        &self,
        stripe_index: u64,
        restored: &Stripe,
        missing: &[usize],
        online: &[bool],
    ) -> usize {
        let d = self.config.data_fragments;
        let mut written = 0;

        for &slot in missing {
            if !online[slot] {
                continue;
            }
            let name = blob_name_for_slot(stripe_index, slot, d);
            let fragment = match restored.slot(slot).as_bytes() {
                Some(fragment) => fragment.clone(),
                None => continue,
            };
            match self.nodes[slot].put(&name, fragment).await {
                Ok(()) => {
                    debug!("wrote back {} to node {}", name, slot);
                    written += 1;
                }
                Err(e) => warn!("writeback of {} to node {} failed: {}", name, slot, e),
            }
        }

        written
    }

    // =========================================================================
    // Purge
    // =========================================================================

    /// Delete the stored session: every stripe blob plus the metadata
    /// replicas. Best effort; returns the number of blobs deleted.
    #[instrument(skip(self))]
    pub async fn purge(&self) -> Result<u64> {
        let online: Vec<bool> =
            join_all(self.nodes.iter().map(|node| node.is_online())).await;
        let (metadata, _) = self.fetch_metadata(&online).await?;

        let d = self.config.data_fragments;
        let mut deleted = 0u64;

        for stripe_index in 0..metadata.total_stripes {
            for (slot, node) in self.nodes.iter().enumerate() {
                let name = blob_name_for_slot(stripe_index, slot, d);
                match node.delete(&name).await {
                    Ok(()) => deleted += 1,
                    Err(e) => debug!("delete of {} on node {} failed: {}", name, slot, e),
                }
            }
        }

        for (slot, node) in self.nodes.iter().enumerate() {
            match node.delete(METADATA_BLOB).await {
                Ok(()) => deleted += 1,
                Err(e) => debug!("metadata delete on node {} failed: {}", slot, e),
            }
        }

        info!("purged {} blobs", deleted);
        Ok(deleted)
    }
}

// =============================================================================
// Tests
// =============================================================================
