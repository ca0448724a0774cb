//! Stripe Encoder
//!
//! Computes the P and Q parity fragments for a group of D data fragments
//! of equal length L. For each byte position j:
//!
//! ```text
//! P[j] = data[0][j] XOR data[1][j] XOR ... XOR data[D-1][j]
//! Q[j] = mul(c_0, data[0][j]) XOR ... XOR mul(c_{D-1}, data[D-1][j])
//! ```
//!
//! where `c_i = 2^i` in GF(2^8). The powers of the generator are distinct
//! non-zero field elements for D <= 255, which is what makes the
//! two-missing-fragment system solvable for every pair of slots.

use crate::codec::stripe::{Fragment, Stripe};
use crate::codec::PARITY_FRAGMENTS;
use crate::error::{Error, Result};
use crate::gf;
use bytes::Bytes;
use tracing::{debug, instrument};

// =============================================================================
// Stripe Encoder
// =============================================================================

/// Erasure coding encoder producing P and Q parity fragments.
#[derive(Debug)]
pub struct StripeEncoder {
    /// Number of data fragments per stripe (D)
    data_fragments: usize,
    /// Q coefficient per data slot: `c_i = 2^i` over GF(2^8)
    q_coefficients: Vec<u8>,
}

impl StripeEncoder {
    /// Create a new encoder for stripes of `data_fragments` data slots.
    ///
    /// # Arguments
    /// * `data_fragments` - Number of data fragments (D), 1..=255
    pub fn new(data_fragments: usize) -> Result<Self> {
        if data_fragments == 0 {
            return Err(Error::InvalidConfig(
                "data_fragments must be greater than 0".to_string(),
            ));
        }
        // Past 255 slots the generator powers wrap and coefficients repeat
        if data_fragments > 255 {
            return Err(Error::InvalidConfig(format!(
                "data_fragments must be at most 255, got {}",
                data_fragments
            )));
        }

        let q_coefficients = (0..data_fragments)
            .map(|i| gf::pow(gf::GENERATOR, i as u32))
            .collect();

        Ok(Self {
            data_fragments,
            q_coefficients,
        })
    }

    /// Number of data fragments (D).
    pub fn data_fragments(&self) -> usize {
        self.data_fragments
    }

    /// Total fragments per stripe (D+2).
    pub fn total_fragments(&self) -> usize {
        self.data_fragments + PARITY_FRAGMENTS
    }

    /// Q coefficient assigned to data slot `index`.
    pub fn q_coefficient(&self, index: usize) -> u8 {
        self.q_coefficients[index]
    }

    /// Compute the (P, Q) parity pair for `data`.
    ///
    /// All fragments must share one length; the parities come back at the
    /// same length.
    #[instrument(skip(self, data), fields(fragments = data.len()))]
    pub fn encode(&self, data: &[Fragment]) -> Result<(Fragment, Fragment)> {
        if data.len() != self.data_fragments {
            return Err(Error::InvalidConfig(format!(
                "expected {} data fragments, got {}",
                self.data_fragments,
                data.len()
            )));
        }

        let fragment_len = data[0].len();
        for fragment in data {
            if fragment.len() != fragment_len {
                return Err(Error::LengthMismatch {
                    expected: fragment_len,
                    actual: fragment.len(),
                });
            }
        }

        let mut p = vec![0u8; fragment_len];
        let mut q = vec![0u8; fragment_len];

        for (i, fragment) in data.iter().enumerate() {
            let coefficient = self.q_coefficients[i];
            for j in 0..fragment_len {
                let byte = fragment[j];
                p[j] ^= byte;
                q[j] ^= gf::mul(coefficient, byte);
            }
        }

        debug!(
            "encoded {} fragments of {} bytes into P and Q",
            data.len(),
            fragment_len
        );

        Ok((Bytes::from(p), Bytes::from(q)))
    }

    /// Encode `data` into a fully populated stripe.
    pub fn encode_stripe(&self, data: Vec<Fragment>) -> Result<Stripe> {
        let (p, q) = self.encode(&data)?;
        Stripe::from_parts(data, p, q)
    }

    /// Verify that a fully present stripe's parities match its data.
    ///
    /// # Returns
    /// true if both P and Q agree with the recomputed parities
    pub fn verify(&self, stripe: &Stripe) -> Result<bool> {
        if stripe.missing_count() != 0 {
            return Err(Error::InvalidConfig(
                "cannot verify a stripe with missing fragments".to_string(),
            ));
        }

        let data = stripe.data()?;
        let (p, q) = self.encode(&data)?;

        Ok(stripe.p().as_bytes() == Some(&p) && stripe.q().as_bytes() == Some(&q))
    }
}

// =============================================================================
// Tests
// =============================================================================
