//! Stripe Reconstructor
//!
//! Restores stripes with up to two missing fragments (any mix of data
//! and parity slots) using the P and Q parities. Three or more missing
//! fragments are unrecoverable.
//!
//! All recovery branches are position-local: byte j of a reconstructed
//! fragment depends only on byte j of the surviving fragments. The
//! reconstructor never mutates its input; it returns a new, fully
//! populated stripe.

use crate::codec::encoder::StripeEncoder;
use crate::codec::stripe::{Fragment, FragmentSlot, Stripe};
use crate::error::{Error, Result};
use crate::gf;
use bytes::Bytes;
use tracing::{debug, instrument, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the stripe reconstructor
#[derive(Debug, Clone, Default)]
pub struct ReconstructorConfig {
    /// Verify P and Q of fully present stripes against their data.
    ///
    /// Off by default: intact stripes are trusted as-is. When enabled, a
    /// parity mismatch surfaces as `Error::Inconsistent`.
    pub verify_intact: bool,
}

// =============================================================================
// Stripe Reconstructor
// =============================================================================

/// Recovers missing fragments from a stripe's survivors.
#[derive(Debug)]
pub struct StripeReconstructor {
    encoder: StripeEncoder,
    config: ReconstructorConfig,
}

impl StripeReconstructor {
    /// Create a reconstructor for stripes of `data_fragments` data slots.
    pub fn new(data_fragments: usize) -> Result<Self> {
        Self::with_config(data_fragments, ReconstructorConfig::default())
    }

    /// Create a reconstructor with explicit configuration.
    pub fn with_config(data_fragments: usize, config: ReconstructorConfig) -> Result<Self> {
        Ok(Self {
            encoder: StripeEncoder::new(data_fragments)?,
            config,
        })
    }

    /// Number of data fragments (D).
    pub fn data_fragments(&self) -> usize {
        self.encoder.data_fragments()
    }

    /// Restore all missing fragments of `stripe`.
    ///
    /// # Arguments
    /// * `stripe` - The stripe with 0, 1 or 2 missing slots
    /// * `stripe_index` - Index used in diagnostics and errors
    ///
    /// # Returns
    /// A fully populated stripe consistent with the parity equations, or
    /// `Unrecoverable` when three or more slots are missing.
    #[instrument(skip(self, stripe), fields(stripe = stripe_index))]
    pub fn reconstruct(&self, stripe: &Stripe, stripe_index: u64) -> Result<Stripe> {
        if stripe.data_fragments() != self.data_fragments() {
            return Err(Error::InvalidConfig(format!(
                "expected {} data fragments, got {}",
                self.data_fragments(),
                stripe.data_fragments()
            )));
        }

        let missing = stripe.missing_indices();

        match missing.len() {
            0 => self.handle_intact(stripe, stripe_index),
            1 => self.handle_single_loss(stripe, stripe_index, missing[0]),
            2 => self.handle_double_loss(stripe, stripe_index, missing[0], missing[1]),
            count => {
                warn!(
                    "stripe {} has {} missing fragments, cannot recover",
                    stripe_index, count
                );
                Err(Error::Unrecoverable {
                    stripe_index,
                    missing: count,
                    total: stripe.total_fragments(),
                })
            }
        }
    }

    /// All D+2 fragments of an unrecoverable stripe as zero fragments.
    ///
    /// Callers substitute these for the data of stripes that failed with
    /// `Unrecoverable` and surface the error alongside.
    pub fn zero_stripe(&self, fragment_len: usize) -> Result<Stripe> {
        let zero = Bytes::from(vec![0u8; fragment_len]);
        let data = vec![zero.clone(); self.data_fragments()];
        Stripe::from_parts(data, zero.clone(), zero)
    }

    // =========================================================================
    // Recovery Branches
    // =========================================================================

    /// m = 0: trust the stripe, optionally verifying parity consistency.
    fn handle_intact(&self, stripe: &Stripe, stripe_index: u64) -> Result<Stripe> {
        if self.config.verify_intact && !self.encoder.verify(stripe)? {
            return Err(Error::Inconsistent { stripe_index });
        }
        Ok(stripe.clone())
    }

    /// m = 1: a single missing fragment.
    fn handle_single_loss(
        &self,
        stripe: &Stripe,
        stripe_index: u64,
        lost: usize,
    ) -> Result<Stripe> {
        debug!("stripe {}: recovering single fragment {}", stripe_index, lost);

        if lost >= stripe.p_index() {
            // A parity slot: recompute it from the intact data, keeping
            // the surviving parity as stored
            return self.assemble(
                present_data(stripe),
                stripe.p().as_bytes().cloned(),
                stripe.q().as_bytes().cloned(),
            );
        }

        // A data slot: XOR of P and the surviving data fragments
        let recovered = self.recover_data_via_p(stripe, lost)?;
        let mut data = present_data(stripe);
        data[lost] = Some(recovered);

        self.assemble(
            data,
            stripe.p().as_bytes().cloned(),
            stripe.q().as_bytes().cloned(),
        )
    }

    /// m = 2: two missing fragments, four shapes.
    fn handle_double_loss(
        &self,
        stripe: &Stripe,
        stripe_index: u64,
        first: usize,
        second: usize,
    ) -> Result<Stripe> {
        debug!(
            "stripe {}: recovering fragments {} and {}",
            stripe_index, first, second
        );

        let p_index = stripe.p_index();
        let q_index = stripe.q_index();

        if first == p_index && second == q_index {
            // Both parities lost: the data is intact, re-encode
            return self.assemble(present_data(stripe), None, None);
        }

        if second == q_index {
            // One data fragment plus Q: recover the data through P, then
            // recompute Q
            let recovered = self.recover_data_via_p(stripe, first)?;
            let mut data = present_data(stripe);
            data[first] = Some(recovered);
            return self.assemble(data, stripe.p().as_bytes().cloned(), None);
        }

        if second == p_index {
            // One data fragment plus P: recover the data through Q, then
            // recompute P
            let recovered = self.recover_data_via_q(stripe, stripe_index, first)?;
            let mut data = present_data(stripe);
            data[first] = Some(recovered);
            return self.assemble(data, None, stripe.q().as_bytes().cloned());
        }

        // Two data fragments: solve the 2x2 system per byte position
        let (d1, d2) = self.solve_two_data(stripe, stripe_index, first, second)?;
        let mut data = present_data(stripe);
        data[first] = Some(d1);
        data[second] = Some(d2);

        self.assemble(
            data,
            stripe.p().as_bytes().cloned(),
            stripe.q().as_bytes().cloned(),
        )
    }

    // =========================================================================
    // Per-Byte Solvers
    // =========================================================================

    /// Recover data slot `lost` as `P XOR (all other data fragments)`.
    /// Requires P and every other data slot present.
    fn recover_data_via_p(&self, stripe: &Stripe, lost: usize) -> Result<Fragment> {
        let p = expect_slot(stripe.p())?;
        let mut recovered = p.to_vec();

        for i in 0..stripe.data_fragments() {
            if i == lost {
                continue;
            }
            let fragment = expect_slot(stripe.slot(i))?;
            for j in 0..recovered.len() {
                recovered[j] ^= fragment[j];
            }
        }

        Ok(Bytes::from(recovered))
    }

    /// Recover data slot `lost` from the Q syndrome:
    /// `data[lost][j] = div(Q[j] XOR sum_of_others, c_lost)`.
    fn recover_data_via_q(
        &self,
        stripe: &Stripe,
        stripe_index: u64,
        lost: usize,
    ) -> Result<Fragment> {
        let q = expect_slot(stripe.q())?;
        let mut syndrome = q.to_vec();

        for i in 0..stripe.data_fragments() {
            if i == lost {
                continue;
            }
            let coefficient = self.encoder.q_coefficient(i);
            let fragment = expect_slot(stripe.slot(i))?;
            for j in 0..syndrome.len() {
                syndrome[j] ^= gf::mul(coefficient, fragment[j]);
            }
        }

        let coefficient = self.encoder.q_coefficient(lost);
        let mut recovered = vec![0u8; syndrome.len()];
        for j in 0..syndrome.len() {
            recovered[j] =
                gf::div(syndrome[j], coefficient).map_err(|_| Error::ArithmeticError {
                    stripe_index,
                    reason: format!("zero Q coefficient for slot {}", lost),
                })?;
        }

        Ok(Bytes::from(recovered))
    }

    /// Solve for two missing data fragments k1 < k2 with both parities
    /// present. Per byte position:
    ///
    /// ```text
    /// d1 XOR d2               = S_P
    /// mul(c1, d1) XOR mul(c2, d2) = S_Q
    /// => d1 = div(S_Q XOR mul(c2, S_P), c1 XOR c2)
    ///    d2 = d1 XOR S_P
    /// ```
    fn solve_two_data(
        &self,
        stripe: &Stripe,
        stripe_index: u64,
        k1: usize,
        k2: usize,
    ) -> Result<(Fragment, Fragment)> {
        let p = expect_slot(stripe.p())?;
        let q = expect_slot(stripe.q())?;

        let mut s_p = p.to_vec();
        let mut s_q = q.to_vec();

        for i in 0..stripe.data_fragments() {
            if i == k1 || i == k2 {
                continue;
            }
            let coefficient = self.encoder.q_coefficient(i);
            let fragment = expect_slot(stripe.slot(i))?;
            for j in 0..s_p.len() {
                s_p[j] ^= fragment[j];
                s_q[j] ^= gf::mul(coefficient, fragment[j]);
            }
        }

        let c1 = self.encoder.q_coefficient(k1);
        let c2 = self.encoder.q_coefficient(k2);
        // Distinct generator powers, so the denominator cannot vanish for
        // k1 != k2; a zero here means the coefficients were corrupted.
        let denominator = gf::add(c1, c2);

        let mut d1 = vec![0u8; s_p.len()];
        let mut d2 = vec![0u8; s_p.len()];
        for j in 0..s_p.len() {
            let numerator = s_q[j] ^ gf::mul(c2, s_p[j]);
            d1[j] = gf::div(numerator, denominator).map_err(|_| Error::ArithmeticError {
                stripe_index,
                reason: format!("singular system for data slots {} and {}", k1, k2),
            })?;
            d2[j] = d1[j] ^ s_p[j];
        }

        Ok((Bytes::from(d1), Bytes::from(d2)))
    }

    // =========================================================================
    // Assembly
    // =========================================================================

    /// Build the output stripe, recomputing whichever parities are absent.
    fn assemble(
        &self,
        data: Vec<Option<Fragment>>,
        p: Option<Fragment>,
        q: Option<Fragment>,
    ) -> Result<Stripe> {
        let data = data
            .into_iter()
            .collect::<Option<Vec<Fragment>>>()
            .ok_or_else(|| {
                Error::Internal("data slot missing after reconstruction".to_string())
            })?;

        let (p, q) = match (p, q) {
            (Some(p), Some(q)) => (p, q),
            (p, q) => {
                let (fresh_p, fresh_q) = self.encoder.encode(&data)?;
                (p.unwrap_or(fresh_p), q.unwrap_or(fresh_q))
            }
        };

        Stripe::from_parts(data, p, q)
    }
}

/// Data slots as options, in slot order.
fn present_data(stripe: &Stripe) -> Vec<Option<Fragment>> {
    (0..stripe.data_fragments())
        .map(|i| stripe.slot(i).as_bytes().cloned())
        .collect()
}

/// Borrow a slot that the current branch requires to be present.
fn expect_slot(slot: &FragmentSlot) -> Result<&Fragment> {
    slot.as_bytes()
        .ok_or_else(|| Error::Internal("required fragment slot is missing".to_string()))
}

// =============================================================================
// Tests
// =============================================================================
