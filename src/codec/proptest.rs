//! Property-Based Tests for the Striping Codec
//!
//! Uses proptest to systematically verify encoder/reconstructor
//! correctness across fragment counts, fragment lengths and erasure
//! patterns.
//!
//! # Test Properties
//!
//! 1. **Roundtrip Correctness**: encoding then reconstructing an intact
//!    stripe returns it unchanged
//! 2. **Fault Tolerance**: any erasure pattern of at most two slots is
//!    recovered byte-identically
//! 3. **Failure Mode**: three or more erasures are reported unrecoverable
//! 4. **Field Laws**: GF(2^8) behaves as a field on random operands

#![cfg(test)]

use proptest::prelude::*;

use super::encoder::StripeEncoder;
use super::reconstruction::StripeReconstructor;
use super::stripe::{Fragment, FragmentSlot, Stripe};
use crate::gf;
use bytes::Bytes;

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for the data fragment count D: small enough for fast cases,
/// wide enough to exercise distinct Q coefficients.
fn geometry_strategy() -> impl Strategy<Value = usize> {
    2usize..=8
}

/// Strategy for generating one stripe's worth of data fragments.
fn stripe_data_strategy() -> impl Strategy<Value = Vec<Vec<u8>>> {
    (geometry_strategy(), 1usize..=64).prop_flat_map(|(d, len)| {
        prop::collection::vec(prop::collection::vec(any::<u8>(), len..=len), d..=d)
    })
}

fn to_fragments(rows: Vec<Vec<u8>>) -> Vec<Fragment> {
    rows.into_iter().map(Bytes::from).collect()
}

fn erase(stripe: &Stripe, indices: &[usize]) -> Stripe {
    let slots: Vec<FragmentSlot> = stripe
        .slots()
        .iter()
        .enumerate()
        .map(|(i, slot)| {
            if indices.contains(&i) {
                FragmentSlot::Missing
            } else {
                slot.clone()
            }
        })
        .collect();
    Stripe::from_slots(stripe.data_fragments(), stripe.fragment_len(), slots).unwrap()
}

// =============================================================================
// Roundtrip Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: an intact encoded stripe reconstructs to itself.
    #[test]
    fn prop_intact_roundtrip(rows in stripe_data_strategy()) {
        let d = rows.len();
        let encoder = StripeEncoder::new(d)?;
        let reconstructor = StripeReconstructor::new(d)?;

        let stripe = encoder.encode_stripe(to_fragments(rows))?;
        let restored = reconstructor.reconstruct(&stripe, 0)?;

        prop_assert_eq!(restored, stripe);
    }

    /// Property: every erasure pattern of at most two slots recovers the
    /// original stripe byte-identically.
    #[test]
    fn prop_all_double_erasures_recover(rows in stripe_data_strategy()) {
        let d = rows.len();
        let encoder = StripeEncoder::new(d)?;
        let reconstructor = StripeReconstructor::new(d)?;

        let stripe = encoder.encode_stripe(to_fragments(rows))?;
        let total = stripe.total_fragments();

        for first in 0..total {
            let restored = reconstructor.reconstruct(&erase(&stripe, &[first]), 0)?;
            prop_assert_eq!(&restored, &stripe, "single erasure {} failed", first);

            for second in (first + 1)..total {
                let degraded = erase(&stripe, &[first, second]);
                let restored = reconstructor.reconstruct(&degraded, 0)?;
                prop_assert_eq!(
                    &restored, &stripe,
                    "double erasure {}+{} failed", first, second
                );
            }
        }
    }

    /// Property: parity fragments match their defining equations.
    #[test]
    fn prop_parity_equations(rows in stripe_data_strategy()) {
        let d = rows.len();
        let encoder = StripeEncoder::new(d)?;
        let fragments = to_fragments(rows);

        let (p, q) = encoder.encode(&fragments)?;

        for j in 0..p.len() {
            let mut expected_p = 0u8;
            let mut expected_q = 0u8;
            for (i, fragment) in fragments.iter().enumerate() {
                expected_p ^= fragment[j];
                expected_q ^= gf::mul(gf::pow(gf::GENERATOR, i as u32), fragment[j]);
            }
            prop_assert_eq!(p[j], expected_p);
            prop_assert_eq!(q[j], expected_q);
        }
    }
}

// =============================================================================
// Failure Mode Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: three erasures are unrecoverable.
    #[test]
    fn prop_triple_erasure_fails(
        rows in stripe_data_strategy(),
        seed in any::<u64>(),
    ) {
        let d = rows.len();
        let encoder = StripeEncoder::new(d)?;
        let reconstructor = StripeReconstructor::new(d)?;

        let stripe = encoder.encode_stripe(to_fragments(rows))?;
        let total = stripe.total_fragments();

        // Pick three distinct slots from the seed
        let a = (seed % total as u64) as usize;
        let b = (a + 1) % total;
        let c = (a + 2) % total;

        let degraded = erase(&stripe, &[a, b, c]);
        prop_assert!(reconstructor.reconstruct(&degraded, 0).is_err());
    }
}

// =============================================================================
// Field Law Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: multiplication is associative and distributes over
    /// addition for random triples.
    #[test]
    fn prop_field_laws(a in any::<u8>(), b in any::<u8>(), c in any::<u8>()) {
        prop_assert_eq!(gf::mul(gf::mul(a, b), c), gf::mul(a, gf::mul(b, c)));
        prop_assert_eq!(
            gf::mul(a, gf::add(b, c)),
            gf::add(gf::mul(a, b), gf::mul(a, c))
        );
    }

    /// Property: division inverts multiplication for non-zero divisors.
    #[test]
    fn prop_div_inverts_mul(a in any::<u8>(), b in 1u8..=255) {
        let product = gf::mul(a, b);
        prop_assert_eq!(gf::div(product, b).unwrap(), a);
    }
}
