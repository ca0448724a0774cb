//! Stripe and Fragment Types
//!
//! A stripe is an ordered group of D data fragment slots followed by the
//! P and Q parity slots. Each slot is either present (an immutable byte
//! payload of the stripe's fragment length) or missing.

use crate::codec::PARITY_FRAGMENTS;
use crate::error::{Error, Result};
use bytes::Bytes;

/// An immutable fragment payload.
pub type Fragment = Bytes;

// =============================================================================
// Fragment Slot
// =============================================================================

/// One slot of a stripe: a fragment that is either available or lost.
///
/// A fragment that failed validation (wrong length, transport error) is
/// represented as `Missing`; the codec does not distinguish lost from
/// corrupted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FragmentSlot {
    /// The fragment is available and trusted.
    Present(Fragment),
    /// The fragment is unavailable or was detected as corrupted.
    Missing,
}

impl FragmentSlot {
    /// Returns true if the slot holds a fragment.
    pub fn is_present(&self) -> bool {
        matches!(self, FragmentSlot::Present(_))
    }

    /// Returns true if the slot is missing.
    pub fn is_missing(&self) -> bool {
        matches!(self, FragmentSlot::Missing)
    }

    /// Borrow the fragment payload, if present.
    pub fn as_bytes(&self) -> Option<&Fragment> {
        match self {
            FragmentSlot::Present(bytes) => Some(bytes),
            FragmentSlot::Missing => None,
        }
    }
}

impl From<Option<Fragment>> for FragmentSlot {
    fn from(value: Option<Fragment>) -> Self {
        match value {
            Some(bytes) => FragmentSlot::Present(bytes),
            None => FragmentSlot::Missing,
        }
    }
}

// =============================================================================
// Stripe
// =============================================================================

/// One stripe: D data slots followed by P (index D) and Q (index D+1).
///
/// All present fragments share the stripe's fragment length; construction
/// rejects slots that disagree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stripe {
    slots: Vec<FragmentSlot>,
    data_fragments: usize,
    fragment_len: usize,
}

impl Stripe {
    /// Build a stripe from its D+2 slots.
    ///
    /// # Arguments
    /// * `data_fragments` - Number of data slots (D)
    /// * `fragment_len` - Fragment length L all present slots must match
    /// * `slots` - The D+2 slots in order: data 0..D, then P, then Q
    pub fn from_slots(
        data_fragments: usize,
        fragment_len: usize,
        slots: Vec<FragmentSlot>,
    ) -> Result<Self> {
        let expected = data_fragments + PARITY_FRAGMENTS;
        if slots.len() != expected {
            return Err(Error::InvalidConfig(format!(
                "expected {} fragment slots, got {}",
                expected,
                slots.len()
            )));
        }

        for slot in &slots {
            if let FragmentSlot::Present(bytes) = slot {
                if bytes.len() != fragment_len {
                    return Err(Error::LengthMismatch {
                        expected: fragment_len,
                        actual: bytes.len(),
                    });
                }
            }
        }

        Ok(Self {
            slots,
            data_fragments,
            fragment_len,
        })
    }

    /// Build a fully present stripe from data fragments plus P and Q.
    pub fn from_parts(data: Vec<Fragment>, p: Fragment, q: Fragment) -> Result<Self> {
        let data_fragments = data.len();
        let fragment_len = p.len();

        let mut slots: Vec<FragmentSlot> =
            data.into_iter().map(FragmentSlot::Present).collect();
        slots.push(FragmentSlot::Present(p));
        slots.push(FragmentSlot::Present(q));

        Self::from_slots(data_fragments, fragment_len, slots)
    }

    /// Number of data slots (D).
    pub fn data_fragments(&self) -> usize {
        self.data_fragments
    }

    /// Total slot count (D+2).
    pub fn total_fragments(&self) -> usize {
        self.slots.len()
    }

    /// Fragment length L.
    pub fn fragment_len(&self) -> usize {
        self.fragment_len
    }

    /// Slot index of the P parity fragment.
    pub fn p_index(&self) -> usize {
        self.data_fragments
    }

    /// Slot index of the Q parity fragment.
    pub fn q_index(&self) -> usize {
        self.data_fragments + 1
    }

    /// Borrow a slot by index.
    pub fn slot(&self, index: usize) -> &FragmentSlot {
        &self.slots[index]
    }

    /// All slots in order.
    pub fn slots(&self) -> &[FragmentSlot] {
        &self.slots
    }

    /// Borrow the P parity slot.
    pub fn p(&self) -> &FragmentSlot {
        &self.slots[self.p_index()]
    }

    /// Borrow the Q parity slot.
    pub fn q(&self) -> &FragmentSlot {
        &self.slots[self.q_index()]
    }

    /// Indices of missing slots, in order.
    pub fn missing_indices(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_missing())
            .map(|(i, _)| i)
            .collect()
    }

    /// Number of missing slots.
    pub fn missing_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_missing()).count()
    }

    /// The data fragments in slot order. Fails if any data slot is missing.
    pub fn data(&self) -> Result<Vec<Fragment>> {
        self.slots[..self.data_fragments]
            .iter()
            .map(|slot| {
                slot.as_bytes().cloned().ok_or_else(|| {
                    Error::Internal("data fragment missing from populated stripe".to_string())
                })
            })
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
