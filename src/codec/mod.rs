// Allow dead code for library-style API methods not yet used by the binary
#![allow(dead_code)]

//! Striping Codec
//!
//! RAID-6 style erasure coding for groups of D data fragments protected
//! by two parity fragments, P and Q.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                       Striping Codec                          │
//! ├──────────────────────────────────────────────────────────────┤
//! │                                                               │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐  │
//! │  │   Stripe     │   │   Stripe     │   │     Stripe       │  │
//! │  │   Types      │──▶│   Encoder    │──▶│  Reconstructor   │  │
//! │  └──────────────┘   └──────────────┘   └──────────────────┘  │
//! │                            │                    │             │
//! │                            └────────┬───────────┘             │
//! │                                     ▼                         │
//! │                          ┌────────────────────┐               │
//! │                          │  GF(2^8) kernel    │               │
//! │                          └────────────────────┘               │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - **Stripe Types** (`stripe.rs`): fragment slots (present or missing)
//!   and the stripe layout of D data slots followed by P and Q.
//!
//! - **Encoder** (`encoder.rs`): computes P as the XOR of the data
//!   fragments and Q as the Reed-Solomon sum weighted by powers of the
//!   field generator.
//!
//! - **Reconstructor** (`reconstruction.rs`): restores up to two missing
//!   fragments per stripe, any mix of data and parity, or reports the
//!   stripe unrecoverable.
//!
//! The codec is synchronous and pure: it performs no I/O, holds no shared
//! mutable state, and every branch is position-local per byte.

pub mod encoder;
pub mod reconstruction;
pub mod stripe;

#[cfg(test)]
mod proptest;

pub use encoder::StripeEncoder;
pub use reconstruction::{ReconstructorConfig, StripeReconstructor};
pub use stripe::{Fragment, FragmentSlot, Stripe};

/// Number of parity fragments per stripe. RAID-6 carries exactly P and Q.
pub const PARITY_FRAGMENTS: usize = 2;
