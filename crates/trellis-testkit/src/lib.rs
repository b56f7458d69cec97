//! # Trellis Testkit
//!
//! Testing utilities for Trellis.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: seeded participants and a [`fixtures::TestChain`]
//!   helper that threads the previous transaction hash through appended
//!   events
//! - **Generators**: proptest strategies for property-based testing
//!
//! ## Test Fixtures
//!
//! Quickly set up a chain:
//!
//! ```rust
//! use trellis_testkit::fixtures::{alice, bob, TestChain};
//! use trellis_core::MemberAuthorization;
//!
//! let a = alice();
//! let b = bob();
//! let mut chain = TestChain::new(&[&a]);
//! chain.add_member(&[&a], b.public_key(), MemberAuthorization::member(true, false));
//! let state = chain.resolve().unwrap();
//! assert_eq!(state.members.len(), 2);
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{alice, bob, carol, resolve_with_lockbox_keys, Participant, TestChain};
