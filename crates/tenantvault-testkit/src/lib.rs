//! # TenantVault Testkit
//!
//! Testing utilities for TenantVault.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Fixtures**: A fully wired vault over a memory store with a fixed
//!   signing secret, plus helpers to sign principals up and act as them
//! - **Generators**: Proptest strategies for claims, items and payloads
//! - **Tracing**: [`init_tracing`] routes `tracing` output to the test writer
//!
//! ## Test Fixtures
//!
//! ```rust,no_run
//! use tenantvault_testkit::TestFixture;
//!
//! async fn example() {
//!     let fixture = TestFixture::new();
//!     let alice = fixture.signup("alice", "pw").await;
//!     let caller = fixture.caller(&alice).await;
//!     assert_eq!(caller.username.as_deref(), Some("alice"));
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use tenantvault_testkit::generators::claim_set;
//!
//! proptest! {
//!     #[test]
//!     fn claims_roundtrip_through_text(claims in claim_set()) {
//!         let text = claims.to_string();
//!         prop_assert_eq!(ClaimSet::parse(Some(&text)), claims);
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;

pub use fixtures::{init_tracing, SignedUp, TestFixture, TEST_API_ARN, TEST_SECRET, TEST_TABLE};
pub use generators::{action, claim, claim_set, item, payload};
