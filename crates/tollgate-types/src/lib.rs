//! Core types for the tollgate payment middleware.
//!
//! This crate provides the foundational pieces for gating HTTP routes behind
//! payments. It is scheme-agnostic: the actual proof formats, signature
//! algorithms, and settlement rails live behind the [`scheme::SchemeHandler`]
//! and [`scheme::ProofSigner`] traits, registered per (scheme, network) pair.
//!
//! # Overview
//!
//! A gated server advertises one or more [`proto::PaymentOption`]s per route.
//! A client that hits a gated route without a proof receives an HTTP 402
//! response whose body is a [`proto::PaymentRequired`] listing the acceptable
//! options. The client constructs an opaque [`proto::PaymentProof`] for one of
//! them and retries; the server verifies the proof, runs the protected
//! handler, settles the payment, and attaches a [`proto::SettlementReceipt`]
//! to the response.
//!
//! # Modules
//!
//! - [`facilitator`] - Trait for remote payment verification and settlement
//! - [`proto`] - Wire format types for proofs, offers, and receipts
//! - [`routes`] - Route patterns and the price/route table
//! - [`scheme`] - Scheme handler and signer registries
//! - [`util`] - Helper types (base64 header transport, money amounts)

pub mod facilitator;
pub mod proto;
pub mod routes;
pub mod scheme;
pub mod util;
