//! Reqwest middleware for paying `402 Payment Required` responses.
//!
//! This crate provides a [`PaymentsClient`] that plugs into `reqwest` as
//! middleware. When a request comes back 402, the middleware reads the
//! server's advertised payment options, signs a proof with the first option a
//! registered [`ProofSigner`](tollgate_types::scheme::ProofSigner) can
//! satisfy, and retries the request once with the proof attached. A 402 the
//! client cannot pay is returned to the caller untouched.
//!
//! ## Quickstart
//!
//! ```rust,ignore
//! use reqwest::Client;
//! use tollgate_reqwest::{PaymentsClient, WithPayments, WithPaymentsBuild};
//! use tollgate_types::scheme::SchemeKey;
//!
//! // Register a signer per (scheme, network) pair you can pay on
//! let payments = PaymentsClient::new()
//!     .register(SchemeKey::new("exact", "eip155:84532"), my_signer)?;
//!
//! // Build a reqwest client with payment middleware
//! let client = Client::new().with_payments(payments).build();
//!
//! // Use the client - payments happen automatically
//! let response = client
//!     .get("https://api.example.com/protected")
//!     .send()
//!     .await?;
//!
//! // The settlement receipt, when the server attached one
//! let receipt = tollgate_reqwest::settlement_receipt(&response);
//! ```
//!
//! ## Option Selection
//!
//! When a 402 offers several options, the [`OptionSelector`] decides which
//! one to pay. The default [`FirstUsable`] takes the first offered option
//! with a registered signer, honoring the server's declaration order. See
//! [`PaymentsClient::with_selector`] for custom selection.

mod builder;
mod client;

pub use builder::*;
pub use client::*;
