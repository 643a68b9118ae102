//! Axum middleware that gates routes behind payment proofs.
//!
//! This crate provides the [`Tollgate`] layer for enforcing payment on a
//! router, and a [`FacilitatorClient`] for talking to a remote verification
//! and settlement service.
//!
//! ## Quickstart
//!
//! ```rust,no_run
//! use axum::{Json, Router, routing::get};
//! use http::Method;
//! use serde_json::json;
//! use tollgate_axum::{FacilitatorClient, Tollgate};
//! use tollgate_types::proto::PaymentOption;
//! use tollgate_types::routes::{RouteRule, RouteTable};
//! use tollgate_types::scheme::{FacilitatorScheme, SchemeKey, SchemeRegistry};
//! use tollgate_types::util::MoneyAmount;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let facilitator = FacilitatorClient::try_from("https://facilitator.example.com")?;
//!
//! let routes = RouteTable::new().and_route(
//!     RouteRule::new(Method::GET, "/weather")?
//!         .accept(PaymentOption::new(
//!             "exact",
//!             "eip155:84532",
//!             MoneyAmount::parse("$0.001")?,
//!             "0xseller",
//!         ))
//!         .with_description("Weather data for any city"),
//! )?;
//! let schemes = SchemeRegistry::new().and_register(
//!     SchemeKey::new("exact", "eip155:84532"),
//!     FacilitatorScheme::new(facilitator),
//! )?;
//!
//! let app: Router = Router::new()
//!     .route("/weather", get(|| async { Json(json!({ "weather": "sunny" })) }))
//!     .layer(Tollgate::new(routes, schemes));
//! # Ok(())
//! # }
//! ```
//!
//! The layer fronts the whole router: routes with a matching rule in the
//! [`RouteTable`](tollgate_types::routes::RouteTable) require a valid payment
//! proof, all others pass through untouched. See [`gate`] for the exact
//! request lifecycle and [`FacilitatorClient`] for facilitator transport
//! configuration.

pub mod facilitator_client;
pub mod gate;
pub mod layer;

pub use facilitator_client::{FacilitatorClient, FacilitatorClientError};
pub use gate::{GateError, VerificationError};
pub use layer::{Tollgate, TollgateService};
