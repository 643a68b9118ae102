//! Trait for remote payment verification and settlement.
//!
//! A facilitator is a service trusted to verify payment proofs and execute
//! settlement. The middleware talks to it through this trait, so tests and
//! local scheme handlers can stand in for the real HTTP client.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use crate::proto::{SettleRequest, SettleResponse, VerifyRequest, VerifyResponse};

/// Asynchronous verify/settle interface to a payment authority.
///
/// Both operations are bounded network round-trips for remote implementations.
/// Callers must treat a failed `verify` as a rejection (fail closed) and a
/// failed `settle` as fatal to the gated request.
pub trait Facilitator {
    /// The error type returned by this facilitator.
    type Error: Debug + Display;

    /// Checks a payment proof against the option it claims to satisfy.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] when the facilitator cannot be consulted or
    /// responds malformed. This is never a pass.
    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send;

    /// Finalizes a previously verified payment.
    ///
    /// The facilitator is the source of truth for idempotence; callers must
    /// not retry a failed settle without explicit consent, since retried
    /// settlement requests are not guaranteed idempotent at the transport
    /// level.
    ///
    /// # Errors
    ///
    /// Returns [`Self::Error`] when settlement cannot be confirmed.
    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send;
}

impl<T: Facilitator> Facilitator for Arc<T> {
    type Error = T::Error;

    fn verify(
        &self,
        request: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, Self::Error>> + Send {
        self.as_ref().verify(request)
    }

    fn settle(
        &self,
        request: &SettleRequest,
    ) -> impl Future<Output = Result<SettleResponse, Self::Error>> + Send {
        self.as_ref().settle(request)
    }
}
