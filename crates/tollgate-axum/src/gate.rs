//! The per-request payment gate.
//!
//! [`Gate`] drives one request through the payment state machine:
//!
//! - no matching route rule: the request passes through untouched;
//! - matched, no or bad proof: HTTP 402 enumerating the rule's options;
//! - matched, proof verifies: the protected handler runs exactly once, then
//!   the payment is settled and a receipt is attached to the response in the
//!   `X-Payment-Response` header;
//! - handler responds with an error status: settlement is skipped — no
//!   charge for work that failed;
//! - settlement fails after a successful handler run: the caller receives a
//!   server error instead of the handler's output. A response is never
//!   delivered as paid unless settlement is confirmed.
//!
//! Settlement is ordered strictly after the handler has produced its
//! response, never speculatively in parallel with it.

use axum_core::body::Body;
use axum_core::response::{IntoResponse, Response};
use http::{HeaderValue, StatusCode};
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;

use tollgate_types::proto::{
    PAYMENT_HEADER, PaymentProof, PaymentRequired, RECEIPT_HEADER, SettleResponse, VerifyResponse,
};
use tollgate_types::routes::{RouteRule, RouteTable};
use tollgate_types::scheme::{RegistryError, SchemeKey, SchemeRegistry};
use tollgate_types::util::Base64Bytes;

#[cfg(feature = "telemetry")]
use tracing::{Instrument, instrument};

/// Reasons a request is rejected before the protected handler runs.
///
/// All of these convert to a 402 response listing the matched rule's
/// payment options; none of them is a server fault.
#[derive(Debug, thiserror::Error)]
pub enum VerificationError {
    #[error("{0} header is required")]
    PaymentHeaderRequired(&'static str),
    #[error("Invalid or malformed payment header")]
    InvalidPaymentHeader,
    #[error("No payment option matches the supplied proof")]
    NoPaymentMatching,
    #[error("No handler registered for {0}")]
    UnknownScheme(SchemeKey),
    #[error("Verification failed: {0}")]
    VerificationFailed(String),
}

/// Gate error type wrapping verification and settlement failures.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Verification(#[from] VerificationError),
    #[error("Settlement failed: {0}")]
    Settlement(String),
}

/// One request's trip through the payment gate.
pub struct Gate {
    /// Frozen price/route table.
    pub routes: Arc<RouteTable>,
    /// Frozen scheme handler registry.
    pub schemes: Arc<SchemeRegistry>,
}

impl Gate {
    /// Calls the inner service with telemetry instrumentation when enabled.
    async fn call_inner<
        ReqBody,
        ResBody,
        S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    >(
        mut inner: S,
        req: http::Request<ReqBody>,
    ) -> Result<http::Response<ResBody>, S::Error>
    where
        S::Future: Send,
    {
        #[cfg(feature = "telemetry")]
        {
            inner
                .call(req)
                .instrument(tracing::info_span!("inner"))
                .await
        }
        #[cfg(not(feature = "telemetry"))]
        {
            inner.call(req).await
        }
    }

    /// Handles an incoming request, enforcing payment when a rule matches.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "tollgate.handle_request", skip_all)
    )]
    pub async fn handle_request<
        ReqBody,
        ResBody,
        S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    >(
        self,
        inner: S,
        req: http::Request<ReqBody>,
    ) -> Result<Response, Infallible>
    where
        S::Response: IntoResponse,
        S::Error: IntoResponse,
        S::Future: Send,
    {
        let rule = match self.routes.route(req.method(), req.uri().path()) {
            // Unmatched routes are free: pass through untouched.
            None => {
                return Ok(match Self::call_inner(inner, req).await {
                    Ok(response) => response.into_response(),
                    Err(err) => err.into_response(),
                });
            }
            Some(rule) => rule,
        };

        match self.gate_request(rule, inner, req).await {
            Ok(response) => Ok(response),
            Err(err) => Ok(error_into_response(err, rule)),
        }
    }

    /// Fallible path for a matched rule: verify, run the handler, settle.
    async fn gate_request<
        ReqBody,
        ResBody,
        S: Service<http::Request<ReqBody>, Response = http::Response<ResBody>>,
    >(
        &self,
        rule: &RouteRule,
        inner: S,
        req: http::Request<ReqBody>,
    ) -> Result<Response, GateError>
    where
        S::Response: IntoResponse,
        S::Error: IntoResponse,
        S::Future: Send,
    {
        let header = req
            .headers()
            .get(PAYMENT_HEADER)
            .ok_or(VerificationError::PaymentHeaderRequired(PAYMENT_HEADER))?;
        let proof: PaymentProof = Base64Bytes::from(header.as_bytes())
            .decode_json()
            .ok_or(VerificationError::InvalidPaymentHeader)?;
        let key = proof.key();

        // First option declaring the proof's (scheme, network) wins;
        // declaration order is authoritative, price never participates.
        let option = rule
            .accepts
            .iter()
            .find(|option| option.key() == key)
            .ok_or(VerificationError::NoPaymentMatching)?;

        let handler = self.schemes.lookup(&key).map_err(|err| match err {
            RegistryError::UnknownScheme(key) => VerificationError::UnknownScheme(key),
            RegistryError::DuplicateScheme(key) => VerificationError::UnknownScheme(key),
        })?;

        let verdict = handler
            .verify(&proof, option)
            .await
            .map_err(|err| VerificationError::VerificationFailed(err.to_string()))?;
        if let VerifyResponse::Invalid { reason, .. } = verdict {
            return Err(VerificationError::VerificationFailed(reason).into());
        }

        // Authorized: the protected handler runs exactly once, knowing
        // nothing about payment internals.
        let response = match Self::call_inner(inner, req).await {
            Ok(response) => response.into_response(),
            Err(err) => return Ok(err.into_response()),
        };

        // A failed handler run is never charged.
        if response.status().is_client_error() || response.status().is_server_error() {
            return Ok(response);
        }

        let settled = handler
            .settle(&proof, option)
            .await
            .map_err(|err| GateError::Settlement(err.to_string()))?;
        let receipt_header = receipt_to_header(&settled)?;

        let mut response = response;
        response.headers_mut().insert(RECEIPT_HEADER, receipt_header);
        Ok(response)
    }
}

/// Converts a gate error into the response the caller sees.
///
/// Verification failures become 402 with the rule's options enumerated, so
/// the caller learns what is acceptable without retry guesswork. Settlement
/// failures become 500: the handler already ran, but its output must not be
/// delivered as paid.
fn error_into_response(err: GateError, rule: &RouteRule) -> Response {
    match err {
        GateError::Verification(err) => {
            let payment_required = PaymentRequired {
                accepts: rule.terms(),
                error: Some(err.to_string()),
            };
            let body = serde_json::to_vec(&payment_required).expect("serialization failed");
            Response::builder()
                .status(StatusCode::PAYMENT_REQUIRED)
                .header("Content-Type", "application/json")
                .body(Body::from(body))
                .expect("Fail to construct response")
        }
        GateError::Settlement(err) => {
            let body = json!({
                "error": "Settlement failed",
                "details": err,
            })
            .to_string();
            Response::builder()
                .status(StatusCode::INTERNAL_SERVER_ERROR)
                .header("Content-Type", "application/json")
                .body(Body::from(body))
                .expect("Fail to construct response")
        }
    }
}

/// Encodes a settlement result into the receipt header value.
///
/// A reported settlement failure is fatal to the request.
fn receipt_to_header(settled: &SettleResponse) -> Result<HeaderValue, GateError> {
    if let SettleResponse::Failed { reason, .. } = settled {
        return Err(GateError::Settlement(reason.clone()));
    }
    let json = serde_json::to_vec(settled).map_err(|err| GateError::Settlement(err.to_string()))?;
    HeaderValue::from_bytes(Base64Bytes::encode(json).as_ref())
        .map_err(|err| GateError::Settlement(err.to_string()))
}
