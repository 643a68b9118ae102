//! Client-side payment handling for reqwest.
//!
//! [`PaymentsClient`] is a reqwest middleware that reacts to
//! `402 Payment Required` responses: it reads the advertised payment options,
//! picks the first one a registered signer can satisfy, constructs a proof,
//! and retries the request once with the proof attached. Exactly one retry is
//! attempted per request; a second 402 is handed back to the caller as-is.

use http::{Extensions, HeaderMap, HeaderValue, StatusCode};
use reqwest::{Request, Response};
use reqwest_middleware as rqm;

use tollgate_types::proto::{
    PAYMENT_HEADER, PaymentRequired, PaymentTerms, RECEIPT_HEADER, SettleResponse,
};
use tollgate_types::scheme::{ProofSigner, RegistryError, SchemeKey, SignerRegistry, SigningError};
use tollgate_types::util::Base64Bytes;

#[cfg(feature = "telemetry")]
use tracing::{debug, info, instrument, trace};

/// Client-side payment failures.
///
/// A 402 the client cannot act on at all (no usable signer) is not an error:
/// the middleware hands the server's original 402 back to the caller instead.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    /// The 402 response body is not a readable payment requirement.
    #[error("cannot parse 402 response: {0}")]
    ParseError(String),
    /// A signer was selected but failed to construct a proof.
    #[error(transparent)]
    Signing(#[from] SigningError),
    /// The request body is a stream and cannot be replayed for the retry.
    #[error("request is not cloneable, cannot retry with payment")]
    RequestNotCloneable,
}

/// Chooses which advertised payment option to pay.
///
/// The default is [`FirstUsable`]. A custom selector can prefer a network or
/// cap prices, but it only ever picks among what the server offered.
pub trait OptionSelector: Send + Sync {
    /// Picks one of `offered`, or `None` when nothing is payable.
    fn select<'a>(
        &self,
        offered: &'a [PaymentTerms],
        signers: &SignerRegistry,
    ) -> Option<&'a PaymentTerms>;
}

/// Default selector: the first offered option with a registered signer.
///
/// The server's declaration order is authoritative; price is not consulted.
#[derive(Debug, Clone, Copy, Default)]
pub struct FirstUsable;

impl OptionSelector for FirstUsable {
    fn select<'a>(
        &self,
        offered: &'a [PaymentTerms],
        signers: &SignerRegistry,
    ) -> Option<&'a PaymentTerms> {
        offered.iter().find(|terms| signers.contains(&terms.key()))
    }
}

/// Reqwest middleware that pays for 402-gated resources automatically.
///
/// ## Creating a PaymentsClient
///
/// ```rust,no_run
/// use tollgate_reqwest::PaymentsClient;
///
/// let client = PaymentsClient::new();
/// ```
///
/// ## Registering Signers
///
/// A [`ProofSigner`] is registered per (scheme, network) pair it can pay on:
///
/// ```rust,ignore
/// use tollgate_reqwest::PaymentsClient;
/// use tollgate_types::scheme::SchemeKey;
///
/// let client = PaymentsClient::new()
///     .register(SchemeKey::new("exact", "eip155:84532"), my_signer)?;
/// ```
///
/// ## Using with Reqwest
///
/// See the [`WithPayments`](crate::WithPayments) trait for integrating with
/// reqwest.
pub struct PaymentsClient<TSelector = FirstUsable> {
    signers: SignerRegistry,
    selector: TSelector,
}

impl PaymentsClient<FirstUsable> {
    /// Creates a client with no signers and [`FirstUsable`] selection.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for PaymentsClient<FirstUsable> {
    fn default() -> Self {
        Self {
            signers: SignerRegistry::new(),
            selector: FirstUsable,
        }
    }
}

impl<TSelector> PaymentsClient<TSelector> {
    /// Registers `signer` for the (scheme, network) pair it can pay on.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateScheme`] if the pair is taken.
    pub fn register<S: ProofSigner + 'static>(
        mut self,
        key: SchemeKey,
        signer: S,
    ) -> Result<Self, RegistryError> {
        self.signers.register(key, signer)?;
        Ok(self)
    }

    /// Replaces the option selector.
    pub fn with_selector<P: OptionSelector>(self, selector: P) -> PaymentsClient<P> {
        PaymentsClient {
            signers: self.signers,
            selector,
        }
    }

    pub fn signers(&self) -> &SignerRegistry {
        &self.signers
    }
}

impl<TSelector> PaymentsClient<TSelector>
where
    TSelector: OptionSelector,
{
    /// Builds the payment proof header for a parsed 402.
    ///
    /// Returns `Ok(None)` when no offered option has a registered signer;
    /// the caller should then surface the server's 402 untouched.
    ///
    /// # Errors
    ///
    /// Returns [`PaymentError::Signing`] when the selected signer fails, and
    /// [`PaymentError::ParseError`] when the proof cannot be encoded.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "tollgate.reqwest.make_payment_header", skip_all, err)
    )]
    pub async fn make_payment_header(
        &self,
        payment_required: &PaymentRequired,
    ) -> Result<Option<HeaderValue>, PaymentError> {
        let selected = match self
            .selector
            .select(&payment_required.accepts, &self.signers)
        {
            Some(terms) => terms,
            None => return Ok(None),
        };
        let signer = match self.signers.signer(&selected.key()) {
            Some(signer) => signer,
            // The selector picked something no signer covers.
            None => return Ok(None),
        };

        #[cfg(feature = "telemetry")]
        debug!(
            scheme = %selected.scheme,
            network = %selected.network,
            price = %selected.price,
            "Selected payment option"
        );

        let proof = signer.sign(selected).await?;
        let json =
            serde_json::to_vec(&proof).map_err(|err| PaymentError::ParseError(err.to_string()))?;
        let header = HeaderValue::from_bytes(Base64Bytes::encode(json).as_ref())
            .map_err(|err| PaymentError::ParseError(err.to_string()))?;
        Ok(Some(header))
    }
}

#[async_trait::async_trait]
impl<TSelector> rqm::Middleware for PaymentsClient<TSelector>
where
    TSelector: OptionSelector + Send + Sync + 'static,
{
    /// Sends a request, paying once if the server answers 402.
    ///
    /// On a 402 this middleware:
    /// 1. Parses the advertised payment options from the response body
    /// 2. Signs a proof with the first usable registered signer
    /// 3. Retries the request once with the proof header attached
    ///
    /// When no registered signer can pay any offered option, the original
    /// 402 is returned so the caller sees exactly what the server said.
    #[cfg_attr(
        feature = "telemetry",
        instrument(name = "tollgate.reqwest.handle", skip_all, err)
    )]
    async fn handle(
        &self,
        req: Request,
        extensions: &mut Extensions,
        next: rqm::Next<'_>,
    ) -> rqm::Result<Response> {
        let retry_req = req.try_clone();
        let res = next.clone().run(req, extensions).await?;

        if res.status() != StatusCode::PAYMENT_REQUIRED {
            #[cfg(feature = "telemetry")]
            trace!(status = ?res.status(), "No payment required, returning response");
            return Ok(res);
        }

        #[cfg(feature = "telemetry")]
        info!(url = ?res.url(), "Received 402 Payment Required, processing payment");

        // Reading the body consumes the response; keep enough to rebuild it.
        let status = res.status();
        let headers = res.headers().clone();
        let body = res.bytes().await.map_err(rqm::Error::Reqwest)?;

        let payment_required: PaymentRequired = serde_json::from_slice(&body).map_err(|err| {
            rqm::Error::Middleware(PaymentError::ParseError(err.to_string()).into())
        })?;

        let header = self
            .make_payment_header(&payment_required)
            .await
            .map_err(|err| rqm::Error::Middleware(err.into()))?;
        let header = match header {
            Some(header) => header,
            None => {
                #[cfg(feature = "telemetry")]
                debug!("No usable payment option, returning the 402 untouched");
                return Ok(rebuild_response(status, headers, body));
            }
        };

        let mut retry = retry_req.ok_or(rqm::Error::Middleware(
            PaymentError::RequestNotCloneable.into(),
        ))?;
        retry.headers_mut().insert(PAYMENT_HEADER, header);

        #[cfg(feature = "telemetry")]
        trace!(url = ?retry.url(), "Retrying request with payment header");

        // Single retry: if the server still answers 402, that is the result.
        next.run(retry, extensions).await
    }
}

/// Extracts and decodes the settlement receipt from a paid response, if any.
pub fn settlement_receipt(response: &Response) -> Option<SettleResponse> {
    let header = response.headers().get(RECEIPT_HEADER)?;
    Base64Bytes::from(header.as_bytes()).decode_json()
}

/// Reassembles a consumed 402 response for the caller.
fn rebuild_response<B: Into<reqwest::Body>>(
    status: StatusCode,
    headers: HeaderMap,
    body: B,
) -> Response {
    let mut response = http::Response::new(body.into());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Response::from(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{WithPayments, WithPaymentsBuild};
    use tollgate_types::proto::{PaymentProof, SettlementReceipt};
    use tollgate_types::util::MoneyAmount;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const NET1: &str = "eip155:84532";
    const NET2: &str = "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1";

    struct TokenSigner {
        token: &'static str,
    }

    #[async_trait::async_trait]
    impl ProofSigner for TokenSigner {
        async fn sign(&self, terms: &PaymentTerms) -> Result<PaymentProof, SigningError> {
            PaymentProof::new(
                terms.scheme.clone(),
                terms.network.clone(),
                serde_json::json!({ "token": self.token }),
            )
            .map_err(|err| SigningError(err.to_string()))
        }
    }

    struct BrokenSigner;

    #[async_trait::async_trait]
    impl ProofSigner for BrokenSigner {
        async fn sign(&self, _terms: &PaymentTerms) -> Result<PaymentProof, SigningError> {
            Err(SigningError("key unavailable".into()))
        }
    }

    fn terms(network: &str, pay_to: &str) -> PaymentTerms {
        PaymentTerms {
            scheme: "exact".into(),
            network: network.into(),
            price: MoneyAmount::parse("0.001").unwrap(),
            pay_to: pay_to.into(),
            description: "Weather data for any city".into(),
            mime_type: "application/json".into(),
        }
    }

    fn payment_required() -> PaymentRequired {
        PaymentRequired {
            accepts: vec![terms(NET1, "P1"), terms(NET2, "P2")],
            error: None,
        }
    }

    async fn gated_server() -> MockServer {
        let server = MockServer::start().await;
        let receipt = SettleResponse::Settled(SettlementReceipt {
            network: NET2.into(),
            payer: "0xbuyer".into(),
            pay_to: "P2".into(),
            amount: MoneyAmount::parse("0.001").unwrap(),
            reference: "0xtx".into(),
        });
        let receipt_header =
            Base64Bytes::encode(serde_json::to_vec(&receipt).unwrap()).to_string();
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(header_exists(PAYMENT_HEADER))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(RECEIPT_HEADER, receipt_header.as_str())
                    .set_body_json(serde_json::json!({ "weather": "sunny" })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(402).set_body_json(&payment_required()))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn pays_with_the_first_usable_option() {
        let server = gated_server().await;
        // Only the second offered option has a signer.
        let client = reqwest::Client::new()
            .with_payments(
                PaymentsClient::new()
                    .register(SchemeKey::new("exact", NET2), TokenSigner { token: "tk" })
                    .unwrap(),
            )
            .build();

        let response = client
            .get(format!("{}/weather", server.uri()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests[0].headers.get(PAYMENT_HEADER).is_none());
        let proof: PaymentProof =
            Base64Bytes::from(requests[1].headers[PAYMENT_HEADER].as_bytes())
                .decode_json()
                .unwrap();
        assert_eq!(proof.network, NET2);
        assert_eq!(proof.scheme, "exact");
    }

    #[tokio::test]
    async fn surfaces_the_receipt_of_a_paid_response() {
        let server = gated_server().await;
        let client = reqwest::Client::new()
            .with_payments(
                PaymentsClient::new()
                    .register(SchemeKey::new("exact", NET2), TokenSigner { token: "tk" })
                    .unwrap(),
            )
            .build();

        let response = client
            .get(format!("{}/weather", server.uri()))
            .send()
            .await
            .unwrap();
        let settled = settlement_receipt(&response).unwrap();
        let receipt = settled.receipt().unwrap();
        assert_eq!(receipt.network, NET2);
        assert_eq!(receipt.pay_to, "P2");
        assert_eq!(receipt.reference, "0xtx");
    }

    #[tokio::test]
    async fn no_usable_signer_returns_the_original_402() {
        let server = gated_server().await;
        let client = reqwest::Client::new()
            .with_payments(PaymentsClient::new())
            .build();

        let response = client
            .get(format!("{}/weather", server.uri()))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);

        // The caller sees exactly what the server advertised.
        let body: PaymentRequired = response.json().await.unwrap();
        assert_eq!(body.accepts.len(), 2);
        assert_eq!(body.accepts[0].network, NET1);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[tokio::test]
    async fn pays_at_most_once_per_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .respond_with(ResponseTemplate::new(402).set_body_json(&payment_required()))
            .mount(&server)
            .await;
        let client = reqwest::Client::new()
            .with_payments(
                PaymentsClient::new()
                    .register(SchemeKey::new("exact", NET1), TokenSigner { token: "tk" })
                    .unwrap(),
            )
            .build();

        let response = client
            .get(format!("{}/weather", server.uri()))
            .send()
            .await
            .unwrap();
        // The second 402 comes back as-is: one payment attempt, no loop.
        assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 2);
    }

    #[tokio::test]
    async fn signer_failure_is_an_error_not_a_silent_402() {
        let server = gated_server().await;
        let client = reqwest::Client::new()
            .with_payments(
                PaymentsClient::new()
                    .register(SchemeKey::new("exact", NET1), BrokenSigner)
                    .unwrap(),
            )
            .build();

        let result = client
            .get(format!("{}/weather", server.uri()))
            .send()
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn selection_follows_server_declaration_order() {
        let signers = {
            let mut registry = SignerRegistry::new();
            registry
                .register(SchemeKey::new("exact", NET1), TokenSigner { token: "a" })
                .unwrap();
            registry
                .register(SchemeKey::new("exact", NET2), TokenSigner { token: "b" })
                .unwrap();
            registry
        };
        let offered = payment_required().accepts;
        let selected = FirstUsable.select(&offered, &signers).unwrap();
        assert_eq!(selected.network, NET1);
    }
}
