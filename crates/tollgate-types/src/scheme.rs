//! Scheme handler and signer registries.
//!
//! A payment scheme is a named proof format plus the logic to verify and
//! settle proofs of that format on a particular network. Schemes are
//! registered per (scheme, network) pair at startup; the registries are frozen
//! after construction and shared across requests behind an `Arc` without
//! locking.
//!
//! The server side registers [`SchemeHandler`]s; the client side registers
//! [`ProofSigner`]s. [`FacilitatorScheme`] is the stock handler that delegates
//! both verification and settlement to a remote facilitator.

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;

use crate::facilitator::Facilitator;
use crate::proto::{
    PaymentOption, PaymentProof, PaymentTerms, SettleResponse, VerifyRequest, VerifyResponse,
};

/// Identifies a scheme implementation: a (scheme, network) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemeKey {
    /// The scheme name (e.g. "exact").
    pub scheme: String,
    /// The network identifier (e.g. "eip155:84532").
    pub network: String,
}

impl SchemeKey {
    pub fn new<S: Into<String>, N: Into<String>>(scheme: S, network: N) -> Self {
        Self {
            scheme: scheme.into(),
            network: network.into(),
        }
    }
}

impl Display for SchemeKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on {}", self.scheme, self.network)
    }
}

/// Registration and lookup errors for the scheme registries.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The (scheme, network) pair is already registered. Fatal at startup.
    #[error("duplicate scheme registration: {0}")]
    DuplicateScheme(SchemeKey),
    /// No handler is registered for the (scheme, network) pair.
    #[error("unknown scheme: {0}")]
    UnknownScheme(SchemeKey),
}

/// Failure inside a scheme handler.
///
/// Verification rejections are not errors; they are expressed as
/// [`VerifyResponse::Invalid`]. This type covers handler-level failures:
/// a settlement that cannot be confirmed, or broken handler plumbing.
#[derive(Debug, thiserror::Error)]
pub enum SchemeError {
    /// Settlement could not be confirmed. Fatal to the gated request.
    #[error("settlement failed: {0}")]
    Settlement(String),
    /// The handler itself failed.
    #[error("scheme handler failure: {0}")]
    Handler(String),
}

/// Server-side scheme implementation: verifies and settles proofs.
///
/// One handler is registered per (scheme, network) pair. The proof payload is
/// opaque to the gate; only the handler understands its structure.
#[async_trait::async_trait]
pub trait SchemeHandler: Send + Sync {
    /// Checks whether `proof` satisfies `option`.
    ///
    /// Returns [`VerifyResponse::Invalid`] for a readable-but-unacceptable
    /// proof; reserves `Err` for handler failures. Implementations that reach
    /// over the network must fail closed: a transport failure is a rejection,
    /// never an implicit pass.
    async fn verify(
        &self,
        proof: &PaymentProof,
        option: &PaymentOption,
    ) -> Result<VerifyResponse, SchemeError>;

    /// Finalizes a previously verified payment.
    ///
    /// Called at most once per gated request, strictly after the protected
    /// handler has produced a successful response. Implementations must not
    /// silently retry: repeated settlement requests are not guaranteed
    /// idempotent at the transport level.
    async fn settle(
        &self,
        proof: &PaymentProof,
        option: &PaymentOption,
    ) -> Result<SettleResponse, SchemeError>;
}

/// Frozen map of (scheme, network) to server-side handlers.
///
/// Built once at startup, then shared read-only. Construct explicitly and pass
/// to the middleware; there is no ambient global registry, so independent
/// middleware instances never interfere.
#[derive(Default)]
pub struct SchemeRegistry(HashMap<SchemeKey, Box<dyn SchemeHandler>>);

impl Debug for SchemeRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.0.keys().map(|k| k.to_string()).collect();
        f.debug_tuple("SchemeRegistry").field(&keys).finish()
    }
}

impl SchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateScheme`] if the pair is taken.
    pub fn register<H: SchemeHandler + 'static>(
        &mut self,
        key: SchemeKey,
        handler: H,
    ) -> Result<(), RegistryError> {
        if self.0.contains_key(&key) {
            return Err(RegistryError::DuplicateScheme(key));
        }
        self.0.insert(key, Box::new(handler));
        Ok(())
    }

    /// Chaining variant of [`SchemeRegistry::register`].
    pub fn and_register<H: SchemeHandler + 'static>(
        mut self,
        key: SchemeKey,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.register(key, handler)?;
        Ok(self)
    }

    /// Looks up the handler for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownScheme`] if nothing is registered.
    pub fn lookup(&self, key: &SchemeKey) -> Result<&dyn SchemeHandler, RegistryError> {
        self.0
            .get(key)
            .map(|h| h.deref())
            .ok_or_else(|| RegistryError::UnknownScheme(key.clone()))
    }
}

/// Failure while constructing a payment proof on the client side.
#[derive(Debug, thiserror::Error)]
#[error("proof signing failed: {0}")]
pub struct SigningError(pub String);

/// Client-side scheme implementation: constructs proofs for offered terms.
#[async_trait::async_trait]
pub trait ProofSigner: Send + Sync {
    /// Constructs a [`PaymentProof`] satisfying the advertised `terms`.
    async fn sign(&self, terms: &PaymentTerms) -> Result<PaymentProof, SigningError>;
}

/// Frozen map of (scheme, network) to client-side signers.
///
/// The client-side mirror of [`SchemeRegistry`]: built at startup, read-only
/// afterwards.
#[derive(Default, Clone)]
pub struct SignerRegistry(HashMap<SchemeKey, Arc<dyn ProofSigner>>);

impl Debug for SignerRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let keys: Vec<String> = self.0.keys().map(|k| k.to_string()).collect();
        f.debug_tuple("SignerRegistry").field(&keys).finish()
    }
}

impl SignerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `signer` for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateScheme`] if the pair is taken.
    pub fn register<S: ProofSigner + 'static>(
        &mut self,
        key: SchemeKey,
        signer: S,
    ) -> Result<(), RegistryError> {
        if self.0.contains_key(&key) {
            return Err(RegistryError::DuplicateScheme(key));
        }
        self.0.insert(key, Arc::new(signer));
        Ok(())
    }

    /// Returns the signer for `key`, if one is registered.
    pub fn signer(&self, key: &SchemeKey) -> Option<&Arc<dyn ProofSigner>> {
        self.0.get(key)
    }

    /// Whether a signer is registered for `key`.
    pub fn contains(&self, key: &SchemeKey) -> bool {
        self.0.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A [`SchemeHandler`] that delegates verification and settlement to a remote
/// facilitator.
///
/// This is the stock handler for schemes whose trust anchor is a facilitator
/// service rather than local logic. Verification fails closed: any transport
/// or decoding failure is reported as an invalid proof, never as a pass.
/// Settlement failures surface as [`SchemeError::Settlement`], which the gate
/// treats as fatal to the request.
#[derive(Debug, Clone)]
pub struct FacilitatorScheme<F> {
    facilitator: F,
}

impl<F> FacilitatorScheme<F> {
    pub fn new(facilitator: F) -> Self {
        Self { facilitator }
    }

    pub fn facilitator(&self) -> &F {
        &self.facilitator
    }
}

#[async_trait::async_trait]
impl<F> SchemeHandler for FacilitatorScheme<F>
where
    F: Facilitator + Send + Sync,
{
    async fn verify(
        &self,
        proof: &PaymentProof,
        option: &PaymentOption,
    ) -> Result<VerifyResponse, SchemeError> {
        let request = VerifyRequest {
            payment_proof: proof.clone(),
            payment_option: option.clone(),
        };
        match self.facilitator.verify(&request).await {
            Ok(response) => Ok(response),
            // Fail closed: an unreachable facilitator is a rejection.
            Err(err) => {
                tracing::warn!(scheme = %proof.key(), error = %err, "facilitator verify failed");
                Ok(VerifyResponse::invalid(
                    None,
                    format!("facilitator verify failed: {err}"),
                ))
            }
        }
    }

    async fn settle(
        &self,
        proof: &PaymentProof,
        option: &PaymentOption,
    ) -> Result<SettleResponse, SchemeError> {
        let request = VerifyRequest {
            payment_proof: proof.clone(),
            payment_option: option.clone(),
        };
        self.facilitator
            .settle(&request)
            .await
            .map_err(|err| SchemeError::Settlement(err.to_string()))
    }
}
