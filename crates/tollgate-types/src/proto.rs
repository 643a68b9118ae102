//! Wire format types for the tollgate payment flow.
//!
//! All types serialize to JSON with camelCase field names. Proofs and receipts
//! travel base64-encoded in HTTP headers; the 402 body is plain JSON.
//!
//! # Key Types
//!
//! - [`PaymentProof`] - Opaque, scheme-defined proof sent by the buyer
//! - [`PaymentOption`] - One acceptable way to pay for a route
//! - [`PaymentTerms`] - A [`PaymentOption`] as advertised in a 402 response
//! - [`PaymentRequired`] - HTTP 402 response body
//! - [`VerifyRequest`] / [`VerifyResponse`] - Verification messages
//! - [`SettleRequest`] / [`SettleResponse`] - Settlement messages
//! - [`SettlementReceipt`] - Proof of completed settlement

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::scheme::SchemeKey;
use crate::util::MoneyAmount;

/// Request header carrying a base64-encoded [`PaymentProof`].
pub const PAYMENT_HEADER: &str = "X-Payment";

/// Response header carrying a base64-encoded [`SettleResponse`].
pub const RECEIPT_HEADER: &str = "X-Payment-Response";

/// An opaque payment proof supplied by the buyer.
///
/// The gate never inspects `payload`; it only reads the declared
/// (scheme, network) pair to select a matching option and handler. The
/// payload's structure is owned entirely by the scheme implementation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProof {
    /// The payment scheme this proof claims to satisfy (e.g. "exact").
    pub scheme: String,
    /// The network the scheme operates on (e.g. "eip155:84532").
    pub network: String,
    /// The scheme-defined proof blob, passed through untouched.
    pub payload: Box<serde_json::value::RawValue>,
}

impl PaymentProof {
    /// Builds a proof around an arbitrary JSON payload.
    pub fn new<S: Into<String>, N: Into<String>>(
        scheme: S,
        network: N,
        payload: serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        let payload = serde_json::value::RawValue::from_string(payload.to_string())?;
        Ok(Self {
            scheme: scheme.into(),
            network: network.into(),
            payload,
        })
    }

    /// The (scheme, network) pair this proof claims to satisfy.
    pub fn key(&self) -> SchemeKey {
        SchemeKey::new(&self.scheme, &self.network)
    }
}

/// One acceptable way to pay for a route.
///
/// Immutable once constructed. Within a single route rule, the
/// (scheme, network) pair must be unique.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOption {
    /// The payment scheme (e.g. "exact").
    pub scheme: String,
    /// The network identifier (e.g. "eip155:84532").
    pub network: String,
    /// The price in the stated currency unit.
    pub price: MoneyAmount,
    /// The destination address for payment.
    pub pay_to: String,
}

impl PaymentOption {
    pub fn new<S, N, P>(
        scheme: S,
        network: N,
        price: MoneyAmount,
        pay_to: P,
    ) -> Self
    where
        S: Into<String>,
        N: Into<String>,
        P: Into<String>,
    {
        Self {
            scheme: scheme.into(),
            network: network.into(),
            price,
            pay_to: pay_to.into(),
        }
    }

    /// The (scheme, network) pair identifying this option within a rule.
    pub fn key(&self) -> SchemeKey {
        SchemeKey::new(&self.scheme, &self.network)
    }
}

/// A payment option as advertised to buyers in a 402 response.
///
/// Combines the option itself with the route's resource description and MIME
/// type, so a buyer learns what is acceptable without retry guesswork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentTerms {
    /// The payment scheme (e.g. "exact").
    pub scheme: String,
    /// The network identifier.
    pub network: String,
    /// The price in the stated currency unit.
    pub price: MoneyAmount,
    /// The destination address for payment.
    pub pay_to: String,
    /// Human-readable description of the gated resource.
    pub description: String,
    /// MIME type of the gated resource.
    pub mime_type: String,
}

impl PaymentTerms {
    /// Advertises `option` with the given resource metadata.
    pub fn advertise(option: &PaymentOption, description: &str, mime_type: &str) -> Self {
        Self {
            scheme: option.scheme.clone(),
            network: option.network.clone(),
            price: option.price.clone(),
            pay_to: option.pay_to.clone(),
            description: description.to_string(),
            mime_type: mime_type.to_string(),
        }
    }

    /// The (scheme, network) pair of the underlying option.
    pub fn key(&self) -> SchemeKey {
        SchemeKey::new(&self.scheme, &self.network)
    }

    /// The underlying [`PaymentOption`], without resource metadata.
    pub fn option(&self) -> PaymentOption {
        PaymentOption {
            scheme: self.scheme.clone(),
            network: self.network.clone(),
            price: self.price.clone(),
            pay_to: self.pay_to.clone(),
        }
    }
}

/// HTTP 402 Payment Required response body.
///
/// Lists the matched route's acceptable payment options, optionally annotated
/// with the reason the current request was rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequired {
    /// Acceptable payment options, in the route's declaration order.
    #[serde(default)]
    pub accepts: Vec<PaymentTerms>,
    /// Optional human-readable rejection reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request to verify a payment proof against a selected option.
///
/// This is the body of the facilitator's `POST /verify` operation, and also
/// what local scheme handlers receive.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    /// The buyer's payment proof.
    pub payment_proof: PaymentProof,
    /// The option the proof was matched against.
    pub payment_option: PaymentOption,
}

/// Request to settle a verified payment.
///
/// Same shape as [`VerifyRequest`]: the proof that was previously verified,
/// plus the option it satisfies.
pub type SettleRequest = VerifyRequest;

/// Result of verifying a payment proof.
#[derive(Debug, Clone)]
pub enum VerifyResponse {
    /// The proof satisfies the option and passes all scheme checks.
    Valid {
        /// The paying address, as recovered by the scheme.
        payer: String,
    },
    /// The proof was readable but failed verification.
    Invalid {
        /// Why verification failed.
        reason: String,
        /// The paying address, when it could still be determined.
        payer: Option<String>,
    },
}

impl VerifyResponse {
    pub fn valid<P: Into<String>>(payer: P) -> Self {
        VerifyResponse::Valid {
            payer: payer.into(),
        }
    }

    pub fn invalid<R: Into<String>>(payer: Option<String>, reason: R) -> Self {
        VerifyResponse::Invalid {
            reason: reason.into(),
            payer,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, VerifyResponse::Valid { .. })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VerifyResponseWire {
    is_valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    invalid_reason: Option<String>,
}

impl Serialize for VerifyResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            VerifyResponse::Valid { payer } => VerifyResponseWire {
                is_valid: true,
                payer: Some(payer.clone()),
                invalid_reason: None,
            },
            VerifyResponse::Invalid { reason, payer } => VerifyResponseWire {
                is_valid: false,
                payer: payer.clone(),
                invalid_reason: Some(reason.clone()),
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for VerifyResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = VerifyResponseWire::deserialize(deserializer)?;
        if wire.is_valid {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            Ok(VerifyResponse::Valid { payer })
        } else {
            let reason = wire
                .invalid_reason
                .ok_or_else(|| serde::de::Error::missing_field("invalidReason"))?;
            Ok(VerifyResponse::Invalid {
                reason,
                payer: wire.payer,
            })
        }
    }
}

/// Proof that a verified payment has been finalized.
///
/// Produced by the settle step only after the gated handler has completed
/// successfully; attached to the outbound response, never to the request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementReceipt {
    /// The network where settlement occurred.
    pub network: String,
    /// The address that paid.
    pub payer: String,
    /// The address that was paid.
    pub pay_to: String,
    /// The settled amount in the option's currency unit.
    pub amount: MoneyAmount,
    /// Transaction or settlement reference.
    pub reference: String,
}

/// Result of a settlement attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum SettleResponse {
    /// Settlement succeeded.
    Settled(SettlementReceipt),
    /// Settlement failed; the gated response must not be delivered as paid.
    Failed {
        /// Why settlement failed.
        reason: String,
        /// The network where settlement was attempted.
        network: String,
    },
}

impl SettleResponse {
    /// The receipt, when settlement succeeded.
    pub fn receipt(&self) -> Option<&SettlementReceipt> {
        match self {
            SettleResponse::Settled(receipt) => Some(receipt),
            SettleResponse::Failed { .. } => None,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettleResponseWire {
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_reason: Option<String>,
    network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pay_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    amount: Option<MoneyAmount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reference: Option<String>,
}

impl Serialize for SettleResponse {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let wire = match self {
            SettleResponse::Settled(receipt) => SettleResponseWire {
                success: true,
                error_reason: None,
                network: receipt.network.clone(),
                payer: Some(receipt.payer.clone()),
                pay_to: Some(receipt.pay_to.clone()),
                amount: Some(receipt.amount.clone()),
                reference: Some(receipt.reference.clone()),
            },
            SettleResponse::Failed { reason, network } => SettleResponseWire {
                success: false,
                error_reason: Some(reason.clone()),
                network: network.clone(),
                payer: None,
                pay_to: None,
                amount: None,
                reference: None,
            },
        };
        wire.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SettleResponse {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = SettleResponseWire::deserialize(deserializer)?;
        if wire.success {
            let payer = wire
                .payer
                .ok_or_else(|| serde::de::Error::missing_field("payer"))?;
            let pay_to = wire
                .pay_to
                .ok_or_else(|| serde::de::Error::missing_field("payTo"))?;
            let amount = wire
                .amount
                .ok_or_else(|| serde::de::Error::missing_field("amount"))?;
            let reference = wire
                .reference
                .ok_or_else(|| serde::de::Error::missing_field("reference"))?;
            Ok(SettleResponse::Settled(SettlementReceipt {
                network: wire.network,
                payer,
                pay_to,
                amount,
                reference,
            }))
        } else {
            let reason = wire
                .error_reason
                .ok_or_else(|| serde::de::Error::missing_field("errorReason"))?;
            Ok(SettleResponse::Failed {
                reason,
                network: wire.network,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verify_response_wire_format() {
        let valid = VerifyResponse::valid("0xpayer");
        let json = serde_json::to_value(&valid).unwrap();
        assert_eq!(json["isValid"], true);
        assert_eq!(json["payer"], "0xpayer");
        assert!(json.get("invalidReason").is_none());

        let invalid = VerifyResponse::invalid(None, "expired");
        let json = serde_json::to_value(&invalid).unwrap();
        assert_eq!(json["isValid"], false);
        assert_eq!(json["invalidReason"], "expired");

        let parsed: VerifyResponse = serde_json::from_value(json).unwrap();
        assert!(!parsed.is_valid());
    }

    #[test]
    fn settle_response_wire_format() {
        let settled = SettleResponse::Settled(SettlementReceipt {
            network: "eip155:84532".into(),
            payer: "0xbuyer".into(),
            pay_to: "0xseller".into(),
            amount: MoneyAmount::parse("0.001").unwrap(),
            reference: "0xabc".into(),
        });
        let json = serde_json::to_value(&settled).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["payTo"], "0xseller");
        assert_eq!(json["amount"], "0.001");

        let back: SettleResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back, settled);

        let failed: SettleResponse = serde_json::from_value(serde_json::json!({
            "success": false,
            "errorReason": "insufficient funds",
            "network": "eip155:84532",
        }))
        .unwrap();
        assert!(failed.receipt().is_none());
    }

    #[test]
    fn proof_payload_is_opaque() {
        let proof = PaymentProof::new(
            "exact",
            "eip155:84532",
            serde_json::json!({"anything": ["goes", 42]}),
        )
        .unwrap();
        let json = serde_json::to_string(&proof).unwrap();
        let back: PaymentProof = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key(), proof.key());
        assert_eq!(back.payload.get(), proof.payload.get());
    }

    #[test]
    fn payment_required_accepts_defaults_empty() {
        let required: PaymentRequired = serde_json::from_str("{}").unwrap();
        assert!(required.accepts.is_empty());
        assert!(required.error.is_none());
    }
}
