use dotenvy::dotenv;
use reqwest::Client;
use std::env;
use tollgate_reqwest::{PaymentsClient, WithPayments, WithPaymentsBuild, settlement_receipt};
use tollgate_types::proto::{PaymentProof, PaymentTerms};
use tollgate_types::scheme::{ProofSigner, SchemeKey, SigningError};

const EIP155_BASE_SEPOLIA: &str = "eip155:84532";

/// Demo signer: proves payment with a bearer token instead of a chain
/// signature. A real deployment would register a wallet-backed signer here.
struct BearerTokenSigner {
    token: String,
}

#[async_trait::async_trait]
impl ProofSigner for BearerTokenSigner {
    async fn sign(&self, terms: &PaymentTerms) -> Result<PaymentProof, SigningError> {
        PaymentProof::new(
            terms.scheme.clone(),
            terms.network.clone(),
            serde_json::json!({ "token": self.token, "payTo": terms.pay_to }),
        )
        .map_err(|err| SigningError(err.to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    let token = env::var("PAYMENT_TOKEN").unwrap_or("demo-token".to_string());
    let base_url = env::var("SERVER_URL").unwrap_or("http://localhost:3000".to_string());

    let payments = PaymentsClient::new().register(
        SchemeKey::new("exact", EIP155_BASE_SEPOLIA),
        BearerTokenSigner { token },
    )?;
    let client = Client::new().with_payments(payments).build();

    for path in ["/weather?city=Tokyo", "/premium/data"] {
        let response = client.get(format!("{base_url}{path}")).send().await?;
        println!("GET {path}: {}", response.status());

        if let Some(settled) = settlement_receipt(&response) {
            match settled.receipt() {
                Some(receipt) => println!(
                    "  paid {} to {} on {} (ref {})",
                    receipt.amount, receipt.pay_to, receipt.network, receipt.reference
                ),
                None => println!("  settlement reported failed"),
            }
        }

        println!("  body: {}", response.text().await?);
    }

    Ok(())
}
