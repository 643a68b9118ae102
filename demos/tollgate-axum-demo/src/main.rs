use axum::Json;
use axum::Router;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use dotenvy::dotenv;
use http::Method;
use serde_json::json;
use std::env;
use tollgate_axum::{FacilitatorClient, Tollgate};
use tollgate_types::proto::PaymentOption;
use tollgate_types::routes::{RouteRule, RouteTable};
use tollgate_types::scheme::{FacilitatorScheme, SchemeKey, SchemeRegistry};
use tollgate_types::util::MoneyAmount;
use tracing_subscriber::EnvFilter;

const EIP155_BASE_SEPOLIA: &str = "eip155:84532";
const SOLANA_DEVNET: &str = "solana:EtWTRABZaYq6iMfeYKouRu166VU2xqa1";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let facilitator_url =
        env::var("FACILITATOR_URL").unwrap_or("https://facilitator.example.com".to_string());
    let evm_pay_to = env::var("EVM_PAY_TO")
        .unwrap_or("0xBAc675C310721717Cd4A37F6cbeA1F081b1C2a07".to_string());
    let solana_pay_to = env::var("SOLANA_PAY_TO")
        .unwrap_or("EGBQqKn968sVv5cQh5Cr72pSTHfxsuzq7o7asqYB5uEV".to_string());

    let facilitator = FacilitatorClient::try_from(facilitator_url)?;
    tracing::info!("Using facilitator on {}", facilitator.base_url());

    let routes = RouteTable::new()
        .and_route(
            RouteRule::new(Method::GET, "/weather")?
                .accept(PaymentOption::new(
                    "exact",
                    EIP155_BASE_SEPOLIA,
                    MoneyAmount::parse("$0.001")?,
                    evm_pay_to.clone(),
                ))
                .accept(PaymentOption::new(
                    "exact",
                    SOLANA_DEVNET,
                    MoneyAmount::parse("$0.001")?,
                    solana_pay_to.clone(),
                ))
                .with_description("Weather data for any city"),
        )?
        .and_route(
            RouteRule::new(Method::GET, "/premium/*")?
                .accept(PaymentOption::new(
                    "exact",
                    EIP155_BASE_SEPOLIA,
                    MoneyAmount::parse("$0.01")?,
                    evm_pay_to,
                ))
                .with_description("Premium content"),
        )?;

    let schemes = SchemeRegistry::new()
        .and_register(
            SchemeKey::new("exact", EIP155_BASE_SEPOLIA),
            FacilitatorScheme::new(facilitator.clone()),
        )?
        .and_register(
            SchemeKey::new("exact", SOLANA_DEVNET),
            FacilitatorScheme::new(facilitator),
        )?;

    let app = Router::new()
        .route("/weather", get(weather))
        .route("/premium/{*rest}", get(premium))
        .route("/health", get(|| async { "ok" }))
        .layer(Tollgate::new(routes, schemes));

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
    tracing::info!("Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn weather() -> impl IntoResponse {
    Json(json!({ "city": "Lisbon", "weather": "sunny", "temperature": 24 }))
}

async fn premium() -> impl IntoResponse {
    (StatusCode::OK, "This is premium content!")
}
