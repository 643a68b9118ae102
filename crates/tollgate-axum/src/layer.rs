//! Tower layer wiring the payment gate into an axum router.
//!
//! [`Tollgate`] is applied to a whole router with [`axum::Router::layer`]. It
//! carries the route table and scheme registry; per request it builds a
//! [`Gate`](crate::gate::Gate) that decides whether payment is required and
//! drives the verify/execute/settle sequence. Routes without a matching rule
//! pass through untouched, so one layer can front an entire application.
//!
//! ```rust,no_run
//! use http::Method;
//! use tollgate_axum::{FacilitatorClient, Tollgate};
//! use tollgate_types::proto::PaymentOption;
//! use tollgate_types::routes::{RouteRule, RouteTable};
//! use tollgate_types::scheme::{FacilitatorScheme, SchemeKey, SchemeRegistry};
//! use tollgate_types::util::MoneyAmount;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let facilitator = FacilitatorClient::try_from("https://facilitator.example.com")?;
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
//! let app: axum::Router = axum::Router::new()
//!     .route("/weather", axum::routing::get(|| async { "sunny" }))
//!     .layer(Tollgate::new(routes, schemes));
//! # Ok(())
//! # }
//! ```

use axum_core::extract::Request;
use axum_core::response::Response;
use std::convert::Infallible;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service};

use tollgate_types::routes::RouteTable;
use tollgate_types::scheme::SchemeRegistry;

use crate::gate::Gate;

/// Payment middleware for axum routers.
///
/// Construction is infallible; all configuration validation happens while
/// building the [`RouteTable`] and [`SchemeRegistry`]. Both are frozen here
/// behind `Arc`s, so cloning the layer and its services is cheap.
#[derive(Debug, Clone)]
pub struct Tollgate {
    routes: Arc<RouteTable>,
    schemes: Arc<SchemeRegistry>,
}

impl Tollgate {
    pub fn new(routes: RouteTable, schemes: SchemeRegistry) -> Self {
        Self {
            routes: Arc::new(routes),
            schemes: Arc::new(schemes),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn schemes(&self) -> &SchemeRegistry {
        &self.schemes
    }
}

impl<S> Layer<S> for Tollgate
where
    S: Service<Request, Response = Response, Error = Infallible> + Clone + Send + Sync + 'static,
    S::Future: Send + 'static,
{
    type Service = TollgateService;

    fn layer(&self, inner: S) -> Self::Service {
        TollgateService {
            routes: self.routes.clone(),
            schemes: self.schemes.clone(),
            inner: BoxCloneSyncService::new(inner),
        }
    }
}

/// The service produced by [`Tollgate`]. Wraps the inner router service and
/// gates each request through [`Gate`].
#[derive(Clone)]
pub struct TollgateService {
    routes: Arc<RouteTable>,
    schemes: Arc<SchemeRegistry>,
    inner: BoxCloneSyncService<Request, Response, Infallible>,
}

impl Service<Request> for TollgateService {
    type Response = Response;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        let gate = Gate {
            routes: self.routes.clone(),
            schemes: self.schemes.clone(),
        };
        // The clone is the ready service; the original keeps waiting.
        let inner = self.inner.clone();
        let inner = std::mem::replace(&mut self.inner, inner);
        Box::pin(gate.handle_request(inner, req))
    }
}
