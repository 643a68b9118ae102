//! Glue for attaching a [`PaymentsClient`] to reqwest clients and builders.

use reqwest::{Client, ClientBuilder};
use reqwest_middleware as rqm;

use crate::client::PaymentsClient;

/// Attaches payment handling to a [`Client`] or [`ClientBuilder`].
pub trait WithPayments<A, S> {
    fn with_payments(self, payments: PaymentsClient<S>) -> WithPaymentsBuilder<A, S>;
}

impl<S> WithPayments<Client, S> for Client {
    fn with_payments(self, payments: PaymentsClient<S>) -> WithPaymentsBuilder<Client, S> {
        WithPaymentsBuilder {
            inner: self,
            payments,
        }
    }
}

impl<S> WithPayments<ClientBuilder, S> for ClientBuilder {
    fn with_payments(self, payments: PaymentsClient<S>) -> WithPaymentsBuilder<ClientBuilder, S> {
        WithPaymentsBuilder {
            inner: self,
            payments,
        }
    }
}

/// Intermediate builder pairing a reqwest client with payment middleware.
pub struct WithPaymentsBuilder<A, S> {
    inner: A,
    payments: PaymentsClient<S>,
}

/// Finishes a [`WithPaymentsBuilder`] into a middleware-equipped client.
pub trait WithPaymentsBuild {
    type BuildResult;
    type BuilderResult;

    fn build(self) -> Self::BuildResult;
    fn builder(self) -> Self::BuilderResult;
}

impl<S> WithPaymentsBuild for WithPaymentsBuilder<Client, S>
where
    PaymentsClient<S>: rqm::Middleware,
{
    type BuildResult = rqm::ClientWithMiddleware;
    type BuilderResult = rqm::ClientBuilder;

    fn build(self) -> Self::BuildResult {
        self.builder().build()
    }

    fn builder(self) -> Self::BuilderResult {
        rqm::ClientBuilder::new(self.inner).with(self.payments)
    }
}

impl<S> WithPaymentsBuild for WithPaymentsBuilder<ClientBuilder, S>
where
    PaymentsClient<S>: rqm::Middleware,
{
    type BuildResult = Result<rqm::ClientWithMiddleware, reqwest::Error>;
    type BuilderResult = Result<rqm::ClientBuilder, reqwest::Error>;

    fn build(self) -> Self::BuildResult {
        let builder = self.builder()?;
        Ok(builder.build())
    }

    fn builder(self) -> Self::BuilderResult {
        let client = self.inner.build()?;
        Ok(rqm::ClientBuilder::new(client).with(self.payments))
    }
}
