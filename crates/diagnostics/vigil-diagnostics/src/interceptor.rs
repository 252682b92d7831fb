//! Transparent observation of outbound HTTP calls.

use async_trait::async_trait;
use reqwest::{Request, RequestBuilder, Response};
use std::sync::Arc;
use tokio::time::Instant;

use crate::diagnostics::Diagnostics;
use crate::event::{FaultCategory, RawFault};

/// The seam through which the application issues outbound calls.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    /// Execute a prepared request
    async fn execute(&self, request: Request) -> reqwest::Result<Response>;
}

#[async_trait]
impl HttpExecutor for reqwest::Client {
    async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        reqwest::Client::execute(self, request).await
    }
}

#[async_trait]
impl<E: HttpExecutor + ?Sized> HttpExecutor for Arc<E> {
    async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        (**self).execute(request).await
    }
}

/// Decorator that reports failed calls and records latency for every call.
///
/// The wrapped executor's result is returned untouched; the response body is
/// never read here.
#[derive(Debug, Clone)]
pub struct InterceptedClient<E = reqwest::Client> {
    inner: E,
    diagnostics: Arc<Diagnostics>,
}

impl<E: HttpExecutor> InterceptedClient<E> {
    /// Wrap `inner`, reporting into `diagnostics`
    pub fn new(inner: E, diagnostics: Arc<Diagnostics>) -> Self {
        Self { inner, diagnostics }
    }

    /// The wrapped executor
    pub fn inner(&self) -> &E {
        &self.inner
    }

    /// Build and execute a request prepared with `reqwest`'s builder API.
    ///
    /// A builder that fails to produce a request is observed like any other
    /// failed call: one `Network` fault and one latency sample.
    pub async fn send(&self, builder: RequestBuilder) -> reqwest::Result<Response> {
        let started = Instant::now();
        match builder.build() {
            Ok(request) => self.execute(request).await,
            Err(err) => {
                let url = err.url().map(ToString::to_string).unwrap_or_default();
                self.report_network(&url, None, &err);
                self.diagnostics.record_latency(&url, started.elapsed());
                Err(err)
            }
        }
    }

    fn observe(&self, url: &str, method: &str, result: &reqwest::Result<Response>) {
        match result {
            Ok(response) if !response.status().is_success() => {
                let status = response.status();
                let status_text = match status.canonical_reason() {
                    Some(reason) => format!("{} {reason}", status.as_u16()),
                    None => status.as_u16().to_string(),
                };
                let message = format!("API Error: {status_text} ({method} {url})");
                self.diagnostics.report(
                    RawFault::new(FaultCategory::Api, message)
                        .with_request_url(url)
                        .with_status(status.as_u16())
                        .with_method(method),
                );
            }
            Ok(_) => {}
            Err(err) => self.report_network(url, Some(method), err),
        }
    }

    fn report_network(&self, url: &str, method: Option<&str>, err: &reqwest::Error) {
        let mut fault = RawFault::new(FaultCategory::Network, format!("Network Error: {err}"));
        if !url.is_empty() {
            fault = fault.with_request_url(url);
        }
        if let Some(method) = method {
            fault = fault.with_method(method);
        }
        self.diagnostics.report(fault);
    }
}

impl InterceptedClient<reqwest::Client> {
    /// Start a GET on the wrapped client; pass the builder to [`send`](Self::send)
    pub fn get(&self, url: &str) -> RequestBuilder {
        self.inner.get(url)
    }

    /// Start a POST on the wrapped client; pass the builder to [`send`](Self::send)
    pub fn post(&self, url: &str) -> RequestBuilder {
        self.inner.post(url)
    }
}

#[async_trait]
impl<E: HttpExecutor> HttpExecutor for InterceptedClient<E> {
    async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        let url = request.url().to_string();
        let method = request.method().to_string();
        let started = Instant::now();

        let result = self.inner.execute(request).await;

        self.observe(&url, &method, &result);
        self.diagnostics.record_latency(&url, started.elapsed());
        result
    }
}
