//! Circuit breaker middleware for request/response services.

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::{Request, Response};
use futures_util::future::BoxFuture;
use hyper::body::Incoming;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tower::{Layer, Service, ServiceExt};

use crate::resilience::{CircuitBreaker, Error};

/// Plain HTTP/1.1 + HTTP/2 client used as the default inner transport.
pub type HttpClient = Client<HttpConnector, Body>;

/// A hyper client guarded by a circuit breaker.
pub type HttpTransport = CircuitBreakerService<HttpClient>;

/// Applies a shared [`CircuitBreaker`] to the wrapped service.
#[derive(Debug, Clone)]
pub struct CircuitBreakerLayer {
    breaker: CircuitBreaker,
}

impl CircuitBreakerLayer {
    pub fn new(breaker: CircuitBreaker) -> Self {
        Self { breaker }
    }
}

impl<S> Layer<S> for CircuitBreakerLayer {
    type Service = CircuitBreakerService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CircuitBreakerService::new(inner, self.breaker.clone())
    }
}

/// Service running every request as one breaker operation.
#[derive(Debug, Clone)]
pub struct CircuitBreakerService<S> {
    inner: S,
    breaker: CircuitBreaker,
}

impl<S> CircuitBreakerService<S> {
    pub fn new(inner: S, breaker: CircuitBreaker) -> Self {
        Self { inner, breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn get_ref(&self) -> &S {
        &self.inner
    }
}

impl<S, Req> Service<Req> for CircuitBreakerService<S>
where
    S: Service<Req> + Clone + Send + 'static,
    S::Future: Send,
    S::Response: Send,
    S::Error: Send,
    Req: Send + 'static,
{
    type Response = S::Response;
    type Error = Error<S::Error>;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Error::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        // use the service that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let breaker = self.breaker.clone();

        Box::pin(async move { breaker.call(move || inner.call(req)).await })
    }
}

impl HttpTransport {
    /// Wrap a fresh hyper client with `breaker`.
    pub fn http(breaker: CircuitBreaker) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());
        Self::new(client, breaker)
    }

    /// Send one request through the breaker.
    pub async fn send(
        &self,
        request: Request<Body>,
    ) -> Result<Response<Incoming>, Error<hyper_util::client::legacy::Error>> {
        self.clone().oneshot(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::resilience::State;

    #[derive(Debug, PartialEq)]
    struct Refused;

    #[tokio::test]
    async fn test_layer_counts_inner_errors() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        let inner = tower::service_fn(move |fail: bool| {
            counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if fail {
                    Err(Refused)
                } else {
                    Ok("ok")
                }
            }
        });

        let breaker = CircuitBreaker::builder("svc").failure_threshold(2).build();
        let svc = CircuitBreakerLayer::new(breaker.clone()).layer(inner);

        assert_eq!(svc.clone().oneshot(false).await.unwrap(), "ok");
        assert!(matches!(svc.clone().oneshot(true).await, Err(Error::Inner(Refused))));
        assert!(matches!(svc.clone().oneshot(true).await, Err(Error::Inner(Refused))));
        assert_eq!(breaker.current_state(), State::Open);

        assert!(matches!(svc.clone().oneshot(false).await, Err(Error::Open)));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_http_transport_connection_refused() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let breaker = CircuitBreaker::builder("http").failure_threshold(1).build();
        let transport = HttpTransport::http(breaker.clone());

        let request = Request::get(format!("http://{}/", addr))
            .body(Body::empty())
            .unwrap();
        let result = transport.send(request).await;

        assert!(matches!(result, Err(Error::Inner(_))));
        assert_eq!(breaker.current_state(), State::Open);

        let request = Request::get(format!("http://{}/", addr))
            .body(Body::empty())
            .unwrap();
        assert!(matches!(transport.send(request).await, Err(Error::Open)));
    }
}
