mod request;
pub use request::{Method, Request};

mod response;
pub use response::Response;

use crate::{async_trait, Result};

use std::fmt::Debug;

/// Performs HTTP requests against a ServiceNow instance.
///
/// Implementations own authentication, proxies, TLS and timeouts. Every
/// cursor created from one client shares the same transport; a transport
/// must not be reconfigured by the code that uses it.
#[async_trait]
pub trait Transport: Debug + Send + Sync + 'static {
    /// Send one request and return the response, whatever its status.
    ///
    /// Only failures to obtain a response at all are errors here; status
    /// handling belongs to the caller.
    async fn send(&self, request: Request) -> Result<Response>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: Request) -> Result<Response> {
        (**self).send(request).await
    }
}
