mod config;
pub use config::{ClientConfig, Credentials, TransportConfig};

use snc_core::{
    async_trait,
    transport::{Method, Request, Response},
    Error, Result, Transport,
};

/// [`Transport`] over a `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    credentials: Credentials,
}

impl HttpTransport {
    /// Wrap an already configured `reqwest` client.
    pub fn new(client: reqwest::Client, credentials: Credentials) -> Self {
        Self {
            client,
            credentials,
        }
    }

    /// Build a client with the default [`TransportConfig`].
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Result<Self> {
        Self::with_config(
            Credentials::basic(username, password),
            &TransportConfig::default(),
        )
    }

    pub fn with_config(credentials: Credentials, config: &TransportConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(proxy) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy.as_str())
                .map_err(|e| Error::transport(e).context(snc_core::err!("invalid proxy {proxy}")))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build().map_err(Error::transport)?;
        Ok(Self::new(client, credentials))
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let mut builder = self.client.request(method(request.method), request.url);

        builder = match &self.credentials {
            Credentials::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Credentials::Bearer(token) => builder.bearer_auth(token),
        };

        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }

        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(Error::transport)?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.bytes().await.map_err(Error::transport)?.to_vec();

        tracing::trace!(status, bytes = body.len(), "http response");
        Ok(Response::new(status, headers, body))
    }
}
