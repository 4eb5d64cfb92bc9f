use crate::HttpTransport;

use snc_core::{err, Error, Result};

use std::time::Duration;

/// How requests authenticate against the instance.
#[derive(Clone)]
pub enum Credentials {
    Basic { username: String, password: String },
    Bearer(String),
}

impl Credentials {
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Credentials::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn bearer(token: impl Into<String>) -> Self {
        Credentials::Bearer(token.into())
    }
}

impl core::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::Bearer(_) => f.debug_tuple("Bearer").field(&"<redacted>").finish(),
        }
    }
}

/// Settings of the HTTP client itself.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Applies to the whole request, body included.
    pub timeout: Duration,

    /// Proxy URL used for every request.
    pub proxy: Option<String>,

    /// Skip TLS certificate verification.
    pub accept_invalid_certs: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            proxy: None,
            accept_invalid_certs: false,
        }
    }
}

/// Everything needed to reach one instance.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub instance: String,
    pub credentials: Credentials,
    pub transport: TransportConfig,
}

impl ClientConfig {
    /// Read `SNC_INSTANCE` and either `SNC_USERNAME` + `SNC_PASSWORD` or
    /// `SNC_TOKEN`.
    pub fn from_env() -> Result<ClientConfig> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<ClientConfig> {
        let Some(instance) = lookup("SNC_INSTANCE") else {
            return Err(Error::invalid_instance("SNC_INSTANCE is not set"));
        };

        let credentials = match (lookup("SNC_USERNAME"), lookup("SNC_PASSWORD"), lookup("SNC_TOKEN")) {
            (Some(username), Some(password), _) => Credentials::basic(username, password),
            (_, _, Some(token)) => Credentials::bearer(token),
            _ => {
                return Err(err!(
                    "no credentials configured; set SNC_USERNAME and SNC_PASSWORD, or SNC_TOKEN"
                ))
            }
        };

        Ok(ClientConfig {
            instance,
            credentials,
            transport: TransportConfig::default(),
        })
    }

    pub fn transport(&self) -> Result<HttpTransport> {
        HttpTransport::with_config(self.credentials.clone(), &self.transport)
    }
}
