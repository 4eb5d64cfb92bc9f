mod builder;
pub use builder::Builder;

use crate::{
    api::{AttachmentApi, BatchApi, TableApi},
    Attachment, GlideRecord, Result,
};

use snc_core::{transport::Request, transport::Response, Error, Transport};

use std::sync::Arc;

/// Default number of rows fetched per Table API request.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Queries whose rendered parameters are longer than this are sent through
/// the batch API, since ServiceNow rejects overly long GET URLs.
pub const DEFAULT_BATCH_QUERY_THRESHOLD: usize = 10_000;

/// A handle to one ServiceNow instance.
///
/// Cheap to clone; all clones share the instance URL, transport and default
/// headers. Nothing created from a client mutates that shared state.
#[derive(Clone)]
pub struct ServiceNowClient {
    shared: Arc<Shared>,
}

struct Shared {
    instance: String,
    transport: Arc<dyn Transport>,
    headers: Vec<(String, String)>,
    batch_size: usize,
    batch_query_threshold: usize,
}

impl ServiceNowClient {
    pub fn builder() -> Builder {
        Builder::default()
    }

    /// Connect to `instance` (a bare instance name or an `https://` URL)
    /// using the given transport and default settings.
    pub fn new(instance: &str, transport: impl Transport) -> Result<ServiceNowClient> {
        Self::builder().instance(instance).transport(transport).build()
    }

    /// The normalized instance URL, e.g. `https://dev0000.service-now.com`.
    pub fn instance(&self) -> &str {
        &self.shared.instance
    }

    /// Headers sent with every request, including batched ones.
    pub fn default_headers(&self) -> &[(String, String)] {
        &self.shared.headers
    }

    pub fn batch_size(&self) -> usize {
        self.shared.batch_size
    }

    pub fn batch_query_threshold(&self) -> usize {
        self.shared.batch_query_threshold
    }

    /// A rewindable record cursor over `table` with the default batch size.
    pub fn glide_record(&self, table: impl Into<String>) -> GlideRecord {
        GlideRecord::new(self.clone(), table, self.shared.batch_size, true)
    }

    pub fn glide_record_with(
        &self,
        table: impl Into<String>,
        batch_size: usize,
        rewindable: bool,
    ) -> GlideRecord {
        GlideRecord::new(self.clone(), table, batch_size, rewindable)
    }

    /// An attachment cursor scoped to `table`.
    pub fn attachment(&self, table: impl Into<String>) -> Attachment {
        Attachment::new(self.clone(), table)
    }

    pub fn table_api(&self) -> TableApi {
        TableApi::new(self.clone())
    }

    pub fn attachment_api(&self) -> AttachmentApi {
        AttachmentApi::new(self.clone())
    }

    /// A new, empty batch coordinator.
    pub fn batch_api(&self) -> BatchApi {
        BatchApi::new(self.clone())
    }

    /// Build an absolute URL under the instance.
    pub(crate) fn url(&self, path: &str) -> Result<url::Url> {
        Ok(url::Url::parse(&format!("{}{path}", self.shared.instance))?)
    }

    /// Send one request with the default headers applied. No status handling.
    pub async fn send(&self, mut request: Request) -> Result<Response> {
        for (name, value) in &self.shared.headers {
            if request.header_value(name).is_none() {
                request.headers.push((name.clone(), value.clone()));
            }
        }

        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.shared.transport.send(request).await?;
        tracing::trace!(status = response.status(), "received response");
        Ok(response)
    }
}

impl core::fmt::Debug for ServiceNowClient {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("ServiceNowClient")
            .field("instance", &self.shared.instance)
            .field("transport", &self.shared.transport)
            .finish()
    }
}

/// Normalize an instance name or URL.
///
/// `dev0000` becomes `https://dev0000.service-now.com`; a URL must be
/// `https` and loses any trailing `/`. A host name without a scheme is
/// rejected.
pub fn get_instance(instance: &str) -> Result<String> {
    let instance = instance.trim();

    if instance.is_empty() {
        return Err(Error::invalid_instance("instance must not be empty"));
    }

    if instance.contains("://") {
        let url = url::Url::parse(instance)
            .map_err(|e| Error::invalid_instance(format!("{instance}: {e}")))?;
        if url.scheme() != "https" {
            return Err(Error::invalid_instance(format!(
                "{instance}: only https instances are supported"
            )));
        }
        return Ok(instance.trim_end_matches('/').to_string());
    }

    if instance.contains('.') {
        return Err(Error::invalid_instance(format!(
            "{instance}: a host name needs an https:// scheme"
        )));
    }

    Ok(format!("https://{instance}.service-now.com"))
}

/// Whether `value` looks like a `sys_id`: exactly 32 ASCII letters or digits.
pub fn guess_is_sys_id(value: &str) -> bool {
    value.len() == 32 && value.bytes().all(|b| b.is_ascii_alphanumeric())
}
