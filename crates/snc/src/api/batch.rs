use crate::{GlideRecord, Result, ServiceNowClient};

use base64::{engine::general_purpose::STANDARD, Engine as _};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use snc_core::{
    transport::{Request, Response},
    Error,
};

const API_VERSION: &str = "v1";

/// Total number of times one set of requests is sent before giving up on
/// the ones the server keeps reporting as unserviced.
pub const MAX_ATTEMPTS: usize = 3;

/// Completion callback for one batched request. Receives `None` when the
/// request was never serviced.
pub type Callback = Box<dyn FnOnce(Option<Response>) + Send + 'static>;

/// Collects independent requests into one `/api/now/v1/batch` call.
///
/// Every enqueued request gets its callback invoked exactly once per
/// [`execute`](BatchApi::execute), and the queue is empty when `execute`
/// returns, whether it succeeded or not.
pub struct BatchApi {
    client: ServiceNowClient,
    batch_request_id: u64,
    next_request_id: u64,
    pending: IndexMap<String, Pending>,
}

struct Pending {
    wire: RestRequest,
    callback: Callback,
}

#[derive(Debug, Clone, Serialize)]
struct RestRequest {
    id: String,
    method: &'static str,
    url: String,
    headers: Vec<Header>,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Header {
    name: String,
    value: String,
}

#[derive(Serialize)]
struct BatchRequest<'a> {
    batch_request_id: u64,
    rest_requests: Vec<&'a RestRequest>,
}

#[derive(Deserialize)]
struct BatchResponse {
    batch_request_id: serde_json::Value,
    #[serde(default)]
    serviced_requests: Vec<ServicedRequest>,
    #[serde(default)]
    unserviced_requests: Vec<UnservicedRequest>,
}

#[derive(Deserialize)]
struct ServicedRequest {
    id: String,
    status_code: u16,
    #[serde(default)]
    headers: Vec<Header>,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum UnservicedRequest {
    Id(String),
    Object { id: String },
}

impl BatchApi {
    pub(crate) fn new(client: ServiceNowClient) -> Self {
        Self {
            client,
            batch_request_id: 0,
            next_request_id: 0,
            pending: IndexMap::new(),
        }
    }

    /// Number of requests waiting for [`execute`](BatchApi::execute).
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Enqueue any request against the instance.
    pub fn add_request(
        &mut self,
        request: Request,
        callback: impl FnOnce(Option<Response>) + Send + 'static,
    ) -> Result<()> {
        self.next_request_id += 1;
        let id = self.next_request_id.to_string();

        let mut headers: Vec<Header> = self
            .client
            .default_headers()
            .iter()
            .filter(|(name, _)| request.header_value(name).is_none())
            .map(|(name, value)| Header {
                name: name.clone(),
                value: value.clone(),
            })
            .collect();
        headers.extend(request.headers.iter().map(|(name, value)| Header {
            name: name.clone(),
            value: value.clone(),
        }));

        let wire = RestRequest {
            id: id.clone(),
            method: request.method.as_str(),
            url: request.relative_url(),
            headers,
            body: request.body.as_deref().map(|body| STANDARD.encode(body)),
        };

        self.pending.insert(
            id,
            Pending {
                wire,
                callback: Box::new(callback),
            },
        );
        Ok(())
    }

    pub fn get(
        &mut self,
        record: &GlideRecord,
        sys_id: &str,
        callback: impl FnOnce(Option<Response>) + Send + 'static,
    ) -> Result<()> {
        let request = self.client.table_api().get_request(record, sys_id)?;
        self.add_request(request, callback)
    }

    pub fn list(
        &mut self,
        record: &GlideRecord,
        callback: impl FnOnce(Option<Response>) + Send + 'static,
    ) -> Result<()> {
        let request = self.client.table_api().list_request(record)?;
        self.add_request(request, callback)
    }

    pub fn post(
        &mut self,
        record: &GlideRecord,
        callback: impl FnOnce(Option<Response>) + Send + 'static,
    ) -> Result<()> {
        let request = self.client.table_api().post_request(record)?;
        self.add_request(request, callback)
    }

    pub fn patch(
        &mut self,
        record: &GlideRecord,
        callback: impl FnOnce(Option<Response>) + Send + 'static,
    ) -> Result<()> {
        let request = self.client.table_api().patch_request(record)?;
        self.add_request(request, callback)
    }

    /// Same as [`BatchApi::patch`].
    pub fn put(
        &mut self,
        record: &GlideRecord,
        callback: impl FnOnce(Option<Response>) + Send + 'static,
    ) -> Result<()> {
        self.patch(record, callback)
    }

    pub fn delete(
        &mut self,
        record: &GlideRecord,
        callback: impl FnOnce(Option<Response>) + Send + 'static,
    ) -> Result<()> {
        let request = self.client.table_api().delete_request(record)?;
        self.add_request(request, callback)
    }

    /// Send everything queued, retrying unserviced requests up to
    /// [`MAX_ATTEMPTS`] sends in total.
    ///
    /// Requests still pending afterwards (unserviced, or stranded by an
    /// error) get `None`.
    pub async fn execute(&mut self) -> Result<()> {
        let result = self.dispatch().await;

        if !self.pending.is_empty() {
            tracing::warn!(
                remaining = self.pending.len(),
                "batched requests were not serviced"
            );
        }

        for (_, pending) in self.pending.drain(..) {
            (pending.callback)(None);
        }

        result
    }

    async fn dispatch(&mut self) -> Result<()> {
        for attempt in 0..MAX_ATTEMPTS {
            if self.pending.is_empty() {
                return Ok(());
            }

            self.batch_request_id += 1;
            let batch_request_id = self.batch_request_id;

            tracing::debug!(
                batch_request_id,
                requests = self.pending.len(),
                attempt,
                "dispatching batch"
            );

            let body = BatchRequest {
                batch_request_id,
                rest_requests: self.pending.values().map(|p| &p.wire).collect(),
            };
            let url = self
                .client
                .url(&format!("/api/now/{API_VERSION}/batch"))?;
            let request = Request::post(url).json(&body)?;

            let response = self.client.send(request).await?.validate()?;
            let data: BatchResponse = response.json_as()?;

            if !echoes(&data.batch_request_id, batch_request_id) {
                return Err(Error::invalid_response(format!(
                    "batch response id {} does not match request id {batch_request_id}",
                    data.batch_request_id
                )));
            }

            for serviced in data.serviced_requests {
                if !self.pending.contains_key(&serviced.id) {
                    return Err(Error::invalid_response(format!(
                        "batch response references unknown request {}",
                        serviced.id
                    )));
                }

                let response = serviced.to_response()?;
                if let Some(pending) = self.pending.shift_remove(&serviced.id) {
                    (pending.callback)(Some(response));
                }
            }

            if data.unserviced_requests.is_empty() {
                return Ok(());
            }

            let unserviced: Vec<&str> = data
                .unserviced_requests
                .iter()
                .map(UnservicedRequest::id)
                .collect();
            tracing::debug!(batch_request_id, ?unserviced, attempt, "requests were not serviced");
        }

        Ok(())
    }
}

impl Drop for BatchApi {
    fn drop(&mut self) {
        for (_, pending) in self.pending.drain(..) {
            (pending.callback)(None);
        }
    }
}

impl core::fmt::Debug for BatchApi {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("BatchApi")
            .field("batch_request_id", &self.batch_request_id)
            .field(
                "pending",
                &self.pending.values().map(|p| &p.wire).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn echoes(echoed: &serde_json::Value, batch_request_id: u64) -> bool {
    match echoed {
        serde_json::Value::String(id) => *id == batch_request_id.to_string(),
        serde_json::Value::Number(id) => id.as_u64() == Some(batch_request_id),
        _ => false,
    }
}

impl ServicedRequest {
    fn to_response(&self) -> Result<Response> {
        let body = match &self.body {
            Some(body) => STANDARD.decode(body).map_err(|e| {
                Error::invalid_response(format!(
                    "body of batched request {} is not base64: {e}",
                    self.id
                ))
            })?,
            None => vec![],
        };

        let headers = self
            .headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();

        Ok(Response::new(self.status_code, headers, body))
    }
}

impl UnservicedRequest {
    fn id(&self) -> &str {
        match self {
            UnservicedRequest::Id(id) | UnservicedRequest::Object { id } => id,
        }
    }
}
