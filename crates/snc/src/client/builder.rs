use super::{
    get_instance, ServiceNowClient, Shared, DEFAULT_BATCH_QUERY_THRESHOLD, DEFAULT_BATCH_SIZE,
};
use crate::Result;

use snc_core::{err, Error, Transport};

use std::sync::Arc;

#[derive(Default)]
pub struct Builder {
    instance: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    headers: Vec<(String, String)>,
    batch_size: Option<usize>,
    batch_query_threshold: Option<usize>,
}

impl Builder {
    /// Instance name (`dev0000`) or URL (`https://dev0000.service-now.com`).
    pub fn instance(&mut self, instance: impl Into<String>) -> &mut Self {
        self.instance = Some(instance.into());
        self
    }

    pub fn transport(&mut self, transport: impl Transport) -> &mut Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(&mut self, transport: Arc<dyn Transport>) -> &mut Self {
        self.transport = Some(transport);
        self
    }

    /// Add a header sent with every request.
    pub fn header(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Default rows per request for cursors created by the client.
    pub fn batch_size(&mut self, batch_size: usize) -> &mut Self {
        self.batch_size = Some(batch_size);
        self
    }

    /// Parameter length above which queries go through the batch API.
    pub fn batch_query_threshold(&mut self, threshold: usize) -> &mut Self {
        self.batch_query_threshold = Some(threshold);
        self
    }

    pub fn build(&mut self) -> Result<ServiceNowClient> {
        let Some(instance) = &self.instance else {
            return Err(Error::invalid_instance("no instance configured"));
        };
        let instance = get_instance(instance)?;

        let Some(transport) = self.transport.clone() else {
            return Err(err!("no transport configured for {instance}"));
        };

        let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
        for (name, value) in &self.headers {
            headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
            headers.push((name.clone(), value.clone()));
        }

        Ok(ServiceNowClient {
            shared: Arc::new(Shared {
                instance,
                transport,
                headers,
                batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
                batch_query_threshold: self
                    .batch_query_threshold
                    .unwrap_or(DEFAULT_BATCH_QUERY_THRESHOLD),
            }),
        })
    }
}
