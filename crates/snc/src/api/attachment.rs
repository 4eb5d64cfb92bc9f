use super::{set_params, table::params_vec};
use crate::{Attachment, Result, ServiceNowClient};

use snc_core::{
    transport::{Request, Response},
    Error,
};
use url::Url;

const API_VERSION: &str = "v1";

/// `/api/now/v1/attachment`
#[derive(Debug, Clone)]
pub struct AttachmentApi {
    client: ServiceNowClient,
}

impl AttachmentApi {
    pub(crate) fn new(client: ServiceNowClient) -> Self {
        Self { client }
    }

    fn target(&self, sys_id: Option<&str>) -> Result<Url> {
        match sys_id {
            Some(sys_id) => self
                .client
                .url(&format!("/api/now/{API_VERSION}/attachment/{sys_id}")),
            None => self.client.url(&format!("/api/now/{API_VERSION}/attachment")),
        }
    }

    /// Attachment metadata.
    pub async fn get(&self, sys_id: &str) -> Result<Response> {
        let request = Request::get(self.target(Some(sys_id))?);
        self.client.send(request).await?.validate()
    }

    /// Attachment content.
    pub async fn get_file(&self, sys_id: &str) -> Result<Response> {
        let url = self.client.url(&format!(
            "/api/now/{API_VERSION}/attachment/{sys_id}/file"
        ))?;
        let request = Request::get(url).header("Accept", "*/*");
        self.client.send(request).await?.validate()
    }

    pub async fn list(&self, attachment: &Attachment) -> Result<Response> {
        let params = set_params(Some(attachment.parameters()));
        let request = Request::get(self.target(None)?)
            .query(&params_vec(&params))
            .header("Accept", "application/json");
        self.client.send(request).await?.validate()
    }

    /// Upload `content` and attach it to `table_name`/`table_sys_id`.
    ///
    /// The content type defaults to `application/octet-stream`.
    pub async fn upload_file(
        &self,
        file_name: &str,
        table_name: &str,
        table_sys_id: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
        encryption_context: Option<&str>,
    ) -> Result<Response> {
        let url = self
            .client
            .url(&format!("/api/now/{API_VERSION}/attachment/file"))?;

        let mut params = vec![
            ("file_name", file_name),
            ("table_name", table_name),
            ("table_sys_id", table_sys_id),
        ];
        if let Some(encryption_context) = encryption_context {
            params.push(("encryption_context", encryption_context));
        }

        let request = Request::post(url).query(&params).body(
            content,
            content_type.unwrap_or("application/octet-stream"),
        );

        let response = self.client.send(request).await?;
        match response.status() {
            401 | 403 | 404 => response.validate(),
            status if status >= 400 => Err(Error::upload(response.payload())),
            _ => Ok(response),
        }
    }

    pub async fn delete(&self, sys_id: &str) -> Result<Response> {
        let request = Request::delete(self.target(Some(sys_id))?);
        self.client.send(request).await?.validate()
    }
}
