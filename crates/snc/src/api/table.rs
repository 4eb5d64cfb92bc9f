use super::{set_params, Params};
use crate::{GlideRecord, Result, ServiceNowClient};

use snc_core::{
    transport::{Request, Response},
    Error, SerializeOptions,
};
use url::Url;

/// `/api/now/table/{table}`
///
/// `list` and `get` map error statuses onto [`Error`]; the write methods
/// return the raw response so the record cursor can report write failures
/// with their status.
#[derive(Debug, Clone)]
pub struct TableApi {
    client: ServiceNowClient,
}

impl TableApi {
    pub(crate) fn new(client: ServiceNowClient) -> Self {
        Self { client }
    }

    fn target(&self, table: &str, sys_id: Option<&str>) -> Result<Url> {
        match sys_id {
            Some(sys_id) => self.client.url(&format!("/api/now/table/{table}/{sys_id}")),
            None => self.client.url(&format!("/api/now/table/{table}")),
        }
    }

    pub fn list_request(&self, record: &GlideRecord) -> Result<Request> {
        let params = set_params(Some(record.parameters()));
        Ok(Request::get(self.target(record.table(), None)?).query(&params_vec(&params)))
    }

    pub fn get_request(&self, record: &GlideRecord, sys_id: &str) -> Result<Request> {
        let mut params = set_params(Some(record.parameters()));
        params.shift_remove("sysparm_offset");
        Ok(Request::get(self.target(record.table(), Some(sys_id))?).query(&params_vec(&params)))
    }

    pub fn patch_request(&self, record: &GlideRecord) -> Result<Request> {
        let sys_id = record.require_sys_id("update")?;
        let Some(body) = record.serialize(&SerializeOptions::changes_only()) else {
            return Err(Error::no_record("cannot update nothing"));
        };
        let params = set_params(None);
        Request::patch(self.target(record.table(), Some(sys_id))?)
            .query(&params_vec(&params))
            .json(&body)
    }

    pub fn post_request(&self, record: &GlideRecord) -> Result<Request> {
        let Some(body) = record.serialize(&SerializeOptions::default()) else {
            return Err(Error::no_record(
                "cannot insert nothing, did you forget to call initialize()?",
            ));
        };
        let params = set_params(None);
        Request::post(self.target(record.table(), None)?)
            .query(&params_vec(&params))
            .json(&body)
    }

    pub fn delete_request(&self, record: &GlideRecord) -> Result<Request> {
        let sys_id = record.require_sys_id("delete")?;
        Ok(Request::delete(self.target(record.table(), Some(sys_id))?))
    }

    pub async fn list(&self, record: &GlideRecord) -> Result<Response> {
        self.client.send(self.list_request(record)?).await?.validate()
    }

    pub async fn get(&self, record: &GlideRecord, sys_id: &str) -> Result<Response> {
        self.client
            .send(self.get_request(record, sys_id)?)
            .await?
            .validate()
    }

    /// Same as [`TableApi::patch`].
    pub async fn put(&self, record: &GlideRecord) -> Result<Response> {
        self.patch(record).await
    }

    pub async fn patch(&self, record: &GlideRecord) -> Result<Response> {
        self.client.send(self.patch_request(record)?).await
    }

    pub async fn post(&self, record: &GlideRecord) -> Result<Response> {
        self.client.send(self.post_request(record)?).await
    }

    pub async fn delete(&self, record: &GlideRecord) -> Result<Response> {
        self.client.send(self.delete_request(record)?).await
    }
}

pub(crate) fn params_vec(params: &Params) -> Vec<(&str, &str)> {
    params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect()
}
