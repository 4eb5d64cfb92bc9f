use crate::{
    api::Params,
    record::window::{read_record, Paged, Window},
    Result, ServiceNowClient,
};

use serde_json::Value;
use snc_core::{async_trait, query::QueryCondition, Error, GlideElement, Query, Row, PRIMARY_KEY};

use std::path::{Path, PathBuf};

static NULL: Value = Value::Null;

/// A cursor over the attachments of one table.
///
/// Every query is implicitly restricted to `table_name=<table>`. Rows are
/// attachment metadata; the content is fetched on demand with
/// [`read`](Attachment::read) or [`write_to`](Attachment::write_to).
pub struct Attachment {
    client: ServiceNowClient,
    table: String,
    query: Query,
    encoded_query: Option<String>,
    window: Window,
}

impl Attachment {
    pub(crate) fn new(client: ServiceNowClient, table: impl Into<String>) -> Self {
        let table = table.into();
        let mut query = Query::new(table.clone());
        query.add_query("table_name", table.clone());

        let window = Window::new(client.batch_size(), true);
        Self {
            client,
            table,
            query,
            encoded_query: None,
            window,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn parameters(&self) -> Params {
        let mut params = Params::new();
        params.insert(
            "sysparm_query".into(),
            self.query.generate_query(
                self.encoded_query.as_deref(),
                Some(&format!("ORDERBY{PRIMARY_KEY}")),
            ),
        );
        params.insert(
            "sysparm_limit".into(),
            self.window.sysparm_limit().to_string(),
        );
        params.insert(
            "sysparm_offset".into(),
            self.window.sysparm_offset().to_string(),
        );
        params
    }

    pub fn add_query(&mut self, field: impl Into<String>, value: impl Into<String>) -> &mut QueryCondition {
        self.query.add_query(field, value)
    }

    pub fn add_query_with(
        &mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut QueryCondition {
        self.query.add_query_with(field, operator, value)
    }

    pub fn add_encoded_query(&mut self, encoded_query: impl Into<String>) {
        self.encoded_query = Some(encoded_query.into());
    }

    /// Cap the number of attachments returned. 0 removes the cap.
    pub fn set_limit(&mut self, limit: usize) {
        self.window.set_limit(Some(limit));
    }

    pub fn get_row_count(&self) -> usize {
        self.window.total().unwrap_or(0)
    }

    /// Run the query from the first page.
    pub async fn query(&mut self) -> Result<()> {
        self.window.reset();
        self.fetch().await
    }

    async fn fetch(&mut self) -> Result<()> {
        if self.window.limit_reached() {
            return Ok(());
        }
        let response = self.client.attachment_api().list(self).await?;
        self.window.load(&response)?;
        Ok(())
    }

    /// Fetch one attachment's metadata. `false` if it does not exist.
    pub async fn get(&mut self, sys_id: &str) -> Result<bool> {
        let response = match self.client.attachment_api().get(sys_id).await {
            Ok(response) => response,
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(err),
        };
        self.window.replace(read_record(&response)?);
        Ok(true)
    }

    pub async fn next(&mut self) -> Result<bool> {
        self.advance_row(false).await
    }

    pub fn has_next(&self) -> bool {
        self.window.has_next()
    }

    /// Walk the attachments from the start.
    pub fn iter(&mut self) -> AttachmentIter<'_> {
        self.window.rewind();
        AttachmentIter { attachment: self }
    }

    fn require_current(&self) -> Result<&Row> {
        self.window
            .current()
            .ok_or_else(|| Error::no_record("cannot read nothing, iterate the attachment first"))
    }

    pub fn row(&self) -> Option<&Row> {
        self.window.current()
    }

    pub fn get_value(&self, field: &str) -> Result<&Value> {
        Ok(self
            .require_current()?
            .get(field)
            .map_or(&NULL, GlideElement::get_value))
    }

    pub fn get_display_value(&self, field: &str) -> Result<&Value> {
        Ok(self
            .require_current()?
            .get(field)
            .map_or(&NULL, GlideElement::get_display_value))
    }

    pub fn element(&self, field: &str) -> Option<&GlideElement> {
        self.window.current().and_then(|row| row.get(field))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.window
            .current()
            .is_some_and(|row| row.contains(field))
    }

    pub fn sys_id(&self) -> Option<&str> {
        self.window.current().and_then(Row::sys_id)
    }

    pub fn file_name(&self) -> Option<&str> {
        self.element("file_name").and_then(GlideElement::as_str)
    }

    fn require_sys_id(&self) -> Result<&str> {
        self.require_current()?;
        self.sys_id()
            .ok_or_else(|| Error::invalid_response("attachment has no sys_id"))
    }

    /// The whole content of the current attachment.
    pub async fn read(&self) -> Result<Vec<u8>> {
        let sys_id = self.require_sys_id()?;
        let response = self.client.attachment_api().get_file(sys_id).await?;
        Ok(response.into_bytes())
    }

    /// The content decoded as UTF-8 and split on `delimiter`.
    pub async fn readlines(&self, delimiter: &str) -> Result<Vec<String>> {
        let content = self.read().await?;
        Ok(String::from_utf8_lossy(&content)
            .split(delimiter)
            .map(str::to_string)
            .collect())
    }

    /// Save the content to `path`. A directory path gets the attachment's
    /// file name appended. Returns the path written.
    pub async fn write_to(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let mut path = path.as_ref().to_path_buf();
        if tokio::fs::metadata(&path)
            .await
            .is_ok_and(|metadata| metadata.is_dir())
        {
            let Some(file_name) = self.file_name() else {
                return Err(Error::invalid_response("attachment has no file_name"));
            };
            path.push(file_name);
        }

        let content = self.read().await?;
        tokio::fs::write(&path, content).await?;
        tracing::debug!(path = %path.display(), "wrote attachment");
        Ok(path)
    }

    /// Upload `content` as an attachment of `table_sys_id`. Returns the
    /// attachment URL from the `Location` header.
    pub async fn add_attachment(
        &self,
        table_sys_id: &str,
        file_name: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String> {
        let response = self
            .client
            .attachment_api()
            .upload_file(file_name, &self.table, table_sys_id, content, content_type, None)
            .await?;

        match response.header("Location") {
            Some(location) => Ok(location.to_string()),
            None => Err(Error::invalid_response("upload response has no Location header")),
        }
    }

    /// Delete the current attachment.
    pub async fn delete(&mut self) -> Result<()> {
        let sys_id = self.require_sys_id()?.to_string();
        let response = self.client.attachment_api().delete(&sys_id).await?;
        if response.status() != 204 {
            return Err(Error::request_with_status(
                response.status(),
                response.text().into_owned(),
            ));
        }
        self.window.clear_current();
        Ok(())
    }

    /// Download URL of the current attachment.
    pub fn get_link(&self) -> Option<String> {
        self.sys_id().map(|sys_id| {
            format!(
                "{}/api/now/v1/attachment/{sys_id}/file",
                self.client.instance()
            )
        })
    }
}

#[async_trait]
impl Paged for Attachment {
    fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    async fn fetch_page(&mut self) -> Result<()> {
        self.fetch().await
    }
}

impl core::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("Attachment")
            .field("table", &self.table)
            .field("location", &self.window.location())
            .field("total", &self.window.total())
            .finish()
    }
}

/// Iterator-style traversal of an [`Attachment`] cursor.
pub struct AttachmentIter<'a> {
    attachment: &'a mut Attachment,
}

impl AttachmentIter<'_> {
    #[allow(clippy::should_implement_trait)]
    pub async fn next(&mut self) -> Option<Result<&mut Attachment>> {
        match self.attachment.next().await {
            Ok(true) => Some(Ok(&mut *self.attachment)),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
