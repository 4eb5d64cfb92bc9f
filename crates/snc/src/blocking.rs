//! Blocking wrappers around the async cursors.
//!
//! Each blocking client owns a current-thread tokio runtime and drives the
//! async API to completion on it. The wrappers deref to their async
//! counterparts, so every non-async method is available unchanged.
//!
//! Do not use this module from inside an async runtime; blocking on a
//! future there panics.
//!
//! ```ignore
//! let client = snc::blocking::ServiceNowClient::new("dev0000", transport)?;
//! let mut gr = client.glide_record("incident");
//! gr.add_active_query();
//! gr.query()?;
//! while gr.next()? {
//!     println!("{}", gr.get_value("number")?);
//! }
//! ```

use crate::{Query, Result, Row, SerializeOptions, Transport};

use serde_json::{Map, Value};
use snc_core::transport::Response;
use tokio::runtime::Runtime;

use std::{
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
    sync::Arc,
};

fn runtime() -> Result<Arc<Runtime>> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(Arc::new(runtime))
}

/// Blocking [`crate::ServiceNowClient`].
#[derive(Debug, Clone)]
pub struct ServiceNowClient {
    inner: crate::ServiceNowClient,
    runtime: Arc<Runtime>,
}

impl ServiceNowClient {
    pub fn new(instance: &str, transport: impl Transport) -> Result<Self> {
        Self::from_async(crate::ServiceNowClient::new(instance, transport)?)
    }

    /// Wrap an async client, e.g. one made with [`crate::Builder`].
    pub fn from_async(inner: crate::ServiceNowClient) -> Result<Self> {
        Ok(Self {
            inner,
            runtime: runtime()?,
        })
    }

    pub fn glide_record(&self, table: impl Into<String>) -> GlideRecord {
        self.wrap(self.inner.glide_record(table))
    }

    pub fn glide_record_with(
        &self,
        table: impl Into<String>,
        batch_size: usize,
        rewindable: bool,
    ) -> GlideRecord {
        self.wrap(self.inner.glide_record_with(table, batch_size, rewindable))
    }

    pub fn attachment(&self, table: impl Into<String>) -> Attachment {
        Attachment {
            inner: self.inner.attachment(table),
            runtime: self.runtime.clone(),
        }
    }

    /// Send one raw request.
    pub fn send(&self, request: crate::Request) -> Result<Response> {
        self.runtime.block_on(self.inner.send(request))
    }

    fn wrap(&self, inner: crate::GlideRecord) -> GlideRecord {
        GlideRecord {
            inner,
            runtime: self.runtime.clone(),
        }
    }
}

impl Deref for ServiceNowClient {
    type Target = crate::ServiceNowClient;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Blocking [`crate::GlideRecord`].
pub struct GlideRecord {
    inner: crate::GlideRecord,
    runtime: Arc<Runtime>,
}

impl GlideRecord {
    pub fn into_async(self) -> crate::GlideRecord {
        self.inner
    }

    pub fn query(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.query())
    }

    pub fn query_with(&mut self, query: Query) -> Result<()> {
        self.runtime.block_on(self.inner.query_with(query))
    }

    pub fn next(&mut self) -> Result<bool> {
        self.runtime.block_on(self.inner.next())
    }

    pub fn get(&mut self, sys_id: &str) -> Result<bool> {
        self.runtime.block_on(self.inner.get(sys_id))
    }

    pub fn get_by(&mut self, field: &str, value: &str) -> Result<bool> {
        self.runtime.block_on(self.inner.get_by(field, value))
    }

    pub fn insert(&mut self) -> Result<Option<String>> {
        self.runtime.block_on(self.inner.insert())
    }

    pub fn update(&mut self) -> Result<Option<String>> {
        self.runtime.block_on(self.inner.update())
    }

    pub fn delete(&mut self) -> Result<bool> {
        self.runtime.block_on(self.inner.delete())
    }

    pub fn delete_multiple(&mut self) -> Result<bool> {
        self.runtime.block_on(self.inner.delete_multiple())
    }

    pub fn update_multiple(&mut self) -> Result<bool> {
        self.runtime.block_on(self.inner.update_multiple())
    }

    pub fn serialize_all(&mut self, options: &SerializeOptions) -> Result<Vec<Map<String, Value>>> {
        self.runtime.block_on(self.inner.serialize_all(options))
    }

    pub fn get_attachments(&self) -> Result<Attachment> {
        let inner = self.runtime.block_on(self.inner.get_attachments())?;
        Ok(Attachment {
            inner,
            runtime: self.runtime.clone(),
        })
    }

    pub fn add_attachment(
        &self,
        file_name: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String> {
        self.runtime
            .block_on(self.inner.add_attachment(file_name, content, content_type))
    }

    /// Copies of the rows, from the start if the cursor is rewindable.
    pub fn rows(&mut self) -> Result<Rows<'_>> {
        if self.inner.is_rewindable() {
            self.inner.rewind()?;
        }
        Ok(Rows { record: self })
    }
}

impl Deref for GlideRecord {
    type Target = crate::GlideRecord;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for GlideRecord {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}

impl core::fmt::Debug for GlideRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        core::fmt::Debug::fmt(&self.inner, f)
    }
}

impl core::fmt::Display for GlideRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.inner, f)
    }
}

/// Iterator returned by [`GlideRecord::rows`].
pub struct Rows<'a> {
    record: &'a mut GlideRecord,
}

impl Iterator for Rows<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Result<Row>> {
        let GlideRecord { inner, runtime } = &mut *self.record;
        match runtime.block_on(inner.advance(true)) {
            Ok(true) => inner.row().cloned().map(Ok),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}

/// Blocking [`crate::Attachment`].
#[derive(Debug)]
pub struct Attachment {
    inner: crate::Attachment,
    runtime: Arc<Runtime>,
}

impl Attachment {
    pub fn query(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.query())
    }

    pub fn get(&mut self, sys_id: &str) -> Result<bool> {
        self.runtime.block_on(self.inner.get(sys_id))
    }

    pub fn next(&mut self) -> Result<bool> {
        self.runtime.block_on(self.inner.next())
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        self.runtime.block_on(self.inner.read())
    }

    pub fn readlines(&self, delimiter: &str) -> Result<Vec<String>> {
        self.runtime.block_on(self.inner.readlines(delimiter))
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        self.runtime.block_on(self.inner.write_to(path))
    }

    pub fn add_attachment(
        &self,
        table_sys_id: &str,
        file_name: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String> {
        self.runtime.block_on(
            self.inner
                .add_attachment(table_sys_id, file_name, content, content_type),
        )
    }

    pub fn delete(&mut self) -> Result<()> {
        self.runtime.block_on(self.inner.delete())
    }
}

impl Deref for Attachment {
    type Target = crate::Attachment;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for Attachment {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.inner
    }
}
