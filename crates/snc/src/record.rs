mod iter;
pub use iter::RecordIter;

pub(crate) mod window;
use window::{read_record, Paged, Window};

use crate::{
    api::{params_len, Params},
    Attachment, Result, ServiceNowClient,
};

use serde_json::{Map, Value};
use snc_core::{
    async_trait, err,
    query::{JoinQuery, QueryCondition, RelatedListQuery},
    transport::Response,
    DisplayValue, Error, GlideElement, Query, Row, SerializeOptions, PRIMARY_KEY,
};
use tokio::sync::oneshot;
use tokio_stream::Stream;

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

static NULL: Value = Value::Null;

/// A cursor over one ServiceNow table.
///
/// Holds the query, the paginated result window and the current row. Rows
/// are fetched `batch_size` at a time as the cursor advances. Field access
/// and mutation act on the current row; `insert`, `update` and `delete`
/// write it back.
///
/// A non-rewindable cursor drops rows as iteration passes them and refuses
/// to `rewind` or re-`query` once iteration has started.
pub struct GlideRecord {
    client: ServiceNowClient,
    table: String,
    query: Query,
    encoded_query: Option<String>,
    fields: Option<Vec<String>>,
    view: Option<String>,
    order: Option<String>,
    display_value: DisplayValue,
    exclude_reference_link: bool,
    is_new_record: bool,
    window: Window,
}

/// Field lists accepted by [`GlideRecord::set_fields`]: a CSV string or a
/// list of names.
pub trait IntoFields {
    fn into_fields(self) -> Vec<String>;
}

impl IntoFields for &str {
    fn into_fields(self) -> Vec<String> {
        self.split(',')
            .map(str::trim)
            .filter(|field| !field.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl IntoFields for String {
    fn into_fields(self) -> Vec<String> {
        self.as_str().into_fields()
    }
}

impl IntoFields for Vec<String> {
    fn into_fields(self) -> Vec<String> {
        self
    }
}

impl IntoFields for Vec<&str> {
    fn into_fields(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl IntoFields for &[&str] {
    fn into_fields(self) -> Vec<String> {
        self.iter().map(|field| field.to_string()).collect()
    }
}

impl<const N: usize> IntoFields for [&str; N] {
    fn into_fields(self) -> Vec<String> {
        self.into_iter().map(str::to_string).collect()
    }
}

impl GlideRecord {
    pub(crate) fn new(
        client: ServiceNowClient,
        table: impl Into<String>,
        batch_size: usize,
        rewindable: bool,
    ) -> Self {
        let table = table.into();
        Self {
            client,
            query: Query::new(table.clone()),
            table,
            encoded_query: None,
            fields: None,
            view: None,
            order: Some(format!("ORDERBY{PRIMARY_KEY}")),
            display_value: DisplayValue::Both,
            exclude_reference_link: true,
            is_new_record: false,
            window: Window::new(batch_size, rewindable),
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn client(&self) -> &ServiceNowClient {
        &self.client
    }

    /// Query string parameters for the next page fetch.
    pub fn parameters(&self) -> Params {
        let mut params = Params::new();
        params.insert("sysparm_query".into(), self.get_encoded_query());

        if let Some(fields) = self.fields.as_ref().filter(|fields| !fields.is_empty()) {
            let mut fields = fields.clone();
            if !fields.iter().any(|field| field == PRIMARY_KEY) {
                fields.insert(0, PRIMARY_KEY.to_string());
            }
            params.insert("sysparm_fields".into(), fields.join(","));
        }

        if let Some(view) = &self.view {
            params.insert("sysparm_view".into(), view.clone());
        }

        params.insert(
            "sysparm_display_value".into(),
            self.display_value.as_param().into(),
        );
        params.insert(
            "sysparm_exclude_reference_link".into(),
            self.exclude_reference_link.to_string(),
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

    /// Total rows the server reported for the query, 0 before any fetch.
    pub fn get_row_count(&self) -> usize {
        self.window.total().unwrap_or(0)
    }

    /// Index of the current row, -1 before iteration starts.
    pub fn location(&self) -> isize {
        self.window.location()
    }

    pub fn set_location(&mut self, location: isize) -> Result<()> {
        self.window.set_location(location)
    }

    /// The requested fields, or else the fields of the current (or first)
    /// row.
    pub fn fields(&self) -> Vec<String> {
        if let Some(fields) = &self.fields {
            return fields.clone();
        }
        self.window
            .current()
            .or_else(|| self.window.first())
            .map(|row| row.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Restrict the fields returned by the server. `sys_id` is always
    /// requested as well.
    pub fn set_fields(&mut self, fields: impl IntoFields) {
        let fields = fields.into_fields();
        self.fields = if fields.is_empty() { None } else { Some(fields) };
    }

    pub fn view(&self) -> Option<&str> {
        self.view.as_deref()
    }

    pub fn set_view(&mut self, view: impl Into<String>) {
        self.view = Some(view.into());
    }

    pub fn limit(&self) -> Option<usize> {
        self.window.limit()
    }

    /// Cap the number of rows the query returns. 0 removes the cap.
    pub fn set_limit(&mut self, limit: usize) {
        self.window.set_limit(Some(limit));
    }

    pub fn batch_size(&self) -> usize {
        self.window.batch_size()
    }

    pub fn set_batch_size(&mut self, batch_size: usize) {
        self.window.set_batch_size(batch_size);
    }

    pub fn display_value_mode(&self) -> DisplayValue {
        self.display_value
    }

    /// What the server sends for each field: value, display value, or both.
    pub fn set_display_value_mode(&mut self, display_value: DisplayValue) {
        self.display_value = display_value;
    }

    pub fn exclude_reference_link(&self) -> bool {
        self.exclude_reference_link
    }

    pub fn set_exclude_reference_link(&mut self, exclude: bool) {
        self.exclude_reference_link = exclude;
    }

    pub fn is_rewindable(&self) -> bool {
        self.window.is_rewindable()
    }

    /// Sort ascending by `column`. An empty column removes the sort.
    pub fn order_by(&mut self, column: &str) {
        self.order = (!column.is_empty()).then(|| format!("ORDERBY{column}"));
    }

    pub fn order_by_desc(&mut self, column: &str) {
        self.order = (!column.is_empty()).then(|| format!("ORDERBYDESC{column}"));
    }

    /// A new cursor holding a copy of the current row only.
    pub fn pop_record(&self) -> Result<GlideRecord> {
        let row = self.require_current()?.clone();
        let mut record = GlideRecord::new(
            self.client.clone(),
            self.table.clone(),
            self.window.batch_size(),
            true,
        );
        record.window.replace(row);
        Ok(record)
    }

    /// Start a new, empty record to be filled in and inserted.
    pub fn initialize(&mut self) {
        self.window.replace(Row::new());
        self.is_new_record = true;
    }

    pub fn is_new_record(&self) -> bool {
        self.is_new_record
    }

    /// Set the `sys_id` of a new record. Must be 32 characters.
    pub fn set_new_guid_value(&mut self, value: &str) -> Result<()> {
        if value.chars().count() != 32 {
            return Err(err!("GUID must be a 32 character string, got {value:?}"));
        }
        self.set_value(PRIMARY_KEY, value)
    }

    /// A random 32 character hex GUID.
    pub fn new_guid() -> String {
        uuid::Uuid::new_v4().simple().to_string()
    }

    /// Move back before the first row so the rows can be walked again.
    pub fn rewind(&mut self) -> Result<()> {
        if !self.window.is_rewindable() {
            return Err(Error::not_rewindable("rewind"));
        }
        self.window.rewind();
        Ok(())
    }

    /// Whether any field of the current row changed.
    pub fn changes(&self) -> bool {
        self.window.current().is_some_and(Row::changes)
    }

    /// Run the query from the first page.
    pub async fn query(&mut self) -> Result<()> {
        self.check_requery()?;
        self.window.reset();
        self.is_new_record = false;
        self.do_query().await
    }

    /// Run `query` instead of the cursor's own conditions, once.
    pub async fn query_with(&mut self, query: Query) -> Result<()> {
        self.check_requery()?;
        self.window.reset();
        self.is_new_record = false;

        let stored = std::mem::replace(&mut self.query, query);
        let result = self.do_query().await;
        self.query = stored;
        result
    }

    fn check_requery(&self) -> Result<()> {
        if !self.window.is_rewindable() && self.window.location() >= 0 {
            return Err(Error::not_rewindable("query"));
        }
        Ok(())
    }

    /// Fetch the next page and append it to the window.
    async fn do_query(&mut self) -> Result<()> {
        if self.window.limit_reached() {
            return Ok(());
        }

        let params = self.parameters();
        let length = params_len(&params);

        let response = if length > self.client.batch_query_threshold() {
            tracing::debug!(
                table = %self.table,
                length,
                "query too long for a GET, sending it through the batch API"
            );
            self.batched_list().await?
        } else {
            self.client
                .table_api()
                .list(self)
                .await
                .map_err(|err| self.explain(err))?
        };

        self.window.load(&response)?;
        Ok(())
    }

    async fn batched_list(&self) -> Result<Response> {
        let (tx, rx) = oneshot::channel();

        let mut batch = self.client.batch_api();
        batch.list(self, move |response| {
            let _ = tx.send(response);
        })?;
        batch.execute().await?;

        match rx.await {
            Ok(Some(response)) => Ok(response),
            _ => Err(Error::request(format!(
                "batched query against {} was not serviced",
                self.table
            ))),
        }
    }

    fn explain(&self, err: Error) -> Error {
        let cancelled = err.payload().is_some_and(|payload| {
            payload
                .message()
                .contains(crate::api::MAX_EXECUTION_TIME_EXCEEDED)
        });
        if cancelled {
            self.window.execution_time_exceeded()
        } else {
            err
        }
    }

    /// Move to the next row, fetching a page if the window is used up.
    pub async fn next(&mut self) -> Result<bool> {
        self.advance(false).await
    }

    pub(crate) async fn advance(&mut self, evict: bool) -> Result<bool> {
        self.advance_row(evict).await
    }

    /// Whether another row is available, in memory or on the server. Never
    /// fetches.
    pub fn has_next(&self) -> bool {
        self.window.has_next()
    }

    /// Walk the rows from the start (rewindable) or from the current row
    /// (non-rewindable).
    pub fn iter(&mut self) -> RecordIter<'_> {
        if self.window.is_rewindable() {
            self.window.rewind();
        }
        RecordIter::new(self)
    }

    /// Consume the cursor into a stream of detached rows.
    pub fn into_stream(self) -> impl Stream<Item = Result<Row>> + Send {
        let mut record = self;
        if record.window.is_rewindable() {
            record.window.rewind();
        }

        async_stream::try_stream! {
            while record.advance(true).await? {
                if let Some(row) = record.window.current() {
                    yield row.clone();
                }
            }
        }
    }

    /// Fetch one record by `sys_id`. `false` if it does not exist.
    pub async fn get(&mut self, sys_id: &str) -> Result<bool> {
        let response = match self.client.table_api().get(self, sys_id).await {
            Ok(response) => response,
            Err(err) if err.is_not_found() => return Ok(false),
            Err(err) => return Err(err),
        };

        let row = read_record(&response)?;
        self.is_new_record = false;
        self.window.replace(row);
        Ok(true)
    }

    /// Fetch the first record where `field` equals `value`.
    pub async fn get_by(&mut self, field: &str, value: &str) -> Result<bool> {
        self.check_requery()?;
        self.add_query(field, value);
        self.window.reset();
        self.is_new_record = false;
        self.do_query().await?;
        self.next().await
    }

    /// Insert the current row. Returns the new `sys_id`.
    pub async fn insert(&mut self) -> Result<Option<String>> {
        let response = self.client.table_api().post(self).await?;
        match response.status() {
            201 => {
                let row = read_record(&response)?;
                self.window.replace(row);
                self.is_new_record = false;
                Ok(self.sys_id().map(str::to_string))
            }
            401 => Err(Error::authentication(response.payload())),
            status => Err(Error::insert(status, response.payload())),
        }
    }

    /// Send the changed fields of the current row. The server's copy of the
    /// row replaces the local one.
    pub async fn update(&mut self) -> Result<Option<String>> {
        let response = self.client.table_api().put(self).await?;
        match response.status() {
            200 => {
                let row = read_record(&response)?;
                if !self.window.set_current(row) {
                    return Ok(None);
                }
                Ok(self.sys_id().map(str::to_string))
            }
            401 => Err(Error::authentication(response.payload())),
            status => Err(Error::update(status, response.payload())),
        }
    }

    /// Delete the current row. The slot is cleared.
    pub async fn delete(&mut self) -> Result<bool> {
        let response = self.client.table_api().delete(self).await?;
        match response.status() {
            204 => {
                self.window.clear_current();
                Ok(true)
            }
            401 => Err(Error::authentication(response.payload())),
            status => Err(Error::delete(status, response.payload())),
        }
    }

    /// Delete every row of the query in one batch. `false` if any delete
    /// failed or went unserviced.
    pub async fn delete_multiple(&mut self) -> Result<bool> {
        let deleted = Arc::new(AtomicBool::new(true));
        let flag = deleted.clone();
        self.delete_multiple_with(move |response| {
            if !response.is_some_and(|response| response.status() == 204) {
                flag.store(false, Ordering::Relaxed);
            }
        })
        .await?;
        Ok(deleted.load(Ordering::Relaxed))
    }

    /// Like [`delete_multiple`](Self::delete_multiple), reporting each
    /// response to `handler` instead.
    pub async fn delete_multiple_with<F>(&mut self, handler: F) -> Result<()>
    where
        F: Fn(Option<Response>) + Send + Sync + 'static,
    {
        if self.window.total().is_none() {
            if self.fields.is_none() {
                self.fields = Some(vec![PRIMARY_KEY.to_string()]);
            }
            self.do_query().await?;
        }

        let handler = Arc::new(handler);
        let mut batch = self.client.batch_api();

        let mut rows = self.iter();
        while let Some(record) = rows.next().await {
            let record = record?;
            let handler = handler.clone();
            batch.delete(record, move |response| handler(response))?;
        }

        batch.execute().await
    }

    /// Update every changed row in one batch. `false` if any update failed
    /// or went unserviced.
    pub async fn update_multiple(&mut self) -> Result<bool> {
        let updated = Arc::new(AtomicBool::new(true));
        let flag = updated.clone();
        self.update_multiple_with(move |response| {
            if !response.is_some_and(|response| response.status() == 200) {
                flag.store(false, Ordering::Relaxed);
            }
        })
        .await?;
        Ok(updated.load(Ordering::Relaxed))
    }

    /// Like [`update_multiple`](Self::update_multiple), reporting each
    /// response to `handler` instead.
    pub async fn update_multiple_with<F>(&mut self, handler: F) -> Result<()>
    where
        F: Fn(Option<Response>) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        let mut batch = self.client.batch_api();

        let mut rows = self.iter();
        while let Some(record) = rows.next().await {
            let record = record?;
            if record.changes() {
                let handler = handler.clone();
                batch.patch(record, move |response| handler(response))?;
            }
        }

        batch.execute().await
    }

    fn require_current(&self) -> Result<&Row> {
        self.window.current().ok_or_else(no_current_row)
    }

    fn require_current_mut(&mut self) -> Result<&mut Row> {
        self.window.current_mut().ok_or_else(no_current_row)
    }

    /// The `sys_id` of the current row, required for `operation`.
    pub(crate) fn require_sys_id(&self, operation: &str) -> Result<&str> {
        let row = self
            .window
            .current()
            .ok_or_else(|| Error::no_record(format!("cannot {operation} nothing")))?;
        row.sys_id()
            .filter(|sys_id| !sys_id.is_empty())
            .ok_or_else(|| err!("cannot {operation} a {} record without a sys_id", self.table))
    }

    pub fn sys_id(&self) -> Option<&str> {
        self.window.current().and_then(Row::sys_id)
    }

    /// The value of `field`, or null when the row does not have it.
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

    /// The cell for `field`, created empty if the row does not have it.
    pub fn get_element(&mut self, field: &str) -> Result<&mut GlideElement> {
        Ok(self.require_current_mut()?.element_mut(field))
    }

    /// The cell for `field` or a dot-walked path such as
    /// `caller_id.email`, if fetched.
    pub fn element(&self, path: &str) -> Result<Option<&GlideElement>> {
        Ok(self.require_current()?.resolve(path))
    }

    /// The current row.
    pub fn row(&self) -> Option<&Row> {
        self.window.current()
    }

    pub fn set_value(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let track_new = !self.is_new_record;
        self.require_current_mut()?
            .set_value(field, value, track_new);
        Ok(())
    }

    pub fn set_display_value(&mut self, field: &str, value: impl Into<Value>) -> Result<()> {
        let track_new = !self.is_new_record;
        self.require_current_mut()?
            .set_display_value(field, value, track_new);
        Ok(())
    }

    pub fn set_link(&mut self, field: &str, link: impl Into<String>) -> Result<()> {
        self.get_element(field)?.set_link(link);
        Ok(())
    }

    pub fn contains(&self, field: &str) -> bool {
        self.window
            .current()
            .is_some_and(|row| row.contains(field))
    }

    pub fn get_unique_name(&self) -> Result<&Value> {
        self.get_value(PRIMARY_KEY)
    }

    /// URL of the current record's form, `sys_id=-1` without one.
    pub fn get_link(&self, no_stack: bool) -> String {
        let stack = if no_stack {
            String::new()
        } else {
            format!(
                "&sysparm_stack={}_list.do?sysparm_query=active=true",
                self.table
            )
        };
        let sys_id = self.sys_id().unwrap_or("-1");
        format!(
            "{}/{}.do?sys_id={sys_id}{stack}",
            self.client.instance(),
            self.table
        )
    }

    /// URL of the list view for the current query.
    pub fn get_link_list(&self) -> Result<String> {
        let mut url = self.client.url(&format!("/{}_list.do", self.table))?;
        url.query_pairs_mut()
            .append_pair("sysparm_query", &self.get_encoded_query());
        Ok(url.to_string())
    }

    /// The rendered `sysparm_query`, sort clause included.
    pub fn get_encoded_query(&self) -> String {
        self.query
            .generate_query(self.encoded_query.as_deref(), self.order.as_deref())
    }

    /// `field=value`
    pub fn add_query(&mut self, field: impl Into<String>, value: impl Into<String>) -> &mut QueryCondition {
        self.query.add_query(field, value)
    }

    /// `field<operator>value`, e.g. `("short_description", "LIKE", "network")`.
    pub fn add_query_with(
        &mut self,
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> &mut QueryCondition {
        self.query.add_query_with(field, operator, value)
    }

    pub fn add_active_query(&mut self) -> &mut QueryCondition {
        self.query.add_active_query()
    }

    pub fn add_null_query(&mut self, field: impl Into<String>) -> &mut QueryCondition {
        self.query.add_null_query(field)
    }

    pub fn add_not_null_query(&mut self, field: impl Into<String>) -> &mut QueryCondition {
        self.query.add_not_null_query(field)
    }

    pub fn add_join_query(
        &mut self,
        join_table: impl Into<String>,
        primary_field: Option<&str>,
        join_table_field: Option<&str>,
    ) -> &mut JoinQuery {
        self.query
            .add_join_query(join_table, primary_field, join_table_field)
    }

    pub fn add_rl_query(
        &mut self,
        related_table: impl Into<String>,
        related_field: impl Into<String>,
        count_condition: impl Into<String>,
        stop_at_relationship: bool,
    ) -> &mut RelatedListQuery {
        self.query.add_rl_query(
            related_table,
            related_field,
            count_condition,
            stop_at_relationship,
        )
    }

    /// A raw encoded query, rendered after all other conditions.
    pub fn add_encoded_query(&mut self, encoded_query: impl Into<String>) {
        self.encoded_query = Some(encoded_query.into());
    }

    /// The current row as JSON, `None` without one.
    pub fn serialize(&self, options: &SerializeOptions) -> Option<Map<String, Value>> {
        self.window.current().map(|row| row.serialize(options))
    }

    /// Serialize every row of the query.
    pub async fn serialize_all(&mut self, options: &SerializeOptions) -> Result<Vec<Map<String, Value>>> {
        let mut out = vec![];
        let mut rows = self.iter();
        while let Some(record) = rows.next().await {
            out.extend(record?.serialize(options));
        }
        Ok(out)
    }

    /// Attachments of the current record, or of the whole table without one.
    pub async fn get_attachments(&self) -> Result<Attachment> {
        let mut attachment = self.client.attachment(self.table.clone());
        if let Some(sys_id) = self.sys_id() {
            attachment.add_query("table_sys_id", sys_id);
        }
        attachment.query().await?;
        Ok(attachment)
    }

    /// Attach `content` to the current record. Returns the attachment URL.
    pub async fn add_attachment(
        &self,
        file_name: &str,
        content: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<String> {
        let sys_id = self.require_sys_id("attach to")?;
        self.client
            .attachment(self.table.clone())
            .add_attachment(sys_id, file_name, content, content_type)
            .await
    }
}

fn no_current_row() -> Error {
    Error::no_record("cannot get a value from nothing, did you forget to call next() or initialize()?")
}

impl core::fmt::Display for GlideRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.serialize(&SerializeOptions::default()) {
            Some(row) => write!(f, "{}({})", self.table, Value::Object(row)),
            None => write!(f, "{}()", self.table),
        }
    }
}

impl core::fmt::Debug for GlideRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("GlideRecord")
            .field("table", &self.table)
            .field("query", &self.get_encoded_query())
            .field("location", &self.window.location())
            .field("total", &self.window.total())
            .field("rewindable", &self.window.is_rewindable())
            .finish()
    }
}

#[async_trait]
impl Paged for GlideRecord {
    fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    async fn fetch_page(&mut self) -> Result<()> {
        self.do_query().await
    }
}
