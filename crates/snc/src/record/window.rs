use crate::api::MAX_EXECUTION_TIME_EXCEEDED;

use serde_json::Value;
use snc_core::{async_trait, err, transport::Response, Error, Result, Row};

/// The in-memory result window and pagination state of a cursor.
///
/// `current` is -1 before the first advance. Consumed rows of a
/// non-rewindable cursor are replaced by `None` so that indices, and with
/// them the offset of the next page, stay tied to `current`.
#[derive(Debug, Clone)]
pub(crate) struct Window {
    results: Vec<Option<Row>>,
    current: isize,
    total: Option<usize>,
    page: isize,
    limit: Option<usize>,
    batch_size: usize,
    rewindable: bool,
}

impl Window {
    pub(crate) fn new(batch_size: usize, rewindable: bool) -> Self {
        Self {
            results: vec![],
            current: -1,
            total: None,
            page: -1,
            limit: None,
            batch_size: batch_size.max(1),
            rewindable,
        }
    }

    /// Forget all rows and pagination progress. Settings are kept.
    pub(crate) fn reset(&mut self) {
        self.results.clear();
        self.current = -1;
        self.total = None;
        self.page = -1;
    }

    /// Make `row` the only row and the current one.
    pub(crate) fn replace(&mut self, row: Row) {
        self.results = vec![Some(row)];
        self.current = 0;
        self.total = Some(1);
    }

    pub(crate) fn current(&self) -> Option<&Row> {
        let index = usize::try_from(self.current).ok()?;
        self.results.get(index)?.as_ref()
    }

    pub(crate) fn current_mut(&mut self) -> Option<&mut Row> {
        let index = usize::try_from(self.current).ok()?;
        self.results.get_mut(index)?.as_mut()
    }

    /// Splice `row` into the current slot. False if there is no slot.
    pub(crate) fn set_current(&mut self, row: Row) -> bool {
        let Ok(index) = usize::try_from(self.current) else {
            return false;
        };
        match self.results.get_mut(index) {
            Some(slot) => {
                *slot = Some(row);
                true
            }
            None => false,
        }
    }

    /// Leave a tombstone in the current slot.
    pub(crate) fn clear_current(&mut self) {
        if let Ok(index) = usize::try_from(self.current) {
            if let Some(slot) = self.results.get_mut(index) {
                *slot = None;
            }
        }
    }

    /// The first row still held in memory.
    pub(crate) fn first(&self) -> Option<&Row> {
        self.results.iter().flatten().next()
    }

    pub(crate) fn location(&self) -> isize {
        self.current
    }

    /// Move onto a row already in the window. Rows the server has not
    /// sent yet cannot be jumped to.
    pub(crate) fn set_location(&mut self, location: isize) -> Result<()> {
        if self.total.is_none() {
            return Err(err!("cannot set a location before the record has been queried"));
        }
        let loaded = self.results.len();
        if location < -1 || location >= loaded as isize {
            return Err(err!("location {location} is outside of the loaded rows -1..{loaded}"));
        }
        if !self.rewindable && location < self.current {
            return Err(Error::not_rewindable("set_location"));
        }
        self.current = location;
        Ok(())
    }

    pub(crate) fn rewind(&mut self) {
        self.current = -1;
    }

    pub(crate) fn total(&self) -> Option<usize> {
        self.total
    }

    pub(crate) fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub(crate) fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit.filter(|limit| *limit > 0);
    }

    pub(crate) fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub(crate) fn set_batch_size(&mut self, batch_size: usize) {
        self.batch_size = batch_size.max(1);
    }

    pub(crate) fn is_rewindable(&self) -> bool {
        self.rewindable
    }

    /// Index of the row after the current one.
    fn next_index(&self) -> usize {
        (self.current + 1) as usize
    }

    /// `sysparm_offset` for the next fetch.
    pub(crate) fn sysparm_offset(&self) -> usize {
        if self.current == -1 {
            0
        } else {
            self.next_index()
        }
    }

    /// `sysparm_limit` for the next fetch: a full batch, or whatever is left
    /// before `limit`.
    pub(crate) fn sysparm_limit(&self) -> usize {
        match self.limit {
            Some(limit) => self
                .batch_size
                .min(limit.saturating_sub(self.sysparm_offset())),
            None => self.batch_size,
        }
    }

    /// Whether the limit has been consumed, so another fetch would ask for
    /// zero rows.
    pub(crate) fn limit_reached(&self) -> bool {
        self.limit
            .is_some_and(|limit| self.sysparm_offset() >= limit)
    }

    fn can_advance(&self) -> bool {
        self.next_index() < self.results.len()
    }

    /// The server holds rows past the window that the limit still allows.
    pub(crate) fn can_fetch(&self) -> bool {
        let next = self.next_index();
        let more_on_server = self
            .total
            .is_some_and(|total| total > 0 && next < total && total > self.results.len());
        let under_limit = self.limit.map_or(true, |limit| next < limit);
        more_on_server && under_limit
    }

    /// Lookahead without fetching.
    pub(crate) fn has_next(&self) -> bool {
        self.can_advance() || self.can_fetch()
    }

    /// Step onto the next materialized row. With `evict` set, a
    /// non-rewindable window drops the row it just left.
    pub(crate) fn advance(&mut self, evict: bool) -> bool {
        if !self.can_advance() {
            return false;
        }

        self.current += 1;
        if evict && !self.rewindable && self.current > 0 {
            self.results[(self.current - 1) as usize] = None;
        }
        true
    }

    /// Append one page of a list response.
    ///
    /// Returns the number of rows read.
    pub(crate) fn load(&mut self, response: &Response) -> Result<usize> {
        match response.status() {
            200 => match read_page(response) {
                Ok((rows, total)) => {
                    let count = rows.len();
                    self.results.extend(rows.into_iter().map(Some));
                    self.page += 1;
                    self.total = Some(total);
                    tracing::debug!(page = self.page, rows = count, total, "loaded page");
                    Ok(count)
                }
                Err(err) => Err(self.page_failed(response, err)),
            },
            401 => Err(Error::authentication(response.payload())),
            status => {
                let err = response.clone().validate().err().unwrap_or_else(|| {
                    Error::invalid_response(format!("unexpected status {status} for a list query"))
                });
                Err(self.page_failed(response, err))
            }
        }
    }

    fn page_failed(&self, response: &Response, err: Error) -> Error {
        if response.text().contains(MAX_EXECUTION_TIME_EXCEEDED) {
            return self.execution_time_exceeded();
        }
        tracing::debug!(status = response.status(), body = %response.text(), "failed to read page");
        err
    }

    /// The server cancelled the query for running too long.
    pub(crate) fn execution_time_exceeded(&self) -> Error {
        Error::request(format!(
            "Maximum execution time exceeded. Lower batch size (< {}).",
            self.batch_size
        ))
    }
}

/// A cursor backed by a [`Window`] that can fetch its next page.
#[async_trait]
pub(crate) trait Paged: Send {
    fn window_mut(&mut self) -> &mut Window;

    /// Fetch the page after the window and append it.
    async fn fetch_page(&mut self) -> Result<()>;

    /// Step onto the next row. At most one page is fetched per call.
    async fn advance_row(&mut self, evict: bool) -> Result<bool> {
        if self.window_mut().advance(evict) {
            return Ok(true);
        }
        if !self.window_mut().can_fetch() {
            return Ok(false);
        }
        self.fetch_page().await?;
        Ok(self.window_mut().advance(evict))
    }
}

fn read_page(response: &Response) -> Result<(Vec<Row>, usize)> {
    let mut body = response.json_value()?;
    let Some(Value::Array(results)) = body.get_mut("result").map(Value::take) else {
        return Err(Error::invalid_response("list response has no `result` array"));
    };

    let rows = results
        .into_iter()
        .map(Row::from_json)
        .collect::<Result<Vec<_>>>()?;

    let Some(total) = response.header("X-Total-Count") else {
        return Err(Error::invalid_response("list response has no X-Total-Count header"));
    };
    let total = total.trim().parse::<usize>().map_err(|e| {
        Error::invalid_response(format!("invalid X-Total-Count {total:?}: {e}"))
    })?;

    Ok((rows, total))
}

/// Read the single `result` object of a get/insert/update response.
pub(crate) fn read_record(response: &Response) -> Result<Row> {
    let mut body = response.json_value()?;
    match body.get_mut("result").map(Value::take) {
        Some(result) => Row::from_json(result),
        None => Err(Error::invalid_response("response has no `result` object")),
    }
}
