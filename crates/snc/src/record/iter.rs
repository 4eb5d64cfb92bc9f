use super::GlideRecord;
use crate::Result;

/// Iterator-style traversal of a [`GlideRecord`], fetching pages as needed.
///
/// Each step yields the cursor itself, positioned on the next row. On a
/// non-rewindable cursor the row left behind is dropped from memory.
///
/// ```ignore
/// let mut rows = gr.iter();
/// while let Some(record) = rows.next().await {
///     let record = record?;
///     println!("{}", record.get_value("number")?);
/// }
/// ```
pub struct RecordIter<'a> {
    record: &'a mut GlideRecord,
}

impl<'a> RecordIter<'a> {
    pub(super) fn new(record: &'a mut GlideRecord) -> Self {
        Self { record }
    }

    #[allow(clippy::should_implement_trait)]
    pub async fn next(&mut self) -> Option<Result<&mut GlideRecord>> {
        match self.record.advance(true).await {
            Ok(true) => Some(Ok(&mut *self.record)),
            Ok(false) => None,
            Err(err) => Some(Err(err)),
        }
    }
}
