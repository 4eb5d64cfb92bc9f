use super::Error;

/// Local misuse: a field or record operation while the cursor has no current
/// row (never advanced, exhausted, or the row was deleted).
#[derive(Debug)]
pub(super) struct NoRecordError {
    message: Box<str>,
}

impl std::error::Error for NoRecordError {}

impl core::fmt::Display for NoRecordError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "no current record: {}", self.message)
    }
}

impl Error {
    pub fn no_record(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::NoRecord(NoRecordError {
            message: message.into().into(),
        }))
    }

    pub fn is_no_record(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::NoRecord(_))
    }
}
