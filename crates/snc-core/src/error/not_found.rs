use super::{Error, Payload};

/// HTTP 404, typically from a direct by-id lookup.
#[derive(Debug)]
pub(super) struct NotFoundError {
    pub(super) payload: Payload,
}

impl std::error::Error for NotFoundError {}

impl core::fmt::Display for NotFoundError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "not found: {}", self.payload)
    }
}

impl Error {
    pub fn not_found(payload: impl Into<Payload>) -> Error {
        Error::from(super::ErrorKind::NotFound(NotFoundError {
            payload: payload.into(),
        }))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::NotFound(_))
    }
}
