use super::{Error, Payload};

/// Any other failed request: a `>= 400` status that is not 401/403/404, a
/// non-JSON error body, or a transaction the instance cancelled.
#[derive(Debug)]
pub(super) struct RequestError {
    pub(super) status: Option<u16>,
    pub(super) payload: Payload,
}

impl std::error::Error for RequestError {}

impl core::fmt::Display for RequestError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "request failed: {}", self.payload)
    }
}

impl Error {
    /// Creates a request error that did not come with an HTTP status.
    pub fn request(payload: impl Into<Payload>) -> Error {
        Error::from(super::ErrorKind::Request(RequestError {
            status: None,
            payload: payload.into(),
        }))
    }

    pub fn request_with_status(status: u16, payload: impl Into<Payload>) -> Error {
        Error::from(super::ErrorKind::Request(RequestError {
            status: Some(status),
            payload: payload.into(),
        }))
    }

    /// Returns `true` if this error is a request error.
    pub fn is_request(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Request(_))
    }
}
