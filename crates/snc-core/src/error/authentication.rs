use super::{Error, Payload};

/// HTTP 401 from any call. Never retried by the cursor layer.
#[derive(Debug)]
pub(super) struct AuthenticationError {
    pub(super) payload: Payload,
}

impl std::error::Error for AuthenticationError {}

impl core::fmt::Display for AuthenticationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "authentication failed: {}", self.payload)
    }
}

impl Error {
    /// Creates an authentication error carrying the server's error body.
    pub fn authentication(payload: impl Into<Payload>) -> Error {
        Error::from(super::ErrorKind::Authentication(AuthenticationError {
            payload: payload.into(),
        }))
    }

    /// Returns `true` if this error is an authentication error.
    pub fn is_authentication(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Authentication(_))
    }
}
