use super::{Error, Payload};

/// HTTP 403: the user is authenticated but lacks the role or ACL.
#[derive(Debug)]
pub(super) struct AuthorizationError {
    pub(super) payload: Payload,
}

impl std::error::Error for AuthorizationError {}

impl core::fmt::Display for AuthorizationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "not authorized: {}", self.payload)
    }
}

impl Error {
    pub fn authorization(payload: impl Into<Payload>) -> Error {
        Error::from(super::ErrorKind::Authorization(AuthorizationError {
            payload: payload.into(),
        }))
    }

    pub fn is_authorization(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Authorization(_))
    }
}
