use super::Error;

/// The server answered, but not in the shape the client relies on (missing
/// `result`, missing total-count header, mismatched batch id, ...).
#[derive(Debug)]
pub(super) struct InvalidResponse {
    message: Box<str>,
}

impl std::error::Error for InvalidResponse {}

impl core::fmt::Display for InvalidResponse {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "invalid response: {}", self.message)
    }
}

impl Error {
    pub fn invalid_response(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::InvalidResponse(InvalidResponse {
            message: message.into().into(),
        }))
    }

    pub fn is_invalid_response(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::InvalidResponse(_))
    }
}
