use super::{Error, Payload};

#[derive(Debug)]
pub(super) struct UploadError {
    pub(super) payload: Payload,
}

impl std::error::Error for UploadError {}

impl core::fmt::Display for UploadError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "attachment upload failed: {}", self.payload)
    }
}

impl Error {
    pub fn upload(payload: impl Into<Payload>) -> Error {
        Error::from(super::ErrorKind::Upload(UploadError {
            payload: payload.into(),
        }))
    }

    pub fn is_upload(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::Upload(_))
    }
}
