use super::Error;

#[derive(Debug)]
pub(super) struct InvalidInstance {
    message: Box<str>,
}

impl Error {
    pub fn invalid_instance(message: impl Into<String>) -> Error {
        Error::from(super::ErrorKind::InvalidInstance(InvalidInstance {
            message: message.into().into(),
        }))
    }

    pub fn is_invalid_instance(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::InvalidInstance(_))
    }
}

impl std::fmt::Display for InvalidInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid instance: {}", self.message)
    }
}
