use super::Error;

/// A non-rewindable cursor was asked to go back to the start.
#[derive(Debug)]
pub(super) struct NotRewindableError {
    operation: &'static str,
}

impl std::error::Error for NotRewindableError {}

impl core::fmt::Display for NotRewindableError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(
            f,
            "cannot {} a non-rewindable record that has been iterated upon",
            self.operation
        )
    }
}

impl Error {
    pub fn not_rewindable(operation: &'static str) -> Error {
        Error::from(super::ErrorKind::NotRewindable(NotRewindableError {
            operation,
        }))
    }

    pub fn is_not_rewindable(&self) -> bool {
        matches!(self.kind(), super::ErrorKind::NotRewindable(_))
    }
}
