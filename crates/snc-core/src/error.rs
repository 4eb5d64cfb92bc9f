mod adhoc;
mod authentication;
mod authorization;
mod invalid_instance;
mod invalid_response;
mod no_record;
mod not_found;
mod not_rewindable;
mod payload;
mod request;
mod transport;
mod upload;
mod write;

pub use payload::Payload;

use adhoc::AdhocError;
use authentication::AuthenticationError;
use authorization::AuthorizationError;
use invalid_instance::InvalidInstance;
use invalid_response::InvalidResponse;
use no_record::NoRecordError;
use not_found::NotFoundError;
use not_rewindable::NotRewindableError;
use request::RequestError;
use std::sync::Arc;
use transport::TransportError;
use upload::UploadError;
use write::WriteError;

/// An error that can occur while talking to a ServiceNow instance.
#[derive(Clone)]
pub struct Error {
    inner: Option<Arc<ErrorInner>>,
}

#[derive(Debug)]
struct ErrorInner {
    kind: ErrorKind,
    cause: Option<Error>,
}

impl Error {
    /// Adds context to this error.
    ///
    /// Context is displayed in reverse order: the most recently added context is shown first,
    /// followed by earlier context, ending with the root cause.
    #[inline(always)]
    pub fn context(self, consequent: impl IntoError) -> Error {
        self.context_impl(consequent.into_error())
    }

    #[inline(never)]
    #[cold]
    fn context_impl(self, consequent: Error) -> Error {
        let mut err = consequent;
        if err.inner.is_none() {
            err = Error::from(ErrorKind::Unknown);
        }
        let inner = err.inner.as_mut().unwrap();
        assert!(
            inner.cause.is_none(),
            "consequent error must not already have a cause"
        );
        Arc::get_mut(inner).unwrap().cause = Some(self);
        err
    }

    #[doc(hidden)]
    pub fn from_args(args: core::fmt::Arguments<'_>) -> Error {
        Error::from(ErrorKind::Adhoc(AdhocError::new(args)))
    }

    fn chain(&self) -> impl Iterator<Item = &Error> {
        let mut err = self;
        core::iter::once(err).chain(core::iter::from_fn(move || {
            err = err.inner.as_ref().and_then(|inner| inner.cause.as_ref())?;
            Some(err)
        }))
    }

    fn kind(&self) -> &ErrorKind {
        self.inner
            .as_ref()
            .map(|inner| &inner.kind)
            .unwrap_or(&ErrorKind::Unknown)
    }

    /// The HTTP status the server answered with, when the error came from a
    /// response.
    pub fn status(&self) -> Option<u16> {
        match self.kind() {
            ErrorKind::Authentication(_) => Some(401),
            ErrorKind::Authorization(_) => Some(403),
            ErrorKind::NotFound(_) => Some(404),
            ErrorKind::Request(err) => err.status,
            ErrorKind::Write(err) => Some(err.status),
            _ => None,
        }
    }

    /// The error body ServiceNow returned, if any.
    pub fn payload(&self) -> Option<&Payload> {
        match self.kind() {
            ErrorKind::Authentication(err) => Some(&err.payload),
            ErrorKind::Authorization(err) => Some(&err.payload),
            ErrorKind::NotFound(err) => Some(&err.payload),
            ErrorKind::Request(err) => Some(&err.payload),
            ErrorKind::Write(err) => Some(&err.payload),
            ErrorKind::Upload(err) => Some(&err.payload),
            _ => None,
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self.kind() {
            ErrorKind::Transport(err) => Some(err),
            ErrorKind::Anyhow(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let mut it = self.chain().peekable();
        while let Some(err) = it.next() {
            core::fmt::Display::fmt(err.kind(), f)?;
            if it.peek().is_some() {
                f.write_str(": ")?;
            }
        }
        Ok(())
    }
}

impl core::fmt::Debug for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        if !f.alternate() {
            core::fmt::Display::fmt(self, f)
        } else {
            let Some(ref inner) = self.inner else {
                return f.debug_struct("Error").field("kind", &"None").finish();
            };
            f.debug_struct("Error")
                .field("kind", &inner.kind)
                .field("cause", &inner.cause)
                .finish()
        }
    }
}

#[derive(Debug)]
enum ErrorKind {
    Anyhow(anyhow::Error),
    Adhoc(AdhocError),
    Authentication(AuthenticationError),
    Authorization(AuthorizationError),
    NotFound(NotFoundError),
    Request(RequestError),
    Write(WriteError),
    NoRecord(NoRecordError),
    NotRewindable(NotRewindableError),
    InvalidInstance(InvalidInstance),
    InvalidResponse(InvalidResponse),
    Transport(TransportError),
    Upload(UploadError),
    Unknown,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use self::ErrorKind::*;

        match self {
            Anyhow(err) => core::fmt::Display::fmt(err, f),
            Adhoc(err) => core::fmt::Display::fmt(err, f),
            Authentication(err) => core::fmt::Display::fmt(err, f),
            Authorization(err) => core::fmt::Display::fmt(err, f),
            NotFound(err) => core::fmt::Display::fmt(err, f),
            Request(err) => core::fmt::Display::fmt(err, f),
            Write(err) => core::fmt::Display::fmt(err, f),
            NoRecord(err) => core::fmt::Display::fmt(err, f),
            NotRewindable(err) => core::fmt::Display::fmt(err, f),
            InvalidInstance(err) => core::fmt::Display::fmt(err, f),
            InvalidResponse(err) => core::fmt::Display::fmt(err, f),
            Transport(err) => core::fmt::Display::fmt(err, f),
            Upload(err) => core::fmt::Display::fmt(err, f),
            Unknown => f.write_str("unknown servicenow client error"),
        }
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error {
            inner: Some(Arc::new(ErrorInner { kind, cause: None })),
        }
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Error {
        Error::from(ErrorKind::Anyhow(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Error {
        Error::from(anyhow::Error::from(err))
    }
}

/// Trait for types that can be converted into an Error.
pub trait IntoError {
    /// Converts this type into an Error.
    fn into_error(self) -> Error;
}

impl IntoError for Error {
    #[inline(always)]
    fn into_error(self) -> Error {
        self
    }
}
