#[macro_use]
mod macros;

pub mod element;
pub use element::{DisplayValue, GlideElement, Row, SerializeOptions};

mod error;
pub use error::{Error, IntoError, Payload};

pub mod query;
pub use query::Query;

pub mod transport;
pub use transport::Transport;

/// A Result type alias that uses the client's [`Error`] type.
pub type Result<T> = core::result::Result<T, Error>;

pub use async_trait::async_trait;

/// Name of the primary key field present on every ServiceNow table.
pub const PRIMARY_KEY: &str = "sys_id";
