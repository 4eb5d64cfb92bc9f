pub mod api;

mod attachment;
pub use attachment::{Attachment, AttachmentIter};

pub mod blocking;

mod client;
pub use client::{get_instance, guess_is_sys_id, Builder, ServiceNowClient};

pub mod record;
pub use record::{GlideRecord, IntoFields, RecordIter};

pub use snc_core::{
    bail, err,
    element::TIMESTAMP_FORMAT,
    query::{JoinQuery, QueryCondition, RelatedListQuery},
    transport::{Method, Request, Response},
    DisplayValue, Error, GlideElement, Payload, Query, Result, Row, SerializeOptions, Transport,
    PRIMARY_KEY,
};
