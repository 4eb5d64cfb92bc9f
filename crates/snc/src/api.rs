//! Thin request builders for the Table, Attachment and Batch REST APIs.

mod attachment;
pub use attachment::AttachmentApi;

mod batch;
pub use batch::{BatchApi, Callback, MAX_ATTEMPTS};

mod table;
pub use table::TableApi;

use indexmap::IndexMap;

/// Query string parameters, in insertion order.
pub type Params = IndexMap<String, String>;

/// Text ServiceNow puts in the body when it kills a long running query.
pub(crate) const MAX_EXECUTION_TIME_EXCEEDED: &str =
    "Transaction cancelled: maximum execution time exceeded";

/// Apply the parameters every Table/Attachment API call carries.
pub(crate) fn set_params(params: Option<Params>) -> Params {
    let mut params = params.unwrap_or_default();
    params
        .entry("sysparm_display_value".to_string())
        .or_insert_with(|| "all".to_string());
    params
        .entry("sysparm_exclude_reference_link".to_string())
        .or_insert_with(|| "true".to_string());
    // Large result sets fail without this.
    params.insert(
        "sysparm_suppress_pagination_header".to_string(),
        "true".to_string(),
    );
    params
}

/// Length of the parameters rendered as `k=v&k=v`, before URL encoding.
pub(crate) fn params_len(params: &Params) -> usize {
    let pairs: usize = params.iter().map(|(k, v)| k.len() + 1 + v.len()).sum();
    pairs + params.len().saturating_sub(1)
}
