//! Wire-level helpers shared by the transport and the form bridge.
//!
//! - **[headers]** - header names, `Retry-After` parsing, content-type checks
//! - **[query]** - query parameter model with bracket-notation flattening

pub mod headers;
pub mod query;

pub use headers::{
    is_json_content_type, parse_retry_after, strip_quotes, ACCEPT_HTML, ACCEPT_JSON,
    X_CSRF_TOKEN, X_LIVEWIRE,
};
pub use query::{ParamValue, Params};
