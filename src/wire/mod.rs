//! The LQTP wire codec: length-prefixed, little-endian throughout.
//!
//! Encoding is pure and allocation-light (callers supply reusable scratch
//! buffers); decoding is strictly bounds-checked and never panics on a
//! truncated buffer, matching the guarantees in spec §4.1.

pub mod column;
pub mod message;
pub mod parameter;
pub mod query;
pub mod response;

pub use column::{Column, ColumnDefinition, ColumnType};
pub use message::MessageType;
pub use parameter::Parameter;
pub use query::Query;
pub use response::{decode_frame_payload, QueryResponse, QueryResponseData};
