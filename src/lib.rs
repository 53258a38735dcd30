//! Client-side core of the Litebase Query Transport Protocol (LQTP), a
//! binary request/response framing carried over a long-lived, bidirectional
//! HTTP streaming body.
//!
//! The wire codec, HMAC request signer, frame batching, write queue and
//! multiplexed `Connection`/`ConnectionPool` live here; `driver` adds a
//! thin `Statement`/`Rows`/`Transaction` layer on top for callers that want
//! a `database/sql`-shaped API instead of the raw core.

#![deny(clippy::all)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
extern crate log;

pub mod buffer_pool;
pub mod conn;
pub mod driver;
pub mod error;
pub mod frame;
pub mod ping;
pub mod signer;
pub mod wire;
mod write_queue;

pub use crate::conn::{Connection, ConnectionPool, ConnectionStatistics, ConnectParams};
pub use crate::driver::{QueryResult, Rows, Statement, Transaction};
pub use crate::error::{LbError, LbResult};
pub use crate::frame::Frame;
pub use crate::ping::ping;
pub use crate::wire::{Column, ColumnDefinition, ColumnType, MessageType, Parameter, Query, QueryResponse};
