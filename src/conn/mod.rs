//! Connection-layer types: parsing the connection string, a single
//! multiplexed connection, and the pool that manages a handful of them.

pub mod connection;
pub mod params;
pub mod pool;

pub use connection::{Connection, ConnectionStatistics};
pub use params::ConnectParams;
pub use pool::ConnectionPool;
