//! Driver-facing collaborators built on top of the LQTP core: a statement
//! that leases pooled connections, a rows cursor, an execute outcome, and a
//! transaction handle. See `SPEC_FULL.md` §B for why these are included
//! even though spec §1's non-goals stop at the core client.

pub mod result;
pub mod rows;
pub mod statement;
pub mod transaction;

pub use result::QueryResult;
pub use rows::Rows;
pub use statement::Statement;
pub use transaction::Transaction;
