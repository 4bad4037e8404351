//! Data models for fluent-db.
//!
//! Plain data types shared by the drivers, the resolver and the command
//! pipeline.

mod connection;
mod record;
mod value;

pub use connection::*;
pub use record::*;
pub use value::*;
