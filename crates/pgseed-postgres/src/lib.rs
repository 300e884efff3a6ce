//! Postgres destination for pgseed.

pub mod connect;
pub mod ddl;
mod session;

pub use connect::{ConnectOptions, connect, target_options};
pub use session::PgSession;
