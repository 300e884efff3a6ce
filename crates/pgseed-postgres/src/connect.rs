use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgPoolOptions};

use pgseed_core::{Error, Result};

use crate::session::PgSession;

/// Pool and timeout settings for a target connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// Server-side `statement_timeout`; a timed-out statement fails the load
    /// and the outermost scope rolls back.
    pub statement_timeout: Option<Duration>,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            max_connections: 5,
            acquire_timeout: Duration::from_secs(10),
            statement_timeout: None,
        }
    }
}

/// Build connect options for `database` on the server named by `base_url`.
pub fn target_options(
    base_url: &str,
    database: &str,
    options: &ConnectOptions,
) -> Result<PgConnectOptions> {
    let mut connect_options = base_url
        .parse::<PgConnectOptions>()
        .map_err(|err| Error::Db(format!("invalid connection string: {err}")))?
        .database(database);

    if let Some(timeout) = options.statement_timeout {
        connect_options = connect_options
            .options([("statement_timeout", format!("{}ms", timeout.as_millis()))]);
    }

    Ok(connect_options)
}

/// Open a session on `database`.
///
/// The pool connects lazily, so an unreachable server surfaces on the first
/// statement or `begin` rather than here.
pub fn connect(base_url: &str, database: &str, options: &ConnectOptions) -> Result<PgSession> {
    let connect_options = target_options(base_url, database, options)?;
    let pool = PgPoolOptions::new()
        .max_connections(options.max_connections)
        .acquire_timeout(options.acquire_timeout)
        .connect_lazy_with(connect_options);
    Ok(PgSession::new(pool))
}
