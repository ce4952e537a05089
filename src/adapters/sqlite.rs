use std::time::Duration;

use rusqlite::{Connection, OpenFlags};

use super::factory::ConnectionFactory;
use super::options::ConnectOptions;
use crate::error::{ErrorKind, Result, translate};

/// Database name that opens a private in-memory database.
pub const MEMORY_DATABASE: &str = ":memory:";

/// Factory opening `rusqlite` connections.
///
/// Recognized options:
/// - `database`: file path; missing or empty opens [`MEMORY_DATABASE`]
/// - `readonly`: open the file read-only
/// - `timeout`: busy timeout in milliseconds
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteFactory;

impl SqliteFactory {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ConnectionFactory for SqliteFactory {
    type Handle = Connection;

    fn create(&self, options: &ConnectOptions) -> Result<Connection> {
        let path = options
            .database()
            .filter(|db| !db.is_empty())
            .unwrap_or(MEMORY_DATABASE);

        let flags = if options.get_bool("readonly").unwrap_or(false) {
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX
        } else {
            OpenFlags::default()
        };

        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| translate(e, ErrorKind::Connection))?;

        if let Some(ms) = options.get_i64("timeout") {
            let ms = u64::try_from(ms).unwrap_or(0);
            conn.busy_timeout(Duration::from_millis(ms))
                .map_err(|e| translate(e, ErrorKind::Connection))?;
        }

        tracing::debug!(path, "opened SQLite connection");
        Ok(conn)
    }

    fn destroy(&self, handle: Connection) -> Result<()> {
        handle
            .close()
            .map_err(|(_, e)| translate(e, ErrorKind::Connection))
    }
}
