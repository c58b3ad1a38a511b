//! ODBC provider.
//!
//! With the `odbc` feature the connection string goes to the platform's ODBC
//! driver manager, so DSNs and any installed driver work. Without it, SQL
//! Server driver strings (`Driver={ODBC Driver 18 for SQL Server};...`) are
//! rewritten and opened over TDS.

use crate::config::ProviderKind;
use crate::db::{Connection, ProviderAdapter};
use crate::error::Result;
use async_trait::async_trait;

/// ODBC provider (`-type Odbc`).
#[derive(Debug, Default)]
pub struct OdbcProvider;

impl OdbcProvider {
    /// Creates a new ODBC provider.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait(?Send)]
impl ProviderAdapter for OdbcProvider {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Odbc
    }

    #[cfg(feature = "odbc")]
    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>> {
        let connection = native::open(connection_string)?;
        Ok(Box::new(connection))
    }

    #[cfg(not(feature = "odbc"))]
    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>> {
        let ado = crate::db::connection_string::odbc_to_ado(connection_string)?;
        tracing::debug!("Opening ODBC connection over TDS");
        let connection = crate::db::sqlclient::open_tds(&ado).await?;
        Ok(Box::new(connection))
    }
}

#[cfg(feature = "odbc")]
mod native {
    use crate::db::{BufferedResult, Command, Connection, ResultSet, RowCursor, Value};
    use crate::error::{DbTestError, Result};
    use async_trait::async_trait;
    use odbc_api::{ConnectionOptions, Cursor, CursorImpl, Environment, ResultSetMetadata, StatementImpl};
    use std::sync::OnceLock;

    fn environment() -> Result<&'static Environment> {
        static ENV: OnceLock<std::result::Result<Environment, String>> = OnceLock::new();
        ENV.get_or_init(|| Environment::new().map_err(|e| e.to_string()))
            .as_ref()
            .map_err(|e| {
                DbTestError::connection(format!("Failed to initialize the ODBC environment: {e}"))
            })
    }

    pub(super) fn open(connection_string: &str) -> Result<NativeConnection> {
        let connection = environment()?
            .connect_with_connection_string(connection_string, ConnectionOptions::default())
            .map_err(|e| DbTestError::connection_with("The ODBC driver failed to connect.", e))?;
        Ok(NativeConnection { connection })
    }

    pub(super) struct NativeConnection {
        connection: odbc_api::Connection<'static>,
    }

    fn timeout_secs(command: &Command) -> Option<usize> {
        command.timeout.map(|d| d.as_secs() as usize)
    }

    fn command_error(error: odbc_api::Error) -> DbTestError {
        DbTestError::command_with(error.to_string(), error)
    }

    #[async_trait(?Send)]
    impl Connection for NativeConnection {
        async fn execute_non_query(&mut self, command: &Command) -> Result<()> {
            self.connection
                .execute(&command.text, (), timeout_secs(command))
                .map_err(command_error)?;
            Ok(())
        }

        async fn execute_reader<'a>(
            &'a mut self,
            command: &Command,
        ) -> Result<Box<dyn RowCursor + 'a>> {
            let cursor = self
                .connection
                .execute(&command.text, (), timeout_secs(command))
                .map_err(command_error)?;
            Ok(Box::new(NativeCursor { cursor }))
        }

        async fn fill_buffered(&mut self, command: &Command) -> Result<BufferedResult> {
            let Some(mut cursor) = self
                .connection
                .execute(&command.text, (), timeout_secs(command))
                .map_err(command_error)?
            else {
                return Ok(BufferedResult::default());
            };

            let columns = cursor
                .column_names()
                .map_err(command_error)?
                .collect::<std::result::Result<Vec<String>, _>>()
                .map_err(command_error)?;
            let mut set = ResultSet::new(columns);
            let column_count = set.columns.len();

            let mut buf = Vec::new();
            while let Some(mut row) = cursor.next_row().map_err(command_error)? {
                let mut values = Vec::with_capacity(column_count);
                for index in 1..=column_count {
                    buf.clear();
                    let present = row.get_text(index as u16, &mut buf).map_err(command_error)?;
                    values.push(if present {
                        Value::String(String::from_utf8_lossy(&buf).into_owned())
                    } else {
                        Value::Null
                    });
                }
                set.rows.push(values);
            }
            Ok(BufferedResult::new(vec![set]))
        }

        async fn close(self: Box<Self>) -> Result<()> {
            // Dropping the handle disconnects
            drop(self);
            Ok(())
        }
    }

    struct NativeCursor<'a> {
        cursor: Option<CursorImpl<StatementImpl<'a>>>,
    }

    #[async_trait(?Send)]
    impl RowCursor for NativeCursor<'_> {
        async fn advance(&mut self) -> Result<bool> {
            let Some(cursor) = self.cursor.as_mut() else {
                return Ok(false);
            };
            Ok(cursor.next_row().map_err(command_error)?.is_some())
        }
    }
}
